//! multilink - multi-link Bluetooth node firmware.
//!
//! Runs on an nRF52840 with the Nordic SoftDevice S140 in peripheral role.
//! Up to eight centrals connect over a UART-style GATT service; every link
//! is tracked by the session manager, and inbound data is echoed back to its
//! sender through the session queue.
//!
//! Task layout:
//! - `softdevice_task` - SoftDevice event pump
//! - `session_task`    - the session manager's processing loop
//! - `link_task` (x8)  - one GATT server loop per connection
//! - `main`            - connectable advertising while slots are free

#![no_std]
#![no_main]

mod ble;

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::interrupt;
use multilink::config::{
    ATT_MTU, BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN, BLE_SUP_TIMEOUT, LE_DEVICE_NAME,
    MAX_CONNECTIONS,
};
use multilink::{LinkId, ReceiveHandler, SessionManager};
use nrf_softdevice::{self as sd, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::ble::nus::Server;
use crate::ble::peripheral::{self, Session};
use crate::ble::LeTransport;

static SERVER: StaticCell<Server> = StaticCell::new();
static SESSION: StaticCell<Session> = StaticCell::new();
static ECHO: StaticCell<Echo> = StaticCell::new();

/// Sends every received payload straight back to its sender.
struct Echo {
    session: &'static Session,
}

impl ReceiveHandler for Echo {
    fn on_receive(&self, link: LinkId, payload: &[u8]) {
        info!("[echo] {} bytes from {}", payload.len(), link);
        if let Err(e) = self.session.send_queued(link, payload) {
            warn!("[echo] reply to {} not queued: {}", link, e);
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("multilink starting...");

    // SoftDevice owns RTC0/TIMER0 and the top interrupt priorities.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;
    let _p = embassy_nrf::init(nrf_config);

    let config = sd::Config {
        clock: Some(sd::raw::nrf_clock_lf_cfg_t {
            source: sd::raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: sd::raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(sd::raw::ble_gap_conn_cfg_t {
            conn_count: MAX_CONNECTIONS as u8,
            event_length: 6,
        }),
        conn_gatt: Some(sd::raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
        gatts_attr_tab_size: Some(sd::raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: sd::raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(sd::raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: MAX_CONNECTIONS as u8,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: sd::raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(sd::raw::ble_gap_cfg_device_name_t {
            p_value: LE_DEVICE_NAME.as_ptr() as _,
            current_len: LE_DEVICE_NAME.len() as u16,
            max_len: multilink::config::MAX_DEVICE_NAME_LEN as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: sd::raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                sd::raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&config);
    let server: &'static Server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;
    set_preferred_conn_params();
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let session: &'static Session = SESSION.init(SessionManager::new(LeTransport::new(server)));
    let echo: &'static Echo = ECHO.init(Echo { session });
    session.set_receive_callback(Some(echo));
    unwrap!(session.set_identity_name(LE_DEVICE_NAME));
    session.start();

    unwrap!(spawner.spawn(session_task(session)));

    info!("All tasks spawned - advertising");
    peripheral::advertise_forever(sd, session, spawner).await
}

/// Peripheral preferred connection parameters (PPCP).
fn set_preferred_conn_params() {
    let params = sd::raw::ble_gap_conn_params_t {
        min_conn_interval: BLE_CONN_INTERVAL_MIN,
        max_conn_interval: BLE_CONN_INTERVAL_MAX,
        slave_latency: 0,
        conn_sup_timeout: BLE_SUP_TIMEOUT,
    };
    let ret = unsafe { sd::raw::sd_ble_gap_ppcp_set(&params) };
    if ret != sd::raw::NRF_SUCCESS {
        warn!("sd_ble_gap_ppcp_set failed: {}", ret);
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    info!("SoftDevice task started");
    sd.run().await
}

#[embassy_executor::task]
async fn session_task(session: &'static Session) -> ! {
    session.run().await
}
