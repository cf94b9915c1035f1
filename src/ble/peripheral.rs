//! Connectable advertising and per-link GATT tasks.

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use multilink::config::{BLE_ADV_INTERVAL, MAX_CONNECTIONS};
use multilink::{BdAddr, LinkId, SessionManager};
use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
};
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::Softdevice;

use super::nus::{NusServiceEvent, ServerEvent};
use super::LeTransport;

pub type Session = SessionManager<'static, LeTransport>;

/// NUS service UUID, little-endian as it goes on air.
const NUS_UUID: [u8; 16] = [
    0x9e, 0xca, 0xdc, 0x24, 0x0e, 0xe5, 0xa9, 0xe0, 0x93, 0xf3, 0xa3, 0xb5, 0x01, 0x00, 0x40, 0x6e,
];

/// Raised by a link task when its slot frees up.
static LINK_CLOSED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

fn adv_data() -> LegacyAdvertisementPayload {
    LegacyAdvertisementBuilder::new()
        .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
        .services_128(ServiceList::Complete, &[NUS_UUID])
        .build()
}

fn scan_data(name: &str) -> LegacyAdvertisementPayload {
    LegacyAdvertisementBuilder::new().full_name(name).build()
}

/// Advertise whenever a link slot is free and hand each new connection to
/// its own task. Never returns.
pub async fn advertise_forever(sd: &'static Softdevice, session: &'static Session, spawner: Spawner) -> ! {
    let config = peripheral::Config {
        interval: BLE_ADV_INTERVAL,
        ..Default::default()
    };
    let adv = adv_data();

    loop {
        let connected = session.connected_count().await.unwrap_or(MAX_CONNECTIONS);
        if connected >= MAX_CONNECTIONS {
            info!("[adv] all {} link slots busy - pausing advertising", MAX_CONNECTIONS);
            LINK_CLOSED.wait().await;
            continue;
        }

        let name = session.transport().device_name();
        let scan = scan_data(&name);
        let advertisement = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv,
            scan_data: &scan,
        };

        info!("[adv] advertising as {} ({}/{} links)", name.as_str(), connected, MAX_CONNECTIONS);
        match peripheral::advertise_connectable(sd, advertisement, &config).await {
            Ok(conn) => {
                if let Err(e) = spawner.spawn(link_task(conn, session)) {
                    warn!("[adv] no task left for new link: {:?}", e);
                }
            }
            Err(e) => {
                warn!("[adv] error (will retry): {:?}", e);
                Timer::after_millis(250).await;
            }
        }
    }
}

/// Owns one connection from accept to disconnect.
#[embassy_executor::task(pool_size = MAX_CONNECTIONS)]
async fn link_task(conn: Connection, session: &'static Session) {
    let Some(handle) = conn.handle() else {
        warn!("[link] connection closed before it was tracked");
        return;
    };
    let link = LinkId::low_energy(handle as u32);
    let le = session.transport();

    if !le.register(link, conn.clone()) {
        warn!("[link] registry full - dropping {}", link);
        if let Err(e) = conn.disconnect() {
            warn!("[link] teardown of {} failed: {:?}", link, e);
        }
        return;
    }

    let mut raw = conn.peer_address().bytes();
    raw.reverse();
    match session.on_connect(link, BdAddr(raw)).await {
        Ok(Some(_)) => {}
        Ok(None) => warn!("[link] {} connected but not tracked", link),
        Err(e) => warn!("[link] {} connect not recorded: {}", link, e),
    }

    let reason = gatt_server::run(&conn, le.server(), |event| match event {
        ServerEvent::Nus(NusServiceEvent::RxWrite(data)) => {
            if let Err(e) = session.on_data(link, &data) {
                warn!("[link] rx from {} dropped: {}", link, e);
            }
        }
        ServerEvent::Nus(NusServiceEvent::TxCccdWrite { notifications }) => {
            info!("[link] {} notifications {}", link, notifications);
        }
    })
    .await;
    info!("[link] {} closed: {:?}", link, reason);

    le.unregister(link);
    if let Err(e) = session.on_disconnect(link).await {
        warn!("[link] {} release not recorded: {}", link, e);
    }
    LINK_CLOSED.signal(());
}
