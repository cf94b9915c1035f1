//! Bluetooth Low Energy transport.
//!
//! Drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **NUS service** - a UART-style GATT service; RX writes feed the
//!    session queue, TX notifications carry outbound data.
//! 2. **Link registry** - maps each session [`LinkId`] to its live
//!    SoftDevice [`Connection`] so the session manager can transmit and
//!    tear down by identity.
//! 3. **Peripheral tasks** - connectable advertising and one task per link.

pub mod nus;
pub mod peripheral;

use core::cell::RefCell;

use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::{String, Vec};
use multilink::config::{LE_DEVICE_NAME, MAX_CONNECTIONS, MAX_DEVICE_NAME_LEN, NOTIFY_CHUNK_SIZE};
use multilink::{LinkId, LinkTransport, TransportError};
use nrf_softdevice::ble::gatt_server::NotifyValueError;
use nrf_softdevice::ble::Connection;
use nrf_softdevice::raw;

use self::nus::{Chunk, Server};

/// [`LinkTransport`] over SoftDevice GATT notifications.
pub struct LeTransport {
    server: &'static Server,
    links: Mutex<CriticalSectionRawMutex, RefCell<Vec<(LinkId, Connection), MAX_CONNECTIONS>>>,
    name: Mutex<CriticalSectionRawMutex, RefCell<String<MAX_DEVICE_NAME_LEN>>>,
}

impl LeTransport {
    pub fn new(server: &'static Server) -> Self {
        let mut name = String::new();
        let _ = name.push_str(LE_DEVICE_NAME);
        Self {
            server,
            links: Mutex::new(RefCell::new(Vec::new())),
            name: Mutex::new(RefCell::new(name)),
        }
    }

    pub fn server(&self) -> &'static Server {
        self.server
    }

    /// Make `conn` reachable by identity. Returns `false` when the registry
    /// is full.
    pub fn register(&self, link: LinkId, conn: Connection) -> bool {
        self.links.lock(|links| {
            let mut links = links.borrow_mut();
            links.retain(|(l, _)| *l != link);
            links.push((link, conn)).is_ok()
        })
    }

    pub fn unregister(&self, link: LinkId) {
        self.links
            .lock(|links| links.borrow_mut().retain(|(l, _)| *l != link));
    }

    /// Name currently advertised.
    pub fn device_name(&self) -> String<MAX_DEVICE_NAME_LEN> {
        self.name.lock(|n| n.borrow().clone())
    }

    fn connection(&self, link: LinkId) -> Option<Connection> {
        self.links.lock(|links| {
            links
                .borrow()
                .iter()
                .find(|(l, _)| *l == link)
                .map(|(_, c)| c.clone())
        })
    }
}

impl LinkTransport for LeTransport {
    fn transmit(&self, link: LinkId, payload: &[u8]) -> Result<(), TransportError> {
        let conn = self.connection(link).ok_or(TransportError::LinkClosed)?;
        for chunk in payload.chunks(NOTIFY_CHUNK_SIZE) {
            let value = Chunk::from_slice(chunk).map_err(|_| TransportError::Unsupported)?;
            self.server.nus.tx_notify(&conn, &value).map_err(|e| match e {
                NotifyValueError::Disconnected => TransportError::LinkClosed,
                NotifyValueError::Raw(raw) => TransportError::Raw(raw as u32),
            })?;
        }
        debug!("notified {} bytes to {}", payload.len(), link);
        Ok(())
    }

    fn disconnect(&self, link: LinkId) -> Result<(), TransportError> {
        let conn = self.connection(link).ok_or(TransportError::LinkClosed)?;
        conn.disconnect().map_err(|_| TransportError::LinkClosed)?;
        info!("teardown requested for {}", link);
        Ok(())
    }

    fn set_device_name(&self, name: &str) -> Result<(), TransportError> {
        // Open write permission (security mode 1, level 1).
        let mut perm: raw::ble_gap_conn_sec_mode_t = unsafe { core::mem::zeroed() };
        perm.set_sm(1);
        perm.set_lv(1);

        let ret = unsafe { raw::sd_ble_gap_device_name_set(&perm, name.as_ptr(), name.len() as u16) };
        if ret != raw::NRF_SUCCESS {
            warn!("sd_ble_gap_device_name_set failed: {}", ret);
            return Err(TransportError::Raw(ret));
        }

        self.name.lock(|n| {
            let mut n = n.borrow_mut();
            n.clear();
            let _ = n.push_str(name);
        });
        info!("device name set to {}", name);
        Ok(())
    }
}
