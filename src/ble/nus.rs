//! Nordic-UART-style GATT service: peers write to RX, we notify on TX.

use heapless::Vec;
use multilink::config::NOTIFY_CHUNK_SIZE;

/// One notification / write payload, bounded by the negotiated ATT MTU.
pub type Chunk = Vec<u8, NOTIFY_CHUNK_SIZE>;

#[nrf_softdevice::gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct NusService {
    /// Peer → node.
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response)]
    pub rx: Chunk,
    /// Node → peer.
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify)]
    pub tx: Chunk,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub nus: NusService,
}
