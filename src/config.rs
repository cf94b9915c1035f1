//! Application-wide constants and compile-time configuration.
//!
//! Session limits, radio timing parameters and mesh identity constants
//! live here so they can be tuned in one place. Nothing is runtime
//! configurable.

// Session manager

/// Maximum simultaneous links across both transports.
pub const MAX_CONNECTIONS: usize = 8;

/// Largest payload accepted by `send`, `broadcast` and the event queue.
pub const MAX_PACKET_SIZE: usize = 512;

/// Capacity of the event ingress queue (messages).
pub const QUEUE_CAPACITY: usize = 20;

/// Longest time any caller may wait for the connection table guard (ms).
pub const GUARD_TIMEOUT_MS: u64 = 100;

/// Maximum display name length in bytes. Longer names are truncated.
pub const MAX_DEVICE_NAME_LEN: usize = 32;

/// Default name for the classic (SPP) transport.
pub const CLASSIC_DEVICE_NAME: &str = "Multilink_SPP";

/// Default name advertised by the low-energy transport.
pub const LE_DEVICE_NAME: &str = "Multilink_BLE";

// BLE (peripheral role)

/// Advertising interval (in 0.625 ms units). 160 = 100 ms.
pub const BLE_ADV_INTERVAL: u32 = 160;

/// BLE connection interval range (in 1.25 ms units).
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Negotiated ATT MTU. Notifications carry at most `ATT_MTU - 3` bytes.
pub const ATT_MTU: u16 = 247;

/// Largest single notification payload; longer sends are chunked.
pub const NOTIFY_CHUNK_SIZE: usize = ATT_MTU as usize - 3;

// Mesh node

/// Bluetooth SIG company identifier placed in the mesh composition data.
pub const MESH_COMPANY_ID: u16 = 0x02E5;

/// Device UUID used for unprovisioned-device beacons.
pub const MESH_DEVICE_UUID: [u8; 16] = [
    0xdd, 0xdd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
