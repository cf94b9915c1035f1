//! multilink - multi-link Bluetooth session manager.
//!
//! Tracks up to eight concurrent links across a classic (SPP) and a
//! low-energy (GATT) transport and exposes one API for sending,
//! broadcasting, disconnecting and enumerating them. Inbound data is queued
//! by the radio stacks and delivered to a single receive callback from one
//! processing task.
//!
//! The library is `no_std` and runs unchanged on the host, which is where
//! the unit and integration tests execute: `cargo test --lib`.
//!
//! Note: The embedded binary (main.rs, `embedded` feature) wires the
//! session manager to the nRF SoftDevice.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod mesh;
pub mod session;
pub mod transport;

pub use error::{SessionError, TransportError};
pub use session::{BroadcastReport, LinkInfo, LinkState, ReceiveHandler, SessionManager};
pub use transport::{BdAddr, DualTransport, LinkEvent, LinkId, LinkTransport, TransportKind};
