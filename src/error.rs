//! Error types for the session manager and its transports.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging, and `Display` for host tooling.

use core::fmt;

/// Error returned by every public session operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// Payload empty or longer than `MAX_PACKET_SIZE`.
    InvalidArgument,

    /// No slot holds the given link identity.
    NotFound,

    /// The connection table guard could not be acquired in time.
    Contention,

    /// Called before the transports reported ready (`start`).
    Uninitialized,

    /// The event queue was full; the message was dropped.
    QueueFull,

    /// The underlying transport rejected the request.
    Transport(TransportError),
}

/// Failures reported by a radio transport, forwarded verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Raw error code from the vendor stack.
    Raw(u32),
    /// The link is no longer open at the transport level.
    LinkClosed,
    /// This transport cannot carry the request (e.g. no radio for it).
    Unsupported,
}

// Convenience conversions

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "payload empty or too large"),
            Self::NotFound => write!(f, "unknown link"),
            Self::Contention => write!(f, "connection table busy"),
            Self::Uninitialized => write!(f, "session manager not started"),
            Self::QueueFull => write!(f, "event queue full"),
            Self::Transport(e) => write!(f, "transport failure: {}", e),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(code) => write!(f, "stack error 0x{:x}", code),
            Self::LinkClosed => write!(f, "link closed"),
            Self::Unsupported => write!(f, "unsupported by transport"),
        }
    }
}
