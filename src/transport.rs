//! Transport contracts between the session manager and the radio stacks.
//!
//! The manager never talks to a radio directly. Inbound, each stack delivers
//! [`LinkEvent`]s (connect, disconnect, data). Outbound, the manager calls a
//! [`LinkTransport`] to transmit to one link, tear a link down, or rename the
//! node. [`DualTransport`] puts the classic and low-energy stacks behind a
//! single `LinkTransport` so one manager serves both.

use core::fmt;

use crate::error::TransportError;

/// Which radio transport owns a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportKind {
    /// Connection-oriented classic transport (SPP).
    Classic,
    /// GATT-based low-energy transport.
    LowEnergy,
}

/// Identity of one link, as assigned by its transport.
///
/// The transport kind is part of the identity, so a classic handle and a
/// low-energy connection handle with the same number never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkId {
    pub transport: TransportKind,
    pub handle: u32,
}

impl LinkId {
    pub const fn classic(handle: u32) -> Self {
        Self {
            transport: TransportKind::Classic,
            handle,
        }
    }

    pub const fn low_energy(handle: u32) -> Self {
        Self {
            transport: TransportKind::LowEnergy,
            handle,
        }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport {
            TransportKind::Classic => write!(f, "spp#{}", self.handle),
            TransportKind::LowEnergy => write!(f, "le#{}", self.handle),
        }
    }
}

/// 6-byte hardware address of a peer, most significant byte first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const ZERO: BdAddr = BdAddr([0; 6]);
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Event delivered by a radio stack to the session manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent<'a> {
    /// A peer opened a link.
    Connected { link: LinkId, address: BdAddr },
    /// A link closed (peer, local request, or supervision timeout).
    Disconnected { link: LinkId },
    /// A peer wrote data on an open link.
    Data { link: LinkId, payload: &'a [u8] },
}

/// Outbound half of a radio stack.
///
/// Implementations are called from the session manager while it holds the
/// connection table guard, so they must not block for long and must not call
/// back into the manager.
pub trait LinkTransport {
    /// Transmit `payload` to a single open link.
    fn transmit(&self, link: LinkId, payload: &[u8]) -> Result<(), TransportError>;

    /// Request transport-level teardown of a link. Completion is reported
    /// later as a [`LinkEvent::Disconnected`].
    fn disconnect(&self, link: LinkId) -> Result<(), TransportError>;

    /// Change the name this node presents to peers.
    fn set_device_name(&self, name: &str) -> Result<(), TransportError>;
}

impl<T: LinkTransport + ?Sized> LinkTransport for &T {
    fn transmit(&self, link: LinkId, payload: &[u8]) -> Result<(), TransportError> {
        (**self).transmit(link, payload)
    }

    fn disconnect(&self, link: LinkId) -> Result<(), TransportError> {
        (**self).disconnect(link)
    }

    fn set_device_name(&self, name: &str) -> Result<(), TransportError> {
        (**self).set_device_name(name)
    }
}

/// Routes each request to the classic or low-energy transport by the link's
/// [`TransportKind`].
pub struct DualTransport<C, L> {
    classic: C,
    low_energy: L,
}

impl<C: LinkTransport, L: LinkTransport> DualTransport<C, L> {
    pub const fn new(classic: C, low_energy: L) -> Self {
        Self {
            classic,
            low_energy,
        }
    }

    pub fn classic(&self) -> &C {
        &self.classic
    }

    pub fn low_energy(&self) -> &L {
        &self.low_energy
    }

    fn route(&self, kind: TransportKind) -> &dyn LinkTransport {
        match kind {
            TransportKind::Classic => &self.classic,
            TransportKind::LowEnergy => &self.low_energy,
        }
    }
}

impl<C: LinkTransport, L: LinkTransport> LinkTransport for DualTransport<C, L> {
    fn transmit(&self, link: LinkId, payload: &[u8]) -> Result<(), TransportError> {
        self.route(link.transport).transmit(link, payload)
    }

    fn disconnect(&self, link: LinkId) -> Result<(), TransportError> {
        self.route(link.transport).disconnect(link)
    }

    /// Both transports are renamed; the first failure is reported after the
    /// second transport has still been updated.
    fn set_device_name(&self, name: &str) -> Result<(), TransportError> {
        let classic = self.classic.set_device_name(name);
        let low_energy = self.low_energy.set_device_name(name);
        classic.and(low_energy)
    }
}
