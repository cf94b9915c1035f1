//! Fixed-capacity table of link slots.
//!
//! Pure data plus invariant enforcement; locking is the caller's job (see
//! [`super::guard`]). Lookups are linear scans - with eight slots a map
//! would cost more than it saves.
//!
//! Invariants:
//! - at most one slot holds a given [`LinkId`];
//! - a slot with no identity is `Disconnected`;
//! - byte counters survive `release` and are cleared by the next `allocate`.

use embassy_time::Instant;
use heapless::Vec;

use crate::config::MAX_CONNECTIONS;
use crate::transport::{BdAddr, LinkId};

/// Index of a row in the [`ConnectionTable`].
pub type SlotIndex = usize;

/// Lifecycle state of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    /// Reserved for transports that report a link before setup completes;
    /// `allocate` goes straight to `Connected`.
    Connecting,
    Connected,
    Disconnecting,
}

/// One row of the connection table.
#[derive(Clone, Debug)]
pub struct LinkSlot {
    pub identity: Option<LinkId>,
    pub state: LinkState,
    pub remote_address: BdAddr,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub last_activity: Instant,
}

impl LinkSlot {
    pub const fn empty() -> Self {
        Self {
            identity: None,
            state: LinkState::Disconnected,
            remote_address: BdAddr::ZERO,
            bytes_received: 0,
            bytes_sent: 0,
            last_activity: Instant::from_ticks(0),
        }
    }

    fn holds(&self, link: LinkId) -> bool {
        self.identity == Some(link)
    }
}

/// Read-only copy of a connected slot, as returned by [`ConnectionTable::snapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkInfo {
    pub link: LinkId,
    pub remote_address: BdAddr,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub last_activity: Instant,
}

pub struct ConnectionTable {
    slots: [LinkSlot; MAX_CONNECTIONS],
}

impl ConnectionTable {
    pub const fn new() -> Self {
        const EMPTY: LinkSlot = LinkSlot::empty();
        Self {
            slots: [EMPTY; MAX_CONNECTIONS],
        }
    }

    /// Claim the first free slot for a new link.
    ///
    /// Returns `None` when every slot is in use. If `link` already owns a
    /// slot, that slot is refreshed and returned instead of creating a
    /// second entry.
    pub fn allocate(&mut self, link: LinkId, address: BdAddr, now: Instant) -> Option<SlotIndex> {
        let index = match self.find(link) {
            Some(existing) => existing,
            None => self
                .slots
                .iter()
                .position(|s| s.state == LinkState::Disconnected)?,
        };

        let slot = &mut self.slots[index];
        if slot.identity.is_none() {
            slot.bytes_received = 0;
            slot.bytes_sent = 0;
        }
        slot.identity = Some(link);
        slot.state = LinkState::Connected;
        slot.remote_address = address;
        slot.last_activity = now;
        Some(index)
    }

    /// Return the slot held by `link` to the free pool. No-op if absent.
    pub fn release(&mut self, link: LinkId) -> Option<SlotIndex> {
        let index = self.find(link)?;
        let slot = &mut self.slots[index];
        slot.state = LinkState::Disconnected;
        slot.identity = None;
        Some(index)
    }

    pub fn find(&self, link: LinkId) -> Option<SlotIndex> {
        self.slots.iter().position(|s| s.holds(link))
    }

    /// Slot index of `link` if it is fully connected.
    pub fn find_connected(&self, link: LinkId) -> Option<SlotIndex> {
        self.find(link)
            .filter(|&i| self.slots[i].state == LinkState::Connected)
    }

    /// Refresh `last_activity` without counting bytes. Not used by the
    /// session manager, which stamps activity through `record_*`.
    pub fn touch(&mut self, link: LinkId, now: Instant) -> bool {
        match self.find(link) {
            Some(i) => {
                self.slots[i].last_activity = now;
                true
            }
            None => false,
        }
    }

    pub fn record_sent(&mut self, index: SlotIndex, len: usize, now: Instant) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.bytes_sent = slot.bytes_sent.saturating_add(len as u64);
            slot.last_activity = now;
        }
    }

    pub fn record_received(&mut self, index: SlotIndex, len: usize, now: Instant) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.bytes_received = slot.bytes_received.saturating_add(len as u64);
            slot.last_activity = now;
        }
    }

    pub fn set_state(&mut self, index: SlotIndex, state: LinkState) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.state = state;
        }
    }

    pub fn slot(&self, index: SlotIndex) -> Option<&LinkSlot> {
        self.slots.get(index)
    }

    /// Connected slots in table order.
    pub fn connected(&self) -> impl Iterator<Item = (SlotIndex, LinkId)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| match (s.state, s.identity) {
            (LinkState::Connected, Some(link)) => Some((i, link)),
            _ => None,
        })
    }

    pub fn connected_count(&self) -> usize {
        self.connected().count()
    }

    /// Copy out every `Connected` slot. Connecting and disconnecting links
    /// are left out.
    pub fn snapshot(&self) -> Vec<LinkInfo, MAX_CONNECTIONS> {
        let mut out = Vec::new();
        for slot in &self.slots {
            if let (LinkState::Connected, Some(link)) = (slot.state, slot.identity) {
                let _ = out.push(LinkInfo {
                    link,
                    remote_address: slot.remote_address,
                    bytes_received: slot.bytes_received,
                    bytes_sent: slot.bytes_sent,
                    last_activity: slot.last_activity,
                });
            }
        }
        out
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
