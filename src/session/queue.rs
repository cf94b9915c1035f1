//! Bounded FIFO between radio-stack producers and the session task.
//!
//! Producers never wait: when the queue is full the new message is dropped,
//! counted, and reported back as [`SessionError::QueueFull`] so the
//! transport can throttle its peer if it wants to. The single consumer
//! awaits indefinitely.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use crate::config::{MAX_PACKET_SIZE, QUEUE_CAPACITY};
use crate::error::SessionError;
use crate::transport::LinkId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Data a peer sent us, bound for the receive callback.
    Received,
    /// Data bound for a peer, transmitted by the session task.
    ToSend,
}

/// One unit of work for the session task. Immutable once queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedMessage {
    link: LinkId,
    payload: Vec<u8, MAX_PACKET_SIZE>,
    direction: Direction,
}

impl QueuedMessage {
    /// Copy `payload` into a new message. Empty or oversized payloads are
    /// rejected, never truncated.
    pub fn new(link: LinkId, payload: &[u8], direction: Direction) -> Result<Self, SessionError> {
        if payload.is_empty() {
            return Err(SessionError::InvalidArgument);
        }
        let payload = Vec::from_slice(payload).map_err(|_| SessionError::InvalidArgument)?;
        Ok(Self {
            link,
            payload,
            direction,
        })
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, QueuedMessage, QUEUE_CAPACITY>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Non-blocking enqueue; drops the message when the queue is full.
    pub fn try_enqueue(&self, msg: QueuedMessage) -> Result<(), SessionError> {
        let link = msg.link;
        if self.channel.try_send(msg).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!("event queue full - dropping message for {} ({} dropped)", link, dropped);
            return Err(SessionError::QueueFull);
        }
        Ok(())
    }

    /// Wait for the next message.
    pub async fn dequeue(&self) -> QueuedMessage {
        self.channel.receive().await
    }

    pub fn try_dequeue(&self) -> Option<QueuedMessage> {
        self.channel.try_receive().ok()
    }

    /// Messages dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
