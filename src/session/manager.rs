//! Session manager - the transport-agnostic front of the node.
//!
//! Owns the connection table (behind a [`Guard`]), the event queue and the
//! receive callback slot. Radio stacks feed it through `on_connect`,
//! `on_disconnect` and `on_data`; applications use `send`, `broadcast`,
//! `disconnect`, `enumerate`, `set_identity_name` and
//! `set_receive_callback`. A single task runs [`SessionManager::run`], which
//! is the only place receive callbacks are invoked, so callbacks never run
//! concurrently with each other.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_time::Instant;
use heapless::{String, Vec};

use super::guard::Guard;
use super::queue::{Direction, EventQueue, QueuedMessage};
use super::table::{ConnectionTable, LinkInfo, LinkState, SlotIndex};
use crate::config::{MAX_CONNECTIONS, MAX_DEVICE_NAME_LEN, MAX_PACKET_SIZE};
use crate::error::SessionError;
use crate::transport::{BdAddr, LinkEvent, LinkId, LinkTransport};

/// Display name, truncated to `MAX_DEVICE_NAME_LEN` bytes.
pub type DeviceName = String<MAX_DEVICE_NAME_LEN>;

/// Application hook for inbound data.
///
/// Invoked only from the session task, one message at a time. Any
/// `Fn(LinkId, &[u8]) + Sync` closure qualifies.
pub trait ReceiveHandler: Sync {
    fn on_receive(&self, link: LinkId, payload: &[u8]);
}

impl<F> ReceiveHandler for F
where
    F: Fn(LinkId, &[u8]) + Sync,
{
    fn on_receive(&self, link: LinkId, payload: &[u8]) {
        self(link, payload)
    }
}

/// Outcome of a broadcast. Every connected link is attempted even when
/// some transmits fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Last transmit failure seen, if any.
    pub last_error: Option<SessionError>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.delivered == self.attempted
    }
}

pub struct SessionManager<'h, T> {
    transport: T,
    table: Guard<ConnectionTable>,
    queue: EventQueue,
    handler: BlockingMutex<CriticalSectionRawMutex, Cell<Option<&'h dyn ReceiveHandler>>>,
    name: BlockingMutex<CriticalSectionRawMutex, RefCell<Option<DeviceName>>>,
    initialized: AtomicBool,
}

impl<'h, T: LinkTransport> SessionManager<'h, T> {
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            table: Guard::new(ConnectionTable::new()),
            queue: EventQueue::new(),
            handler: BlockingMutex::new(Cell::new(None)),
            name: BlockingMutex::new(RefCell::new(None)),
            initialized: AtomicBool::new(false),
        }
    }

    /// Mark the transports as up. A name stored with `set_identity_name`
    /// before this point is pushed to the transports now.
    pub fn start(&self) {
        let mut pushed = self.device_name();
        if let Some(name) = &pushed {
            self.apply_name(name);
        }
        self.initialized.store(true, Ordering::SeqCst);

        // A name stored while the first push was in flight saw the flag
        // still clear, so nobody else will propagate it.
        loop {
            let current = self.device_name();
            if current == pushed {
                break;
            }
            if let Some(name) = &current {
                self.apply_name(name);
            }
            pushed = current;
        }
        info!("session manager started ({} link slots)", MAX_CONNECTIONS);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn apply_name(&self, name: &str) {
        if let Err(e) = self.transport.set_device_name(name) {
            warn!("could not apply device name: {}", e);
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Inbound (radio stack → manager)
    // ═══════════════════════════════════════════════════════════════════════

    /// Track a newly opened link.
    ///
    /// Returns `Ok(None)` when the table is full: the transport has already
    /// accepted the link, it just stays invisible to the session API.
    pub async fn on_connect(
        &self,
        link: LinkId,
        address: BdAddr,
    ) -> Result<Option<SlotIndex>, SessionError> {
        let mut table = self.table.lock().await?;
        match table.allocate(link, address, Instant::now()) {
            Some(index) => {
                info!("{} connected from {} (slot {})", link, address, index);
                Ok(Some(index))
            }
            None => {
                warn!("connection table full - {} is not tracked", link);
                Ok(None)
            }
        }
    }

    /// Forget a closed link. Unknown and repeated disconnects are ignored.
    pub async fn on_disconnect(&self, link: LinkId) -> Result<(), SessionError> {
        let mut table = self.table.lock().await?;
        match table.release(link) {
            Some(index) => info!("{} disconnected (slot {} free)", link, index),
            None => debug!("disconnect for untracked {}", link),
        }
        Ok(())
    }

    /// Queue inbound data for the session task. Never waits and never
    /// touches the table, so it is safe from any stack callback.
    pub fn on_data(&self, link: LinkId, payload: &[u8]) -> Result<(), SessionError> {
        let msg = QueuedMessage::new(link, payload, Direction::Received).map_err(|e| {
            warn!("rejecting {} byte payload from {}", payload.len(), link);
            e
        })?;
        self.queue.try_enqueue(msg)
    }

    pub async fn handle_event(&self, event: LinkEvent<'_>) -> Result<(), SessionError> {
        match event {
            LinkEvent::Connected { link, address } => self.on_connect(link, address).await.map(|_| ()),
            LinkEvent::Disconnected { link } => self.on_disconnect(link).await,
            LinkEvent::Data { link, payload } => self.on_data(link, payload),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Application API
    // ═══════════════════════════════════════════════════════════════════════

    /// Transmit to one link synchronously, bypassing the queue.
    pub async fn send(&self, link: LinkId, payload: &[u8]) -> Result<(), SessionError> {
        check_payload(payload)?;
        self.ensure_started()?;

        let mut table = self.table.lock().await?;
        let index = table.find_connected(link).ok_or(SessionError::NotFound)?;
        self.transport.transmit(link, payload).map_err(|e| {
            warn!("send to {} failed: {}", link, e);
            e
        })?;
        table.record_sent(index, payload.len(), Instant::now());
        Ok(())
    }

    /// Queue data for a link; the session task transmits it in order with
    /// everything else it processes.
    pub fn send_queued(&self, link: LinkId, payload: &[u8]) -> Result<(), SessionError> {
        check_payload(payload)?;
        self.ensure_started()?;
        self.queue
            .try_enqueue(QueuedMessage::new(link, payload, Direction::ToSend)?)
    }

    /// Transmit to every connected link under one guard acquisition.
    pub async fn broadcast(&self, payload: &[u8]) -> Result<BroadcastReport, SessionError> {
        check_payload(payload)?;
        self.ensure_started()?;

        let mut table = self.table.lock().await?;
        let targets: Vec<(SlotIndex, LinkId), MAX_CONNECTIONS> = table.connected().collect();
        let now = Instant::now();
        let mut report = BroadcastReport::default();

        for (index, link) in targets {
            report.attempted += 1;
            match self.transport.transmit(link, payload) {
                Ok(()) => {
                    report.delivered += 1;
                    table.record_sent(index, payload.len(), now);
                }
                Err(e) => {
                    warn!("broadcast to {} failed: {}", link, e);
                    report.last_error = Some(e.into());
                }
            }
        }

        debug!("broadcast delivered to {}/{} links", report.delivered, report.attempted);
        Ok(report)
    }

    /// Ask the transport to close a connected link.
    ///
    /// Links already closing are left alone. The slot is released later,
    /// when the transport reports the disconnect.
    pub async fn disconnect(&self, link: LinkId) -> Result<(), SessionError> {
        self.ensure_started()?;

        let mut table = self.table.lock().await?;
        let index = table.find(link).ok_or(SessionError::NotFound)?;
        if table.slot(index).map(|s| s.state) != Some(LinkState::Connected) {
            debug!("{} is not connected - nothing to tear down", link);
            return Ok(());
        }

        table.set_state(index, LinkState::Disconnecting);
        if let Err(e) = self.transport.disconnect(link) {
            warn!("teardown of {} failed: {}", link, e);
            table.set_state(index, LinkState::Connected);
            return Err(e.into());
        }
        Ok(())
    }

    /// Consistent point-in-time copy of every connected link.
    pub async fn enumerate(&self) -> Result<Vec<LinkInfo, MAX_CONNECTIONS>, SessionError> {
        Ok(self.table.lock().await?.snapshot())
    }

    pub async fn connected_count(&self) -> Result<usize, SessionError> {
        Ok(self.table.lock().await?.connected_count())
    }

    /// Store the node's display name, truncated to `MAX_DEVICE_NAME_LEN`
    /// bytes. Reaches the transports only once the manager is started.
    pub fn set_identity_name(&self, name: &str) -> Result<(), SessionError> {
        if name.is_empty() {
            return Err(SessionError::InvalidArgument);
        }
        let name = truncate_name(name);
        self.name.lock(|n| *n.borrow_mut() = Some(name.clone()));

        if self.is_initialized() {
            self.transport.set_device_name(&name)?;
        }
        Ok(())
    }

    pub fn device_name(&self) -> Option<DeviceName> {
        self.name.lock(|n| n.borrow().clone())
    }

    /// Replace (or clear) the receive callback. Takes effect from the next
    /// message the session task dequeues.
    pub fn set_receive_callback(&self, handler: Option<&'h dyn ReceiveHandler>) {
        self.handler.lock(|h| h.set(handler));
    }

    /// Messages dropped so far because the queue was full.
    pub fn dropped_messages(&self) -> u32 {
        self.queue.dropped()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Session task
    // ═══════════════════════════════════════════════════════════════════════

    /// Session task body. Never returns.
    pub async fn run(&self) -> ! {
        info!("session task running");
        loop {
            self.process_next().await;
        }
    }

    /// Wait for one message and handle it.
    pub async fn process_next(&self) {
        let msg = self.queue.dequeue().await;
        self.dispatch(msg).await;
    }

    /// Handle everything already queued without waiting for more.
    pub async fn process_pending(&self) -> usize {
        let mut handled = 0;
        while let Some(msg) = self.queue.try_dequeue() {
            self.dispatch(msg).await;
            handled += 1;
        }
        handled
    }

    async fn dispatch(&self, msg: QueuedMessage) {
        match msg.direction() {
            Direction::Received => self.deliver(&msg).await,
            Direction::ToSend => self.transmit_queued(&msg).await,
        }
    }

    async fn deliver(&self, msg: &QueuedMessage) {
        let link = msg.link();
        let payload = msg.payload();

        match self.table.lock().await {
            Ok(mut table) => match table.find(link) {
                Some(index) => table.record_received(index, payload.len(), Instant::now()),
                None => {
                    warn!("dropping {} bytes for closed link {}", payload.len(), link);
                    return;
                }
            },
            Err(_) => warn!("delivering data from {} without accounting", link),
        }

        match self.handler.lock(|h| h.get()) {
            Some(handler) => handler.on_receive(link, payload),
            None => debug!("no receive callback - discarding {} bytes from {}", payload.len(), link),
        }
    }

    async fn transmit_queued(&self, msg: &QueuedMessage) {
        let link = msg.link();
        let payload = msg.payload();

        let Ok(mut table) = self.table.lock().await else {
            error!("queued send to {} abandoned", link);
            return;
        };
        let Some(index) = table.find_connected(link) else {
            warn!("queued send to {} dropped - link not connected", link);
            return;
        };
        match self.transport.transmit(link, payload) {
            Ok(()) => table.record_sent(index, payload.len(), Instant::now()),
            Err(e) => warn!("queued send to {} failed: {}", link, e),
        }
    }

    fn ensure_started(&self) -> Result<(), SessionError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SessionError::Uninitialized)
        }
    }
}

fn check_payload(payload: &[u8]) -> Result<(), SessionError> {
    if payload.is_empty() || payload.len() > MAX_PACKET_SIZE {
        return Err(SessionError::InvalidArgument);
    }
    Ok(())
}

fn truncate_name(name: &str) -> DeviceName {
    let mut out = DeviceName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
