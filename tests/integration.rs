//! Integration tests for the multilink session layer, driven through the
//! public API with fake classic and low-energy transports.

use std::sync::Mutex;

use embassy_futures::block_on;
use multilink::config::{MAX_CONNECTIONS, MAX_DEVICE_NAME_LEN, MAX_PACKET_SIZE, QUEUE_CAPACITY};
use multilink::{
    BdAddr, DualTransport, LinkEvent, LinkId, LinkTransport, SessionError, SessionManager,
    TransportError,
};

#[derive(Default)]
struct FakeStack {
    sent: Mutex<Vec<(LinkId, usize)>>,
    closed: Mutex<Vec<LinkId>>,
    name: Mutex<Option<String>>,
    drop_all: bool,
}

impl LinkTransport for FakeStack {
    fn transmit(&self, link: LinkId, payload: &[u8]) -> Result<(), TransportError> {
        if self.drop_all {
            return Err(TransportError::LinkClosed);
        }
        self.sent.lock().unwrap().push((link, payload.len()));
        Ok(())
    }

    fn disconnect(&self, link: LinkId) -> Result<(), TransportError> {
        self.closed.lock().unwrap().push(link);
        Ok(())
    }

    fn set_device_name(&self, name: &str) -> Result<(), TransportError> {
        *self.name.lock().unwrap() = Some(name.to_string());
        Ok(())
    }
}

type Dual = DualTransport<FakeStack, FakeStack>;

fn addr(n: u8) -> BdAddr {
    BdAddr([0xAA, 0xBB, 0xCC, 0x00, 0x00, n])
}

fn connect(manager: &SessionManager<'_, Dual>, link: LinkId, n: u8) {
    block_on(manager.handle_event(LinkEvent::Connected {
        link,
        address: addr(n),
    }))
    .unwrap();
}

#[test]
fn mixed_transports_share_eight_slots() {
    let manager = SessionManager::new(Dual::new(FakeStack::default(), FakeStack::default()));
    manager.start();

    for h in 0..4u32 {
        connect(&manager, LinkId::classic(h), h as u8);
        connect(&manager, LinkId::low_energy(h), 10 + h as u8);
    }
    assert_eq!(block_on(manager.connected_count()), Ok(MAX_CONNECTIONS));

    assert_eq!(
        block_on(manager.on_connect(LinkId::low_energy(99), addr(99))),
        Ok(None)
    );
    let links = block_on(manager.enumerate()).unwrap();
    assert_eq!(links.len(), MAX_CONNECTIONS);
    assert!(links.iter().all(|l| l.link != LinkId::low_energy(99)));

    let report = block_on(manager.broadcast(b"hello everyone")).unwrap();
    assert_eq!(report.attempted, MAX_CONNECTIONS);
    assert!(report.is_complete());
    assert_eq!(manager.transport().classic().sent.lock().unwrap().len(), 4);
    assert_eq!(manager.transport().low_energy().sent.lock().unwrap().len(), 4);
}

#[test]
fn broadcast_continues_past_a_dead_transport() {
    let classic = FakeStack {
        drop_all: true,
        ..Default::default()
    };
    let manager = SessionManager::new(Dual::new(classic, FakeStack::default()));
    manager.start();
    connect(&manager, LinkId::classic(1), 1);
    connect(&manager, LinkId::low_energy(1), 2);
    connect(&manager, LinkId::low_energy(2), 3);

    let report = block_on(manager.broadcast(&[7u8; MAX_PACKET_SIZE])).unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.delivered, 2);
    assert_eq!(
        report.last_error,
        Some(SessionError::Transport(TransportError::LinkClosed))
    );
}

#[test]
fn disconnect_routes_to_owning_transport() {
    let manager = SessionManager::new(Dual::new(FakeStack::default(), FakeStack::default()));
    manager.start();
    connect(&manager, LinkId::classic(5), 1);
    connect(&manager, LinkId::low_energy(5), 2);

    block_on(manager.disconnect(LinkId::low_energy(5))).unwrap();
    assert!(manager.transport().classic().closed.lock().unwrap().is_empty());
    assert_eq!(
        *manager.transport().low_energy().closed.lock().unwrap(),
        [LinkId::low_energy(5)]
    );

    block_on(manager.handle_event(LinkEvent::Disconnected {
        link: LinkId::low_energy(5),
    }))
    .unwrap();
    // Freed slot is reusable.
    connect(&manager, LinkId::low_energy(6), 3);
    assert_eq!(block_on(manager.connected_count()), Ok(2));
}

#[test]
fn receive_path_delivers_in_arrival_order() {
    let log = Mutex::new(Vec::new());
    let handler = |link: LinkId, payload: &[u8]| log.lock().unwrap().push((link, payload.to_vec()));

    let manager = SessionManager::new(Dual::new(FakeStack::default(), FakeStack::default()));
    manager.set_receive_callback(Some(&handler));
    manager.start();
    connect(&manager, LinkId::classic(1), 1);
    connect(&manager, LinkId::low_energy(1), 2);

    block_on(async {
        manager
            .handle_event(LinkEvent::Data { link: LinkId::low_energy(1), payload: b"a" })
            .await
            .unwrap();
        manager
            .handle_event(LinkEvent::Data { link: LinkId::classic(1), payload: b"bb" })
            .await
            .unwrap();
        manager
            .handle_event(LinkEvent::Data { link: LinkId::low_energy(1), payload: b"ccc" })
            .await
            .unwrap();
        assert_eq!(manager.process_pending().await, 3);
    });

    assert_eq!(
        *log.lock().unwrap(),
        [
            (LinkId::low_energy(1), b"a".to_vec()),
            (LinkId::classic(1), b"bb".to_vec()),
            (LinkId::low_energy(1), b"ccc".to_vec()),
        ]
    );
    let links = block_on(manager.enumerate()).unwrap();
    assert_eq!(links[0].bytes_received, 2);
    assert_eq!(links[1].bytes_received, 4);
}

#[test]
fn burst_beyond_queue_capacity_is_dropped_not_blocked() {
    let count = Mutex::new(0usize);
    let handler = |_: LinkId, _: &[u8]| *count.lock().unwrap() += 1;
    let manager = SessionManager::new(Dual::new(FakeStack::default(), FakeStack::default()));
    manager.set_receive_callback(Some(&handler));
    connect(&manager, LinkId::low_energy(1), 1);

    let accepted = (0..QUEUE_CAPACITY + 5)
        .filter(|_| manager.on_data(LinkId::low_energy(1), b"x").is_ok())
        .count();
    assert_eq!(accepted, QUEUE_CAPACITY);
    assert_eq!(manager.dropped_messages(), 5);

    assert_eq!(block_on(manager.process_pending()), QUEUE_CAPACITY);
    assert_eq!(*count.lock().unwrap(), QUEUE_CAPACITY);
}

#[test]
fn echo_through_send_queued() {
    let manager = SessionManager::new(Dual::new(FakeStack::default(), FakeStack::default()));
    manager.start();
    connect(&manager, LinkId::classic(2), 1);

    manager.on_data(LinkId::classic(2), b"ping").unwrap();
    manager.send_queued(LinkId::classic(2), b"pong").unwrap();
    block_on(manager.process_pending());

    assert_eq!(
        *manager.transport().classic().sent.lock().unwrap(),
        [(LinkId::classic(2), 4)]
    );
    let info = block_on(manager.enumerate()).unwrap()[0];
    assert_eq!(info.bytes_received, 4);
    assert_eq!(info.bytes_sent, 4);
}

#[test]
fn identity_name_reaches_both_transports() {
    let manager = SessionManager::new(Dual::new(FakeStack::default(), FakeStack::default()));
    manager.set_identity_name("workbench").unwrap();
    assert!(manager.transport().classic().name.lock().unwrap().is_none());

    manager.start();
    assert_eq!(
        manager.transport().low_energy().name.lock().unwrap().as_deref(),
        Some("workbench")
    );

    let long = "n".repeat(MAX_DEVICE_NAME_LEN + 8);
    manager.set_identity_name(&long).unwrap();
    let classic = manager.transport().classic().name.lock().unwrap().clone().unwrap();
    assert_eq!(classic.len(), MAX_DEVICE_NAME_LEN);
}

#[test]
fn concurrent_connect_churn_keeps_table_consistent() {
    let manager = SessionManager::new(Dual::new(FakeStack::default(), FakeStack::default()));
    manager.start();

    std::thread::scope(|s| {
        for t in 0..4u32 {
            let manager = &manager;
            s.spawn(move || {
                let links = [LinkId::classic(t), LinkId::low_energy(t)];
                for round in 0..20 {
                    for link in links {
                        block_on(manager.on_connect(link, addr(round as u8))).unwrap();
                    }
                    for link in links {
                        block_on(manager.on_disconnect(link)).unwrap();
                    }
                }
                for link in links {
                    block_on(manager.on_connect(link, addr(0xFF))).unwrap();
                }
            });
        }
    });

    let links = block_on(manager.enumerate()).unwrap();
    assert_eq!(links.len(), MAX_CONNECTIONS);
    for (i, a) in links.iter().enumerate() {
        assert!(links[i + 1..].iter().all(|b| b.link != a.link));
    }
}
