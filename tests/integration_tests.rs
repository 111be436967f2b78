//! Integration tests for cross-crate interactions.
//!
//! Drives discovery controllers against each other, feeds their events into
//! the connection scheduler and exercises the address book with real files
//! and sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use xdag_crypto::KeyPair;
use xdag_discovery::{
    Bootnode, DiscoveryConfig, DiscoveryError, DiscoveryEvent, DiscoveryPeer, Endpoint, Packet,
    PacketData, PeerId, Ping, UdpDiscovery,
};
use xdag_integration_tests::{RecordingDialer, T0, TestNode, pump_all};
use xdag_net::{
    ActiveChannels, AddressBook, DiscoveryBridge, NetConfig, NetDb, NodeManager, NodeRecord,
    bridge::handle_event,
};

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn manager_with(
    book: Arc<AddressBook>,
    config: NetConfig,
) -> (Arc<NodeManager>, Arc<ActiveChannels>, Arc<RecordingDialer>) {
    let channels = Arc::new(ActiveChannels::new());
    let dialer = Arc::new(RecordingDialer::default());
    let manager = Arc::new(NodeManager::new(
        config,
        NodeRecord::from(addr("127.0.0.1:8001")),
        book,
        channels.clone(),
        dialer.clone(),
    ));
    (manager, channels, dialer)
}

fn drain_events(node: &mut TestNode) -> Vec<DiscoveryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = node.events.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Discovery Between Controllers
// ============================================================================

/// A bootstrapping node learns a third peer through its bootnode and bonds it.
#[test]
fn test_bootstrap_discovers_third_peer() {
    let mut a = TestNode::new(30401, 8401, DiscoveryConfig::default());
    let b = TestNode::new(30402, 8402, DiscoveryConfig::default());
    let c = TestNode::new(30403, 8403, DiscoveryConfig::default());

    // C joins first through B
    let b_as_peer = Arc::new(DiscoveryPeer::new(b.id(), b.endpoint(), T0));
    c.controller.bond_at(&b_as_peer, false, T0);
    pump_all(&[&b, &c], T0);
    assert!(b.controller.table().get(&c.id()).unwrap().is_bonded());

    let bootnode = Bootnode {
        id: b.id(),
        endpoint: b.endpoint(),
    };
    a.controller.start_at(&[bootnode], T0);
    pump_all(&[&a, &b, &c], T0);

    // The first FIND_NEIGHBORS races B's bond with A and is ignored; the
    // retry is answered
    assert!(a.controller.table().get(&b.id()).unwrap().is_bonded());
    assert!(!a.controller.table().contains(&c.id()));
    a.controller.tick_at(T0 + 2_000);
    pump_all(&[&a, &b, &c], T0 + 2_000);

    let c_in_a = a.controller.table().get(&c.id()).unwrap();
    assert!(c_in_a.is_bonded());
    assert_eq!(c_in_a.endpoint().tcp_port, 8403);
    assert!(c.controller.table().get(&a.id()).unwrap().is_bonded());
    assert_eq!(a.controller.peer_count(), 2);

    let bonded: Vec<_> = drain_events(&mut a)
        .into_iter()
        .filter_map(|event| match event {
            DiscoveryEvent::PeerBonded { peer, .. } => Some(*peer.id()),
            DiscoveryEvent::PeerDropped { .. } => None,
        })
        .collect();
    assert_eq!(bonded, vec![b.id(), c.id()]);
}

/// Bonded peers become dial candidates; dropped peers are not queued.
#[test]
fn test_discovery_events_feed_scheduler() {
    let mut a = TestNode::new(30411, 8411, DiscoveryConfig::default());
    let b = TestNode::new(30412, 8412, DiscoveryConfig::default());
    let book = Arc::new(AddressBook::new(Vec::new(), None, None));
    let (manager, _channels, dialer) = manager_with(book.clone(), NetConfig::default());

    let b_as_peer = Arc::new(DiscoveryPeer::new(b.id(), b.endpoint(), T0));
    a.controller.bond_at(&b_as_peer, false, T0);
    pump_all(&[&a, &b], T0);

    // A silent peer is dropped after its attempts run out
    let silent = Arc::new(DiscoveryPeer::new(
        PeerId::from_public_key(&KeyPair::generate().public_key()),
        Endpoint::new("127.0.0.1".parse().unwrap(), 30413, 8413),
        T0,
    ));
    a.controller.bond_at(&silent, false, T0);
    let mut now = T0;
    for _ in 0..4 {
        now += 60_000;
        a.controller.tick_at(now);
    }

    let queued: Vec<_> = drain_events(&mut a)
        .iter()
        .filter_map(|event| handle_event(&manager, event))
        .collect();
    assert_eq!(queued, vec![NodeRecord::from(addr("127.0.0.1:8412"))]);
    assert_eq!(manager.queue_size(), 1);
    assert!(book.netdb().contains(&addr("127.0.0.1:8412")));

    assert_eq!(manager.tick_connect_at(now), Some(queued[0].clone()));
    assert_eq!(dialer.dialed(), queued);
}

/// A corrupted PING is rejected without leaving any state behind.
#[test]
fn test_tampered_ping_rejected_end_to_end() {
    let a = TestNode::new(30421, 8421, DiscoveryConfig::default());
    let remote = KeyPair::generate();
    let ping = Packet::create(
        Ping {
            from: Endpoint::new("127.0.0.1".parse().unwrap(), 30422, 8422),
            to: a.endpoint(),
            expiration: T0 + 60_000,
        },
        &remote,
    )
    .unwrap();

    let mut bytes = ping.into_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let result = a
        .controller
        .handle_datagram_at(&bytes, addr("127.0.0.1:30422"), T0);
    assert!(matches!(result, Err(DiscoveryError::Decode(_))));
    assert!(a.controller.table().is_empty());
    assert!(a.sink.take().is_empty());
}

/// A NEIGHBORS reply never lists more peers than the configured limit.
#[test]
fn test_neighbors_reply_respects_limit() {
    let config = DiscoveryConfig {
        neighbors_limit: 3,
        ..DiscoveryConfig::default()
    };
    let hub = TestNode::new(30430, 8430, config);
    let spokes: Vec<TestNode> = (0..6)
        .map(|i| TestNode::new(30431 + i, 8431 + i, DiscoveryConfig::default()))
        .collect();

    for spoke in &spokes {
        let hub_as_peer = Arc::new(DiscoveryPeer::new(hub.id(), hub.endpoint(), T0));
        spoke.controller.bond_at(&hub_as_peer, false, T0);
    }
    let mut nodes: Vec<&TestNode> = spokes.iter().collect();
    nodes.push(&hub);
    pump_all(&nodes, T0);
    assert_eq!(hub.controller.bonded_peers().len(), 6);

    // The first spoke asks the hub directly
    let asker = &spokes[0];
    let hub_peer = asker.controller.table().get(&hub.id()).unwrap();
    assert!(hub_peer.is_bonded());
    asker.controller.refresh_table_at(T0 + 1);
    let requests = asker.sink.take();
    assert_eq!(requests.len(), 1);
    hub.controller
        .handle_datagram_at(&requests[0].1, asker.addr, T0 + 1)
        .unwrap();

    let replies = hub.sink.take();
    assert_eq!(replies.len(), 1);
    let reply = Packet::decode(&replies[0].1).unwrap();
    let PacketData::Neighbors(neighbors) = reply.data() else {
        panic!("expected NEIGHBORS");
    };
    assert_eq!(neighbors.peers.len(), 3);
}

// ============================================================================
// UDP Transport
// ============================================================================

/// Two sockets bond over loopback and the bridge queues the bootnode.
#[tokio::test]
async fn test_udp_bond_feeds_node_manager() {
    let localhost = "127.0.0.1".parse().unwrap();
    let (mut b, _b_events) = UdpDiscovery::bind(
        addr("127.0.0.1:0"),
        KeyPair::generate(),
        Endpoint::new(localhost, 0, 9102),
        DiscoveryConfig::default(),
    )
    .await
    .unwrap();
    b.start(&[]);

    let (mut a, a_events) = UdpDiscovery::bind(
        addr("127.0.0.1:0"),
        KeyPair::generate(),
        Endpoint::new(localhost, 0, 9101),
        DiscoveryConfig::default(),
    )
    .await
    .unwrap();

    let book = Arc::new(AddressBook::new(Vec::new(), None, None));
    let (manager, _channels, dialer) = manager_with(book, NetConfig::default());
    let bridge = DiscoveryBridge::new(manager.clone(), a_events).spawn();

    let bootnode = Bootnode {
        id: *b.controller().local_peer().id(),
        endpoint: Endpoint::new(localhost, b.local_addr().port(), 9102),
    };
    a.start(&[bootnode]);

    let queued = tokio::time::timeout(Duration::from_secs(5), async {
        while manager.queue_size() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(queued.is_ok(), "bootnode was never queued");

    let dialed = manager.tick_connect().unwrap();
    assert_eq!(dialed.address(), addr("127.0.0.1:9102"));
    assert_eq!(dialer.dialed(), vec![dialed]);
    assert!(a.stats().packets_received > 0);

    a.shutdown();
    b.shutdown();
    bridge.abort();
}

// ============================================================================
// Address Book and Scheduling
// ============================================================================

/// The cached whitelist and gossip both reach the dial queue.
#[tokio::test]
async fn test_whitelist_file_and_gossip_reseed_queue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("netdb-white.txt");
    std::fs::write(&path, "# seeds\n10.0.0.1:8001\n10.0.0.2:8001\n").unwrap();

    let book = Arc::new(AddressBook::new(
        vec![addr("10.0.0.9:8001")],
        Some(path),
        None,
    ));
    book.init().await;
    assert!(book.can_accept(&addr("10.0.0.1:8001")));
    assert!(book.can_accept(&addr("10.0.0.9:8001")));

    // Gossip arrives in compact form
    let gossip: NetDb = [addr("10.0.1.1:8001"), addr("10.0.0.1:8001")]
        .into_iter()
        .collect();
    assert_eq!(book.merge_gossip(&NetDb::parse_compact(&gossip.to_compact())), 2);
    assert!(!book.can_accept(&addr("10.0.1.1:8001")));

    let (manager, _channels, _dialer) = manager_with(book, NetConfig::default());
    manager.tick_fetch().await;
    assert_eq!(manager.queue_size(), 4);

    let discovered: Vec<_> = manager
        .discovered_nodes()
        .iter()
        .map(NodeRecord::address)
        .collect();
    assert_eq!(
        discovered,
        vec![
            addr("10.0.0.9:8001"),
            addr("10.0.0.1:8001"),
            addr("10.0.0.2:8001"),
            addr("10.0.1.1:8001"),
        ]
    );
}

/// The scheduler stops at the ceiling and resumes once a slot frees up.
#[test]
fn test_ceiling_and_backoff_across_channels() {
    let book = Arc::new(AddressBook::new(Vec::new(), None, None));
    let config = NetConfig {
        max_connections: 1,
        reconnect_backoff_ms: 10_000,
        ..NetConfig::default()
    };
    let (manager, channels, dialer) = manager_with(book, config);

    let first = NodeRecord::from(addr("10.0.0.1:8001"));
    let second = NodeRecord::from(addr("10.0.0.2:8001"));
    manager.add_node(second.clone());
    manager.add_node(first.clone());

    assert_eq!(manager.tick_connect_at(T0), Some(first.clone()));
    channels.register(first.clone(), T0);
    assert_eq!(manager.tick_connect_at(T0 + 500), None);
    assert_eq!(manager.queue_size(), 1);

    channels.unregister(&first.address());
    manager.add_node(first.clone());
    // First is still inside its backoff window and is discarded
    assert_eq!(manager.tick_connect_at(T0 + 1_000), Some(second.clone()));
    assert_eq!(dialer.dialed(), vec![first.clone(), second]);

    manager.add_node(first.clone());
    assert_eq!(manager.tick_connect_at(T0 + 10_001), Some(first));
}
