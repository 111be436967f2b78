//! Property-based tests for XDAG discovery and scheduling
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

fn v4(octets: [u8; 4], port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port)
}

// ============================================================================
// Packet Codec Properties
// ============================================================================

mod packet_properties {
    use super::*;
    use std::sync::OnceLock;
    use xdag_crypto::KeyPair;
    use xdag_discovery::{
        Endpoint, FindNeighbors, NeighborRecord, Neighbors, Packet, PacketData, PeerId, Ping,
    };

    fn key() -> &'static KeyPair {
        static KEY: OnceLock<KeyPair> = OnceLock::new();
        KEY.get_or_init(KeyPair::generate)
    }

    fn endpoint() -> impl Strategy<Value = Endpoint> {
        (any::<[u8; 4]>(), 1u16.., any::<u16>())
            .prop_map(|(ip, udp, tcp)| Endpoint::new(IpAddr::V4(Ipv4Addr::from(ip)), udp, tcp))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Flipping any bit of a signed packet makes it undecodable
        #[test]
        fn any_bit_flip_is_detected(
            from in endpoint(),
            to in endpoint(),
            expiration in any::<u64>(),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let packet = Packet::create(Ping { from, to, expiration }, key()).unwrap();
            let mut bytes = packet.into_bytes();
            let i = index.index(bytes.len());
            bytes[i] ^= 1 << bit;
            prop_assert!(Packet::decode(&bytes).is_err());
        }

        /// Decoding recovers the signer and the payload
        #[test]
        fn neighbors_survive_the_wire(
            endpoints in prop::collection::vec(endpoint(), 0..16),
            expiration in any::<u64>(),
        ) {
            let peers: Vec<NeighborRecord> = endpoints
                .into_iter()
                .map(|endpoint| NeighborRecord { endpoint, id: PeerId::random() })
                .collect();
            let data = Neighbors { peers, expiration };
            let packet = Packet::create(data.clone(), key()).unwrap();

            let decoded = Packet::decode(packet.as_bytes()).unwrap();
            prop_assert_eq!(decoded.sender(), &PeerId::from_public_key(&key().public_key()));
            prop_assert_eq!(decoded.data(), &PacketData::Neighbors(data));
            prop_assert_eq!(decoded.hash(), packet.hash());
        }

        /// Truncated datagrams never decode
        #[test]
        fn truncation_is_rejected(expiration in any::<u64>(), cut in 1usize..64) {
            let target = PeerId::random();
            let packet = Packet::create(FindNeighbors { target, expiration }, key()).unwrap();
            let bytes = packet.as_bytes();
            let len = bytes.len().saturating_sub(cut);
            prop_assert!(Packet::decode(&bytes[..len]).is_err());
        }

        /// Arbitrary bytes never panic the decoder
        #[test]
        fn garbage_does_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = Packet::decode(&bytes);
        }
    }
}

// ============================================================================
// Identity and Distance Properties
// ============================================================================

mod distance_properties {
    use super::*;
    use xdag_discovery::{log_distance, xor_distance};

    proptest! {
        /// Log distance is symmetric, bounded and zero only for equal digests
        #[test]
        fn log_distance_metric(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            let d = log_distance(&a, &b);
            prop_assert_eq!(d, log_distance(&b, &a));
            prop_assert!(d <= 256);
            prop_assert_eq!(d == 0, a == b);
            prop_assert_eq!(log_distance(&a, &a), 0);
        }

        /// Log distance is the bit length of the XOR distance
        #[test]
        fn log_distance_is_xor_bit_length(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            let xor = xor_distance(&a, &b);
            let leading: usize = xor
                .iter()
                .position(|&byte| byte != 0)
                .map_or(256, |i| i * 8 + xor[i].leading_zeros() as usize);
            prop_assert_eq!(log_distance(&a, &b), 256 - leading);
        }
    }
}

// ============================================================================
// Routing Bucket Properties
// ============================================================================

mod bucket_properties {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use xdag_discovery::{BucketError, DiscoveryPeer, Endpoint, PeerId, RoutingBucket};

    fn peer(port: u16) -> Arc<DiscoveryPeer> {
        Arc::new(DiscoveryPeer::new(
            PeerId::random(),
            Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port.max(1), 0),
            0,
        ))
    }

    proptest! {
        /// A bucket never exceeds its capacity and newest entries are first
        #[test]
        fn bucket_bounded_and_mru(capacity in 1usize..20, count in 0usize..40) {
            let bucket = RoutingBucket::new(capacity);
            let mut inserted = Vec::new();
            for i in 0..count {
                let p = peer(i as u16 + 1);
                match bucket.add(p.clone()).unwrap() {
                    None => inserted.push(*p.id()),
                    Some(lru) => prop_assert_eq!(lru.id(), &inserted[0]),
                }
                prop_assert!(bucket.len() <= capacity);
            }
            let order: Vec<PeerId> = bucket.peers().iter().map(|p| *p.id()).collect();
            let expected: Vec<PeerId> = inserted.iter().rev().copied().collect();
            prop_assert_eq!(order, expected);
        }

        /// Any mix of adds, re-adds and evictions keeps the bucket bounded
        /// and free of duplicate identities
        #[test]
        fn bucket_ops_keep_bound_and_unique(
            capacity in 1usize..6,
            ops in prop::collection::vec((0u8..3, 0usize..8), 0..64),
        ) {
            let bucket = RoutingBucket::new(capacity);
            let pool: Vec<_> = (0..8).map(|i| peer(i as u16 + 1)).collect();

            for (op, i) in ops {
                let p = &pool[i];
                let present = bucket.contains(p.id());
                match op {
                    // Plain add
                    0 => match bucket.add(p.clone()) {
                        Err(BucketError::DuplicatePeer(id)) => {
                            prop_assert!(present);
                            prop_assert_eq!(&id, p.id());
                        }
                        Ok(None) => prop_assert!(!present),
                        Ok(Some(lru)) => {
                            prop_assert!(!present);
                            let last = bucket.peers().last().map(|e| *e.id());
                            prop_assert_eq!(Some(*lru.id()), last);
                        }
                    },
                    // Evict
                    1 => prop_assert_eq!(bucket.evict(p.id()), present),
                    // Add, evicting the candidate and retrying when full
                    _ => match bucket.add(p.clone()) {
                        Ok(Some(lru)) => {
                            prop_assert!(bucket.evict(lru.id()));
                            prop_assert!(matches!(bucket.add(p.clone()), Ok(None)));
                            prop_assert!(!bucket.contains(lru.id()));
                        }
                        Ok(None) => prop_assert!(!present),
                        Err(_) => prop_assert!(present),
                    },
                }

                let ids: Vec<PeerId> = bucket.peers().iter().map(|e| *e.id()).collect();
                let unique: HashSet<PeerId> = ids.iter().copied().collect();
                prop_assert!(ids.len() <= capacity);
                prop_assert_eq!(unique.len(), ids.len());
                prop_assert_eq!(bucket.len(), ids.len());
            }
        }

        /// Touching moves an entry to the front without changing membership
        #[test]
        fn touch_moves_to_front(count in 1usize..16, pick in any::<prop::sample::Index>()) {
            let bucket = RoutingBucket::new(16);
            let peers: Vec<_> = (0..count).map(|i| peer(i as u16 + 1)).collect();
            for p in &peers {
                bucket.add(p.clone()).unwrap();
            }
            let chosen = peers[pick.index(count)].id();
            prop_assert!(bucket.get_and_touch(chosen).is_some());
            let front = bucket.peers();
            prop_assert_eq!(front[0].id(), chosen);
            prop_assert_eq!(bucket.len(), count);
        }
    }
}

// ============================================================================
// Scheduler Queue Properties
// ============================================================================

mod queue_properties {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use xdag_integration_tests::RecordingDialer;
    use xdag_net::{ActiveChannels, AddressBook, NetConfig, NodeManager, NodeRecord};

    fn manager(max_queue_size: usize) -> NodeManager {
        NodeManager::new(
            NetConfig {
                max_queue_size,
                ..NetConfig::default()
            },
            NodeRecord::from(v4([127, 0, 0, 1], 8001)),
            Arc::new(AddressBook::new(Vec::new(), None, None)),
            Arc::new(ActiveChannels::new()),
            Arc::new(RecordingDialer::default()),
        )
    }

    proptest! {
        /// The queue stays duplicate-free and bounded
        #[test]
        fn queue_dedup_and_bound(
            max in 1usize..32,
            ports in prop::collection::vec(1u16..64, 0..128),
        ) {
            let manager = manager(max);
            for port in &ports {
                manager.add_node(NodeRecord::from(v4([10, 0, 0, 1], *port)));
                prop_assert!(manager.queue_size() <= max);
            }
            let distinct: HashSet<_> = ports.iter().collect();
            prop_assert_eq!(manager.queue_size(), distinct.len().min(max));
        }

        /// Every tick dials at most one node and never the same one twice
        /// within the backoff window
        #[test]
        fn ticks_never_redial(ports in prop::collection::vec(1u16..16, 1..64)) {
            let manager = manager(1024);
            let mut dialed = HashSet::new();
            for (i, port) in ports.iter().enumerate() {
                manager.add_node(NodeRecord::from(v4([10, 0, 0, 2], *port)));
                if let Some(node) = manager.tick_connect_at(1_000 + i as u64) {
                    prop_assert!(dialed.insert(node.address()));
                }
            }
        }
    }
}

// ============================================================================
// NetDB Encoding Properties
// ============================================================================

mod netdb_properties {
    use super::*;
    use xdag_net::NetDb;

    fn dialable_v4() -> impl Strategy<Value = SocketAddr> {
        (any::<[u8; 4]>().prop_filter("non-zero address", |ip| *ip != [0; 4]), 1u16..)
            .prop_map(|(ip, port)| v4(ip, port))
    }

    proptest! {
        /// The compact form preserves dialable IPv4 sets and their order
        #[test]
        fn compact_preserves_set(addrs in prop::collection::vec(dialable_v4(), 0..64)) {
            let db: NetDb = addrs.into_iter().collect();
            let bytes = db.to_compact();
            prop_assert_eq!(bytes.len(), db.len() * 6);
            prop_assert_eq!(NetDb::parse_compact(&bytes), db);
        }

        /// Appending is a union and reports only new entries
        #[test]
        fn append_is_union(
            a in prop::collection::vec(dialable_v4(), 0..32),
            b in prop::collection::vec(dialable_v4(), 0..32),
        ) {
            let mut left: NetDb = a.iter().copied().collect();
            let right: NetDb = b.iter().copied().collect();
            let before = left.len();
            let added = left.append(&right);
            prop_assert_eq!(left.len(), before + added);
            prop_assert!(right.iter().all(|addr| left.contains(addr)));
            prop_assert_eq!(left.append(&right), 0);
        }

        /// The whitelist text form parses back to the same set
        #[test]
        fn lines_preserve_set(addrs in prop::collection::vec(dialable_v4(), 0..32)) {
            let db: NetDb = addrs.into_iter().collect();
            prop_assert_eq!(NetDb::parse_lines(&db.to_lines()), db);
        }
    }
}
