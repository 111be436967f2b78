//! # XDAG Discovery
//!
//! UDP peer discovery for XDAG nodes.
//!
//! This crate provides:
//! - A strict RLP codec for packet payloads
//! - Signed, integrity-checked discovery packets (PING, PONG,
//!   FIND_NEIGHBORS, NEIGHBORS)
//! - Peer identities with a memoized Keccak-256 routing coordinate
//! - A Kademlia routing table with ping-before-evict buckets
//! - The bonding state machine and a tokio UDP driver
//!
//! ## Packet layout
//!
//! | Offset | Field |
//! |--------|-------|
//! | `0..32` | Keccak-256 of everything after it |
//! | `32..97` | Recoverable signature over Keccak-256 of `type \|\| payload` |
//! | `97` | Packet type |
//! | `98..` | RLP payload |
//!
//! ## Example
//!
//! ```rust
//! use xdag_crypto::KeyPair;
//! use xdag_discovery::{Endpoint, Packet, PacketData, Ping};
//!
//! let key = KeyPair::generate();
//! let ping = Ping {
//!     from: Endpoint::new("1.2.3.4".parse().unwrap(), 30303, 30303),
//!     to: Endpoint::new("5.6.7.8".parse().unwrap(), 30303, 0),
//!     expiration: 1_700_000_060_000,
//! };
//! let packet = Packet::create(ping.clone(), &key).unwrap();
//!
//! let decoded = Packet::decode(packet.as_bytes()).unwrap();
//! assert_eq!(decoded.data(), &PacketData::Ping(ping));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blacklist;
pub mod config;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod packet;
pub mod rlp;
pub mod routing;
pub mod udp;

pub use blacklist::PeerBlacklist;
pub use config::{Bootnode, BootnodeParseError, DiscoveryConfig, MAX_PACKET_SIZE};
pub use controller::{DiscoveryController, DiscoveryEvent, PacketSink, now_millis};
pub use endpoint::Endpoint;
pub use error::{DiscoveryError, Result};
pub use identity::{PEER_ID_SIZE, PeerId, PeerIdError, log_distance, xor_distance};
pub use packet::{
    DecodeError, FindNeighbors, NeighborRecord, Neighbors, Packet, PacketData, PacketType, Ping,
    Pong,
};
pub use routing::{
    AddResult, BucketError, DiscoveryPeer, PeerDiscoveryStatus, PeerTable, RoutingBucket,
};
pub use udp::{UdpDiscovery, UdpSink, UdpStats};
