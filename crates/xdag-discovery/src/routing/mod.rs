//! Kademlia routing table.
//!
//! - [`RoutingBucket`]: fixed-capacity, most-recently-used-first bucket with
//!   an explicit ping-before-evict protocol
//! - [`PeerTable`]: 257 buckets indexed by log distance from the local id
//! - [`DiscoveryPeer`]: shared table entry carrying the bonding status

pub mod bucket;
pub mod peer;
pub mod table;

pub use bucket::{BucketError, DEFAULT_BUCKET_SIZE, RoutingBucket};
pub use peer::{DiscoveryPeer, PeerDiscoveryStatus};
pub use table::{AddResult, NUM_BUCKETS, PeerTable};
