//! Distance-bucketed peer table.

use super::bucket::{BucketError, RoutingBucket};
use super::peer::DiscoveryPeer;
use crate::identity::{DISTANCE_BITS, PeerId};
use std::sync::Arc;

/// One bucket per log distance, `0..=256`.
pub const NUM_BUCKETS: usize = DISTANCE_BITS + 1;

/// Outcome of [`PeerTable::try_add`].
#[derive(Debug, Clone)]
pub enum AddResult {
    /// Inserted at the front of its bucket
    Added,
    /// Bucket full; the least-recently-used entry is returned for a liveness
    /// check and nothing was inserted
    BucketFull(Arc<DiscoveryPeer>),
    /// Already in the table; the existing entry was touched
    AlreadyExisted(Arc<DiscoveryPeer>),
    /// The local peer is never added
    SelfPeer,
}

/// Kademlia routing table keyed by log distance from the local id.
#[derive(Debug)]
pub struct PeerTable {
    local_id: PeerId,
    buckets: Vec<RoutingBucket>,
}

impl PeerTable {
    /// Empty table around `local_id`.
    #[must_use]
    pub fn new(local_id: PeerId, bucket_size: usize) -> Self {
        Self {
            local_id,
            buckets: (0..NUM_BUCKETS)
                .map(|_| RoutingBucket::new(bucket_size))
                .collect(),
        }
    }

    /// The local peer id.
    #[must_use]
    pub const fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    fn bucket_for(&self, id: &PeerId) -> &RoutingBucket {
        &self.buckets[self.local_id.log_distance(id)]
    }

    /// Bucket at log distance `index`.
    #[must_use]
    pub fn bucket(&self, index: usize) -> Option<&RoutingBucket> {
        self.buckets.get(index)
    }

    /// Add `peer` unless it is the local peer or already present.
    pub fn try_add(&self, peer: Arc<DiscoveryPeer>) -> AddResult {
        if peer.id() == &self.local_id {
            return AddResult::SelfPeer;
        }
        let bucket = self.bucket_for(peer.id());
        if let Some(existing) = bucket.get_and_touch(peer.id()) {
            return AddResult::AlreadyExisted(existing);
        }
        match bucket.add(peer) {
            Ok(None) => AddResult::Added,
            Ok(Some(candidate)) => AddResult::BucketFull(candidate),
            // Lost a race with a concurrent add of the same peer
            Err(BucketError::DuplicatePeer(id)) => match bucket.get_and_touch(&id) {
                Some(existing) => AddResult::AlreadyExisted(existing),
                None => AddResult::Added,
            },
        }
    }

    /// Look up `id`, marking it most recently used.
    pub fn get(&self, id: &PeerId) -> Option<Arc<DiscoveryPeer>> {
        self.bucket_for(id).get_and_touch(id)
    }

    /// True if `id` is in the table.
    #[must_use]
    pub fn contains(&self, id: &PeerId) -> bool {
        self.bucket_for(id).contains(id)
    }

    /// Remove `id`; returns whether it was present.
    pub fn evict(&self, id: &PeerId) -> bool {
        self.bucket_for(id).evict(id)
    }

    /// Up to `limit` bonded peers ordered by XOR distance to `target`.
    #[must_use]
    pub fn nearest_peers(&self, target: &PeerId, limit: usize) -> Vec<Arc<DiscoveryPeer>> {
        let mut peers: Vec<_> = self
            .buckets
            .iter()
            .flat_map(RoutingBucket::peers)
            .filter(|p| p.is_bonded())
            .collect();
        peers.sort_by_cached_key(|p| p.id().xor_distance(target));
        peers.truncate(limit);
        peers
    }

    /// Every peer in the table, nearest buckets first.
    #[must_use]
    pub fn all_peers(&self) -> Vec<Arc<DiscoveryPeer>> {
        self.buckets.iter().flat_map(RoutingBucket::peers).collect()
    }

    /// Number of peers in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(RoutingBucket::len).sum()
    }

    /// True if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(RoutingBucket::is_empty)
    }
}
