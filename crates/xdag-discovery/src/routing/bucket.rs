//! Kademlia k-bucket.

use super::peer::DiscoveryPeer;
use crate::identity::PeerId;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Default bucket capacity.
pub const DEFAULT_BUCKET_SIZE: usize = 16;

/// Bucket contract violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BucketError {
    /// `add` was called for a peer already in the bucket
    #[error("peer {0:?} is already in the bucket")]
    DuplicatePeer(PeerId),
}

/// Fixed-capacity bucket ordered most-recently-used first.
///
/// A full bucket never replaces an entry on its own. [`RoutingBucket::add`]
/// hands back the least-recently-used entry instead; the caller must check
/// that it is unreachable, [`RoutingBucket::evict`] it, and add again.
///
/// All operations take the bucket's lock, so calls on one bucket are totally
/// ordered.
#[derive(Debug)]
pub struct RoutingBucket {
    capacity: usize,
    entries: Mutex<Vec<Arc<DiscoveryPeer>>>,
}

impl RoutingBucket {
    /// Empty bucket holding at most `capacity` peers, and at least one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up `id`; on a hit, move it to the front.
    pub fn get_and_touch(&self, id: &PeerId) -> Option<Arc<DiscoveryPeer>> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|p| p.id() == id)?;
        let peer = entries.remove(index);
        entries.insert(0, peer.clone());
        Some(peer)
    }

    /// Insert `peer` at the front.
    ///
    /// Returns `Ok(None)` when inserted, or `Ok(Some(lru))` without inserting
    /// when the bucket is full.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::DuplicatePeer`] if the peer is already present.
    pub fn add(
        &self,
        peer: Arc<DiscoveryPeer>,
    ) -> Result<Option<Arc<DiscoveryPeer>>, BucketError> {
        let mut entries = self.entries.lock();
        if entries.iter().any(|p| p.id() == peer.id()) {
            return Err(BucketError::DuplicatePeer(*peer.id()));
        }
        if entries.len() >= self.capacity {
            return Ok(entries.last().cloned());
        }
        entries.insert(0, peer);
        Ok(None)
    }

    /// Remove `id`; returns whether it was present.
    pub fn evict(&self, id: &PeerId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|p| p.id() == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the entries, most recently used first.
    #[must_use]
    pub fn peers(&self) -> Vec<Arc<DiscoveryPeer>> {
        self.entries.lock().clone()
    }

    /// True if `id` is present, without touching it.
    #[must_use]
    pub fn contains(&self, id: &PeerId) -> bool {
        self.entries.lock().iter().any(|p| p.id() == id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if the bucket holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// True if `add` would return an eviction candidate.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.lock().len() >= self.capacity
    }
}

impl Default for RoutingBucket {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE)
    }
}
