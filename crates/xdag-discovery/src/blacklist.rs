//! Peer blacklist.

use crate::identity::PeerId;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;

/// Default number of rolling entries.
pub const DEFAULT_BLACKLIST_CAPACITY: usize = 500;

/// Ids whose packets are dropped.
///
/// Holds a bounded set of recently blacklisted ids, where the least recently
/// used entry rolls off once the capacity is reached, and a permanent set of
/// banned ids that never rolls off.
#[derive(Debug)]
pub struct PeerBlacklist {
    recent: Mutex<LruCache<PeerId, ()>>,
    banned: HashSet<PeerId>,
}

impl PeerBlacklist {
    /// Blacklist with `capacity` rolling entries and a permanent `banned`
    /// set. A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize, banned: HashSet<PeerId>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            recent: Mutex::new(LruCache::new(capacity)),
            banned,
        }
    }

    /// Blacklist with only rolling entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, HashSet::new())
    }

    /// True if `id` is banned or recently blacklisted.
    #[must_use]
    pub fn contains(&self, id: &PeerId) -> bool {
        self.banned.contains(id) || self.recent.lock().get(id).is_some()
    }

    /// Blacklist `id`, possibly pushing out the oldest rolling entry.
    pub fn add(&self, id: PeerId) {
        self.recent.lock().put(id, ());
    }

    /// Remove `id` from the rolling entries. Banned ids stay banned.
    pub fn remove(&self, id: &PeerId) -> bool {
        self.recent.lock().pop(id).is_some()
    }

    /// Number of rolling entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recent.lock().len()
    }

    /// True if there are no rolling entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recent.lock().is_empty()
    }
}

impl Default for PeerBlacklist {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BLACKLIST_CAPACITY)
    }
}
