//! Routing table entries.

use crate::endpoint::Endpoint;
use crate::identity::PeerId;
use parking_lot::Mutex;
use std::fmt;

/// Bonding state of a table entry.
///
/// ```text
/// Known ──ping sent──▶ Bonding ──matching pong──▶ Bonded
///   ▲                     │
///   └──── retry ──────────┘   (removed after the last failed attempt)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerDiscoveryStatus {
    /// Learned from gossip or an unsolicited packet, not yet verified
    Known,
    /// PING sent, PONG outstanding
    Bonding,
    /// Answered a PING with a matching PONG
    Bonded,
}

#[derive(Debug)]
struct PeerState {
    status: PeerDiscoveryStatus,
    last_seen: u64,
    last_contacted: u64,
}

/// A peer known to the discovery layer.
///
/// Identity and endpoint never change. Status and timestamps are updated
/// through a per-peer lock, so one `Arc<DiscoveryPeer>` can be shared by
/// the table and by in-flight interactions.
pub struct DiscoveryPeer {
    id: PeerId,
    endpoint: Endpoint,
    first_discovered: u64,
    state: Mutex<PeerState>,
}

impl DiscoveryPeer {
    /// New `Known` peer first seen at `now` (ms epoch).
    #[must_use]
    pub fn new(id: PeerId, endpoint: Endpoint, now: u64) -> Self {
        Self {
            id,
            endpoint,
            first_discovered: now,
            state: Mutex::new(PeerState {
                status: PeerDiscoveryStatus::Known,
                last_seen: now,
                last_contacted: 0,
            }),
        }
    }

    /// Peer identity.
    #[must_use]
    pub const fn id(&self) -> &PeerId {
        &self.id
    }

    /// Advertised endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// When the peer was first learned.
    #[must_use]
    pub const fn first_discovered(&self) -> u64 {
        self.first_discovered
    }

    /// Current bonding status.
    #[must_use]
    pub fn status(&self) -> PeerDiscoveryStatus {
        self.state.lock().status
    }

    /// Move to `status`.
    pub fn set_status(&self, status: PeerDiscoveryStatus) {
        self.state.lock().status = status;
    }

    /// True once the peer answered a PING.
    #[must_use]
    pub fn is_bonded(&self) -> bool {
        self.status() == PeerDiscoveryStatus::Bonded
    }

    /// Last time a valid packet arrived from the peer.
    #[must_use]
    pub fn last_seen(&self) -> u64 {
        self.state.lock().last_seen
    }

    /// Record an authenticated packet from the peer.
    pub fn mark_seen(&self, now: u64) {
        let mut state = self.state.lock();
        state.last_seen = state.last_seen.max(now);
    }

    /// Last time we sent the peer a request, `0` if never.
    #[must_use]
    pub fn last_contacted(&self) -> u64 {
        self.state.lock().last_contacted
    }

    /// Record an outgoing request.
    pub fn mark_contacted(&self, now: u64) {
        self.state.lock().last_contacted = now;
    }
}

impl fmt::Debug for DiscoveryPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DiscoveryPeer")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("status", &state.status)
            .field("last_seen", &state.last_seen)
            .finish()
    }
}
