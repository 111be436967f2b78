//! Collaborator seams for the transport layer.
//!
//! The scheduler never opens connections itself. It asks a [`Dialer`] to
//! start one and learns about established connections from a
//! [`ChannelManager`].

use crate::node::NodeRecord;
use dashmap::DashMap;
use std::collections::HashSet;
use std::net::SocketAddr;

/// View of the established connections.
pub trait ChannelManager: Send + Sync {
    /// Remote addresses of all active connections.
    fn active_addresses(&self) -> HashSet<SocketAddr>;

    /// Nodes behind the active connections.
    fn active_nodes(&self) -> Vec<NodeRecord>;

    /// Number of active connections.
    fn size(&self) -> usize;

    /// True if `node` has an active connection.
    fn contains_node(&self, node: &NodeRecord) -> bool;

    /// When the connection to `node` was established (ms epoch).
    fn last_connect(&self, node: &NodeRecord) -> Option<u64>;
}

/// Starts outbound connections.
pub trait Dialer: Send + Sync {
    /// Begin connecting to `node`. Must return without waiting for the
    /// connection; the outcome is reported through the [`ChannelManager`].
    fn dial(&self, node: NodeRecord);
}

/// In-memory [`ChannelManager`] fed by the transport.
#[derive(Debug, Default)]
pub struct ActiveChannels {
    channels: DashMap<SocketAddr, (NodeRecord, u64)>,
}

impl ActiveChannels {
    /// No connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection to `node` established at `now`.
    pub fn register(&self, node: NodeRecord, now: u64) {
        self.channels.insert(node.address(), (node, now));
    }

    /// Forget the connection to `addr`; returns whether one existed.
    pub fn unregister(&self, addr: &SocketAddr) -> bool {
        self.channels.remove(addr).is_some()
    }
}

impl ChannelManager for ActiveChannels {
    fn active_addresses(&self) -> HashSet<SocketAddr> {
        self.channels.iter().map(|entry| *entry.key()).collect()
    }

    fn active_nodes(&self) -> Vec<NodeRecord> {
        self.channels
            .iter()
            .map(|entry| entry.value().0.clone())
            .collect()
    }

    fn size(&self) -> usize {
        self.channels.len()
    }

    fn contains_node(&self, node: &NodeRecord) -> bool {
        self.channels.contains_key(&node.address())
    }

    fn last_connect(&self, node: &NodeRecord) -> Option<u64> {
        self.channels.get(&node.address()).map(|entry| entry.value().1)
    }
}
