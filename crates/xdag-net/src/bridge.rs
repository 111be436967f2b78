//! Feeds bonded discovery peers into the connection scheduler.

use crate::manager::NodeManager;
use crate::netdb::NetDb;
use crate::node::NodeRecord;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use xdag_discovery::DiscoveryEvent;

/// Consumes discovery events and queues bonded peers for dialing.
pub struct DiscoveryBridge {
    manager: Arc<NodeManager>,
    events: mpsc::Receiver<DiscoveryEvent>,
}

impl DiscoveryBridge {
    /// Bridge `events` into `manager`.
    #[must_use]
    pub fn new(manager: Arc<NodeManager>, events: mpsc::Receiver<DiscoveryEvent>) -> Self {
        Self { manager, events }
    }

    /// Run until the event channel closes.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            handle_event(&self.manager, &event);
        }
        debug!("Discovery event channel closed");
    }

    /// Run on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Apply one event. Returns the node queued, if any.
///
/// Peers that advertise no TCP port cannot be dialed and are ignored.
pub fn handle_event(manager: &NodeManager, event: &DiscoveryEvent) -> Option<NodeRecord> {
    match event {
        DiscoveryEvent::PeerBonded { peer, .. } => {
            let endpoint = peer.endpoint();
            let Some(addr) = endpoint.tcp_addr() else {
                trace!(%endpoint, "Bonded peer has no TCP port");
                return None;
            };
            manager.address_book().merge_gossip(&NetDb::from_iter([addr]));
            let node = NodeRecord::from(addr);
            manager.add_node(node.clone()).then_some(node)
        }
        DiscoveryEvent::PeerDropped { peer, .. } => {
            trace!(endpoint = %peer.endpoint(), "Discovery dropped peer");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_book::AddressBook;
    use crate::channel::{ActiveChannels, Dialer};
    use crate::config::NetConfig;
    use std::net::SocketAddr;
    use xdag_discovery::{DiscoveryPeer, Endpoint, PeerId};

    struct NoopDialer;

    impl Dialer for NoopDialer {
        fn dial(&self, _node: NodeRecord) {}
    }

    fn manager() -> Arc<NodeManager> {
        Arc::new(NodeManager::new(
            NetConfig::default(),
            NodeRecord::from("127.0.0.1:8001".parse::<SocketAddr>().unwrap()),
            Arc::new(AddressBook::new(Vec::new(), None, None)),
            Arc::new(ActiveChannels::new()),
            Arc::new(NoopDialer),
        ))
    }

    fn bonded(tcp_port: u16) -> DiscoveryEvent {
        DiscoveryEvent::PeerBonded {
            peer: Arc::new(DiscoveryPeer::new(
                PeerId::random(),
                Endpoint::new("10.0.0.9".parse().unwrap(), 30303, tcp_port),
                0,
            )),
            timestamp: 0,
        }
    }

    #[test]
    fn test_bonded_peer_queued_and_merged() {
        let manager = manager();
        let node = handle_event(&manager, &bonded(8001)).unwrap();
        assert_eq!(node.address(), "10.0.0.9:8001".parse::<SocketAddr>().unwrap());
        assert_eq!(manager.queue_size(), 1);
        assert!(manager.address_book().netdb().contains(&node.address()));

        // Already queued
        assert!(handle_event(&manager, &bonded(8001)).is_none());
        assert_eq!(manager.queue_size(), 1);
    }

    #[test]
    fn test_peer_without_tcp_ignored() {
        let manager = manager();
        assert!(handle_event(&manager, &bonded(0)).is_none());
        assert_eq!(manager.queue_size(), 0);
        assert!(manager.address_book().netdb().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let manager = manager();
        let (tx, rx) = mpsc::channel(8);
        let handle = DiscoveryBridge::new(manager.clone(), rx).spawn();

        tx.send(bonded(8001)).await.unwrap();
        tx.send(bonded(8002)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(manager.queue_size(), 2);
    }
}
