//! Outbound connection scheduler.
//!
//! Candidates enter a bounded, duplicate-free queue from the whitelist, the
//! gossip NetDB and discovery. A single tokio task drives two ticks:
//!
//! - `tick_connect` (every 500ms): pop candidates from the front until one
//!   is dialable, dial it and stop. At most one dial per tick.
//! - `tick_fetch` (every 100s): optionally refresh the whitelist, then
//!   reseed the queue from the address book.
//!
//! Because both ticks run on the same task they never overlap. A panic in
//! either tick is logged and the schedule carries on. The queue
//! and the recent-connect cache are still locked individually since
//! discovery adds nodes from other tasks.

use crate::address_book::AddressBook;
use crate::channel::{ChannelManager, Dialer};
use crate::config::NetConfig;
use crate::node::NodeRecord;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, trace};
use xdag_discovery::now_millis;

/// Schedules outbound connections.
pub struct NodeManager {
    config: NetConfig,
    local: NodeRecord,
    address_book: Arc<AddressBook>,
    channels: Arc<dyn ChannelManager>,
    dialer: Arc<dyn Dialer>,
    queue: Mutex<VecDeque<NodeRecord>>,
    recent: Mutex<LruCache<NodeRecord, u64>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeManager {
    /// Scheduler for the node listening on `local`.
    #[must_use]
    pub fn new(
        config: NetConfig,
        local: NodeRecord,
        address_book: Arc<AddressBook>,
        channels: Arc<dyn ChannelManager>,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.recent_connect_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(config.max_queue_size)),
            recent: Mutex::new(LruCache::new(capacity)),
            task: Mutex::new(None),
            config,
            local,
            address_book,
            channels,
            dialer,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// The address book feeding the queue.
    #[must_use]
    pub fn address_book(&self) -> &Arc<AddressBook> {
        &self.address_book
    }

    // ------------------------------------------------------------------
    // Candidate queue
    // ------------------------------------------------------------------

    /// Push `node` to the front of the queue unless it is already queued.
    /// Returns whether it was added.
    pub fn add_node(&self, node: NodeRecord) -> bool {
        let mut queue = self.queue.lock();
        if queue.contains(&node) {
            return false;
        }
        queue.push_front(node);
        queue.truncate(self.config.max_queue_size);
        true
    }

    /// [`NodeManager::add_node`] for each node; returns how many were added.
    pub fn add_nodes(&self, nodes: impl IntoIterator<Item = NodeRecord>) -> usize {
        nodes.into_iter().filter(|node| self.add_node(node.clone())).count()
    }

    /// Number of queued candidates.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    /// Every address the node knows about: whitelist first, then gossip.
    #[must_use]
    pub fn discovered_nodes(&self) -> Vec<NodeRecord> {
        let mut known = self.address_book.whitelist();
        known.append(&self.address_book.netdb());
        known.nodes()
    }

    /// Active connections with the time of our last dial, falling back to
    /// the time the channel manager saw the connection come up.
    #[must_use]
    pub fn active_nodes_with_last_attempt(&self) -> Vec<(NodeRecord, Option<u64>)> {
        let recent = self.recent.lock();
        self.channels
            .active_nodes()
            .into_iter()
            .map(|node| {
                let last = recent
                    .peek(&node)
                    .copied()
                    .or_else(|| self.channels.last_connect(&node));
                (node, last)
            })
            .collect()
    }

    /// Last dial of `node`, if still cached.
    #[must_use]
    pub fn last_attempt(&self, node: &NodeRecord) -> Option<u64> {
        self.recent.lock().peek(node).copied()
    }

    // ------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------

    /// Dial at most one queued candidate.
    pub fn tick_connect(&self) -> Option<NodeRecord> {
        self.tick_connect_at(now_millis())
    }

    /// [`NodeManager::tick_connect`] at an explicit time.
    ///
    /// Candidates that are the local node, already connected, or dialed
    /// within the backoff window are discarded. Returns the dialed node.
    pub fn tick_connect_at(&self, now: u64) -> Option<NodeRecord> {
        let active = self.channels.active_addresses();
        loop {
            if self.channels.size() >= self.config.max_connections {
                trace!("Connection ceiling reached");
                return None;
            }
            let node = self.queue.lock().pop_front()?;

            if node == self.local || active.contains(&node.address()) {
                continue;
            }
            let last = self.recent.lock().get(&node).copied();
            if let Some(last) = last {
                if last.saturating_add(self.config.reconnect_backoff_ms) >= now {
                    trace!(%node, "Skipping node inside reconnect backoff");
                    continue;
                }
            }

            debug!(%node, "Dialing node");
            self.recent.lock().put(node.clone(), now);
            self.dialer.dial(node.clone());
            return Some(node);
        }
    }

    /// Refresh the whitelist if enabled and reseed the queue.
    pub async fn tick_fetch(&self) {
        if self.config.refresh_enabled {
            self.address_book.refresh().await;
        }
        let added = self.add_nodes(self.address_book.whitelist().nodes())
            + self.add_nodes(self.address_book.netdb().nodes());
        debug!(added, queued = self.queue_size(), "Fetched candidate nodes");
    }

    /// Dial `host:port` now unless it is the local node or already
    /// connected. Returns whether a dial was started.
    pub fn connect_direct(&self, host: IpAddr, port: u16) -> bool {
        let node = NodeRecord::new(host, port);
        if node == self.local || self.channels.contains_node(&node) {
            return false;
        }
        info!(%node, "Direct connect");
        self.dialer.dial(node);
        true
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Seed the queue from the whitelist and start the tick task.
    ///
    /// Has no effect if already running. Must be called inside a tokio
    /// runtime.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        self.add_nodes(self.address_book.whitelist().nodes());

        *task = Some(tokio::spawn(Arc::clone(self).run()));
        info!(queued = self.queue_size(), "Node manager started");
    }

    /// Stop the tick task. In-flight dials are left to the dialer.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Node manager stopped");
        }
    }

    /// True between [`NodeManager::start`] and [`NodeManager::stop`].
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    async fn run(self: Arc<Self>) {
        let now = Instant::now();
        let mut connect = interval_at(
            now + self.config.connect_initial_delay,
            self.config.connect_interval,
        );
        let mut fetch = interval_at(
            now + self.config.fetch_initial_delay,
            self.config.fetch_interval,
        );
        connect.set_missed_tick_behavior(MissedTickBehavior::Skip);
        fetch.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = connect.tick() => {
                    if catch_unwind(AssertUnwindSafe(|| self.tick_connect())).is_err() {
                        error!("Connect tick panicked");
                    }
                }
                _ = fetch.tick() => {
                    // Awaited in place so the ticks still never overlap
                    let manager = Arc::clone(&self);
                    if let Err(e) = tokio::spawn(async move { manager.tick_fetch().await }).await {
                        error!(error = %e, "Fetch tick failed");
                    }
                }
            }
        }
    }
}

impl Drop for NodeManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeManager")
            .field("local", &self.local)
            .field("queued", &self.queue.lock().len())
            .field("active", &self.channels.size())
            .finish()
    }
}
