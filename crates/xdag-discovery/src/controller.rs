//! Discovery protocol controller.
//!
//! The controller owns the peer table and drives the bonding state machine:
//!
//! 1. A peer is learned (bootnode, PING, NEIGHBORS) and starts `Known`.
//! 2. [`DiscoveryController::bond`] sends a PING and records an in-flight
//!    interaction expecting a PONG that echoes the PING hash. The peer is
//!    `Bonding`.
//! 3. A matching PONG makes it `Bonded`; it is inserted into the table and a
//!    [`DiscoveryEvent::PeerBonded`] is emitted.
//! 4. Unanswered requests are retried from [`DiscoveryController::tick`]
//!    with a growing delay; after the last attempt the peer is dropped.
//!
//! When a bucket is full the least-recently-used entry is pinged first and
//! only evicted if it stays silent.
//!
//! The controller performs no I/O of its own. Outgoing datagrams go to a
//! [`PacketSink`]; inbound datagrams are fed to
//! [`DiscoveryController::handle_datagram`]. Every time-dependent method has
//! an `_at` variant taking the current time in milliseconds.

use crate::blacklist::PeerBlacklist;
use crate::config::{Bootnode, DiscoveryConfig, duration_millis};
use crate::endpoint::Endpoint;
use crate::error::{DiscoveryError, Result};
use crate::identity::PeerId;
use crate::packet::{
    FindNeighbors, NeighborRecord, Neighbors, Packet, PacketData, Ping, Pong,
};
use crate::routing::{AddResult, DiscoveryPeer, PeerDiscoveryStatus, PeerTable};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use xdag_crypto::KeyPair;

/// Destination for encoded datagrams.
///
/// Implementations must not block; a full socket buffer is reported as an
/// error and the datagram is dropped.
pub trait PacketSink: Send + Sync {
    /// Send one datagram to `to`.
    ///
    /// # Errors
    ///
    /// Returns the socket error, if any.
    fn send(&self, to: SocketAddr, datagram: &[u8]) -> io::Result<()>;
}

/// Notifications emitted by the controller.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A peer answered our PING
    PeerBonded {
        /// The bonded peer
        peer: Arc<DiscoveryPeer>,
        /// When it bonded (ms epoch)
        timestamp: u64,
    },
    /// A peer stopped answering and was removed
    PeerDropped {
        /// The dropped peer
        peer: Arc<DiscoveryPeer>,
        /// When it was dropped (ms epoch)
        timestamp: u64,
    },
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
enum InteractionKind {
    /// PING sent to bond with the peer
    Bond { ping_hash: [u8; 32], bootstrap: bool },
    /// PING sent to the least-recently-used entry of a full bucket
    EvictionCheck {
        ping_hash: [u8; 32],
        replacement: Arc<DiscoveryPeer>,
    },
    /// FIND_NEIGHBORS sent, NEIGHBORS expected
    FindNeighbors { target: PeerId },
}

#[derive(Debug)]
struct Interaction {
    peer: Arc<DiscoveryPeer>,
    kind: InteractionKind,
    attempts: u32,
    delay: u64,
    deadline: u64,
}

#[derive(Debug, Default)]
struct RefreshState {
    last_refresh: Option<u64>,
    last_check: u64,
}

/// Discovery protocol state machine.
pub struct DiscoveryController {
    key: KeyPair,
    local: Arc<DiscoveryPeer>,
    config: DiscoveryConfig,
    table: PeerTable,
    blacklist: PeerBlacklist,
    sink: Arc<dyn PacketSink>,
    interactions: DashMap<PeerId, Interaction>,
    events: mpsc::Sender<DiscoveryEvent>,
    refresh: Mutex<RefreshState>,
}

impl DiscoveryController {
    /// Create a controller advertising `local_endpoint`.
    ///
    /// Returns the controller and the receiving end of its event channel.
    pub fn new(
        key: KeyPair,
        local_endpoint: Endpoint,
        config: DiscoveryConfig,
        sink: Arc<dyn PacketSink>,
    ) -> (Self, mpsc::Receiver<DiscoveryEvent>) {
        let local_id = PeerId::from_public_key(&key.public_key());
        let local = Arc::new(DiscoveryPeer::new(local_id, local_endpoint, now_millis()));
        local.set_status(PeerDiscoveryStatus::Bonded);

        let (events, rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let controller = Self {
            key,
            table: PeerTable::new(local_id, config.bucket_size),
            blacklist: PeerBlacklist::with_capacity(config.blacklist_capacity),
            local,
            config,
            sink,
            interactions: DashMap::new(),
            events,
            refresh: Mutex::new(RefreshState::default()),
        };
        (controller, rx)
    }

    /// The local peer.
    #[must_use]
    pub fn local_peer(&self) -> &Arc<DiscoveryPeer> {
        &self.local
    }

    /// The routing table.
    #[must_use]
    pub fn table(&self) -> &PeerTable {
        &self.table
    }

    /// The blacklist consulted for every inbound packet.
    #[must_use]
    pub fn blacklist(&self) -> &PeerBlacklist {
        &self.blacklist
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Number of peers in the table.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.table.len()
    }

    /// Peers that completed bonding.
    #[must_use]
    pub fn bonded_peers(&self) -> Vec<Arc<DiscoveryPeer>> {
        self.table
            .all_peers()
            .into_iter()
            .filter(|p| p.is_bonded())
            .collect()
    }

    /// Number of requests awaiting an answer.
    #[must_use]
    pub fn pending_interactions(&self) -> usize {
        self.interactions.len()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Add `bootnodes` to the table and bond with them.
    pub fn start(&self, bootnodes: &[Bootnode]) {
        self.start_at(bootnodes, now_millis());
    }

    /// [`DiscoveryController::start`] at an explicit time.
    pub fn start_at(&self, bootnodes: &[Bootnode], now: u64) {
        info!(
            id = %self.local.id(),
            endpoint = %self.local.endpoint(),
            bootnodes = bootnodes.len(),
            "Starting peer discovery"
        );
        self.refresh.lock().last_check = now;
        for bootnode in bootnodes {
            let peer = Arc::new(DiscoveryPeer::new(bootnode.id, bootnode.endpoint, now));
            match self.table.try_add(peer.clone()) {
                AddResult::Added => self.bond_at(&peer, true, now),
                AddResult::AlreadyExisted(existing) => self.bond_at(&existing, true, now),
                AddResult::BucketFull(_) => self.bond_at(&peer, true, now),
                AddResult::SelfPeer => debug!("Skipping bootnode that is the local peer"),
            }
        }
    }

    /// Start bonding with `peer`.
    pub fn bond(&self, peer: &Arc<DiscoveryPeer>, bootstrap: bool) {
        self.bond_at(peer, bootstrap, now_millis());
    }

    /// [`DiscoveryController::bond`] at an explicit time.
    pub fn bond_at(&self, peer: &Arc<DiscoveryPeer>, bootstrap: bool, now: u64) {
        peer.set_status(PeerDiscoveryStatus::Bonding);
        let ping_hash = self.send_ping(peer, now).unwrap_or([0u8; 32]);
        self.dispatch(
            peer.clone(),
            InteractionKind::Bond {
                ping_hash,
                bootstrap,
            },
            now,
        );
    }

    fn dispatch(&self, peer: Arc<DiscoveryPeer>, kind: InteractionKind, now: u64) {
        let delay = self.config.next_retry_delay(0);
        let id = *peer.id();
        let interaction = Interaction {
            peer,
            kind,
            attempts: 1,
            delay,
            deadline: now.saturating_add(delay),
        };
        if self.interactions.insert(id, interaction).is_some() {
            trace!(peer = %id, "Replaced in-flight interaction");
        }
    }

    // ------------------------------------------------------------------
    // Outgoing packets
    // ------------------------------------------------------------------

    fn expiration(&self, now: u64) -> u64 {
        now.saturating_add(duration_millis(self.config.packet_expiration))
    }

    fn send_packet(&self, peer: &DiscoveryPeer, data: PacketData, now: u64) -> Result<Packet> {
        let packet_type = data.packet_type();
        let packet = Packet::create(data, &self.key)?;
        let to = peer.endpoint().udp_addr();
        self.sink
            .send(to, packet.as_bytes())
            .map_err(|e| DiscoveryError::Send(e.to_string()))?;
        peer.mark_contacted(now);
        trace!(%to, %packet_type, size = packet.as_bytes().len(), "Sent discovery packet");
        Ok(packet)
    }

    fn send_logged(&self, peer: &DiscoveryPeer, data: PacketData, now: u64) -> Option<Packet> {
        match self.send_packet(peer, data, now) {
            Ok(packet) => Some(packet),
            Err(e) => {
                warn!(peer = ?peer.id(), error = %e, "Failed to send discovery packet");
                None
            }
        }
    }

    fn send_ping(&self, peer: &DiscoveryPeer, now: u64) -> Option<[u8; 32]> {
        let ping = Ping {
            from: *self.local.endpoint(),
            to: *peer.endpoint(),
            expiration: self.expiration(now),
        };
        self.send_logged(peer, ping.into(), now)
            .map(|packet| *packet.hash())
    }

    fn send_find_neighbors(&self, peer: &DiscoveryPeer, target: PeerId, now: u64) {
        let find = FindNeighbors {
            target,
            expiration: self.expiration(now),
        };
        self.send_logged(peer, find.into(), now);
    }

    fn find_neighbors(&self, peer: &Arc<DiscoveryPeer>, target: PeerId, now: u64) {
        self.send_find_neighbors(peer, target, now);
        self.dispatch(peer.clone(), InteractionKind::FindNeighbors { target }, now);
    }

    // ------------------------------------------------------------------
    // Inbound packets
    // ------------------------------------------------------------------

    /// Handle one inbound datagram from `from`.
    ///
    /// # Errors
    ///
    /// Returns why the datagram was dropped. Errors never affect the sender's
    /// standing.
    pub fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) -> Result<()> {
        self.handle_datagram_at(datagram, from, now_millis())
    }

    /// [`DiscoveryController::handle_datagram`] at an explicit time.
    ///
    /// # Errors
    ///
    /// See [`DiscoveryController::handle_datagram`].
    pub fn handle_datagram_at(&self, datagram: &[u8], from: SocketAddr, now: u64) -> Result<()> {
        if datagram.len() > self.config.max_packet_size {
            return Err(DiscoveryError::Decode(crate::packet::DecodeError::TooLarge {
                size: datagram.len(),
                max: self.config.max_packet_size,
            }));
        }

        let packet = Packet::decode(datagram)?;
        let expiration = packet.data().expiration();
        if expiration < now {
            return Err(DiscoveryError::Expired { expiration, now });
        }

        let sender_id = *packet.sender();
        if self.blacklist.contains(&sender_id) {
            return Err(DiscoveryError::Blacklisted(sender_id));
        }
        if &sender_id == self.local.id() {
            trace!("Ignoring packet from self");
            return Ok(());
        }

        trace!(%from, packet_type = %packet.packet_type(), "Received discovery packet");
        self.on_packet(packet, from, now);
        Ok(())
    }

    fn on_packet(&self, packet: Packet, from: SocketAddr, now: u64) {
        let sender_id = *packet.sender();
        let hash = *packet.hash();

        let tcp_port = match packet.data() {
            PacketData::Ping(ping) => ping.from.tcp_port,
            _ => 0,
        };
        let known = self.table.get(&sender_id);
        let peer = known.clone().unwrap_or_else(|| {
            Arc::new(DiscoveryPeer::new(
                sender_id,
                Endpoint::new(from.ip(), from.port(), tcp_port),
                now,
            ))
        });
        peer.mark_seen(now);

        match packet.into_data() {
            PacketData::Ping(ping) => self.on_ping(&peer, known.is_some(), &ping, hash, now),
            PacketData::Pong(pong) => self.on_pong(&sender_id, &pong, now),
            PacketData::FindNeighbors(find) => self.on_find_neighbors(&peer, &find, now),
            PacketData::Neighbors(neighbors) => self.on_neighbors(&sender_id, neighbors, now),
        }
    }

    fn on_ping(&self, peer: &Arc<DiscoveryPeer>, known: bool, ping: &Ping, hash: [u8; 32], now: u64) {
        if !known {
            // Only take free slots; full buckets are handled once the peer bonds
            if matches!(self.table.try_add(peer.clone()), AddResult::Added) {
                debug!(peer = %peer.endpoint(), "Added peer from PING");
            }
        }

        let pong = Pong {
            to: ping.from,
            ping_hash: hash,
            expiration: self.expiration(now),
        };
        self.send_logged(peer, pong.into(), now);

        if peer.status() == PeerDiscoveryStatus::Known && !self.interactions.contains_key(peer.id()) {
            self.bond_at(peer, false, now);
        }
    }

    fn on_pong(&self, sender: &PeerId, pong: &Pong, now: u64) {
        let matched = self.interactions.remove_if(sender, |_, interaction| {
            interaction.deadline >= now
                && match &interaction.kind {
                    InteractionKind::Bond { ping_hash, .. }
                    | InteractionKind::EvictionCheck { ping_hash, .. } => {
                        *ping_hash == pong.ping_hash
                    }
                    InteractionKind::FindNeighbors { .. } => false,
                }
        });
        let Some((_, interaction)) = matched else {
            debug!(peer = ?sender, "Unsolicited PONG");
            return;
        };

        let peer = interaction.peer;
        peer.mark_seen(now);
        match interaction.kind {
            InteractionKind::Bond { bootstrap, .. } => {
                self.on_bonded(&peer, now);
                if bootstrap {
                    self.find_neighbors(&peer, *self.local.id(), now);
                }
            }
            InteractionKind::EvictionCheck { replacement, .. } => {
                // Candidate is alive: keep it and drop the replacement
                self.table.get(peer.id());
                peer.set_status(PeerDiscoveryStatus::Bonded);
                debug!(
                    kept = %peer.endpoint(),
                    discarded = %replacement.endpoint(),
                    "Eviction candidate answered"
                );
            }
            InteractionKind::FindNeighbors { .. } => {}
        }
    }

    fn on_bonded(&self, peer: &Arc<DiscoveryPeer>, now: u64) {
        peer.set_status(PeerDiscoveryStatus::Bonded);
        match self.table.try_add(peer.clone()) {
            AddResult::Added | AddResult::AlreadyExisted(_) => self.announce_bonded(peer, now),
            // Announced once the candidate is evicted and the peer is in
            AddResult::BucketFull(candidate) => self.check_eviction(candidate, peer.clone(), now),
            AddResult::SelfPeer => {}
        }
    }

    fn announce_bonded(&self, peer: &Arc<DiscoveryPeer>, now: u64) {
        info!(peer = %peer.endpoint(), id = ?peer.id(), "Peer bonded");
        self.emit(DiscoveryEvent::PeerBonded {
            peer: peer.clone(),
            timestamp: now,
        });
    }

    fn check_eviction(&self, candidate: Arc<DiscoveryPeer>, replacement: Arc<DiscoveryPeer>, now: u64) {
        if self.interactions.contains_key(candidate.id()) {
            debug!(
                candidate = %candidate.endpoint(),
                discarded = %replacement.endpoint(),
                "Eviction candidate already being checked, dropping replacement"
            );
            return;
        }
        debug!(candidate = %candidate.endpoint(), "Bucket full, pinging eviction candidate");
        let ping_hash = self.send_ping(&candidate, now).unwrap_or([0u8; 32]);
        self.dispatch(
            candidate,
            InteractionKind::EvictionCheck {
                ping_hash,
                replacement,
            },
            now,
        );
    }

    fn on_find_neighbors(&self, peer: &Arc<DiscoveryPeer>, find: &FindNeighbors, now: u64) {
        if !self.table.contains(peer.id()) || !peer.is_bonded() {
            debug!(peer = %peer.endpoint(), "Ignoring FIND_NEIGHBORS from unbonded peer");
            return;
        }
        let peers: Vec<NeighborRecord> = self
            .table
            .nearest_peers(&find.target, self.config.neighbors_limit)
            .iter()
            .map(|p| NeighborRecord {
                endpoint: *p.endpoint(),
                id: *p.id(),
            })
            .collect();
        trace!(count = peers.len(), "Answering FIND_NEIGHBORS");
        let neighbors = Neighbors {
            peers,
            expiration: self.expiration(now),
        };
        self.send_logged(peer, neighbors.into(), now);
    }

    fn on_neighbors(&self, sender: &PeerId, neighbors: Neighbors, now: u64) {
        let matched = self.interactions.remove_if(sender, |_, interaction| {
            matches!(interaction.kind, InteractionKind::FindNeighbors { .. })
        });
        if matched.is_none() {
            debug!(peer = ?sender, "Unsolicited NEIGHBORS");
            return;
        }

        for record in neighbors.peers {
            if &record.id == self.local.id()
                || self.blacklist.contains(&record.id)
                || self.table.contains(&record.id)
                || self.interactions.contains_key(&record.id)
            {
                continue;
            }
            let peer = Arc::new(DiscoveryPeer::new(record.id, record.endpoint, now));
            if matches!(self.table.try_add(peer.clone()), AddResult::Added) {
                trace!(peer = %record.endpoint, "Added neighbor");
            }
            self.bond_at(&peer, false, now);
        }
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Retry or expire unanswered requests and refresh the table when due.
    pub fn tick(&self) {
        self.tick_at(now_millis());
    }

    /// [`DiscoveryController::tick`] at an explicit time.
    pub fn tick_at(&self, now: u64) {
        let expired: Vec<PeerId> = self
            .interactions
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| *entry.key())
            .collect();

        for id in expired {
            let exhausted = self.interactions.remove_if(&id, |_, interaction| {
                interaction.deadline <= now && interaction.attempts >= self.config.max_bond_attempts
            });
            if let Some((_, interaction)) = exhausted {
                self.give_up(interaction, now);
                continue;
            }
            self.retry(&id, now);
        }

        self.refresh_if_due(now);
    }

    fn retry(&self, id: &PeerId, now: u64) {
        let Some(mut interaction) = self.interactions.get_mut(id) else {
            return;
        };
        if interaction.deadline > now {
            return;
        }
        interaction.attempts += 1;
        interaction.delay = self.config.next_retry_delay(interaction.delay);
        interaction.deadline = now.saturating_add(interaction.delay);
        let peer = interaction.peer.clone();
        debug!(
            peer = %peer.endpoint(),
            attempt = interaction.attempts,
            "Retrying discovery request"
        );

        match &mut interaction.kind {
            InteractionKind::Bond { ping_hash, .. }
            | InteractionKind::EvictionCheck { ping_hash, .. } => {
                if let Some(hash) = self.send_ping(&peer, now) {
                    *ping_hash = hash;
                }
            }
            InteractionKind::FindNeighbors { target } => {
                let target = *target;
                self.send_find_neighbors(&peer, target, now);
            }
        }
    }

    fn give_up(&self, interaction: Interaction, now: u64) {
        let peer = interaction.peer;
        match interaction.kind {
            InteractionKind::Bond { .. } => {
                self.table.evict(peer.id());
                peer.set_status(PeerDiscoveryStatus::Known);
                debug!(peer = %peer.endpoint(), "Bonding failed, dropping peer");
                self.emit(DiscoveryEvent::PeerDropped {
                    peer,
                    timestamp: now,
                });
            }
            InteractionKind::EvictionCheck { replacement, .. } => {
                self.table.evict(peer.id());
                debug!(
                    evicted = %peer.endpoint(),
                    replacement = %replacement.endpoint(),
                    "Eviction candidate silent, replacing"
                );
                self.emit(DiscoveryEvent::PeerDropped {
                    peer,
                    timestamp: now,
                });
                match self.table.try_add(replacement.clone()) {
                    AddResult::Added => self.announce_bonded(&replacement, now),
                    AddResult::AlreadyExisted(_) | AddResult::SelfPeer => {}
                    AddResult::BucketFull(_) => {
                        debug!(replacement = %replacement.endpoint(), "Bucket refilled before replacement");
                    }
                }
            }
            InteractionKind::FindNeighbors { .. } => {
                trace!(peer = %peer.endpoint(), "FIND_NEIGHBORS unanswered");
            }
        }
    }

    fn refresh_if_due(&self, now: u64) {
        let check_interval = duration_millis(self.config.refresh_check_interval);
        let refresh_interval = duration_millis(self.config.table_refresh_interval);
        {
            let mut state = self.refresh.lock();
            if now < state.last_check.saturating_add(check_interval) {
                return;
            }
            state.last_check = now;
            if let Some(last) = state.last_refresh {
                if now < last.saturating_add(refresh_interval) {
                    return;
                }
            }
            state.last_refresh = Some(now);
        }
        self.refresh_table_at(now);
    }

    /// Look up a random target through the nearest bonded peers.
    pub fn refresh_table_at(&self, now: u64) {
        let target = PeerId::random();
        let peers = self
            .table
            .nearest_peers(&target, self.config.neighbors_limit);
        info!(peers = peers.len(), "Refreshing peer table");
        for peer in peers {
            if !self.interactions.contains_key(peer.id()) {
                self.find_neighbors(&peer, target, now);
            }
        }
    }

    fn emit(&self, event: DiscoveryEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!(error = %e, "Dropping discovery event");
        }
    }
}

impl std::fmt::Debug for DiscoveryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryController")
            .field("local", &self.local)
            .field("peers", &self.table.len())
            .field("interactions", &self.interactions.len())
            .finish()
    }
}
