//! Tokio UDP driver for the discovery controller.

use crate::config::{Bootnode, DiscoveryConfig};
use crate::controller::{DiscoveryController, DiscoveryEvent, PacketSink};
use crate::endpoint::Endpoint;
use crate::error::{DiscoveryError, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use xdag_crypto::KeyPair;

/// Socket counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UdpStats {
    /// Datagrams sent
    pub packets_sent: u64,
    /// Datagrams received
    pub packets_received: u64,
    /// Datagrams dropped by the controller
    pub packets_dropped: u64,
    /// Failed sends (full buffer or socket error)
    pub send_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_dropped: AtomicU64,
    send_errors: AtomicU64,
}

/// [`PacketSink`] writing to a shared tokio socket without awaiting.
#[derive(Debug, Clone)]
pub struct UdpSink {
    socket: Arc<UdpSocket>,
    counters: Arc<Counters>,
}

impl PacketSink for UdpSink {
    fn send(&self, to: SocketAddr, datagram: &[u8]) -> io::Result<()> {
        match self.socket.try_send_to(datagram, to) {
            Ok(_) => {
                self.counters.packets_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

/// Discovery bound to a UDP socket.
///
/// # Examples
///
/// ```no_run
/// use xdag_discovery::{DiscoveryConfig, Endpoint, UdpDiscovery};
/// use xdag_crypto::KeyPair;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let addr = "0.0.0.0:30303".parse()?;
/// let endpoint = Endpoint::new("203.0.113.7".parse()?, 30303, 30304);
/// let (mut discovery, mut events) =
///     UdpDiscovery::bind(addr, KeyPair::generate(), endpoint, DiscoveryConfig::default()).await?;
/// discovery.start(&[]);
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct UdpDiscovery {
    controller: Arc<DiscoveryController>,
    local_addr: SocketAddr,
    counters: Arc<Counters>,
    recv_task: JoinHandle<()>,
    tick_task: Option<JoinHandle<()>>,
}

impl UdpDiscovery {
    /// Bind `addr` and start receiving.
    ///
    /// `endpoint` is what the node advertises in its PINGs. When its UDP
    /// port is `0` the bound port is used.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Io`] if the socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        key: KeyPair,
        endpoint: Endpoint,
        config: DiscoveryConfig,
    ) -> Result<(Self, mpsc::Receiver<DiscoveryEvent>)> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let local_addr = socket.local_addr()?;
        let endpoint = if endpoint.udp_port == 0 {
            Endpoint::new(endpoint.host, local_addr.port(), endpoint.tcp_port)
        } else {
            endpoint
        };

        let counters = Arc::new(Counters::default());
        let sink = UdpSink {
            socket: socket.clone(),
            counters: counters.clone(),
        };
        let max_packet_size = config.max_packet_size;
        let (controller, events) = DiscoveryController::new(key, endpoint, config, Arc::new(sink));
        let controller = Arc::new(controller);

        info!(%local_addr, %endpoint, "Discovery socket bound");
        let recv_task = tokio::spawn(recv_loop(
            socket,
            controller.clone(),
            counters.clone(),
            max_packet_size,
        ));

        Ok((
            Self {
                controller,
                local_addr,
                counters,
                recv_task,
                tick_task: None,
            },
            events,
        ))
    }

    /// Bond with `bootnodes` and start the maintenance ticker.
    pub fn start(&mut self, bootnodes: &[Bootnode]) {
        self.controller.start(bootnodes);
        if self.tick_task.is_none() {
            let controller = self.controller.clone();
            let period = controller.config().tick_interval;
            self.tick_task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    controller.tick();
                }
            }));
        }
    }

    /// The controller driven by this socket.
    #[must_use]
    pub fn controller(&self) -> &Arc<DiscoveryController> {
        &self.controller
    }

    /// Bound socket address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Snapshot of the socket counters.
    #[must_use]
    pub fn stats(&self) -> UdpStats {
        UdpStats {
            packets_sent: self.counters.packets_sent.load(Ordering::Relaxed),
            packets_received: self.counters.packets_received.load(Ordering::Relaxed),
            packets_dropped: self.counters.packets_dropped.load(Ordering::Relaxed),
            send_errors: self.counters.send_errors.load(Ordering::Relaxed),
        }
    }

    /// Stop the receive loop and the ticker.
    pub fn shutdown(&mut self) {
        self.recv_task.abort();
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
        info!(local_addr = %self.local_addr, "Discovery stopped");
    }
}

impl Drop for UdpDiscovery {
    fn drop(&mut self) {
        self.recv_task.abort();
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
    }
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    controller: Arc<DiscoveryController>,
    counters: Arc<Counters>,
    max_packet_size: usize,
) {
    // One spare byte so oversized datagrams are seen as such
    let mut buf = vec![0u8; max_packet_size + 1];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            // ICMP port unreachable surfaces here on some platforms
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
            Err(e) => {
                error!(error = %e, "Discovery socket receive failed");
                return;
            }
        };
        counters.packets_received.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = controller.handle_datagram(&buf[..len], from) {
            counters.packets_dropped.fetch_add(1, Ordering::Relaxed);
            match &e {
                DiscoveryError::Decode(_) | DiscoveryError::Expired { .. } => {
                    debug!(%from, error = %e, "Dropped discovery packet");
                }
                _ => debug!(%from, error = %e, "Discovery packet rejected"),
            }
        }
    }
}
