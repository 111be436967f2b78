//! Dialable node records.

use rand::RngCore;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

/// Length of the ephemeral node id.
pub const EPHEMERAL_ID_SIZE: usize = 8;

/// A node the scheduler can dial.
///
/// Two records are the same node when host and port match; the ephemeral
/// id and the sector counters are ignored by `==` and `Hash`.
#[derive(Clone)]
pub struct NodeRecord {
    host: IpAddr,
    port: u16,
    ephemeral_id: [u8; EPHEMERAL_ID_SIZE],
    inbound_sector: u64,
    outbound_sector: u64,
}

impl NodeRecord {
    /// Record for `host:port` with a random ephemeral id.
    #[must_use]
    pub fn new(host: IpAddr, port: u16) -> Self {
        let mut ephemeral_id = [0u8; EPHEMERAL_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut ephemeral_id);
        Self::with_id(host, port, ephemeral_id)
    }

    /// Record with a known ephemeral id.
    #[must_use]
    pub const fn with_id(host: IpAddr, port: u16, ephemeral_id: [u8; EPHEMERAL_ID_SIZE]) -> Self {
        Self {
            host,
            port,
            ephemeral_id,
            inbound_sector: 0,
            outbound_sector: 0,
        }
    }

    /// Host address.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` as a socket address.
    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Ephemeral node id.
    #[must_use]
    pub const fn ephemeral_id(&self) -> &[u8; EPHEMERAL_ID_SIZE] {
        &self.ephemeral_id
    }

    /// Return the inbound sector nonce and advance it.
    pub fn next_inbound_sector(&mut self) -> u64 {
        let sector = self.inbound_sector;
        self.inbound_sector = self.inbound_sector.wrapping_add(1);
        sector
    }

    /// Return the outbound sector nonce and advance it.
    pub fn next_outbound_sector(&mut self) -> u64 {
        let sector = self.outbound_sector;
        self.outbound_sector = self.outbound_sector.wrapping_add(1);
        sector
    }
}

impl From<SocketAddr> for NodeRecord {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl PartialEq for NodeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for NodeRecord {}

impl Hash for NodeRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Debug for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRecord")
            .field("address", &self.address())
            .field("ephemeral_id", &hex::encode(self.ephemeral_id))
            .finish()
    }
}

impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}
