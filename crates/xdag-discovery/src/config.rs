//! Discovery configuration.

use crate::endpoint::Endpoint;
use crate::identity::PeerId;
use crate::routing::DEFAULT_BUCKET_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Largest datagram accepted by the discovery socket.
pub const MAX_PACKET_SIZE: usize = 1600;

/// Discovery tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Capacity of each routing bucket
    pub bucket_size: usize,

    /// Datagrams above this size are dropped before decoding
    pub max_packet_size: usize,

    /// Delay before the first retry of an unanswered request
    pub bond_timeout: Duration,

    /// Growth factor applied to the retry delay after each attempt
    pub retry_multiplier: f64,

    /// Upper bound for the retry delay
    pub max_retry_delay: Duration,

    /// Attempts before a silent peer is dropped
    pub max_bond_attempts: u32,

    /// How often the table is refreshed with a random lookup
    pub table_refresh_interval: Duration,

    /// How often the refresh deadline is checked
    pub refresh_check_interval: Duration,

    /// Period of the maintenance tick (retries, refresh check)
    pub tick_interval: Duration,

    /// Peers returned in one NEIGHBORS reply
    pub neighbors_limit: usize,

    /// Lifetime stamped into outgoing packets
    pub packet_expiration: Duration,

    /// Capacity of the discovery event channel
    pub event_channel_capacity: usize,

    /// Capacity of the rolling blacklist
    pub blacklist_capacity: usize,

    /// Peers bonded with at startup
    pub bootnodes: Vec<Bootnode>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
            max_packet_size: MAX_PACKET_SIZE,
            bond_timeout: Duration::from_secs(2),
            retry_multiplier: 1.5,
            max_retry_delay: Duration::from_secs(60),
            max_bond_attempts: 3,
            table_refresh_interval: Duration::from_secs(30 * 60),
            refresh_check_interval: Duration::from_secs(30),
            tick_interval: Duration::from_millis(500),
            neighbors_limit: 16,
            packet_expiration: Duration::from_secs(60),
            event_channel_capacity: 1024,
            blacklist_capacity: 500,
            bootnodes: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Next retry delay after `previous` (milliseconds).
    #[must_use]
    pub fn next_retry_delay(&self, previous: u64) -> u64 {
        let max = duration_millis(self.max_retry_delay);
        if previous == 0 {
            return duration_millis(self.bond_timeout).min(max);
        }
        let next = (previous as f64 * self.retry_multiplier) as u64;
        next.max(previous).min(max)
    }
}

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Errors parsing a [`Bootnode`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BootnodeParseError {
    /// Missing `@` separator
    #[error("expected <hex-id>@<ip>:<udp-port>[:<tcp-port>]")]
    MissingSeparator,

    /// Id is not valid hex or not a valid peer id
    #[error("invalid peer id: {0}")]
    InvalidId(String),

    /// Address part does not parse
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// A statically configured peer: `<hex-id>@<ip>:<udp-port>[:<tcp-port>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bootnode {
    /// Peer identity
    pub id: PeerId,
    /// Peer endpoint
    pub endpoint: Endpoint,
}

impl FromStr for Bootnode {
    type Err = BootnodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id_hex, addr) = s
            .trim()
            .split_once('@')
            .ok_or(BootnodeParseError::MissingSeparator)?;

        let id_bytes =
            hex::decode(id_hex).map_err(|e| BootnodeParseError::InvalidId(e.to_string()))?;
        let id =
            PeerId::from_slice(&id_bytes).map_err(|e| BootnodeParseError::InvalidId(e.to_string()))?;

        let endpoint = if let Ok(udp) = addr.parse::<SocketAddr>() {
            Endpoint::new(udp.ip(), udp.port(), 0)
        } else {
            let (udp, tcp) = addr
                .rsplit_once(':')
                .ok_or_else(|| BootnodeParseError::InvalidAddress(addr.to_string()))?;
            let udp: SocketAddr = udp
                .parse()
                .map_err(|_| BootnodeParseError::InvalidAddress(addr.to_string()))?;
            let tcp: u16 = tcp
                .parse()
                .map_err(|_| BootnodeParseError::InvalidAddress(addr.to_string()))?;
            Endpoint::new(udp.ip(), udp.port(), tcp)
        };
        if endpoint.udp_port == 0 {
            return Err(BootnodeParseError::InvalidAddress(addr.to_string()));
        }

        Ok(Self { id, endpoint })
    }
}

impl TryFrom<String> for Bootnode {
    type Error = BootnodeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bootnode> for String {
    fn from(node: Bootnode) -> Self {
        node.to_string()
    }
}

impl fmt::Display for Bootnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.endpoint.udp_addr())?;
        if self.endpoint.tcp_port != 0 {
            write!(f, ":{}", self.endpoint.tcp_port)?;
        }
        Ok(())
    }
}
