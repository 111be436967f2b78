//! Ordered address sets and their two wire forms.
//!
//! Peers exchange address lists in a compact binary form, six bytes per
//! entry:
//!
//! ```text
//! [0..4)  IPv4 address
//! [4..6)  port, little-endian
//! ```
//!
//! Entries with an all-zero address or port are skipped. Whitelist files use
//! one `ip:port` per line.

use crate::node::NodeRecord;
use indexmap::IndexSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{debug, warn};

/// Size of one compact entry.
pub const COMPACT_ENTRY_SIZE: usize = 6;

/// Insertion-ordered set of socket addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDb {
    addresses: IndexSet<SocketAddr>,
}

impl NetDb {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `addr`; returns `false` if it was already present.
    pub fn add(&mut self, addr: SocketAddr) -> bool {
        self.addresses.insert(addr)
    }

    /// True if `addr` is present.
    #[must_use]
    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.addresses.contains(addr)
    }

    /// Number of addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// True if no addresses are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Addresses in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SocketAddr> {
        self.addresses.iter()
    }

    /// Union `other` into this set; returns how many addresses were new.
    pub fn append(&mut self, other: &NetDb) -> usize {
        let before = self.addresses.len();
        self.addresses.extend(other.addresses.iter().copied());
        self.addresses.len() - before
    }

    /// One [`NodeRecord`] per address.
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeRecord> {
        self.addresses.iter().copied().map(NodeRecord::from).collect()
    }

    /// Parse the compact form. A trailing partial entry is ignored.
    #[must_use]
    pub fn parse_compact(bytes: &[u8]) -> Self {
        let mut db = Self::new();
        for entry in bytes.chunks_exact(COMPACT_ENTRY_SIZE) {
            let ip = [entry[0], entry[1], entry[2], entry[3]];
            let port = u16::from_le_bytes([entry[4], entry[5]]);
            if ip == [0; 4] || port == 0 {
                continue;
            }
            db.add(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), port));
        }
        db
    }

    /// Encode as the compact form. IPv6 addresses have no compact encoding
    /// and are left out.
    #[must_use]
    pub fn to_compact(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.addresses.len() * COMPACT_ENTRY_SIZE);
        for addr in &self.addresses {
            match addr.ip() {
                IpAddr::V4(ip) => {
                    out.extend_from_slice(&ip.octets());
                    out.extend_from_slice(&addr.port().to_le_bytes());
                }
                IpAddr::V6(_) => debug!(%addr, "Skipping IPv6 address in compact encoding"),
            }
        }
        out
    }

    /// Parse `ip:port` lines. Blank lines and `#` comments are ignored;
    /// invalid lines are logged and skipped.
    #[must_use]
    pub fn parse_lines(text: &str) -> Self {
        let mut db = Self::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<SocketAddr>() {
                Ok(addr) if addr.port() != 0 => {
                    db.add(addr);
                }
                _ => warn!(line = number + 1, entry = line, "Skipping invalid whitelist entry"),
            }
        }
        db
    }

    /// Render as `ip:port` lines.
    #[must_use]
    pub fn to_lines(&self) -> String {
        self.addresses
            .iter()
            .map(|addr| format!("{addr}\n"))
            .collect()
    }
}

impl FromIterator<SocketAddr> for NetDb {
    fn from_iter<I: IntoIterator<Item = SocketAddr>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().collect(),
        }
    }
}

impl Extend<SocketAddr> for NetDb {
    fn extend<I: IntoIterator<Item = SocketAddr>>(&mut self, iter: I) {
        self.addresses.extend(iter);
    }
}
