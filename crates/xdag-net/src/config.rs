//! Scheduler and address book configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Node management tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Active connection ceiling; no dial is started at or above it
    pub max_connections: usize,

    /// Minimum time between two dials of the same node (milliseconds)
    pub reconnect_backoff_ms: u64,

    /// Remote whitelist location
    pub whitelist_url: Option<String>,

    /// Local whitelist file, written after every successful download
    pub whitelist_path: Option<PathBuf>,

    /// Re-download the whitelist on every fetch tick
    pub refresh_enabled: bool,

    /// Candidate queue capacity
    pub max_queue_size: usize,

    /// Entries kept in the recent-connect cache
    pub recent_connect_capacity: usize,

    /// Period of the connect tick
    pub connect_interval: Duration,

    /// Delay before the first connect tick
    pub connect_initial_delay: Duration,

    /// Period of the fetch tick
    pub fetch_interval: Duration,

    /// Delay before the first fetch tick
    pub fetch_initial_delay: Duration,

    /// Statically whitelisted addresses
    pub white_ip_list: Vec<SocketAddr>,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            max_connections: 128,
            reconnect_backoff_ms: 60_000,
            whitelist_url: None,
            whitelist_path: None,
            refresh_enabled: false,
            max_queue_size: 1024,
            recent_connect_capacity: 1024,
            connect_interval: Duration::from_millis(500),
            connect_initial_delay: Duration::from_secs(1),
            fetch_interval: Duration::from_secs(100),
            fetch_initial_delay: Duration::from_secs(5),
            white_ip_list: Vec::new(),
        }
    }
}
