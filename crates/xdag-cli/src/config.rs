//! Configuration system for the XDAG node.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use xdag_crypto::KeyPair;
use xdag_discovery::{Bootnode, DiscoveryConfig};
use xdag_net::NetConfig;

/// Node configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Identity and addresses
    #[serde(default)]
    pub node: NodeConfig,
    /// Discovery protocol
    #[serde(default)]
    pub discovery: DiscoverySection,
    /// Address book and connection scheduling
    #[serde(default)]
    pub network: NetworkSection,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity and addresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hex-encoded secp256k1 secret key file
    #[serde(default = "default_private_key_path")]
    pub private_key_file: PathBuf,
    /// UDP discovery listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Address advertised to peers; the listen IP when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertised_ip: Option<String>,
    /// TCP port peers dial for the block exchange
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
}

/// Discovery protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySection {
    /// Bootnodes as `<hex-id>@<ip>:<udp-port>[:<tcp-port>]`
    #[serde(default)]
    pub bootnodes: Vec<String>,
    /// Routing bucket capacity
    #[serde(default = "default_bucket_size")]
    pub bucket_size: usize,
    /// First retry delay for unanswered requests (ms)
    #[serde(default = "default_bond_timeout_ms")]
    pub bond_timeout_ms: u64,
    /// Attempts before a silent peer is dropped
    #[serde(default = "default_max_bond_attempts")]
    pub max_bond_attempts: u32,
    /// Random lookup period (seconds)
    #[serde(default = "default_table_refresh_secs")]
    pub table_refresh_secs: u64,
    /// Peers per NEIGHBORS reply
    #[serde(default = "default_neighbors_limit")]
    pub neighbors_limit: usize,
    /// Lifetime stamped on outgoing packets (seconds)
    #[serde(default = "default_packet_expiration_secs")]
    pub packet_expiration_secs: u64,
}

/// Address book and connection scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    /// Active connection ceiling
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Minimum time between dials of one node (ms)
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Remote whitelist URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist_url: Option<String>,
    /// Local whitelist cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist_file: Option<PathBuf>,
    /// Re-download the whitelist periodically
    #[serde(default)]
    pub refresh_enabled: bool,
    /// Candidate queue capacity
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Statically whitelisted `ip:port` entries
    #[serde(default)]
    pub white_ip_list: Vec<String>,
    /// TCP connect timeout (ms)
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_private_key_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".xdag/node_key")
}

fn default_listen_addr() -> String {
    "0.0.0.0:30303".to_string()
}

fn default_tcp_port() -> u16 {
    8001
}

fn default_bucket_size() -> usize {
    16
}

fn default_bond_timeout_ms() -> u64 {
    2_000
}

fn default_max_bond_attempts() -> u32 {
    3
}

fn default_table_refresh_secs() -> u64 {
    30 * 60
}

fn default_neighbors_limit() -> usize {
    16
}

fn default_packet_expiration_secs() -> u64 {
    60
}

fn default_max_connections() -> usize {
    128
}

fn default_reconnect_backoff_ms() -> u64 {
    60_000
}

fn default_max_queue_size() -> usize {
    1024
}

fn default_dial_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            private_key_file: default_private_key_path(),
            listen_addr: default_listen_addr(),
            advertised_ip: None,
            tcp_port: default_tcp_port(),
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            bootnodes: Vec::new(),
            bucket_size: default_bucket_size(),
            bond_timeout_ms: default_bond_timeout_ms(),
            max_bond_attempts: default_max_bond_attempts(),
            table_refresh_secs: default_table_refresh_secs(),
            neighbors_limit: default_neighbors_limit(),
            packet_expiration_secs: default_packet_expiration_secs(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            whitelist_url: None,
            whitelist_file: None,
            refresh_enabled: false,
            max_queue_size: default_max_queue_size(),
            white_ip_list: Vec::new(),
            dial_timeout_ms: default_dial_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("xdag/config.toml")
    }

    /// Load config from `path`; the default path falls back to defaults
    /// when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed, or a
    /// non-default path is missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() || path != Self::default_path() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse the discovery listen address
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn parse_listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.node.listen_addr.parse()?)
    }

    /// IP advertised to peers
    ///
    /// # Errors
    ///
    /// Returns an error if `advertised_ip` or the listen address is invalid.
    pub fn advertised_ip(&self) -> anyhow::Result<IpAddr> {
        match &self.node.advertised_ip {
            Some(ip) => Ok(ip.parse()?),
            None => Ok(self.parse_listen_addr()?.ip()),
        }
    }

    /// True when peers would be told an unspecified address such as
    /// `0.0.0.0`, in which case the node cannot spot its own public
    /// address in the whitelist.
    ///
    /// # Errors
    ///
    /// Returns an error if `advertised_ip` or the listen address is invalid.
    pub fn advertises_unspecified_ip(&self) -> anyhow::Result<bool> {
        Ok(self.advertised_ip()?.is_unspecified())
    }

    /// Parsed bootnodes
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid entry.
    pub fn bootnodes(&self) -> anyhow::Result<Vec<Bootnode>> {
        self.discovery
            .bootnodes
            .iter()
            .map(|s| {
                s.parse::<Bootnode>()
                    .map_err(|e| anyhow::anyhow!("Invalid bootnode '{s}': {e}"))
            })
            .collect()
    }

    /// Discovery settings
    ///
    /// # Errors
    ///
    /// Returns an error if a bootnode is invalid.
    pub fn discovery_config(&self) -> anyhow::Result<DiscoveryConfig> {
        let d = &self.discovery;
        Ok(DiscoveryConfig {
            bucket_size: d.bucket_size,
            bond_timeout: Duration::from_millis(d.bond_timeout_ms),
            max_bond_attempts: d.max_bond_attempts,
            table_refresh_interval: Duration::from_secs(d.table_refresh_secs),
            neighbors_limit: d.neighbors_limit,
            packet_expiration: Duration::from_secs(d.packet_expiration_secs),
            bootnodes: self.bootnodes()?,
            ..DiscoveryConfig::default()
        })
    }

    /// Scheduler and address book settings
    ///
    /// # Errors
    ///
    /// Returns an error if a whitelist entry is invalid.
    pub fn net_config(&self) -> anyhow::Result<NetConfig> {
        let n = &self.network;
        let white_ip_list = n
            .white_ip_list
            .iter()
            .map(|s| {
                s.parse::<SocketAddr>()
                    .map_err(|_| anyhow::anyhow!("Invalid whitelist entry '{s}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(NetConfig {
            max_connections: n.max_connections,
            reconnect_backoff_ms: n.reconnect_backoff_ms,
            whitelist_url: n.whitelist_url.clone(),
            whitelist_path: n.whitelist_file.clone(),
            refresh_enabled: n.refresh_enabled,
            max_queue_size: n.max_queue_size,
            white_ip_list,
            ..NetConfig::default()
        })
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.parse_listen_addr()?;
        self.advertised_ip()?;

        if self.node.tcp_port == 0 {
            anyhow::bail!("TCP port must not be 0");
        }

        if self.discovery.bucket_size == 0 || self.discovery.bucket_size > 256 {
            anyhow::bail!("Bucket size must be between 1 and 256");
        }

        if self.discovery.max_bond_attempts == 0 {
            anyhow::bail!("Max bond attempts must be at least 1");
        }

        if self.network.max_connections == 0 {
            anyhow::bail!("Max connections must be at least 1");
        }

        if self.network.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be at least 1");
        }

        if self.network.refresh_enabled && self.network.whitelist_url.is_none() {
            anyhow::bail!("Whitelist refresh enabled but no whitelist URL specified");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        self.discovery_config()?;
        self.net_config()?;
        Ok(())
    }
}

/// Read a hex-encoded secret key file
///
/// # Errors
///
/// Returns an error if the file is missing or does not hold a valid key.
pub fn load_key(path: &Path) -> anyhow::Result<KeyPair> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read key file {}: {e}", path.display()))?;
    let bytes = hex::decode(contents.trim())?;
    Ok(KeyPair::from_secret_slice(&bytes)?)
}

/// Write `key` hex-encoded to `path`
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_key(key: &KeyPair, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, hex::encode(*key.secret_bytes()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use xdag_discovery::PeerId;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.node.listen_addr, "0.0.0.0:30303");
        assert_eq!(config.node.tcp_port, 8001);
        assert_eq!(config.discovery.bucket_size, 16);
        assert_eq!(config.network.max_connections, 128);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        config.discovery.bucket_size = 0;
        assert!(config.validate().is_err());

        config.discovery.bucket_size = 16;
        config.network.refresh_enabled = true;
        assert!(config.validate().is_err());

        config.network.whitelist_url = Some("https://example.org/netdb-white.txt".to_string());
        assert!(config.validate().is_ok());

        config.discovery.bootnodes = vec!["not-a-bootnode".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.network.white_ip_list = vec!["10.0.0.1:8001".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.node.listen_addr, config.node.listen_addr);
        assert_eq!(loaded.network.white_ip_list, config.network.white_ip_list);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[network]\nmax_connections = 8\n").unwrap();
        assert_eq!(config.network.max_connections, 8);
        assert_eq!(config.network.max_queue_size, 1024);
        assert_eq!(config.discovery.bucket_size, 16);
    }

    #[test]
    fn test_conversions() {
        let id = PeerId::random();
        let mut config = Config::default();
        config.discovery.bootnodes = vec![format!("{id}@10.0.0.1:30303:8001")];
        config.discovery.bond_timeout_ms = 500;
        config.network.white_ip_list = vec!["10.0.0.2:8001".to_string()];

        let discovery = config.discovery_config().unwrap();
        assert_eq!(discovery.bootnodes.len(), 1);
        assert_eq!(discovery.bootnodes[0].id, id);
        assert_eq!(discovery.bond_timeout, Duration::from_millis(500));

        let net = config.net_config().unwrap();
        assert_eq!(net.white_ip_list, vec!["10.0.0.2:8001".parse().unwrap()]);
        assert_eq!(net.max_connections, 128);
    }

    #[test]
    fn test_unspecified_advertised_ip() {
        let mut config = Config::default();
        assert!(config.advertises_unspecified_ip().unwrap());

        config.node.advertised_ip = Some("203.0.113.7".to_string());
        assert!(!config.advertises_unspecified_ip().unwrap());

        config.node.advertised_ip = None;
        config.node.listen_addr = "192.0.2.1:30303".to_string();
        assert!(!config.advertises_unspecified_ip().unwrap());
    }

    #[test]
    fn test_missing_non_default_path_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_or_default(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_key_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys/node_key");
        let key = KeyPair::generate();
        save_key(&key, &path).unwrap();

        let loaded = load_key(&path).unwrap();
        assert_eq!(loaded.public_key(), key.public_key());
        assert!(load_key(&dir.path().join("absent")).is_err());
    }
}
