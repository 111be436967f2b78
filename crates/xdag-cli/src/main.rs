//! XDAG node CLI
//!
//! Runs UDP peer discovery and the outbound connection scheduler.

mod config;
mod dialer;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xdag_crypto::KeyPair;
use xdag_discovery::{Endpoint, Packet, PacketData, PeerId, UdpDiscovery};
use xdag_net::{
    ActiveChannels, AddressBook, DiscoveryBridge, HttpWhitelistSource, NodeManager, NodeRecord,
    WhitelistSource,
};

use config::Config;
use dialer::TcpDialer;

/// XDAG node - peer discovery and connection scheduling
#[derive(Parser)]
#[command(name = "xdag-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run discovery and the connection scheduler
    Run {
        /// Discovery listen address, overrides the config file
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Generate a new node key
    Keygen {
        /// Output file for the private key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode and verify a hex-encoded discovery packet
    Decode {
        /// Packet bytes as hex
        #[arg(required = true)]
        packet: String,
    },

    /// Print the node identity
    Identity,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)?;
    config.validate()?;

    // Initialize logging; RUST_LOG wins over the flag and the config
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(&config.logging.level)
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { bind } => {
            run_node(bind, &config).await?;
        }
        Commands::Keygen { output } => {
            generate_key(output, &config)?;
        }
        Commands::Decode { packet } => {
            decode_packet(&packet)?;
        }
        Commands::Identity => {
            show_identity(&config)?;
        }
    }

    Ok(())
}

/// Load the node key, creating one on first start
fn load_or_create_key(config: &Config) -> anyhow::Result<KeyPair> {
    let path = &config.node.private_key_file;
    if path.exists() {
        return config::load_key(path);
    }
    let key = KeyPair::generate();
    config::save_key(&key, path)?;
    info!(path = %path.display(), "Generated new node key");
    Ok(key)
}

/// Run discovery and connection scheduling until Ctrl+C
async fn run_node(bind: Option<String>, config: &Config) -> anyhow::Result<()> {
    let key = load_or_create_key(config)?;
    let listen_addr = match bind {
        Some(bind) => bind.parse()?,
        None => config.parse_listen_addr()?,
    };
    let endpoint = Endpoint::new(config.advertised_ip()?, listen_addr.port(), config.node.tcp_port);
    let discovery_config = config.discovery_config()?;
    let bootnodes = discovery_config.bootnodes.clone();
    let net_config = config.net_config()?;

    info!(
        peer_id = %PeerId::from_public_key(&key.public_key()),
        %listen_addr,
        tcp_port = config.node.tcp_port,
        "Starting XDAG node"
    );

    let (mut discovery, events) =
        UdpDiscovery::bind(listen_addr, key, endpoint, discovery_config).await?;

    let source: Option<Arc<dyn WhitelistSource>> = match &net_config.whitelist_url {
        Some(url) => Some(Arc::new(HttpWhitelistSource::new(
            url.clone(),
            Duration::from_secs(30),
        )?)),
        None => None,
    };
    let address_book = Arc::new(AddressBook::new(
        net_config.white_ip_list.clone(),
        net_config.whitelist_path.clone(),
        source,
    ));
    address_book.init().await;

    let channels = Arc::new(ActiveChannels::new());
    let dialer = Arc::new(TcpDialer::new(
        channels.clone(),
        Duration::from_millis(config.network.dial_timeout_ms),
        tokio::runtime::Handle::current(),
    ));
    if config.advertises_unspecified_ip()? {
        warn!(
            host = %endpoint.host,
            "No advertised_ip configured; a whitelist entry for this node's public address will be dialed"
        );
    }
    let local = NodeRecord::new(endpoint.host, config.node.tcp_port);
    let manager = Arc::new(NodeManager::new(
        net_config,
        local,
        address_book,
        channels,
        dialer,
    ));
    manager.start();

    let bridge = DiscoveryBridge::new(manager.clone(), events).spawn();
    discovery.start(&bootnodes);

    println!("Node running on {}", discovery.local_addr());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    println!();
    info!("Shutting down");
    manager.stop();
    discovery.shutdown();
    bridge.abort();

    let stats = discovery.stats();
    info!(
        peers = discovery.controller().peer_count(),
        packets_sent = stats.packets_sent,
        packets_received = stats.packets_received,
        packets_dropped = stats.packets_dropped,
        "Node stopped"
    );
    Ok(())
}

/// Generate a node key
fn generate_key(output: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let key = KeyPair::generate();
    let path = output.unwrap_or_else(|| config.node.private_key_file.clone());
    if path.exists() {
        anyhow::bail!("Key file {} already exists", path.display());
    }
    config::save_key(&key, &path)?;

    println!("Private key saved to: {}", path.display());
    println!("Peer ID: {}", PeerId::from_public_key(&key.public_key()));
    Ok(())
}

/// Decode and print a packet
fn decode_packet(packet: &str) -> anyhow::Result<()> {
    let bytes = hex::decode(packet.trim().trim_start_matches("0x"))?;
    let packet = Packet::decode(&bytes)?;

    println!("Type:   {:?}", packet.packet_type());
    println!("Hash:   {}", hex::encode(packet.hash()));
    println!("Sender: {}", packet.sender());
    match packet.data() {
        PacketData::Ping(ping) => {
            println!("From:   {}", ping.from);
            println!("To:     {}", ping.to);
            println!("Expiry: {}", ping.expiration);
        }
        PacketData::Pong(pong) => {
            println!("To:        {}", pong.to);
            println!("Ping hash: {}", hex::encode(pong.ping_hash));
            println!("Expiry:    {}", pong.expiration);
        }
        PacketData::FindNeighbors(find) => {
            println!("Target: {}", find.target);
            println!("Expiry: {}", find.expiration);
        }
        PacketData::Neighbors(neighbors) => {
            println!("Expiry: {}", neighbors.expiration);
            println!("Peers:  {}", neighbors.peers.len());
            for peer in &neighbors.peers {
                println!("  {}@{}", peer.id, peer.endpoint);
            }
        }
    }
    Ok(())
}

/// Print the identity of the configured key
fn show_identity(config: &Config) -> anyhow::Result<()> {
    let path = &config.node.private_key_file;
    if !path.exists() {
        warn!(path = %path.display(), "No node key");
        anyhow::bail!("No key at {}; run `xdag-node keygen` first", path.display());
    }
    let key = config::load_key(path)?;
    let id = PeerId::from_public_key(&key.public_key());

    println!("Peer ID:  {id}");
    println!("Key file: {}", path.display());
    println!("Listen:   {}", config.node.listen_addr);
    println!("TCP port: {}", config.node.tcp_port);
    Ok(())
}
