//! # XDAG Net
//!
//! Address book and outbound connection scheduling for XDAG nodes.
//!
//! This crate provides:
//! - [`NetDb`]: ordered address sets with the compact gossip encoding and
//!   the `ip:port` whitelist file format
//! - [`AddressBook`]: the authoritative whitelist plus gossip-fed NetDB
//! - [`NodeManager`]: a bounded, duplicate-free candidate queue drained by a
//!   periodic, backoff-aware dialer
//! - [`DiscoveryBridge`]: queues peers as discovery bonds them
//!
//! Connections themselves belong to the transport. The scheduler talks to it
//! through the [`Dialer`] and [`ChannelManager`] traits.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xdag_net::{ActiveChannels, AddressBook, Dialer, NetConfig, NodeManager, NodeRecord};
//!
//! struct LogDialer;
//!
//! impl Dialer for LogDialer {
//!     fn dial(&self, node: NodeRecord) {
//!         println!("dial {node}");
//!     }
//! }
//!
//! # async fn example() {
//! let config = NetConfig::default();
//! let book = Arc::new(AddressBook::new(config.white_ip_list.clone(), None, None));
//! book.init().await;
//!
//! let local = NodeRecord::from("127.0.0.1:8001".parse::<std::net::SocketAddr>().unwrap());
//! let manager = Arc::new(NodeManager::new(
//!     config,
//!     local,
//!     book,
//!     Arc::new(ActiveChannels::new()),
//!     Arc::new(LogDialer),
//! ));
//! manager.start();
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address_book;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod manager;
pub mod netdb;
pub mod node;

pub use address_book::{AddressBook, HttpWhitelistSource, WhitelistSource};
pub use bridge::DiscoveryBridge;
pub use channel::{ActiveChannels, ChannelManager, Dialer};
pub use config::NetConfig;
pub use error::{NetError, Result};
pub use manager::NodeManager;
pub use netdb::NetDb;
pub use node::NodeRecord;
