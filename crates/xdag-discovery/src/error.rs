//! Controller-level errors.

use crate::identity::PeerId;
use crate::packet::DecodeError;
use thiserror::Error;
use xdag_crypto::CryptoError;

/// Errors raised while handling or sending discovery packets
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Datagram failed to decode
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Packet expiration is in the past
    #[error("packet expired at {expiration} (now {now})")]
    Expired {
        /// Expiration carried by the packet (ms epoch)
        expiration: u64,
        /// Local time (ms epoch)
        now: u64,
    },

    /// Sender is blacklisted
    #[error("peer {0:?} is blacklisted")]
    Blacklisted(PeerId),

    /// Signing an outgoing packet failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Outgoing datagram could not be handed to the socket
    #[error("send failed: {0}")]
    Send(String),
}

/// Result alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;
