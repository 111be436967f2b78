//! Packet decoding errors.

use crate::identity::PeerIdError;
use crate::rlp::RlpError;
use thiserror::Error;
use xdag_crypto::CryptoError;

/// Reasons a datagram is rejected by [`Packet::decode`](super::Packet::decode).
///
/// Every variant means the same thing to the caller: drop the datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Shorter than the fixed header
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    /// Larger than the configured maximum datagram size
    #[error("packet too large: {size} bytes (max {max})")]
    TooLarge {
        /// Received size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Stored hash does not match the packet contents
    #[error("packet hash mismatch")]
    Integrity,

    /// No public key can be recovered from the signature
    #[error("signature recovery failed: {0}")]
    Auth(CryptoError),

    /// No payload decoder is registered for this type code
    #[error("unknown packet type 0x{0:02x}")]
    UnknownType(u8),

    /// Payload violates its RLP shape or field constraints
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<RlpError> for DecodeError {
    fn from(err: RlpError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<PeerIdError> for DecodeError {
    fn from(err: PeerIdError) -> Self {
        Self::Malformed(err.to_string())
    }
}
