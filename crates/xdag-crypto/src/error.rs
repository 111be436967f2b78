//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Secret key bytes are not a valid secp256k1 scalar
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// Public key bytes are not a valid SEC1 point
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Signature components are out of range
    #[error("invalid signature encoding")]
    InvalidSignature,

    /// Recovery id byte is not in `0..=3`
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// No public key can be recovered from the signature
    #[error("public key recovery failed")]
    RecoveryFailed,

    /// Signing failed
    #[error("signing failed")]
    SigningFailed,

    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}
