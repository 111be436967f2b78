//! # XDAG Crypto
//!
//! Cryptographic primitives used by the XDAG discovery protocol.
//!
//! This crate provides:
//! - Keccak-256 hashing for packet integrity and identity coordinates
//! - secp256k1 key pairs
//! - Recoverable ECDSA signatures (`r || s || v`, 65 bytes)
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Encoding |
//! |----------|-----------|----------|
//! | Hash | Keccak-256 | 32 bytes |
//! | Signatures | ECDSA over secp256k1 | 65 bytes, recoverable |
//! | Public keys | SEC1 compressed | 33 bytes |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod keys;

pub use error::CryptoError;
pub use hash::{Keccak256Hasher, keccak256};
pub use keys::{KeyPair, PublicKey, RecoverableSignature};

/// Keccak-256 output size
pub const KECCAK256_OUTPUT_SIZE: usize = 32;

/// secp256k1 secret key size
pub const SECRET_KEY_SIZE: usize = 32;

/// Compressed SEC1 public key size
pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;

/// Recoverable signature size (`r || s || recovery_id`)
pub const RECOVERABLE_SIGNATURE_SIZE: usize = 65;
