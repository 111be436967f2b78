//! Keccak-256 hashing.
//!
//! Discovery packets are integrity-checked with Keccak-256 (the original
//! Keccak padding, not NIST SHA3-256), and peer identities are placed in the
//! routing table by their Keccak-256 digest.

use sha3::{Digest, Keccak256};

/// Keccak-256 hash output (32 bytes).
pub type HashOutput = [u8; 32];

/// Compute the Keccak-256 hash of input data.
#[must_use]
pub fn keccak256(data: &[u8]) -> HashOutput {
    Keccak256::digest(data).into()
}

/// Incremental Keccak-256 hasher for multi-part input.
#[derive(Clone, Default)]
pub struct Keccak256Hasher {
    inner: Keccak256,
}

impl Keccak256Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Keccak256::new(),
        }
    }

    /// Update with more data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return the hash.
    #[must_use]
    pub fn finalize(self) -> HashOutput {
        self.inner.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        // Well-known Keccak-256 digest of the empty string
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_is_not_sha3() {
        // SHA3-256("") starts with a7ffc6f8; Keccak-256 must differ
        assert!(!hex::encode(keccak256(b"")).starts_with("a7ffc6f8"));
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut hasher = Keccak256Hasher::new();
        hasher.update(b"hello ").update(b"world");
        assert_eq!(hasher.finalize(), keccak256(b"hello world"));
    }

    #[test]
    fn test_different_inputs() {
        assert_ne!(keccak256(b"a"), keccak256(b"b"));
    }
}
