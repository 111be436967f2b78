//! Peer identity and distance metric.
//!
//! A [`PeerId`] is the 37-byte serialized public key a peer signs its
//! packets with: a 4-byte key-type header followed by the 33-byte compressed
//! secp256k1 key. Routing never compares raw ids; it uses the Keccak-256
//! digest of the id, computed once when the id is constructed.

use rand::RngCore;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use xdag_crypto::{COMPRESSED_PUBLIC_KEY_SIZE, CryptoError, PublicKey, keccak256};

/// Key-type header: protobuf `KeyType = Secp256k1`, `Data` of 33 bytes.
pub const PEER_ID_HEADER: [u8; 4] = [0x08, 0x02, 0x12, 0x21];

/// Serialized length of a [`PeerId`].
pub const PEER_ID_SIZE: usize = PEER_ID_HEADER.len() + COMPRESSED_PUBLIC_KEY_SIZE;

/// Number of bits in the distance space.
pub const DISTANCE_BITS: usize = 256;

/// Errors building a [`PeerId`] from untrusted bytes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerIdError {
    /// Wrong number of bytes
    #[error("invalid peer id length: expected {PEER_ID_SIZE}, got {0}")]
    InvalidLength(usize),

    /// Unknown key-type header
    #[error("unsupported key type header {0:02x?}")]
    UnsupportedKeyType([u8; 4]),
}

/// Identity of a discovery peer.
///
/// Equality, hashing and ordering use the raw id bytes. The Keccak-256
/// digest used as the routing coordinate is cached alongside.
#[derive(Clone, Copy)]
pub struct PeerId {
    bytes: [u8; PEER_ID_SIZE],
    keccak: [u8; 32],
}

impl PeerId {
    /// Derive the id of a public key.
    ///
    /// # Examples
    ///
    /// ```
    /// use xdag_crypto::KeyPair;
    /// use xdag_discovery::PeerId;
    ///
    /// let key = KeyPair::generate();
    /// let id = PeerId::from_public_key(&key.public_key());
    /// assert_eq!(id.public_key().unwrap(), key.public_key());
    /// ```
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let mut bytes = [0u8; PEER_ID_SIZE];
        bytes[..4].copy_from_slice(&PEER_ID_HEADER);
        bytes[4..].copy_from_slice(&public_key.to_compressed());
        Self::from_array(bytes)
    }

    /// Parse an id received from the network.
    ///
    /// Only the framing is checked; the key itself is validated lazily by
    /// [`PeerId::public_key`].
    ///
    /// # Errors
    ///
    /// Returns [`PeerIdError`] on a wrong length or an unknown key-type
    /// header.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PeerIdError> {
        let array: [u8; PEER_ID_SIZE] = bytes
            .try_into()
            .map_err(|_| PeerIdError::InvalidLength(bytes.len()))?;
        if array[..4] != PEER_ID_HEADER {
            let mut header = [0u8; 4];
            header.copy_from_slice(&array[..4]);
            return Err(PeerIdError::UnsupportedKeyType(header));
        }
        Ok(Self::from_array(array))
    }

    /// Random id, used as a lookup target when refreshing the table.
    ///
    /// The key part is random bytes and is generally not a valid curve
    /// point.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; PEER_ID_SIZE];
        bytes[..4].copy_from_slice(&PEER_ID_HEADER);
        rand::thread_rng().fill_bytes(&mut bytes[4..]);
        Self::from_array(bytes)
    }

    fn from_array(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self {
            keccak: keccak256(&bytes),
            bytes,
        }
    }

    /// Raw id bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.bytes
    }

    /// Memoized Keccak-256 digest of the id.
    #[must_use]
    pub const fn keccak(&self) -> &[u8; 32] {
        &self.keccak
    }

    /// Public key carried by the id.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the key bytes are not a
    /// valid compressed point.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_sec1_bytes(&self.bytes[4..])
    }

    /// Kademlia log distance to `other`.
    ///
    /// `0` when the digests are equal, otherwise the bit length of their
    /// XOR (1..=256).
    #[must_use]
    pub fn log_distance(&self, other: &PeerId) -> usize {
        log_distance(&self.keccak, &other.keccak)
    }

    /// XOR of the two digests, comparable as a big-endian integer.
    #[must_use]
    pub fn xor_distance(&self, other: &PeerId) -> [u8; 32] {
        xor_distance(&self.keccak, &other.keccak)
    }
}

/// Log distance between two digests.
#[must_use]
pub fn log_distance(a: &[u8; 32], b: &[u8; 32]) -> usize {
    let mut leading = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        let byte = x ^ y;
        if byte == 0 {
            leading += 8;
        } else {
            leading += byte.leading_zeros() as usize;
            break;
        }
    }
    DISTANCE_BITS - leading
}

/// Byte-wise XOR of two digests.
#[must_use]
pub fn xor_distance(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}

impl PartialEq for PeerId {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PeerId {}

impl Hash for PeerId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl PartialOrd for PeerId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PeerId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(&self.bytes[4..12]))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.bytes))
    }
}
