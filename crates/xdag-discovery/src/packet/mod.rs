//! Signed discovery packets.
//!
//! Every datagram has a fixed layout:
//!
//! ```text
//! [0:32)   hash         Keccak256(signature || type || payload)
//! [32:64)  signature.r
//! [64:96)  signature.s
//! [96]     signature.recovery_id
//! [97]     type
//! [98..)   RLP payload
//! ```
//!
//! The signature covers `Keccak256(type || payload)`; the signer's public
//! key is recovered from it, so packets do not carry the sender id.
//!
//! # Example
//!
//! ```
//! use xdag_crypto::KeyPair;
//! use xdag_discovery::packet::{FindNeighbors, Packet};
//! use xdag_discovery::PeerId;
//!
//! let key = KeyPair::generate();
//! let find = FindNeighbors { target: PeerId::random(), expiration: 0 };
//! let packet = Packet::create(find, &key).unwrap();
//!
//! let decoded = Packet::decode(packet.as_bytes()).unwrap();
//! assert_eq!(decoded.sender(), &PeerId::from_public_key(&key.public_key()));
//! ```

mod data;
mod error;
mod types;

pub use data::{FindNeighbors, NeighborRecord, Neighbors, PING_VERSION, PacketData, Ping, Pong};
pub use error::DecodeError;
pub use types::{PacketType, PayloadDecoder};

use crate::identity::PeerId;
use xdag_crypto::{
    CryptoError, Keccak256Hasher, KeyPair, RECOVERABLE_SIGNATURE_SIZE, RecoverableSignature,
};

/// Offset of the packet hash.
pub const HASH_OFFSET: usize = 0;
/// Offset of the 65-byte signature.
pub const SIGNATURE_OFFSET: usize = 32;
/// Offset of the type byte.
pub const TYPE_OFFSET: usize = SIGNATURE_OFFSET + RECOVERABLE_SIGNATURE_SIZE;
/// Offset of the RLP payload.
pub const PAYLOAD_OFFSET: usize = TYPE_OFFSET + 1;

/// A created or decoded discovery packet.
///
/// Immutable once built; the encoded bytes are kept alongside the decoded
/// fields so a packet can be sent or re-inspected without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    hash: [u8; 32],
    signature: RecoverableSignature,
    data: PacketData,
    sender: PeerId,
    bytes: Vec<u8>,
}

impl Packet {
    /// Sign and assemble a packet.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if signing fails.
    pub fn create(data: impl Into<PacketData>, key: &KeyPair) -> Result<Self, CryptoError> {
        let data = data.into();
        let type_code = data.packet_type().code();
        let payload = data.encode();

        let mut hasher = Keccak256Hasher::new();
        hasher.update(&[type_code]).update(&payload);
        let signed_hash = hasher.finalize();
        let signature = key.sign_prehash(&signed_hash)?;
        let signature_bytes = signature.to_bytes();

        let mut hasher = Keccak256Hasher::new();
        hasher
            .update(&signature_bytes)
            .update(&[type_code])
            .update(&payload);
        let hash = hasher.finalize();

        let mut bytes = Vec::with_capacity(PAYLOAD_OFFSET + payload.len());
        bytes.extend_from_slice(&hash);
        bytes.extend_from_slice(&signature_bytes);
        bytes.push(type_code);
        bytes.extend_from_slice(&payload);

        Ok(Self {
            hash,
            signature,
            data,
            sender: PeerId::from_public_key(&key.public_key()),
            bytes,
        })
    }

    /// Parse and authenticate a datagram.
    ///
    /// Checks run in a fixed order: length, hash, signature recovery, type
    /// lookup, payload decoding. The first failure is returned. No state is
    /// shared between calls.
    ///
    /// # Errors
    ///
    /// Returns the [`DecodeError`] of the first failed check.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < PAYLOAD_OFFSET {
            return Err(DecodeError::TooShort(bytes.len()));
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[HASH_OFFSET..SIGNATURE_OFFSET]);
        let computed = xdag_crypto::keccak256(&bytes[SIGNATURE_OFFSET..]);
        if computed != hash {
            return Err(DecodeError::Integrity);
        }

        let signature = RecoverableSignature::from_slice(&bytes[SIGNATURE_OFFSET..TYPE_OFFSET])
            .map_err(DecodeError::Auth)?;
        let signed_hash = xdag_crypto::keccak256(&bytes[TYPE_OFFSET..]);
        let public_key = signature
            .recover(&signed_hash)
            .map_err(DecodeError::Auth)?;

        let type_code = bytes[TYPE_OFFSET];
        let (_, decoder) = types::lookup(type_code).ok_or(DecodeError::UnknownType(type_code))?;
        let data = decoder(&bytes[PAYLOAD_OFFSET..])?;

        Ok(Self {
            hash,
            signature,
            data,
            sender: PeerId::from_public_key(&public_key),
            bytes: bytes.to_vec(),
        })
    }

    /// Packet hash (bytes `[0:32)`); PONG echoes it for PING.
    #[must_use]
    pub const fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Signature over `Keccak256(type || payload)`.
    #[must_use]
    pub const fn signature(&self) -> &RecoverableSignature {
        &self.signature
    }

    /// Packet type.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.data.packet_type()
    }

    /// Decoded payload.
    #[must_use]
    pub const fn data(&self) -> &PacketData {
        &self.data
    }

    /// Consume the packet, keeping only its payload.
    #[must_use]
    pub fn into_data(self) -> PacketData {
        self.data
    }

    /// Identity of the signer.
    #[must_use]
    pub const fn sender(&self) -> &PeerId {
        &self.sender
    }

    /// Raw RLP payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[PAYLOAD_OFFSET..]
    }

    /// Encoded datagram.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the packet, returning the encoded datagram.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
