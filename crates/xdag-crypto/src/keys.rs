//! secp256k1 key pairs and recoverable ECDSA signatures.
//!
//! Discovery packets carry no explicit public key. The sender signs the
//! Keccak-256 digest of `type || payload` and the receiver recovers the
//! public key from the 65-byte signature:
//!
//! ```text
//! [0..32)  r
//! [32..64) s
//! [64]     recovery id (0..=3)
//! ```
//!
//! ## Usage
//!
//! ```
//! use xdag_crypto::{KeyPair, keccak256};
//!
//! let key = KeyPair::generate();
//! let digest = keccak256(b"payload");
//! let signature = key.sign_prehash(&digest).unwrap();
//!
//! let recovered = signature.recover(&digest).unwrap();
//! assert_eq!(recovered, key.public_key());
//! ```

use crate::{COMPRESSED_PUBLIC_KEY_SIZE, CryptoError, RECOVERABLE_SIGNATURE_SIZE, SECRET_KEY_SIZE};
use k256::ecdsa::{
    RecoveryId, Signature as EcdsaSignature, SigningKey as EcdsaSigningKey,
    VerifyingKey as EcdsaVerifyingKey,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use std::fmt;
use zeroize::Zeroizing;

/// secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    inner: EcdsaVerifyingKey,
}

impl PublicKey {
    /// Parse a SEC1 encoded point (compressed or uncompressed).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the bytes are not a point
    /// on the curve.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            EcdsaVerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { inner })
    }

    /// SEC1 compressed encoding (33 bytes).
    #[must_use]
    pub fn to_compressed(&self) -> [u8; COMPRESSED_PUBLIC_KEY_SIZE] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_compressed()))
    }
}

/// Recoverable ECDSA signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    r: [u8; 32],
    s: [u8; 32],
    recovery_id: u8,
}

impl RecoverableSignature {
    /// Build a signature from its raw components.
    ///
    /// No validation happens here; an out-of-range component surfaces as an
    /// error from [`RecoverableSignature::recover`].
    #[must_use]
    pub const fn from_parts(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    /// Parse the 65-byte `r || s || v` encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignature`] if the slice is not exactly
    /// 65 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != RECOVERABLE_SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignature);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&slice[..32]);
        s.copy_from_slice(&slice[32..64]);
        Ok(Self::from_parts(r, s, slice[64]))
    }

    /// 65-byte `r || s || v` encoding.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RECOVERABLE_SIGNATURE_SIZE] {
        let mut out = [0u8; RECOVERABLE_SIGNATURE_SIZE];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id;
        out
    }

    /// The `r` component.
    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// The `s` component.
    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// The recovery id.
    #[must_use]
    pub const fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    /// Recover the signer's public key from a 32-byte message digest.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidRecoveryId`] if `v` is not in `0..=3`
    /// - [`CryptoError::InvalidSignature`] if `r` or `s` is zero or out of range
    /// - [`CryptoError::RecoveryFailed`] if no curve point matches
    pub fn recover(&self, prehash: &[u8; 32]) -> Result<PublicKey, CryptoError> {
        let recovery_id = RecoveryId::from_byte(self.recovery_id)
            .ok_or(CryptoError::InvalidRecoveryId(self.recovery_id))?;

        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.r);
        rs[32..].copy_from_slice(&self.s);
        let signature = EcdsaSignature::from_slice(&rs).map_err(|_| CryptoError::InvalidSignature)?;

        let inner = EcdsaVerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)
            .map_err(|_| CryptoError::RecoveryFailed)?;
        Ok(PublicKey { inner })
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverableSignature")
            .field("r", &hex::encode(self.r))
            .field("s", &hex::encode(self.s))
            .field("v", &self.recovery_id)
            .finish()
    }
}

/// secp256k1 signing key pair.
///
/// The secret scalar is zeroized on drop by `k256`.
#[derive(Clone)]
pub struct KeyPair {
    secret: EcdsaSigningKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(EcdsaSigningKey::random(&mut OsRng))
    }

    /// Load a key pair from a 32-byte secret scalar.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSecretKey`] if the scalar is zero or not
    /// below the curve order.
    pub fn from_secret_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Result<Self, CryptoError> {
        let secret =
            EcdsaSigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self::from_signing_key(secret))
    }

    /// Load a key pair from a slice, checking its length first.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] or
    /// [`CryptoError::InvalidSecretKey`].
    pub fn from_secret_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SECRET_KEY_SIZE] =
            slice.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE,
                actual: slice.len(),
            })?;
        let bytes = Zeroizing::new(bytes);
        Self::from_secret_bytes(&bytes)
    }

    fn from_signing_key(secret: EcdsaSigningKey) -> Self {
        let public = PublicKey {
            inner: *secret.verifying_key(),
        };
        Self { secret, public }
    }

    /// The public half of this key pair.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Export the secret scalar (handle with care).
    #[must_use]
    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        let mut out = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Sign a 32-byte digest, producing a recoverable signature.
    ///
    /// Signing is deterministic (RFC 6979) and always yields a low-`s`
    /// signature.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SigningFailed`] if the underlying signer rejects
    /// the digest.
    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<RecoverableSignature, CryptoError> {
        let (signature, recovery_id) = self
            .secret
            .sign_prehash_recoverable(prehash)
            .map_err(|_| CryptoError::SigningFailed)?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(RecoverableSignature::from_parts(r, s, recovery_id.to_byte()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
