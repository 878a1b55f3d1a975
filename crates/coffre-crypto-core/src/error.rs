//! Cryptographic error types for `coffre-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key material (wrong length, malformed spec, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Authentication tag or MAC verification failed — data tampered or
    /// wrong key. Deliberately detail-free.
    #[error("authentication failed: tag mismatch")]
    Authentication,

    /// Symmetric encryption/decryption internal failure (SIV, CCM, GCM).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Keyed-hash or KDF failure (HMAC-SHA256, X9.63).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// ECDSA signature creation or verification internal failure.
    #[error("signature error: {0}")]
    Signature(String),

    /// Public point rejected (identity, out-of-range coordinate, off-curve).
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Secure memory or CSPRNG failure (mlock, random fill).
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
