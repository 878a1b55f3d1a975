//! Keystore error types for `coffre-keystore`.

use crate::seed::SeedType;
use coffre_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by keystore operations.
///
/// Every failure is local: no operation leaves the registry partially
/// mutated, and no error carries key material.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Malformed caller input (bad length, unknown key spec, bad IV).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A bounded table is full (clients or key slots).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// Unknown ticket or empty slot.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// A tag, MAC, or signature did not verify. Deliberately detail-free.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The requested seed was not provisioned.
    #[error("seed unavailable: {0}")]
    SeedUnavailable(SeedType),

    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(CryptoError),
}

impl From<CryptoError> for KeystoreError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Authentication => Self::AuthenticationFailed,
            other => Self::Crypto(other),
        }
    }
}
