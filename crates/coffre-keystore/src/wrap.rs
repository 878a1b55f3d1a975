//! Application-key wrapping.
//!
//! A wrapped key is `SIV(client_key, spec_byte || raw_key)` — deterministic,
//! so wrapping the same key twice yields the same bytes and the caller can
//! deduplicate. The spec byte travels inside the authenticated envelope,
//! which is what lets `unwrap` reject a 16-byte key smuggled in under a
//! 32-byte spec (and vice versa) as tampering rather than trusting the
//! caller.
//!
//! Wire layout: `siv_tag(16) || enc(spec_byte || raw_key)`, total
//! `key_len + 17`.

use crate::error::KeystoreError;
use coffre_crypto_core::memory::SecretBuffer;
use coffre_crypto_core::{siv, SecretBytes};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Symmetric key specification carried inside every wrapped key.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum KeySpec {
    /// 128-bit AES key.
    Aes128,
    /// 256-bit AES key.
    Aes256,
}

/// SIV tag plus the in-envelope spec byte.
pub const WRAP_OVERHEAD: usize = siv::BLOCK_SIZE + 1;

impl KeySpec {
    /// Raw key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// Wire encoding of the spec.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Aes128 => 0x01,
            Self::Aes256 => 0x02,
        }
    }

    /// Decode a spec byte.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`] for an unknown value.
    pub fn from_byte(byte: u8) -> Result<Self, KeystoreError> {
        match byte {
            0x01 => Ok(Self::Aes128),
            0x02 => Ok(Self::Aes256),
            other => Err(KeystoreError::InvalidArgument(format!(
                "unknown key spec byte: {other:#04x}"
            ))),
        }
    }
}

/// Wrapped size for a key of spec `spec`: `key_len + 17`.
#[must_use]
pub const fn wrapped_key_size(spec: KeySpec) -> usize {
    spec.key_len().saturating_add(WRAP_OVERHEAD)
}

/// Raw key size recoverable from a wrapped blob of `wrapped_len` bytes —
/// the buffer-allocation oracle for callers that size before unwrapping.
///
/// # Errors
///
/// Returns [`KeystoreError::InvalidArgument`] if `wrapped_len` is below the
/// smallest possible wrapped key.
pub fn unwrapped_key_size(wrapped_len: usize) -> Result<usize, KeystoreError> {
    let min = wrapped_key_size(KeySpec::Aes128);
    if wrapped_len < min {
        return Err(KeystoreError::InvalidArgument(format!(
            "wrapped key too short: {wrapped_len} bytes (minimum {min})"
        )));
    }
    Ok(wrapped_len.saturating_sub(WRAP_OVERHEAD))
}

/// Wrap `app_key` under `client_key`.
///
/// # Errors
///
/// Returns [`KeystoreError::InvalidArgument`] if `app_key` does not match
/// the spec length.
pub fn wrap_app_key(
    client_key: &SecretBytes<32>,
    spec: KeySpec,
    app_key: &[u8],
) -> Result<Vec<u8>, KeystoreError> {
    if app_key.len() != spec.key_len() {
        return Err(KeystoreError::InvalidArgument(format!(
            "key length {} does not match spec ({} expected)",
            app_key.len(),
            spec.key_len()
        )));
    }
    let mut envelope = Zeroizing::new(Vec::with_capacity(app_key.len().saturating_add(1)));
    envelope.push(spec.to_byte());
    envelope.extend_from_slice(app_key);
    Ok(siv::encrypt(client_key.expose(), &envelope, None)?)
}

/// Unwrap a wrapped key under `client_key`, returning the spec and the raw
/// key bytes.
///
/// # Errors
///
/// Returns [`KeystoreError::AuthenticationFailed`] on any tamper (including
/// a spec byte inconsistent with the envelope length) and
/// [`KeystoreError::InvalidArgument`] for impossible sizes.
pub fn unwrap_app_key(
    client_key: &SecretBytes<32>,
    wrapped: &[u8],
) -> Result<(KeySpec, SecretBuffer), KeystoreError> {
    unwrapped_key_size(wrapped.len())?;
    let envelope = siv::decrypt(client_key.expose(), wrapped, None)?;
    let body = envelope.expose();
    let spec = KeySpec::from_byte(body[0])?;
    if body.len() != spec.key_len().saturating_add(1) {
        // Authenticated but internally inconsistent — treat as tampering.
        return Err(KeystoreError::AuthenticationFailed);
    }
    Ok((spec, SecretBuffer::new(&body[1..])?))
}
