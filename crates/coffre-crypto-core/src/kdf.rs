//! Keyed-hash derivation helpers.
//!
//! This module provides:
//! - [`hmac_sha256`] — the derivation backbone for client keys, migration
//!   keys, and the device identity scalar
//! - [`x963_kdf`] — ANSI X9.63 KDF (iterated SHA-256 with a big-endian
//!   counter), used by ECIES to stretch an ECDH shared value into a key
//!   stream

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use ring::digest::{self, SHA256};
use ring::hmac;

/// HMAC-SHA256 output length in bytes.
pub const HMAC_LEN: usize = 32;

/// SHA-256 digest length in bytes.
const DIGEST_LEN: usize = 32;

/// Compute `SHA-256(data)`. Migration signing hashes ciphertexts before
/// handing them to ECDSA, which only ever sees 32-byte digests.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(digest::digest(&SHA256, data).as_ref());
    out
}

/// Compute `HMAC-SHA256(key, data)`.
///
/// Deterministic by design: the same key and data always re-derive the same
/// output, which is what lets a client re-register after a crash and recover
/// access to its previously wrapped keys.
#[must_use]
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; HMAC_LEN] {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, data);
    let mut out = [0u8; HMAC_LEN];
    out.copy_from_slice(tag.as_ref());
    out
}

/// ANSI X9.63 KDF: `SHA-256(z || counter)` for counter = 1, 2, ... until
/// `out_len` bytes are produced. The counter is 4 bytes, big-endian.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if `out_len` is zero or exceeds the
/// counter space (never reachable for the message sizes the core handles).
pub fn x963_kdf(z: &[u8], out_len: usize) -> Result<SecretBuffer, CryptoError> {
    if out_len == 0 {
        return Err(CryptoError::KeyDerivation("requested zero-length output".into()));
    }
    let blocks = out_len.div_ceil(DIGEST_LEN);
    if blocks > u32::MAX as usize {
        return Err(CryptoError::KeyDerivation("requested output too long".into()));
    }

    let mut stream = Vec::with_capacity(blocks.saturating_mul(DIGEST_LEN));
    for counter in 1..=u32::try_from(blocks).map_err(|_| {
        CryptoError::KeyDerivation("counter overflow".into())
    })? {
        let mut ctx = digest::Context::new(&SHA256);
        ctx.update(z);
        ctx.update(&counter.to_be_bytes());
        stream.extend_from_slice(ctx.finish().as_ref());
    }
    stream.truncate(out_len);
    SecretBuffer::from_vec(stream)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_empty_input_kat() {
        let out = sha256(b"");
        let expected = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn hmac_sha256_rfc4231_case_2() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?".
        let out = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        let expected = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn hmac_is_deterministic_and_key_sensitive() {
        let a = hmac_sha256(b"seed-a", b"client-id");
        let b = hmac_sha256(b"seed-a", b"client-id");
        let c = hmac_sha256(b"seed-b", b"client-id");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn x963_single_block_is_sha256_with_counter_one() {
        let out = x963_kdf(b"shared-z", 32).expect("kdf");
        let mut ctx = digest::Context::new(&SHA256);
        ctx.update(b"shared-z");
        ctx.update(&1u32.to_be_bytes());
        assert_eq!(out.expose(), ctx.finish().as_ref());
    }

    #[test]
    fn x963_increments_counter_across_blocks() {
        let long = x963_kdf(b"shared-z", 80).expect("kdf");
        let first = x963_kdf(b"shared-z", 32).expect("kdf");
        // Block 1 is a strict prefix; block 3 is truncated at 80 bytes.
        assert_eq!(&long.expose()[..32], first.expose());
        let mut ctx = digest::Context::new(&SHA256);
        ctx.update(b"shared-z");
        ctx.update(&2u32.to_be_bytes());
        assert_eq!(&long.expose()[32..64], ctx.finish().as_ref());
        assert_eq!(long.len(), 80);
    }

    #[test]
    fn x963_truncates_mid_block() {
        let out = x963_kdf(b"z", 33).expect("kdf");
        assert_eq!(out.len(), 33);
    }

    #[test]
    fn x963_rejects_zero_length() {
        assert!(matches!(
            x963_kdf(b"z", 0),
            Err(CryptoError::KeyDerivation(_))
        ));
    }
}
