//! AES-SIV deterministic authenticated encryption (RFC 5297).
//!
//! This module provides:
//! - [`encrypt`] — compute the S2V tag over `[ad?, plaintext]` and produce
//!   `V || AES-CTR(K2, Q, plaintext)`
//! - [`decrypt`] — CTR-decrypt, recompute S2V, and compare tags in constant
//!   time before releasing plaintext
//!
//! SIV is used exclusively for key wrapping: it is deterministic (no nonce to
//! manage or misuse) and any bit flip in the wrapped blob fails
//! authentication. The input key is split into two halves — K1 drives the
//! CMAC-based S2V construction, K2 drives CTR encryption — so accepted key
//! sizes are 32, 48 and 64 bytes (AES-128/192/256 halves).

use crate::error::CryptoError;
use crate::memory::{ct_eq, SecretBuffer};
use aes::cipher::consts::U16;
use aes::cipher::{BlockCipher, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use cmac::{Cmac, Mac};
use ctr::Ctr128BE;
use zeroize::Zeroize;

/// AES block size in bytes — also the SIV tag size.
pub const BLOCK_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Block-level helpers (RFC 5297 §2.3/§2.4)
// ---------------------------------------------------------------------------

/// Doubling in GF(2^128): big-endian left shift by one bit, XOR `0x87` into
/// the final byte if a 1-bit fell off the top.
fn dbl(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    let mut carry = 0u8;
    for (dst, &src) in out.iter_mut().rev().zip(block.iter().rev()) {
        *dst = (src << 1) | carry;
        carry = src >> 7;
    }
    if carry == 1 {
        out[BLOCK_SIZE - 1] ^= 0x87;
    }
    out
}

/// 10* padding: append a single 1-bit, zero-fill to the block size.
fn pad(data: &[u8]) -> [u8; BLOCK_SIZE] {
    debug_assert!(data.len() < BLOCK_SIZE);
    let mut out = [0u8; BLOCK_SIZE];
    out[..data.len()].copy_from_slice(data);
    out[data.len()] = 0x80;
    out
}

/// XOR `tail` into the right-aligned end of `data`, leaving the left part
/// untouched.
fn xorend(data: &[u8], tail: &[u8; BLOCK_SIZE]) -> Vec<u8> {
    debug_assert!(data.len() >= BLOCK_SIZE);
    let mut out = data.to_vec();
    let split = out.len().saturating_sub(BLOCK_SIZE);
    for (dst, src) in out[split..].iter_mut().zip(tail.iter()) {
        *dst ^= src;
    }
    out
}

fn xor_blocks(a: &[u8; BLOCK_SIZE], b: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for ((dst, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *dst = x ^ y;
    }
    out
}

// ---------------------------------------------------------------------------
// Generic core, instantiated per AES width
// ---------------------------------------------------------------------------

fn cmac_block<C>(key: &[u8], data: &[u8]) -> Result<[u8; BLOCK_SIZE], CryptoError>
where
    C: BlockCipher<BlockSize = U16> + BlockEncrypt + KeyInit + Clone,
{
    let mut mac = <Cmac<C> as Mac>::new_from_slice(key)
        .map_err(|_| CryptoError::Encryption("CMAC key setup failed".into()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// S2V (RFC 5297 §2.4): a chained-CMAC tag over an ordered string vector.
///
/// The vector here is `[associated_data?, plaintext]` — SIV key wrapping
/// never needs more components.
fn s2v<C>(k1: &[u8], ad: Option<&[u8]>, plaintext: &[u8]) -> Result<[u8; BLOCK_SIZE], CryptoError>
where
    C: BlockCipher<BlockSize = U16> + BlockEncrypt + KeyInit + Clone,
{
    let mut d = cmac_block::<C>(k1, &[0u8; BLOCK_SIZE])?;

    if let Some(ad) = ad {
        let mac = cmac_block::<C>(k1, ad)?;
        d = xor_blocks(&dbl(&d), &mac);
    }

    let t: Vec<u8> = if plaintext.len() >= BLOCK_SIZE {
        xorend(plaintext, &d)
    } else {
        xor_blocks(&dbl(&d), &pad(plaintext)).to_vec()
    };

    let tag = cmac_block::<C>(k1, &t)?;
    // t holds plaintext-derived bytes when len >= block size.
    let mut t = t;
    t.zeroize();
    Ok(tag)
}

/// The CTR initial counter Q: the tag V with the top bit of bytes 8 and 12
/// cleared (bits 63 and 31 counting from the LSB), per RFC 5297 §2.6.
fn ctr_iv(v: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut q = *v;
    q[8] &= 0x7f;
    q[12] &= 0x7f;
    q
}

fn encrypt_impl<C>(
    k1: &[u8],
    k2: &[u8],
    plaintext: &[u8],
    ad: Option<&[u8]>,
) -> Result<Vec<u8>, CryptoError>
where
    C: BlockCipher<BlockSize = U16> + BlockEncrypt + KeyInit + Clone,
    Ctr128BE<C>: KeyIvInit + StreamCipher,
{
    let v = s2v::<C>(k1, ad, plaintext)?;
    let q = ctr_iv(&v);

    let mut body = plaintext.to_vec();
    let mut ctr = <Ctr128BE<C> as KeyIvInit>::new_from_slices(k2, &q)
        .map_err(|_| CryptoError::Encryption("CTR setup failed".into()))?;
    ctr.apply_keystream(&mut body);

    let mut out = Vec::with_capacity(BLOCK_SIZE.saturating_add(body.len()));
    out.extend_from_slice(&v);
    out.extend_from_slice(&body);
    body.zeroize();
    Ok(out)
}

fn decrypt_impl<C>(
    k1: &[u8],
    k2: &[u8],
    ciphertext: &[u8],
    ad: Option<&[u8]>,
) -> Result<SecretBuffer, CryptoError>
where
    C: BlockCipher<BlockSize = U16> + BlockEncrypt + KeyInit + Clone,
    Ctr128BE<C>: KeyIvInit + StreamCipher,
{
    if ciphertext.len() < BLOCK_SIZE {
        return Err(CryptoError::Encryption(format!(
            "SIV ciphertext too short: {} bytes (minimum {BLOCK_SIZE})",
            ciphertext.len()
        )));
    }

    let mut v = [0u8; BLOCK_SIZE];
    v.copy_from_slice(&ciphertext[..BLOCK_SIZE]);
    let q = ctr_iv(&v);

    let mut body = ciphertext[BLOCK_SIZE..].to_vec();
    let mut ctr = <Ctr128BE<C> as KeyIvInit>::new_from_slices(k2, &q)
        .map_err(|_| CryptoError::Encryption("CTR setup failed".into()))?;
    ctr.apply_keystream(&mut body);

    let expected = s2v::<C>(k1, ad, &body)?;
    if !ct_eq(&expected, &v) {
        body.zeroize();
        return Err(CryptoError::Authentication);
    }

    SecretBuffer::from_vec(body)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn split_key(key: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    match key.len() {
        32 | 48 | 64 => Ok(key.split_at(key.len() / 2)),
        n => Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid SIV key length: {n} bytes (expected 32, 48 or 64)"
        ))),
    }
}

/// SIV-encrypt `plaintext` under `key`, optionally authenticating `ad`.
///
/// Output layout: `V (16 bytes) || ciphertext (plaintext length)`. The same
/// key + ad + plaintext always produce the same output — deterministic by
/// construction.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] for an unsupported key length,
/// [`CryptoError::Encryption`] on an internal cipher failure.
pub fn encrypt(key: &[u8], plaintext: &[u8], ad: Option<&[u8]>) -> Result<Vec<u8>, CryptoError> {
    let (k1, k2) = split_key(key)?;
    match key.len() {
        32 => encrypt_impl::<Aes128>(k1, k2, plaintext, ad),
        48 => encrypt_impl::<Aes192>(k1, k2, plaintext, ad),
        _ => encrypt_impl::<Aes256>(k1, k2, plaintext, ad),
    }
}

/// SIV-decrypt and authenticate, returning the plaintext in a
/// [`SecretBuffer`].
///
/// # Errors
///
/// Returns [`CryptoError::Authentication`] if the recomputed S2V tag does not
/// match the leading block exactly — tampered data, wrong key, or wrong ad.
pub fn decrypt(key: &[u8], ciphertext: &[u8], ad: Option<&[u8]>) -> Result<SecretBuffer, CryptoError> {
    let (k1, k2) = split_key(key)?;
    match key.len() {
        32 => decrypt_impl::<Aes128>(k1, k2, ciphertext, ad),
        48 => decrypt_impl::<Aes192>(k1, k2, ciphertext, ad),
        _ => decrypt_impl::<Aes256>(k1, k2, ciphertext, ad),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
