//! AES-CCM / AES-GCM authenticated encryption for application payloads.
//!
//! Unlike the key-wrapping path (SIV, deterministic), application data is
//! encrypted under a slot key with a caller-supplied IV — the dispatch layer
//! owns IV discipline, the core only validates the length. Wire layout for
//! both algorithms is `ciphertext || tag(16)`, so the size delta is a fixed
//! `+`/`-` 16 bytes per direction.
//!
//! GCM goes through `ring`; CCM (which `ring` does not provide) uses the
//! `ccm` crate over `aes`.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use aes::cipher::consts::{U13, U16};
use aes::{Aes128, Aes256};
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};
use ccm::Ccm;
use ring::aead as ring_aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Authentication tag length in bytes, identical for both algorithms.
pub const TAG_LEN: usize = 16;

/// GCM IV length in bytes (96 bits).
pub const GCM_IV_LEN: usize = 12;

/// CCM nonce length in bytes (13 bytes leaves a 2-byte CTR length field).
pub const CCM_IV_LEN: usize = 13;

/// AES-CCM with a 16-byte tag and 13-byte nonce.
type Aes128Ccm = Ccm<Aes128, U16, U13>;
type Aes256Ccm = Ccm<Aes256, U16, U13>;

// ---------------------------------------------------------------------------
// Algorithm selector
// ---------------------------------------------------------------------------

/// AEAD algorithm for application-data encryption under a slot key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AeadAlgorithm {
    /// AES-GCM, 12-byte IV.
    AesGcm,
    /// AES-CCM, 13-byte nonce.
    AesCcm,
}

impl AeadAlgorithm {
    /// Required IV length in bytes.
    #[must_use]
    pub const fn iv_len(self) -> usize {
        match self {
            Self::AesGcm => GCM_IV_LEN,
            Self::AesCcm => CCM_IV_LEN,
        }
    }

    /// Output size for `input_len` bytes of plaintext.
    #[must_use]
    pub const fn encrypted_size(self, input_len: usize) -> usize {
        input_len.saturating_add(TAG_LEN)
    }

    /// Plaintext size recovered from `input_len` bytes of ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] if the input cannot even
    /// hold a tag.
    pub fn decrypted_size(self, input_len: usize) -> Result<usize, CryptoError> {
        input_len.checked_sub(TAG_LEN).ok_or_else(|| {
            CryptoError::InvalidKeyMaterial(format!(
                "ciphertext too short: {input_len} bytes (minimum {TAG_LEN})"
            ))
        })
    }
}

fn check_inputs(algo: AeadAlgorithm, key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
    if key.len() != 16 && key.len() != 32 {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid AEAD key length: {} bytes (expected 16 or 32)",
            key.len()
        )));
    }
    if iv.len() != algo.iv_len() {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid IV length: {} bytes (expected {})",
            iv.len(),
            algo.iv_len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GCM via ring
// ---------------------------------------------------------------------------

fn gcm_key(key: &[u8]) -> Result<ring_aead::LessSafeKey, CryptoError> {
    let alg = if key.len() == 16 {
        &ring_aead::AES_128_GCM
    } else {
        &ring_aead::AES_256_GCM
    };
    let unbound = ring_aead::UnboundKey::new(alg, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-GCM key".into()))?;
    Ok(ring_aead::LessSafeKey::new(unbound))
}

fn gcm_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let sealing = gcm_key(key)?;
    let nonce = ring_aead::Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| CryptoError::Encryption("bad GCM nonce".into()))?;

    let mut in_out = plaintext.to_vec();
    let Ok(tag) =
        sealing.seal_in_place_separate_tag(nonce, ring_aead::Aad::from(aad), &mut in_out)
    else {
        in_out.zeroize();
        return Err(CryptoError::Encryption("AES-GCM encryption failed".into()));
    };
    in_out.extend_from_slice(tag.as_ref());
    Ok(in_out)
}

fn gcm_decrypt(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<SecretBuffer, CryptoError> {
    let opening = gcm_key(key)?;
    let nonce = ring_aead::Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| CryptoError::Encryption("bad GCM nonce".into()))?;

    let mut in_out = ciphertext.to_vec();
    let plaintext_len = {
        let plaintext = opening
            .open_in_place(nonce, ring_aead::Aad::from(aad), &mut in_out)
            .map_err(|_| CryptoError::Authentication)?;
        plaintext.len()
    };
    in_out.truncate(plaintext_len);
    SecretBuffer::from_vec(in_out)
}

// ---------------------------------------------------------------------------
// CCM via the ccm crate
// ---------------------------------------------------------------------------

fn ccm_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut buf = plaintext.to_vec();
    let nonce = GenericArray::from_slice(iv);
    let tag = if key.len() == 16 {
        let cipher = Aes128Ccm::new_from_slice(key)
            .map_err(|_| CryptoError::Encryption("failed to create AES-CCM key".into()))?;
        cipher.encrypt_in_place_detached(nonce, aad, &mut buf)
    } else {
        let cipher = Aes256Ccm::new_from_slice(key)
            .map_err(|_| CryptoError::Encryption("failed to create AES-CCM key".into()))?;
        cipher.encrypt_in_place_detached(nonce, aad, &mut buf)
    };
    let Ok(tag) = tag else {
        buf.zeroize();
        return Err(CryptoError::Encryption("AES-CCM encryption failed".into()));
    };
    buf.extend_from_slice(&tag);
    Ok(buf)
}

fn ccm_decrypt(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<SecretBuffer, CryptoError> {
    let split = ciphertext.len().checked_sub(TAG_LEN).ok_or_else(|| {
        CryptoError::InvalidKeyMaterial(format!(
            "ciphertext too short: {} bytes (minimum {TAG_LEN})",
            ciphertext.len()
        ))
    })?;
    let (body, tag) = ciphertext.split_at(split);

    let mut buf = body.to_vec();
    let nonce = GenericArray::from_slice(iv);
    let tag = GenericArray::from_slice(tag);
    let res = if key.len() == 16 {
        let cipher = Aes128Ccm::new_from_slice(key)
            .map_err(|_| CryptoError::Encryption("failed to create AES-CCM key".into()))?;
        cipher.decrypt_in_place_detached(nonce, aad, &mut buf, tag)
    } else {
        let cipher = Aes256Ccm::new_from_slice(key)
            .map_err(|_| CryptoError::Encryption("failed to create AES-CCM key".into()))?;
        cipher.decrypt_in_place_detached(nonce, aad, &mut buf, tag)
    };
    if res.is_err() {
        buf.zeroize();
        return Err(CryptoError::Authentication);
    }
    SecretBuffer::from_vec(buf)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Encrypt under a slot key, producing `ciphertext || tag`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] for a bad key or IV length,
/// [`CryptoError::Encryption`] on an internal cipher failure.
pub fn encrypt(
    algo: AeadAlgorithm,
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_inputs(algo, key, iv)?;
    match algo {
        AeadAlgorithm::AesGcm => gcm_encrypt(key, iv, plaintext, aad),
        AeadAlgorithm::AesCcm => ccm_encrypt(key, iv, plaintext, aad),
    }
}

/// Decrypt `ciphertext || tag`, rejecting on any tag mismatch.
///
/// # Errors
///
/// Returns [`CryptoError::Authentication`] if the tag does not verify —
/// decryption is all-or-nothing, no partial plaintext is ever released.
pub fn decrypt(
    algo: AeadAlgorithm,
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<SecretBuffer, CryptoError> {
    check_inputs(algo, key, iv)?;
    match algo {
        AeadAlgorithm::AesGcm => gcm_decrypt(key, iv, ciphertext, aad),
        AeadAlgorithm::AesCcm => ccm_decrypt(key, iv, ciphertext, aad),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_128: [u8; 16] = [0xA1; 16];
    const KEY_256: [u8; 32] = [0xB2; 32];
    const GCM_IV: [u8; GCM_IV_LEN] = [0x01; GCM_IV_LEN];
    const CCM_IV: [u8; CCM_IV_LEN] = [0x02; CCM_IV_LEN];

    fn iv_for(algo: AeadAlgorithm) -> &'static [u8] {
        match algo {
            AeadAlgorithm::AesGcm => &GCM_IV,
            AeadAlgorithm::AesCcm => &CCM_IV,
        }
    }

    #[test]
    fn roundtrip_both_algorithms_both_key_sizes() {
        for algo in [AeadAlgorithm::AesGcm, AeadAlgorithm::AesCcm] {
            for key in [&KEY_128[..], &KEY_256[..]] {
                let iv = iv_for(algo);
                let ct = encrypt(algo, key, iv, b"application payload", b"ctx").expect("encrypt");
                assert_eq!(ct.len(), algo.encrypted_size(19));
                let pt = decrypt(algo, key, iv, &ct, b"ctx").expect("decrypt");
                assert_eq!(pt.expose(), b"application payload");
            }
        }
    }

    #[test]
    fn size_oracles_are_inverse() {
        let algo = AeadAlgorithm::AesGcm;
        assert_eq!(algo.encrypted_size(100), 116);
        assert_eq!(algo.decrypted_size(116).expect("size"), 100);
        assert!(algo.decrypted_size(15).is_err());
        assert_eq!(algo.decrypted_size(TAG_LEN).expect("size"), 0);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        for algo in [AeadAlgorithm::AesGcm, AeadAlgorithm::AesCcm] {
            let iv = iv_for(algo);
            let mut ct = encrypt(algo, &KEY_256, iv, b"data", &[]).expect("encrypt");
            ct[0] ^= 0xFF;
            assert!(matches!(
                decrypt(algo, &KEY_256, iv, &ct, &[]),
                Err(CryptoError::Authentication)
            ));
        }
    }

    #[test]
    fn tampered_tag_is_rejected() {
        for algo in [AeadAlgorithm::AesGcm, AeadAlgorithm::AesCcm] {
            let iv = iv_for(algo);
            let mut ct = encrypt(algo, &KEY_256, iv, b"data", &[]).expect("encrypt");
            let last = ct.len() - 1;
            ct[last] ^= 0x01;
            assert!(matches!(
                decrypt(algo, &KEY_256, iv, &ct, &[]),
                Err(CryptoError::Authentication)
            ));
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        for algo in [AeadAlgorithm::AesGcm, AeadAlgorithm::AesCcm] {
            let iv = iv_for(algo);
            let ct = encrypt(algo, &KEY_256, iv, b"data", &[]).expect("encrypt");
            let wrong = [0xCC; 32];
            assert!(matches!(
                decrypt(algo, &wrong, iv, &ct, &[]),
                Err(CryptoError::Authentication)
            ));
        }
    }

    #[test]
    fn wrong_iv_is_rejected() {
        let ct = encrypt(AeadAlgorithm::AesGcm, &KEY_128, &GCM_IV, b"data", &[]).expect("encrypt");
        let other_iv = [0xEE; GCM_IV_LEN];
        assert!(matches!(
            decrypt(AeadAlgorithm::AesGcm, &KEY_128, &other_iv, &ct, &[]),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn aad_mismatch_is_rejected() {
        let ct =
            encrypt(AeadAlgorithm::AesCcm, &KEY_128, &CCM_IV, b"data", b"right").expect("encrypt");
        assert!(matches!(
            decrypt(AeadAlgorithm::AesCcm, &KEY_128, &CCM_IV, &ct, b"wrong"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn iv_length_is_enforced_per_algorithm() {
        // GCM IV used with CCM and vice versa must fail up front.
        assert!(matches!(
            encrypt(AeadAlgorithm::AesCcm, &KEY_128, &GCM_IV, b"x", &[]),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            encrypt(AeadAlgorithm::AesGcm, &KEY_128, &CCM_IV, b"x", &[]),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn key_length_is_enforced() {
        for len in [0usize, 15, 17, 24, 31, 33] {
            let key = vec![0u8; len];
            assert!(matches!(
                encrypt(AeadAlgorithm::AesGcm, &key, &GCM_IV, b"x", &[]),
                Err(CryptoError::InvalidKeyMaterial(_))
            ));
        }
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        for algo in [AeadAlgorithm::AesGcm, AeadAlgorithm::AesCcm] {
            let iv = iv_for(algo);
            let ct = encrypt(algo, &KEY_128, iv, &[], &[]).expect("encrypt");
            assert_eq!(ct.len(), TAG_LEN);
            let pt = decrypt(algo, &KEY_128, iv, &ct, &[]).expect("decrypt");
            assert!(pt.expose().is_empty());
        }
    }
}
