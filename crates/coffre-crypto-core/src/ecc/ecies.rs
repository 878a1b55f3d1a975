//! ECIES hybrid encryption over P-256.
//!
//! Wire layout: `ephemeral public key (65) || ciphertext || HMAC (32)`.
//! The ECDH x coordinate is stretched with the X9.63 KDF into
//! `len(plaintext)` keystream bytes followed by a 32-byte HMAC-SHA256 key;
//! the MAC covers the ciphertext only, so the ephemeral key is bound through
//! the shared secret rather than the tag.

use super::{ecdh_shared_secret, generate_keypair, PrivateKey, PublicKey, PUBLIC_KEY_LEN};
use crate::error::CryptoError;
use crate::kdf::{hmac_sha256, x963_kdf, HMAC_LEN};
use crate::memory::{ct_eq, SecretBuffer};

/// Fixed expansion of an ECIES message over its plaintext.
pub const ECIES_OVERHEAD: usize = PUBLIC_KEY_LEN + HMAC_LEN;

fn split_keystream(stream: &[u8], msg_len: usize) -> (&[u8], &[u8]) {
    stream.split_at(msg_len)
}

fn derive_stream(
    public: &PublicKey,
    private: &PrivateKey,
    msg_len: usize,
) -> Result<SecretBuffer, CryptoError> {
    let shared = ecdh_shared_secret(public, private)?;
    let stream_len = msg_len
        .checked_add(HMAC_LEN)
        .ok_or_else(|| CryptoError::Encryption("message too long".into()))?;
    x963_kdf(shared.expose(), stream_len)
}

/// Encrypt `plaintext` to `recipient` under a fresh ephemeral keypair.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] on CSPRNG failure and propagates
/// derivation errors from the KDF.
pub fn ecies_encrypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let (ephemeral_private, ephemeral_public) = generate_keypair()?;
    let stream = derive_stream(recipient, &ephemeral_private, plaintext.len())?;
    let (pad, mac_key) = split_keystream(stream.expose(), plaintext.len());

    let mut out = Vec::with_capacity(
        plaintext
            .len()
            .checked_add(ECIES_OVERHEAD)
            .ok_or_else(|| CryptoError::Encryption("message too long".into()))?,
    );
    out.extend_from_slice(&ephemeral_public.to_bytes());
    out.extend(plaintext.iter().zip(pad.iter()).map(|(&p, &s)| p ^ s));
    let mac = hmac_sha256(mac_key, &out[PUBLIC_KEY_LEN..]);
    out.extend_from_slice(&mac);
    Ok(out)
}

/// Decrypt an ECIES message addressed to `recipient`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the message is shorter than the
/// fixed overhead, [`CryptoError::InvalidPublicKey`] if the embedded
/// ephemeral key does not parse, and [`CryptoError::Authentication`] on MAC
/// mismatch.
pub fn ecies_decrypt(recipient: &PrivateKey, message: &[u8]) -> Result<SecretBuffer, CryptoError> {
    let ct_len = message
        .len()
        .checked_sub(ECIES_OVERHEAD)
        .ok_or_else(|| CryptoError::Encryption("truncated message".into()))?;
    let ephemeral_public = PublicKey::from_bytes(&message[..PUBLIC_KEY_LEN])?;
    let (ciphertext, mac) = message[PUBLIC_KEY_LEN..].split_at(ct_len);

    let stream = derive_stream(&ephemeral_public, recipient, ct_len)?;
    let (pad, mac_key) = split_keystream(stream.expose(), ct_len);
    if !ct_eq(&hmac_sha256(mac_key, ciphertext), mac) {
        return Err(CryptoError::Authentication);
    }

    let plaintext: Vec<u8> = ciphertext.iter().zip(pad.iter()).map(|(&c, &s)| c ^ s).collect();
    SecretBuffer::from_vec(plaintext)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let (private, public) = generate_keypair().unwrap();
        let msg = b"wrapped application key material";
        let blob = ecies_encrypt(&public, msg).unwrap();
        assert_eq!(blob.len(), msg.len() + ECIES_OVERHEAD);
        let recovered = ecies_decrypt(&private, &blob).unwrap();
        assert_eq!(recovered.expose(), msg);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let (private, public) = generate_keypair().unwrap();
        let blob = ecies_encrypt(&public, b"").unwrap();
        assert_eq!(blob.len(), ECIES_OVERHEAD);
        let recovered = ecies_decrypt(&private, &blob).unwrap();
        assert!(recovered.expose().is_empty());
    }

    #[test]
    fn encryption_is_randomized() {
        let (_, public) = generate_keypair().unwrap();
        let a = ecies_encrypt(&public, b"same message").unwrap();
        let b = ecies_encrypt(&public, b"same message").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let (private, public) = generate_keypair().unwrap();
        let mut blob = ecies_encrypt(&public, b"payload bytes").unwrap();
        blob[PUBLIC_KEY_LEN] ^= 1;
        assert!(matches!(
            ecies_decrypt(&private, &blob),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn tampered_mac_is_rejected() {
        let (private, public) = generate_keypair().unwrap();
        let mut blob = ecies_encrypt(&public, b"payload bytes").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 1;
        assert!(matches!(
            ecies_decrypt(&private, &blob),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn wrong_recipient_fails_authentication() {
        let (_, public) = generate_keypair().unwrap();
        let (other_private, _) = generate_keypair().unwrap();
        let blob = ecies_encrypt(&public, b"payload bytes").unwrap();
        assert!(matches!(
            ecies_decrypt(&other_private, &blob),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn truncated_message_is_rejected() {
        let (private, public) = generate_keypair().unwrap();
        let blob = ecies_encrypt(&public, b"").unwrap();
        assert!(matches!(
            ecies_decrypt(&private, &blob[..blob.len() - 1]),
            Err(CryptoError::Encryption(_))
        ));
    }

    #[test]
    fn corrupted_ephemeral_key_is_rejected() {
        let (private, public) = generate_keypair().unwrap();
        let mut blob = ecies_encrypt(&public, b"payload").unwrap();
        blob[0] = 0x02;
        assert!(matches!(
            ecies_decrypt(&private, &blob),
            Err(CryptoError::InvalidPublicKey)
        ));
    }
}
