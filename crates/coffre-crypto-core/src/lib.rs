//! `coffre-crypto-core` — Pure cryptographic primitives for COFFRE.
//!
//! This crate is the audit target: zero I/O, zero async, zero persistence
//! dependencies. Everything the keystore service needs — deterministic SIV
//! key wrapping, AEAD for application data, HMAC/X9.63 derivation, and the
//! P-256 engine behind device identity and migration — lives here.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod siv;

pub mod aead;

pub mod ecc;

pub use aead::{AeadAlgorithm, CCM_IV_LEN, GCM_IV_LEN, TAG_LEN};
pub use ecc::{
    ecdh_shared_secret, ecdsa_sign, ecdsa_verify, ecies_decrypt, ecies_encrypt, generate_keypair,
    keypair_from_seed, validate_public_key, PrivateKey, PublicKey, Signature, COORD_LEN,
    ECIES_OVERHEAD, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};
pub use error::CryptoError;
pub use kdf::{hmac_sha256, sha256, x963_kdf, HMAC_LEN};
pub use memory::{ct_eq, disable_core_dumps, LockedRegion, SecretBuffer, SecretBytes};
