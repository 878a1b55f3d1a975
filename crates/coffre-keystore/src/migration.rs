//! Backup and migration between two devices.
//!
//! The protocol moves a client's *derivation secret* (its client key), never
//! a raw application key:
//!
//! 1. source device: [`Keystore::backup`] seals the client record to the
//!    target's identity key and signs it.
//! 2. target device: [`Keystore::generate_migration_key`] hands a migration
//!    agent a nonce-derived key it can prove was minted here — the key
//!    itself is re-derivable from the nonce and never stored.
//! 3. target device: [`Keystore::migrate`] re-seals the backup under the
//!    migration key, detaching it from the identity keypair.
//! 4. target device: [`Keystore::rewrap_key`] turns an old wrapped key into
//!    one the local client context can load.
//!
//! Every signature covers the SHA-256 of the ciphertext it accompanies.

use crate::error::KeystoreError;
use crate::registry::{Ticket, CLIENT_ID_LEN};
use crate::seed::SeedType;
use crate::service::Keystore;
use crate::wrap;
use coffre_crypto_core::{
    aead, ecdsa_sign, ecdsa_verify, ecies_decrypt, ecies_encrypt, hmac_sha256, sha256,
    validate_public_key, AeadAlgorithm, CryptoError, PublicKey, SecretBytes, Signature,
    GCM_IV_LEN, TAG_LEN,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Migration nonce length in bytes.
pub const MIGRATION_NONCE_LEN: usize = 16;

/// Encoded backup record: `client_key(32) || client_id(32)`.
pub const BACKUP_RECORD_LEN: usize = 64;

/// Migration-key-sealed backup: `iv(12) || record(64) || tag(16)`.
pub const BACKUP_MK_LEN: usize = GCM_IV_LEN + BACKUP_RECORD_LEN + TAG_LEN;

/// Output of [`Keystore::generate_migration_key`]. `mkey_enc` goes to the
/// migration agent; `nonce` is what the target later re-derives from.
pub struct MigrationKeyGrant {
    /// The migration key, ECIES-sealed to the requesting agent.
    pub mkey_enc: Vec<u8>,
    /// Signature over `SHA-256(mkey_enc)` by the device identity.
    pub mkey_sig: Signature,
    /// Public derivation nonce.
    pub nonce: [u8; MIGRATION_NONCE_LEN],
}

fn random_bytes<const N: usize>() -> Result<[u8; N], KeystoreError> {
    let mut out = [0u8; N];
    OsRng.try_fill_bytes(&mut out).map_err(|e| {
        KeystoreError::Crypto(CryptoError::SecureMemory(format!("CSPRNG failure: {e}")))
    })?;
    Ok(out)
}

impl Keystore {
    /// Derive the migration key for `nonce`. Nothing is stored: possession
    /// of the device seed is what makes the key recoverable.
    fn migration_key(&self, nonce: &[u8; MIGRATION_NONCE_LEN]) -> Result<SecretBytes<32>, KeystoreError> {
        let device = self.seeds.seed(SeedType::Device)?;
        Ok(SecretBytes::new(hmac_sha256(device.expose(), nonce)))
    }

    /// Seal a client's record (`client_key || client_id`) to a migration
    /// target and sign the ciphertext with the device identity. The
    /// signature is verified locally before anything is returned: a backup
    /// this device cannot re-verify must never leave it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ticket, `Crypto(InvalidPublicKey)` for a
    /// bad target key.
    pub fn backup(
        &self,
        ticket: Ticket,
        target: &PublicKey,
    ) -> Result<(Vec<u8>, Signature), KeystoreError> {
        validate_public_key(target)?;
        let secrets = self.client_secrets(ticket)?;

        let mut record = Zeroizing::new([0u8; BACKUP_RECORD_LEN]);
        record[..32].copy_from_slice(secrets.client_key.expose());
        record[32..].copy_from_slice(&secrets.client_id);
        let backup_enc = ecies_encrypt(target, &record[..])?;

        let (identity_priv, identity_pub) = self.identity_keypair()?;
        let digest = sha256(&backup_enc);
        let backup_sig = ecdsa_sign(&identity_priv, &digest)?;
        ecdsa_verify(&identity_pub, &digest, &backup_sig)?;

        tracing::info!(ticket = %ticket, bytes = backup_enc.len(), "client backup sealed");
        Ok((backup_enc, backup_sig))
    }

    /// Mint a migration key for an agent that proves possession of its
    /// keypair by self-signing its own encoded public point.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` if the proof-of-possession signature does not
    /// verify.
    pub fn generate_migration_key(
        &self,
        agent: &PublicKey,
        agent_sig: &Signature,
    ) -> Result<MigrationKeyGrant, KeystoreError> {
        validate_public_key(agent)?;
        ecdsa_verify(agent, &sha256(&agent.to_bytes()), agent_sig).map_err(|e| {
            tracing::warn!("migration-key request rejected: bad proof of possession");
            KeystoreError::from(e)
        })?;

        let nonce = random_bytes::<MIGRATION_NONCE_LEN>()?;
        let mkey = self.migration_key(&nonce)?;
        let mkey_enc = ecies_encrypt(agent, mkey.expose())?;
        let (identity_priv, _) = self.identity_keypair()?;
        let mkey_sig = ecdsa_sign(&identity_priv, &sha256(&mkey_enc))?;

        tracing::info!("migration key granted");
        Ok(MigrationKeyGrant { mkey_enc, mkey_sig, nonce })
    }

    /// Accept a backup sealed to this device's identity and re-seal it under
    /// the migration key for `nonce`, detaching it from the identity
    /// keypair. Output: `iv(12) || record(64) || tag(16)`.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` if `backup_sig` does not verify against
    /// `source`, `InvalidArgument` if the decrypted record is malformed.
    pub fn migrate(
        &self,
        nonce: &[u8; MIGRATION_NONCE_LEN],
        backup_enc: &[u8],
        backup_sig: &Signature,
        source: &PublicKey,
    ) -> Result<Vec<u8>, KeystoreError> {
        validate_public_key(source)?;
        ecdsa_verify(source, &sha256(backup_enc), backup_sig).map_err(|e| {
            tracing::warn!("backup rejected: bad source signature");
            KeystoreError::from(e)
        })?;

        let (identity_priv, _) = self.identity_keypair()?;
        let record = ecies_decrypt(&identity_priv, backup_enc)?;
        if record.expose().len() != BACKUP_RECORD_LEN {
            return Err(KeystoreError::InvalidArgument(format!(
                "backup record has {} bytes (expected {BACKUP_RECORD_LEN})",
                record.expose().len()
            )));
        }

        let mkey = self.migration_key(nonce)?;
        let iv = random_bytes::<GCM_IV_LEN>()?;
        let sealed = aead::encrypt(
            AeadAlgorithm::AesGcm,
            mkey.expose(),
            &iv,
            record.expose(),
            &[],
        )?;

        let mut out = Vec::with_capacity(BACKUP_MK_LEN);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&sealed);
        tracing::info!("backup migrated to migration key");
        Ok(out)
    }

    /// Rewrap an old device's wrapped key for the calling client: recover
    /// the old client key from the migrated backup, unwrap, wrap again under
    /// the caller's client key. The raw application key never crosses the
    /// API boundary.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a malformed `backup_mk`, `AuthenticationFailed`
    /// if either the backup seal or the wrapped key fails to authenticate.
    pub fn rewrap_key(
        &self,
        ticket: Ticket,
        backup_mk: &[u8],
        nonce: &[u8; MIGRATION_NONCE_LEN],
        wrapped: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        if backup_mk.len() != BACKUP_MK_LEN {
            return Err(KeystoreError::InvalidArgument(format!(
                "migrated backup has {} bytes (expected {BACKUP_MK_LEN})",
                backup_mk.len()
            )));
        }
        let (iv, sealed) = backup_mk.split_at(GCM_IV_LEN);
        let mkey = self.migration_key(nonce)?;
        let record = aead::decrypt(AeadAlgorithm::AesGcm, mkey.expose(), iv, sealed, &[])
            .map_err(|e| {
                let e = KeystoreError::from(e);
                if matches!(e, KeystoreError::AuthenticationFailed) {
                    tracing::warn!(ticket = %ticket, "migrated backup rejected at rewrap");
                }
                e
            })?;

        let old_client_key = SecretBytes::<32>::from_slice(&record.expose()[..32])
            .map_err(KeystoreError::Crypto)?;
        let (spec, raw) = wrap::unwrap_app_key(&old_client_key, wrapped)?;

        let secrets = self.client_secrets(ticket)?;
        let rewrapped = wrap::wrap_app_key(&secrets.client_key, spec, raw.expose())?;
        tracing::info!(ticket = %ticket, "key rewrapped for local client");
        Ok(rewrapped)
    }
}
