//! The keystore operation surface.
//!
//! One `Keystore` instance per process: provisioned seeds plus the client
//! registry behind a single mutex. The locking discipline is uniform across
//! every operation — take the lock, copy the secrets the operation needs,
//! release, then do the cryptography. Nothing crypto-heavy ever runs inside
//! the critical section.

use crate::error::KeystoreError;
use crate::registry::{ClientRegistry, ClientSecrets, Slot, Ticket, CLIENT_ID_LEN};
use crate::seed::{SeedStore, SeedType};
use crate::wrap::{self, KeySpec};
use coffre_crypto_core::memory::SecretBuffer;
use coffre_crypto_core::{
    aead, hmac_sha256, keypair_from_seed, AeadAlgorithm, PrivateKey, PublicKey, SecretBytes,
};
use std::sync::{Mutex, PoisonError};

/// Derivation label for the device identity scalar.
const IDENTITY_LABEL: &[u8] = b"coffre-device-identity";

/// The keystore service: provisioned seeds and the live client registry.
pub struct Keystore {
    pub(crate) seeds: SeedStore,
    registry: Mutex<ClientRegistry>,
}

impl Keystore {
    /// Build a keystore over provisioned seeds.
    #[must_use]
    pub fn new(seeds: SeedStore) -> Self {
        Self {
            seeds,
            registry: Mutex::new(ClientRegistry::new()),
        }
    }

    /// Take the registry lock, absorbing poison: the registry holds no
    /// invariants a panicked writer could have half-applied (every mutation
    /// is a single push/swap/take).
    pub(crate) fn registry(&self) -> std::sync::MutexGuard<'_, ClientRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a client, deriving its key from the chosen seed:
    /// `client_key = HMAC-SHA256(seed, client_id)`. Deterministic, so a
    /// client that re-registers after a crash recovers access to every key
    /// it ever wrapped.
    ///
    /// # Errors
    ///
    /// `SeedUnavailable` if the chosen seed type was not provisioned,
    /// `ResourceExhausted` when the client table is full.
    pub fn register(
        &self,
        client_id: &[u8; CLIENT_ID_LEN],
        seed_type: SeedType,
    ) -> Result<Ticket, KeystoreError> {
        let seed = self.seeds.seed(seed_type)?;
        let client_key = SecretBytes::new(hmac_sha256(seed.expose(), client_id));
        let ticket = self.registry().register(*client_id, seed_type, client_key)?;
        tracing::debug!(ticket = %ticket, seed = %seed_type, "client registered");
        Ok(ticket)
    }

    /// Drop a client context and all of its slots.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ticket.
    pub fn unregister(&self, ticket: Ticket) -> Result<(), KeystoreError> {
        self.registry().unregister(ticket)?;
        tracing::debug!(ticket = %ticket, "client unregistered");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Key wrapping
    // -----------------------------------------------------------------------

    /// Generate a fresh random key of `spec` and return it wrapped. The raw
    /// key exists only transiently inside this call.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ticket; crypto errors propagate.
    pub fn generate_key(&self, ticket: Ticket, spec: KeySpec) -> Result<Vec<u8>, KeystoreError> {
        let secrets = self.client_secrets(ticket)?;
        let raw = SecretBytes::<32>::random().map_err(KeystoreError::Crypto)?;
        wrap::wrap_app_key(&secrets.client_key, spec, &raw.expose()[..spec.key_len()])
    }

    /// Wrap a caller-supplied key.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `app_key` does not match the spec length,
    /// `NotFound` for an unknown ticket.
    pub fn wrap_key(
        &self,
        ticket: Ticket,
        spec: KeySpec,
        app_key: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        let secrets = self.client_secrets(ticket)?;
        wrap::wrap_app_key(&secrets.client_key, spec, app_key)
    }

    /// Unwrap `wrapped` and load it into the smallest free slot, returning
    /// the slot id.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` on tamper or wrong client,
    /// `ResourceExhausted` when all slots are taken.
    pub fn load_key(&self, ticket: Ticket, wrapped: &[u8]) -> Result<usize, KeystoreError> {
        let secrets = self.client_secrets(ticket)?;
        let (spec, raw) = wrap::unwrap_app_key(&secrets.client_key, wrapped).map_err(|e| {
            if matches!(e, KeystoreError::AuthenticationFailed) {
                tracing::warn!(ticket = %ticket, "wrapped key rejected at load");
            }
            e
        })?;
        let slot = Slot::new(spec, raw.expose())?;
        let slot_id = self.registry().add_slot(ticket, slot)?;
        tracing::debug!(ticket = %ticket, slot_id, "key loaded");
        Ok(slot_id)
    }

    /// Unload a slot; the id becomes reusable.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ticket or empty slot.
    pub fn unload_key(&self, ticket: Ticket, slot_id: usize) -> Result<(), KeystoreError> {
        self.registry().remove_slot(ticket, slot_id)?;
        tracing::debug!(ticket = %ticket, slot_id, "key unloaded");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Application-data encryption
    // -----------------------------------------------------------------------

    /// Encrypt under a loaded slot key. The caller owns IV discipline.
    ///
    /// # Errors
    ///
    /// `NotFound` for ticket/slot, `InvalidArgument` for a bad IV length.
    pub fn encrypt(
        &self,
        ticket: Ticket,
        slot_id: usize,
        algo: AeadAlgorithm,
        iv: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        let (spec, key) = self.registry().slot_key(ticket, slot_id)?;
        Ok(aead::encrypt(algo, &key.expose()[..spec.key_len()], iv, plaintext, &[])?)
    }

    /// Decrypt under a loaded slot key.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` on tag mismatch; otherwise as [`Self::encrypt`].
    pub fn decrypt(
        &self,
        ticket: Ticket,
        slot_id: usize,
        algo: AeadAlgorithm,
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<SecretBuffer, KeystoreError> {
        let (spec, key) = self.registry().slot_key(ticket, slot_id)?;
        aead::decrypt(algo, &key.expose()[..spec.key_len()], iv, ciphertext, &[]).map_err(|e| {
            let e = KeystoreError::from(e);
            if matches!(e, KeystoreError::AuthenticationFailed) {
                tracing::warn!(ticket = %ticket, slot_id, "ciphertext rejected");
            }
            e
        })
    }

    /// Ciphertext size for `plaintext_len` bytes — the buffer oracle hosts
    /// call before allocating.
    #[must_use]
    pub const fn encrypt_size(algo: AeadAlgorithm, plaintext_len: usize) -> usize {
        algo.encrypted_size(plaintext_len)
    }

    /// Plaintext size for `ciphertext_len` bytes.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the ciphertext cannot even hold a tag.
    pub fn decrypt_size(algo: AeadAlgorithm, ciphertext_len: usize) -> Result<usize, KeystoreError> {
        algo.decrypted_size(ciphertext_len)
            .map_err(|e| KeystoreError::InvalidArgument(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Device identity
    // -----------------------------------------------------------------------

    /// The device identity keypair, re-derived from the device seed on every
    /// use. No long-lived private-scalar copy exists anywhere.
    pub(crate) fn identity_keypair(&self) -> Result<(PrivateKey, PublicKey), KeystoreError> {
        let device = self.seeds.seed(SeedType::Device)?;
        let scalar_seed = hmac_sha256(device.expose(), IDENTITY_LABEL);
        Ok(keypair_from_seed(&scalar_seed)?)
    }

    /// The device identity public key, for handing to a migration peer.
    ///
    /// # Errors
    ///
    /// Propagates derivation failures only.
    pub fn device_public_key(&self) -> Result<PublicKey, KeystoreError> {
        let (_, public) = self.identity_keypair()?;
        Ok(public)
    }

    /// Copy a client's secrets out from under the lock.
    pub(crate) fn client_secrets(&self, ticket: Ticket) -> Result<ClientSecrets, KeystoreError> {
        self.registry().client_secrets(ticket)
    }
}
