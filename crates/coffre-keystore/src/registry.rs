//! Client registry: tickets, per-client contexts, and key slots.
//!
//! The registry is a bounded in-memory arena, nothing more. It never touches
//! a cryptographic primitive; derivation happens in the service layer before
//! insertion. All access is serialized behind a single mutex owned by
//! [`crate::Keystore`], and accessors copy secrets out so the lock is never
//! held across crypto.

use crate::error::KeystoreError;
use crate::seed::SeedType;
use crate::wrap::KeySpec;
use coffre_crypto_core::{CryptoError, SecretBytes};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Maximum simultaneously registered clients.
pub const MAX_CLIENTS: usize = 32;

/// Maximum loaded key slots per client.
pub const MAX_SLOTS_PER_CLIENT: usize = 16;

/// Client identity length in bytes (a hash of the client's manifest or
/// binary, opaque to the keystore).
pub const CLIENT_ID_LEN: usize = 32;

/// Ticket length in bytes.
pub const TICKET_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// Opaque random session handle returned by registration.
///
/// Not a secret in the cryptographic sense — it authorizes nothing beyond
/// this process — but it is never logged in full either. Display and Debug
/// show the first four hex digits only.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket([u8; TICKET_LEN]);

impl Ticket {
    fn random() -> Result<Self, KeystoreError> {
        let mut bytes = [0u8; TICKET_LEN];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            KeystoreError::Crypto(CryptoError::SecureMemory(format!(
                "CSPRNG failure generating ticket: {e}"
            )))
        })?;
        Ok(Self(bytes))
    }

    /// Raw bytes, for hosts that marshal tickets over an IPC boundary.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; TICKET_LEN] {
        self.0
    }

    /// Rebuild a ticket from marshalled bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; TICKET_LEN]) -> Self {
        Self(bytes)
    }

    /// Abbreviated form for logs: first four hex digits.
    #[must_use]
    pub fn abbrev(&self) -> String {
        format!("{:02x}{:02x}…", self.0[0], self.0[1])
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.abbrev())
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({self})")
    }
}

// ---------------------------------------------------------------------------
// Slots and contexts
// ---------------------------------------------------------------------------

/// One loaded application key. 128-bit keys occupy the first 16 bytes of the
/// fixed buffer; `spec` is authoritative for the length.
pub(crate) struct Slot {
    spec: KeySpec,
    key: SecretBytes<32>,
}

impl Slot {
    pub(crate) fn new(spec: KeySpec, raw_key: &[u8]) -> Result<Self, KeystoreError> {
        if raw_key.len() != spec.key_len() {
            return Err(KeystoreError::InvalidArgument(format!(
                "slot key length {} does not match spec",
                raw_key.len()
            )));
        }
        let mut buf = [0u8; 32];
        buf[..raw_key.len()].copy_from_slice(raw_key);
        Ok(Self {
            spec,
            key: SecretBytes::new(buf),
        })
    }
}

/// Copy-out of the secrets the wrap and backup paths need, taken under the
/// registry lock and used after it is released.
pub(crate) struct ClientSecrets {
    pub(crate) client_key: SecretBytes<32>,
    pub(crate) client_id: [u8; CLIENT_ID_LEN],
    pub(crate) seed_type: SeedType,
}

struct ClientContext {
    ticket: Ticket,
    client_id: [u8; CLIENT_ID_LEN],
    client_key: SecretBytes<32>,
    seed_type: SeedType,
    slots: Vec<Option<Slot>>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Bounded client arena, looked up by linear ticket scan (32 entries; a map
/// would cost more than it saves).
pub(crate) struct ClientRegistry {
    clients: Vec<ClientContext>,
}

impl ClientRegistry {
    pub(crate) const fn new() -> Self {
        Self { clients: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }

    fn find(&self, ticket: Ticket) -> Result<&ClientContext, KeystoreError> {
        self.clients
            .iter()
            .find(|c| c.ticket == ticket)
            .ok_or(KeystoreError::NotFound("client"))
    }

    fn find_mut(&mut self, ticket: Ticket) -> Result<&mut ClientContext, KeystoreError> {
        self.clients
            .iter_mut()
            .find(|c| c.ticket == ticket)
            .ok_or(KeystoreError::NotFound("client"))
    }

    /// Insert a freshly derived client, returning its new ticket.
    ///
    /// The same `client_id` may register more than once; each registration
    /// gets its own ticket and slots, while the derived `client_key` is
    /// identical by construction.
    pub(crate) fn register(
        &mut self,
        client_id: [u8; CLIENT_ID_LEN],
        seed_type: SeedType,
        client_key: SecretBytes<32>,
    ) -> Result<Ticket, KeystoreError> {
        if self.clients.len() >= MAX_CLIENTS {
            return Err(KeystoreError::ResourceExhausted("client table"));
        }
        let ticket = loop {
            let candidate = Ticket::random()?;
            if self.clients.iter().all(|c| c.ticket != candidate) {
                break candidate;
            }
        };
        self.clients.push(ClientContext {
            ticket,
            client_id,
            client_key,
            seed_type,
            slots: Vec::new(),
        });
        Ok(ticket)
    }

    /// Drop a client and every slot it holds.
    pub(crate) fn unregister(&mut self, ticket: Ticket) -> Result<(), KeystoreError> {
        let index = self
            .clients
            .iter()
            .position(|c| c.ticket == ticket)
            .ok_or(KeystoreError::NotFound("client"))?;
        // Slot keys and the client key zeroize on drop.
        self.clients.swap_remove(index);
        Ok(())
    }

    /// Store a slot under the smallest unused id. Removed ids are reused.
    pub(crate) fn add_slot(&mut self, ticket: Ticket, slot: Slot) -> Result<usize, KeystoreError> {
        let client = self.find_mut(ticket)?;
        if let Some(free) = client.slots.iter().position(Option::is_none) {
            client.slots[free] = Some(slot);
            return Ok(free);
        }
        if client.slots.len() >= MAX_SLOTS_PER_CLIENT {
            return Err(KeystoreError::ResourceExhausted("key slots"));
        }
        client.slots.push(Some(slot));
        Ok(client.slots.len().saturating_sub(1))
    }

    /// Copy out a slot's spec and key bytes.
    pub(crate) fn slot_key(
        &self,
        ticket: Ticket,
        slot_id: usize,
    ) -> Result<(KeySpec, SecretBytes<32>), KeystoreError> {
        let client = self.find(ticket)?;
        let slot = client
            .slots
            .get(slot_id)
            .and_then(Option::as_ref)
            .ok_or(KeystoreError::NotFound("key slot"))?;
        Ok((slot.spec, SecretBytes::new(*slot.key.expose())))
    }

    /// Clear a slot, making its id reusable.
    pub(crate) fn remove_slot(&mut self, ticket: Ticket, slot_id: usize) -> Result<(), KeystoreError> {
        let client = self.find_mut(ticket)?;
        let slot = client
            .slots
            .get_mut(slot_id)
            .ok_or(KeystoreError::NotFound("key slot"))?;
        if slot.take().is_none() {
            return Err(KeystoreError::NotFound("key slot"));
        }
        Ok(())
    }

    /// Copy out the client's derivation secrets for wrap/backup paths.
    pub(crate) fn client_secrets(&self, ticket: Ticket) -> Result<ClientSecrets, KeystoreError> {
        let client = self.find(ticket)?;
        Ok(ClientSecrets {
            client_key: SecretBytes::new(*client.client_key.expose()),
            client_id: client.client_id,
            seed_type: client.seed_type,
        })
    }
}
