//! `coffre-keystore` — Keystore service logic for COFFRE.
//!
//! Holds the provisioned seeds, the bounded client registry, and the
//! operation surface hosts dispatch into: register/unregister, key
//! generation and wrapping, slot load/unload, application-data encryption,
//! and device-to-device migration. All cryptography is delegated to
//! `coffre-crypto-core`; this crate owns policy, bookkeeping, and locking.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod seed;

pub mod registry;
pub mod wrap;

pub mod service;

pub mod migration;

pub use error::KeystoreError;
pub use migration::{MigrationKeyGrant, BACKUP_MK_LEN, BACKUP_RECORD_LEN, MIGRATION_NONCE_LEN};
pub use registry::{Ticket, CLIENT_ID_LEN, MAX_CLIENTS, MAX_SLOTS_PER_CLIENT, TICKET_LEN};
pub use seed::{SeedInput, SeedStore, SeedType, SEED_LEN};
pub use service::Keystore;
pub use wrap::{unwrapped_key_size, wrapped_key_size, KeySpec, WRAP_OVERHEAD};
