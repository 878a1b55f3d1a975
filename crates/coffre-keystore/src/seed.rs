//! Seed provisioning and selection.
//!
//! Seeds arrive exactly once, at construction time, from whatever platform
//! channel the host uses (boot parameters, a TEE handoff, a test harness).
//! The store copies them into locked memory, picks the winning candidate per
//! type, and the originals are wiped. After provisioning the set of seeds
//! never changes for the lifetime of the keystore.

use crate::error::KeystoreError;
use coffre_crypto_core::SecretBytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Seed length in bytes.
pub const SEED_LEN: usize = 32;

/// Which root secret a client's keys are bound to.
///
/// `Device` survives a factory-reset of the user profile; `User` is rotated
/// with it. A client picks one at registration and every key it ever wraps
/// is bound to that choice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SeedType {
    /// Device-lifetime seed. Always provisioned; the keystore refuses to
    /// start without it.
    Device,
    /// User-profile seed. Optional.
    User,
}

impl fmt::Display for SeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device => f.write_str("device"),
            Self::User => f.write_str("user"),
        }
    }
}

/// Provisioning input for one seed type: versioned candidates, with an
/// optional unversioned fallback. All buffers are consumed and wiped.
#[derive(Default)]
pub struct SeedInput {
    /// `(svn, seed)` pairs; the highest security version number wins.
    pub candidates: Vec<(u32, Zeroizing<[u8; SEED_LEN]>)>,
    /// Used only when no candidate is present.
    pub fallback: Option<Zeroizing<[u8; SEED_LEN]>>,
}

impl SeedInput {
    /// A single unversioned seed.
    #[must_use]
    pub fn single(seed: [u8; SEED_LEN]) -> Self {
        Self {
            candidates: Vec::new(),
            fallback: Some(Zeroizing::new(seed)),
        }
    }

    /// A versioned candidate list.
    #[must_use]
    pub fn versioned(candidates: Vec<(u32, [u8; SEED_LEN])>) -> Self {
        Self {
            candidates: candidates
                .into_iter()
                .map(|(svn, seed)| (svn, Zeroizing::new(seed)))
                .collect(),
            fallback: None,
        }
    }

    /// Pick the winning seed: highest SVN first, fallback otherwise.
    fn select(self) -> Option<SecretBytes<SEED_LEN>> {
        let best = self
            .candidates
            .iter()
            .max_by_key(|(svn, _)| *svn)
            .map(|(_, seed)| SecretBytes::new(**seed));
        // Candidate and fallback buffers are Zeroizing and wiped here.
        best.or_else(|| self.fallback.map(|seed| SecretBytes::new(*seed)))
    }
}

/// The provisioned root secrets. Immutable after construction.
pub struct SeedStore {
    device: SecretBytes<SEED_LEN>,
    user: Option<SecretBytes<SEED_LEN>>,
}

impl SeedStore {
    /// Provision from per-type inputs, consuming and wiping every source
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::SeedUnavailable`] for [`SeedType::Device`]
    /// when no device seed was supplied — the keystore fails closed rather
    /// than running with derivations nobody can ever reproduce.
    pub fn provision(device: SeedInput, user: Option<SeedInput>) -> Result<Self, KeystoreError> {
        let device = device
            .select()
            .ok_or(KeystoreError::SeedUnavailable(SeedType::Device))?;
        let user = user.and_then(SeedInput::select);
        Ok(Self { device, user })
    }

    /// The seed for `seed_type`.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::SeedUnavailable`] if that type was never
    /// provisioned.
    pub fn seed(&self, seed_type: SeedType) -> Result<&SecretBytes<SEED_LEN>, KeystoreError> {
        match seed_type {
            SeedType::Device => Ok(&self.device),
            SeedType::User => self
                .user
                .as_ref()
                .ok_or(KeystoreError::SeedUnavailable(SeedType::User)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_device_seed_is_selected() {
        let store = SeedStore::provision(SeedInput::single([0x11; SEED_LEN]), None).unwrap();
        assert_eq!(store.seed(SeedType::Device).unwrap().expose(), &[0x11; SEED_LEN]);
    }

    #[test]
    fn highest_svn_candidate_wins() {
        let input = SeedInput::versioned(vec![
            (1, [0x01; SEED_LEN]),
            (7, [0x07; SEED_LEN]),
            (3, [0x03; SEED_LEN]),
        ]);
        let store = SeedStore::provision(input, None).unwrap();
        assert_eq!(store.seed(SeedType::Device).unwrap().expose(), &[0x07; SEED_LEN]);
    }

    #[test]
    fn candidates_shadow_the_fallback() {
        let input = SeedInput {
            candidates: vec![(0, Zeroizing::new([0xAA; SEED_LEN]))],
            fallback: Some(Zeroizing::new([0xBB; SEED_LEN])),
        };
        let store = SeedStore::provision(input, None).unwrap();
        assert_eq!(store.seed(SeedType::Device).unwrap().expose(), &[0xAA; SEED_LEN]);
    }

    #[test]
    fn missing_device_seed_fails_closed() {
        assert!(matches!(
            SeedStore::provision(SeedInput::default(), None),
            Err(KeystoreError::SeedUnavailable(SeedType::Device))
        ));
    }

    #[test]
    fn user_seed_is_optional() {
        let store = SeedStore::provision(SeedInput::single([0x11; SEED_LEN]), None).unwrap();
        assert!(matches!(
            store.seed(SeedType::User),
            Err(KeystoreError::SeedUnavailable(SeedType::User))
        ));

        let store = SeedStore::provision(
            SeedInput::single([0x11; SEED_LEN]),
            Some(SeedInput::single([0x22; SEED_LEN])),
        )
        .unwrap();
        assert_eq!(store.seed(SeedType::User).unwrap().expose(), &[0x22; SEED_LEN]);
    }
}
