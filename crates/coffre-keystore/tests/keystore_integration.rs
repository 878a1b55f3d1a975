#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for the keystore operation surface: registration
//! limits, slot lifecycle, and the wrap → load → encrypt path end to end.

use coffre_crypto_core::AeadAlgorithm;
use coffre_keystore::{
    unwrapped_key_size, wrapped_key_size, KeySpec, Keystore, KeystoreError, SeedInput, SeedStore,
    SeedType, MAX_CLIENTS, MAX_SLOTS_PER_CLIENT,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn keystore() -> Keystore {
    let seeds = SeedStore::provision(
        SeedInput::versioned(vec![(1, [0xD1; 32]), (2, [0xD2; 32])]),
        Some(SeedInput::single([0x05; 32])),
    )
    .unwrap();
    Keystore::new(seeds)
}

fn client_id(byte: u8) -> [u8; 32] {
    [byte; 32]
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn client_capacity_is_enforced_and_recovered() {
    let ks = keystore();
    let tickets: Vec<_> = (0..MAX_CLIENTS)
        .map(|i| ks.register(&client_id(i as u8), SeedType::Device).unwrap())
        .collect();
    assert!(matches!(
        ks.register(&client_id(0xFF), SeedType::Device),
        Err(KeystoreError::ResourceExhausted(_))
    ));

    ks.unregister(tickets[0]).unwrap();
    ks.register(&client_id(0xFF), SeedType::Device).unwrap();
}

#[test]
fn tickets_are_session_scoped_not_identity_scoped() {
    let ks = keystore();
    let a = ks.register(&client_id(1), SeedType::Device).unwrap();
    let b = ks.register(&client_id(1), SeedType::Device).unwrap();
    assert_ne!(a, b);

    // Both sessions derive the same client key: a key wrapped through one
    // ticket loads through the other.
    let wrapped = ks.wrap_key(a, KeySpec::Aes256, &[0x11; 32]).unwrap();
    ks.load_key(b, &wrapped).unwrap();
}

// ---------------------------------------------------------------------------
// Slot lifecycle
// ---------------------------------------------------------------------------

#[test]
fn slot_capacity_and_reuse() {
    let ks = keystore();
    let ticket = ks.register(&client_id(2), SeedType::Device).unwrap();
    let wrapped = ks.generate_key(ticket, KeySpec::Aes128).unwrap();

    let slots: Vec<_> = (0..MAX_SLOTS_PER_CLIENT)
        .map(|_| ks.load_key(ticket, &wrapped).unwrap())
        .collect();
    assert_eq!(slots, (0..MAX_SLOTS_PER_CLIENT).collect::<Vec<_>>());
    assert!(matches!(
        ks.load_key(ticket, &wrapped),
        Err(KeystoreError::ResourceExhausted(_))
    ));

    // Freeing a middle slot makes exactly that id usable again.
    ks.unload_key(ticket, 7).unwrap();
    assert_eq!(ks.load_key(ticket, &wrapped).unwrap(), 7);
}

#[test]
fn unload_then_use_is_not_found() {
    let ks = keystore();
    let ticket = ks.register(&client_id(3), SeedType::Device).unwrap();
    let wrapped = ks.generate_key(ticket, KeySpec::Aes256).unwrap();
    let slot = ks.load_key(ticket, &wrapped).unwrap();
    ks.unload_key(ticket, slot).unwrap();
    assert!(matches!(
        ks.encrypt(ticket, slot, AeadAlgorithm::AesGcm, &[0; 12], b"x"),
        Err(KeystoreError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Wrap → load → encrypt end to end
// ---------------------------------------------------------------------------

#[test]
fn full_data_path_round_trip() {
    let ks = keystore();
    let ticket = ks.register(&client_id(4), SeedType::User).unwrap();

    for (spec, algo, iv_len) in [
        (KeySpec::Aes128, AeadAlgorithm::AesGcm, 12),
        (KeySpec::Aes128, AeadAlgorithm::AesCcm, 13),
        (KeySpec::Aes256, AeadAlgorithm::AesGcm, 12),
        (KeySpec::Aes256, AeadAlgorithm::AesCcm, 13),
    ] {
        let wrapped = ks.generate_key(ticket, spec).unwrap();
        assert_eq!(wrapped.len(), wrapped_key_size(spec));
        assert_eq!(unwrapped_key_size(wrapped.len()).unwrap(), spec.key_len());

        let slot = ks.load_key(ticket, &wrapped).unwrap();
        let iv = vec![0x3C; iv_len];
        let ct = ks.encrypt(ticket, slot, algo, &iv, b"application record").unwrap();
        let pt = ks.decrypt(ticket, slot, algo, &iv, &ct).unwrap();
        assert_eq!(pt.expose(), b"application record");
        ks.unload_key(ticket, slot).unwrap();
    }
}

#[test]
fn ciphertext_does_not_decrypt_under_a_different_slot_key() {
    let ks = keystore();
    let ticket = ks.register(&client_id(5), SeedType::Device).unwrap();
    let slot_a = ks
        .load_key(ticket, &ks.generate_key(ticket, KeySpec::Aes256).unwrap())
        .unwrap();
    let slot_b = ks
        .load_key(ticket, &ks.generate_key(ticket, KeySpec::Aes256).unwrap())
        .unwrap();

    let iv = [0x44; 12];
    let ct = ks.encrypt(ticket, slot_a, AeadAlgorithm::AesGcm, &iv, b"secret").unwrap();
    assert!(matches!(
        ks.decrypt(ticket, slot_b, AeadAlgorithm::AesGcm, &iv, &ct),
        Err(KeystoreError::AuthenticationFailed)
    ));
}

#[test]
fn highest_svn_seed_governs_derivation() {
    // A keystore provisioned with only the SVN-2 seed derives identically
    // to one provisioned with both candidates.
    let both = keystore();
    let only_latest = Keystore::new(
        SeedStore::provision(SeedInput::single([0xD2; 32]), None).unwrap(),
    );

    let t1 = both.register(&client_id(6), SeedType::Device).unwrap();
    let t2 = only_latest.register(&client_id(6), SeedType::Device).unwrap();
    let wrapped = both.wrap_key(t1, KeySpec::Aes128, &[0x21; 16]).unwrap();
    only_latest.load_key(t2, &wrapped).unwrap();
}
