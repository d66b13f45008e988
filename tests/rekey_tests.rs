//! # Crypto Layer Tests: Rekey State Machine
//!
//! Validates Primary/Secondary slot transitions, continuity of traffic across
//! a key switch, rejection of illegal transitions and key erasure.

mod common;

use common::{configure_pids, keyed_pair, seal, stage, wire, DirectionMaterial, NOW};
use datachan_core::{DcError, DecryptStatus, PacketIdForm, ReplayMode, SessionStats, StatKind};
use datachan_crypto::{CryptoAlg, EngineFactory, RekeyType, RustCryptoFactory, SlotState, StaticKey};
use std::time::Instant;

/// Old-key traffic keeps flowing while a new generation is staged,
/// promoted and finally retired.
#[test]
fn test_rekey_continuity() {
    let t = Instant::now();
    let factory = RustCryptoFactory::new();

    for (cipher, digest) in [
        (CryptoAlg::Aes256Gcm, CryptoAlg::None),
        (CryptoAlg::Aes128Cbc, CryptoAlg::Sha256),
    ] {
        let ctx = factory.new_obj(cipher, digest).expect("resolves");
        let (mut a, mut b, _, _) = keyed_pair(&ctx, PacketIdForm::Short, ReplayMode::Enforce);
        assert_eq!(a.slot_state(), SlotState::PrimaryOnly);

        let gen1_early = seal(&mut a, b"gen1 early", NOW);
        assert_eq!(b.decrypt(&mut wire(&gen1_early), NOW), DecryptStatus::Success);

        // Stage and activate generation 2 as Secondary on both peers.
        let (ab2, ba2) = (DirectionMaterial::random(), DirectionMaterial::random());
        stage(&mut a, &ab2, &ba2);
        stage(&mut b, &ba2, &ab2);
        a.rekey(RekeyType::ActivatePrimary).expect("stage gen2 on a");
        b.rekey(RekeyType::ActivatePrimary).expect("stage gen2 on b");
        assert_eq!(a.slot_state(), SlotState::PrimaryAndSecondary);

        // Primary still encrypts with generation 1.
        let gen1_mid = seal(&mut a, b"gen1 mid", NOW);
        let gen1_late = seal(&mut a, b"gen1 late", NOW);
        assert_eq!(b.decrypt(&mut wire(&gen1_mid), NOW), DecryptStatus::Success);

        a.rekey(RekeyType::PromoteSecondaryToPrimary).expect("promote a");
        b.rekey(RekeyType::PromoteSecondaryToPrimary).expect("promote b");

        let gen2 = seal(&mut a, b"gen2", NOW);
        let mut buf = wire(&gen2);
        assert_eq!(b.decrypt(&mut buf, NOW), DecryptStatus::Success, "{}", ctx.options_string());
        assert_eq!(buf.as_slice(), b"gen2");
        assert_eq!(a.last_sent_packet_id(), Some(1), "New generation restarts the counter");

        // A straggler from generation 1 is caught by the demoted slot.
        let mut buf = wire(&gen1_late);
        assert_eq!(b.decrypt(&mut buf, NOW), DecryptStatus::Success, "{}", ctx.options_string());
        assert_eq!(buf.as_slice(), b"gen1 late");

        b.rekey(RekeyType::DeactivateSecondary).expect("retire gen1");
        assert_eq!(b.slot_state(), SlotState::PrimaryOnly);
        assert_eq!(
            b.decrypt(&mut wire(&gen1_early), NOW),
            DecryptStatus::AuthenticationFailed,
            "Retired keys no longer decrypt"
        );
    }

    println!("test_rekey_continuity: Testing Overhead = {:?}", t.elapsed());
}

/// The sender switches first: its new-key packets reach a receiver whose
/// Primary still holds the old generation.
#[test]
fn test_receiver_not_yet_promoted() {
    let t = Instant::now();
    let factory = RustCryptoFactory::new();

    for (cipher, digest) in [
        (CryptoAlg::ChaCha20Poly1305, CryptoAlg::None),
        (CryptoAlg::Aes256Cbc, CryptoAlg::Sha1),
    ] {
        let ctx = factory.new_obj(cipher, digest).expect("resolves");
        let (mut a, mut b, _, b_stats) = keyed_pair(&ctx, PacketIdForm::Short, ReplayMode::Enforce);

        let (ab2, ba2) = (DirectionMaterial::random(), DirectionMaterial::random());
        stage(&mut a, &ab2, &ba2);
        stage(&mut b, &ba2, &ab2);
        a.rekey(RekeyType::ActivatePrimary).expect("stage gen2 on a");
        b.rekey(RekeyType::ActivatePrimary).expect("stage gen2 on b");

        a.rekey(RekeyType::PromoteSecondaryToPrimary).expect("promote a");

        let gen2 = seal(&mut a, b"gen2 first", NOW);
        let mut buf = wire(&gen2);
        assert_eq!(b.decrypt(&mut buf, NOW), DecryptStatus::Success, "{}", ctx.options_string());
        assert_eq!(buf.as_slice(), b"gen2 first");
        assert_eq!(b_stats.get(StatKind::AuthFailed), 0, "Secondary retry is not an auth failure");

        // The other way round: b still sends under generation 1, which a now
        // holds as its Secondary.
        let gen1 = seal(&mut b, b"gen1 reply", NOW);
        let mut buf = wire(&gen1);
        assert_eq!(a.decrypt(&mut buf, NOW), DecryptStatus::Success, "{}", ctx.options_string());
        assert_eq!(buf.as_slice(), b"gen1 reply");

        b.rekey(RekeyType::PromoteSecondaryToPrimary).expect("promote b");
        let gen2_reply = seal(&mut b, b"gen2 reply", NOW);
        assert_eq!(a.decrypt(&mut wire(&gen2_reply), NOW), DecryptStatus::Success);
        assert_eq!(
            b.decrypt(&mut wire(&gen2), NOW),
            DecryptStatus::ReplayDetected,
            "Window travels with the generation"
        );
    }

    println!("test_receiver_not_yet_promoted: Testing Overhead = {:?}", t.elapsed());
}

#[test]
fn test_illegal_transitions_rejected() {
    let ctx = RustCryptoFactory::new().new_obj(CryptoAlg::Aes128Gcm, CryptoAlg::None).expect("resolves");
    let mut inst = ctx.new_obj(0).expect("instance");

    for kind in [RekeyType::PromoteSecondaryToPrimary, RekeyType::DeactivateSecondary] {
        match inst.rekey(kind).unwrap_err() {
            DcError::InvalidRekey { from, requested } => {
                assert_eq!(from, "NoKeys");
                assert_eq!(requested, kind.name());
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(inst.slot_state(), SlotState::NoKeys);
    }

    let material = DirectionMaterial::random();
    stage(&mut inst, &material, &material);
    inst.rekey(RekeyType::ActivatePrimary).expect("activate");

    for kind in [RekeyType::PromoteSecondaryToPrimary, RekeyType::DeactivateSecondary] {
        assert!(matches!(inst.rekey(kind), Err(DcError::InvalidRekey { from: "PrimaryOnly", .. })));
        assert_eq!(inst.slot_state(), SlotState::PrimaryOnly);
    }

    stage(&mut inst, &material, &material);
    inst.rekey(RekeyType::ActivatePrimary).expect("activate secondary");

    // A third generation needs the Secondary retired first.
    stage(&mut inst, &material, &material);
    assert!(matches!(
        inst.rekey(RekeyType::ActivatePrimary),
        Err(DcError::InvalidRekey { from: "PrimaryAndSecondary", requested: "ACTIVATE_PRIMARY" })
    ));
    assert_eq!(inst.slot_state(), SlotState::PrimaryAndSecondary);

    inst.rekey(RekeyType::DeactivateSecondary).expect("retire secondary");
    inst.rekey(RekeyType::ActivatePrimary).expect("staged generation is still there");
    assert_eq!(inst.slot_state(), SlotState::PrimaryAndSecondary);
}

#[test]
fn test_activation_requires_complete_keys() {
    let ctx = RustCryptoFactory::new().new_obj(CryptoAlg::Aes256Cbc, CryptoAlg::Sha1).expect("resolves");
    let mut inst = ctx.new_obj(0).expect("instance");

    let material = DirectionMaterial::random();
    inst.init_encrypt_cipher(&material.cipher).expect("key");
    inst.init_encrypt_hmac(&material.hmac).expect("key");
    inst.init_decrypt_cipher(&material.cipher).expect("key");

    assert!(matches!(inst.rekey(RekeyType::ActivatePrimary), Err(DcError::NoKey)), "Decrypt HMAC key missing");
    assert_eq!(inst.slot_state(), SlotState::NoKeys);

    inst.init_decrypt_hmac(&material.hmac).expect("key");
    inst.rekey(RekeyType::ActivatePrimary).expect("complete now");
    assert_eq!(inst.slot_state(), SlotState::PrimaryOnly);
}

#[test]
fn test_deactivate_all_erases_everything() {
    let t = Instant::now();

    let ctx = RustCryptoFactory::new().new_obj(CryptoAlg::ChaCha20Poly1305, CryptoAlg::None).expect("resolves");
    let (mut a, mut b, _, _) = keyed_pair(&ctx, PacketIdForm::Long, ReplayMode::Enforce);
    let sealed = seal(&mut a, b"before", NOW);

    // Leave a staged generation behind as well.
    let material = DirectionMaterial::random();
    stage(&mut b, &material, &material);

    b.rekey(RekeyType::DeactivateAll).expect("always legal");
    assert_eq!(b.slot_state(), SlotState::NoKeys);
    assert_eq!(b.decrypt(&mut wire(&sealed), NOW), DecryptStatus::NoKey);
    assert!(matches!(b.rekey(RekeyType::ActivatePrimary), Err(DcError::NoKey)), "Staged keys were wiped too");

    // Idempotent from NoKeys.
    b.rekey(RekeyType::DeactivateAll).expect("always legal");

    println!("test_deactivate_all_erases_everything: Testing Overhead = {:?}", t.elapsed());
}

#[test]
fn test_replay_window_is_per_generation() {
    let ctx = RustCryptoFactory::new().new_obj(CryptoAlg::Aes128Gcm, CryptoAlg::None).expect("resolves");
    let (mut a, mut b, _, _) = keyed_pair(&ctx, PacketIdForm::Short, ReplayMode::Enforce);

    for _ in 0..5 {
        let sealed = seal(&mut a, b"gen1", NOW);
        assert_eq!(b.decrypt(&mut wire(&sealed), NOW), DecryptStatus::Success);
    }

    let (ab2, ba2) = (DirectionMaterial::random(), DirectionMaterial::random());
    stage(&mut a, &ab2, &ba2);
    stage(&mut b, &ba2, &ab2);
    for inst in [&mut a, &mut b] {
        inst.rekey(RekeyType::ActivatePrimary).expect("activate");
        inst.rekey(RekeyType::PromoteSecondaryToPrimary).expect("promote");
    }

    // Generation 2 starts at id 1 again and is not mistaken for a replay.
    let sealed = seal(&mut a, b"gen2", NOW);
    assert_eq!(b.decrypt(&mut wire(&sealed), NOW), DecryptStatus::Success);
}

#[test]
fn test_instances_of_one_context_are_independent() {
    let ctx = RustCryptoFactory::new().new_obj(CryptoAlg::Aes256Gcm, CryptoAlg::None).expect("resolves");
    let stats = SessionStats::new();

    let mut k0 = ctx.new_obj(0).expect("instance");
    let mut k1 = ctx.new_obj(1).expect("instance");
    configure_pids(&mut k0, PacketIdForm::Short, ReplayMode::Enforce, stats.clone());
    configure_pids(&mut k1, PacketIdForm::Short, ReplayMode::Enforce, stats);

    let material = DirectionMaterial::random();
    stage(&mut k0, &material, &material);
    k0.rekey(RekeyType::ActivatePrimary).expect("activate");

    assert_eq!(k0.slot_state(), SlotState::PrimaryOnly);
    assert_eq!(k1.slot_state(), SlotState::NoKeys);
    assert!(std::sync::Arc::ptr_eq(k0.context(), k1.context()));
}

#[test]
fn test_static_key_wipe() {
    let mut key = StaticKey::new(&[0xAA; 32]);
    assert_eq!(key.len(), 32);
    assert_eq!(format!("{:?}", key), "StaticKey([REDACTED; 32])");

    key.wipe();
    assert!(key.is_empty(), "Wiped material is gone");
    assert!(key.prefix(1).is_none());
}
