//! Shared fixtures: keyed instance pairs and packet helpers.
#![allow(dead_code)]

use datachan_core::{PacketBuf, PacketIdForm, ReplayMode, SessionStats};
use datachan_crypto::{AlgorithmContext, RekeyType, SessionInstance, StaticKey};
use std::sync::Arc;

pub const NOW: u64 = 1_700_000_000;

/// Key material for one direction. 64 bytes covers every cipher key plus the
/// AEAD nonce salt, and the longest HMAC key.
pub struct DirectionMaterial {
    pub cipher: StaticKey,
    pub hmac: StaticKey,
}

impl DirectionMaterial {
    pub fn random() -> Self {
        Self { cipher: StaticKey::random(64), hmac: StaticKey::random(64) }
    }
}

/// Stages one generation: `tx` for encrypt, `rx` for decrypt.
pub fn stage(inst: &mut SessionInstance, tx: &DirectionMaterial, rx: &DirectionMaterial) {
    inst.init_encrypt_cipher(&tx.cipher).expect("encrypt cipher key");
    inst.init_encrypt_hmac(&tx.hmac).expect("encrypt hmac key");
    inst.init_decrypt_cipher(&rx.cipher).expect("decrypt cipher key");
    inst.init_decrypt_hmac(&rx.hmac).expect("decrypt hmac key");
}

pub fn configure_pids(inst: &mut SessionInstance, form: PacketIdForm, mode: ReplayMode, stats: Arc<SessionStats>) {
    inst.init_encrypt_pid_send(form);
    inst.init_decrypt_pid_recv(mode, form, 64, 15, "test", inst.key_id() as i32, stats)
        .expect("receive window config");
}

/// Two peers sharing one activated generation. Returns both sides and
/// their statistics sinks.
pub fn keyed_pair(
    ctx: &Arc<AlgorithmContext>,
    form: PacketIdForm,
    mode: ReplayMode,
) -> (SessionInstance, SessionInstance, Arc<SessionStats>, Arc<SessionStats>) {
    let a_to_b = DirectionMaterial::random();
    let b_to_a = DirectionMaterial::random();
    let (a_stats, b_stats) = (SessionStats::new(), SessionStats::new());

    let mut a = ctx.new_obj(0).expect("instance a");
    let mut b = ctx.new_obj(0).expect("instance b");
    configure_pids(&mut a, form, mode, a_stats.clone());
    configure_pids(&mut b, form, mode, b_stats.clone());
    stage(&mut a, &a_to_b, &b_to_a);
    stage(&mut b, &b_to_a, &a_to_b);
    a.rekey(RekeyType::ActivatePrimary).expect("activate a");
    b.rekey(RekeyType::ActivatePrimary).expect("activate b");
    (a, b, a_stats, b_stats)
}

/// A buffer with room for the worst-case framing of `ctx`.
pub fn packet(ctx: &AlgorithmContext, payload: &[u8]) -> PacketBuf {
    let room = ctx.encap_overhead();
    PacketBuf::with_payload(room, payload, room)
}

/// Encrypts `payload` and returns the wire bytes.
pub fn seal(inst: &mut SessionInstance, payload: &[u8], now: u64) -> Vec<u8> {
    let ctx = Arc::clone(inst.context());
    let mut buf = packet(&ctx, payload);
    inst.encrypt(&mut buf, now).expect("encrypt");
    buf.as_slice().to_vec()
}

/// Wraps received wire bytes in a fresh buffer.
pub fn wire(bytes: &[u8]) -> PacketBuf {
    PacketBuf::with_payload(0, bytes, 0)
}
