use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Named counters fed by the data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum StatKind {
    PacketsEncrypted,
    PacketsDecrypted,
    /// Exact duplicate of an id still inside the window.
    Replay,
    /// Id older than the sequence backtrack allows.
    Backtrack,
    /// Id inside the window whose slot aged past the time backtrack.
    Expired,
    /// Long-form sender timestamp moved backwards.
    TimeBacktrack,
    InvalidPacketId,
    AuthFailed,
    DecryptFailed,
    KeyExhaustionHint,
}

const STAT_KINDS: usize = StatKind::KeyExhaustionHint as usize + 1;

impl StatKind {
    pub const ALL: [StatKind; STAT_KINDS] = [
        StatKind::PacketsEncrypted,
        StatKind::PacketsDecrypted,
        StatKind::Replay,
        StatKind::Backtrack,
        StatKind::Expired,
        StatKind::TimeBacktrack,
        StatKind::InvalidPacketId,
        StatKind::AuthFailed,
        StatKind::DecryptFailed,
        StatKind::KeyExhaustionHint,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            StatKind::PacketsEncrypted => "packets_encrypted",
            StatKind::PacketsDecrypted => "packets_decrypted",
            StatKind::Replay => "replay",
            StatKind::Backtrack => "backtrack",
            StatKind::Expired => "expired",
            StatKind::TimeBacktrack => "time_backtrack",
            StatKind::InvalidPacketId => "invalid_packet_id",
            StatKind::AuthFailed => "auth_failed",
            StatKind::DecryptFailed => "decrypt_failed",
            StatKind::KeyExhaustionHint => "key_exhaustion_hint",
        }
    }
}

/// Statistics sink shared by the instances of one session.
///
/// ## Mechanical Sympathy
/// Counters are independent relaxed atomics: bumping one never orders
/// against the packet data, so the hot path pays a single `lock xadd`.
#[derive(Debug, Default)]
pub struct SessionStats {
    counters: [AtomicU64; STAT_KINDS],
}

impl SessionStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline(always)]
    pub fn inc(&self, kind: StatKind) {
        self.counters[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, kind: StatKind) -> u64 {
        self.counters[kind as usize].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter with its name.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        StatKind::ALL.iter().map(|k| (k.name(), self.get(*k))).collect()
    }
}
