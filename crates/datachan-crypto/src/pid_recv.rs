use std::sync::Arc;

use datachan_core::{PacketId, PacketIdForm, ReplayMode, SessionStats, StatKind};
use datachan_dsa::{ReplayVerdict, ReplayWindow};

/// Receive-side settings, kept on the instance and applied to each new
/// key generation.
#[derive(Debug, Clone)]
pub(crate) struct RecvConfig {
    pub(crate) mode: ReplayMode,
    pub(crate) form: PacketIdForm,
    pub(crate) seq_backtrack: u32,
    pub(crate) time_backtrack: u32,
    pub(crate) reap_interval: u32,
    pub(crate) name: String,
    pub(crate) unit: i32,
    pub(crate) stats: Arc<SessionStats>,
}

/// Anti-replay state for one key generation.
pub(crate) struct PacketIdReceive {
    mode: ReplayMode,
    form: PacketIdForm,
    window: ReplayWindow,
}

impl PacketIdReceive {
    pub(crate) fn new(config: &RecvConfig) -> Self {
        Self {
            mode: config.mode,
            form: config.form,
            window: ReplayWindow::new(config.seq_backtrack, config.time_backtrack, config.reap_interval),
        }
    }

    #[inline(always)]
    pub(crate) fn form(&self) -> PacketIdForm {
        self.form
    }

    /// True until the first packet id is recorded.
    pub(crate) fn is_fresh(&self) -> bool {
        self.window.highest() == 0 && self.window.epoch() == 0
    }

    /// Admits or rejects `pid`, recording it when admitted. Rejections are
    /// counted into `stats`, never logged.
    #[inline]
    pub(crate) fn test_add(&mut self, pid: PacketId, now: u64, stats: &SessionStats) -> bool {
        self.window.reap(now);
        let verdict = self.window.test(pid.id, pid.time);
        if verdict.is_accept() {
            self.window.record(pid.id, pid.time, now);
            return true;
        }
        stats.inc(match verdict {
            ReplayVerdict::Replay => StatKind::Replay,
            ReplayVerdict::Backtrack => StatKind::Backtrack,
            ReplayVerdict::Expired => StatKind::Expired,
            ReplayVerdict::TimeBacktrack => StatKind::TimeBacktrack,
            ReplayVerdict::Invalid | ReplayVerdict::Accept => StatKind::InvalidPacketId,
        });
        self.mode == ReplayMode::TrackOnly && verdict != ReplayVerdict::Invalid
    }

    pub(crate) fn clear(&mut self) {
        self.window.clear();
    }
}
