//! # SessionInstance: the packet hot path
//!
//! ## Key generations
//! ```text
//!   init_*  ──► staged ──ACTIVATE_PRIMARY──► Primary            (NoKeys → PrimaryOnly)
//!   init_*  ──► staged ──ACTIVATE_PRIMARY──► Secondary          (PrimaryOnly → PrimaryAndSecondary)
//!   PROMOTE_SECONDARY_TO_PRIMARY: Primary ⇄ Secondary
//!   DEACTIVATE_SECONDARY:         Secondary erased              (→ PrimaryOnly)
//!   DEACTIVATE_ALL:               everything erased             (→ NoKeys)
//! ```
//!
//! Encryption always uses the Primary. Decryption tries the Primary and, on
//! an authentication failure, the Secondary, so packets in flight across a
//! key switch are not lost.

use std::sync::Arc;

use datachan_core::config::MAX_SEQ_BACKTRACK;
use datachan_core::packet_id::DEFAULT_WRAP_MARGIN;
use datachan_core::{
    BufferError, DataChannelConfig, DcError, DecryptStatus, PacketBuf, PacketId, PacketIdForm, PacketIdSend, ReplayMode,
    SessionStats, StatKind,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use zeroize::Zeroize;

use crate::aead;
use crate::chm;
use crate::context::AlgorithmContext;
use crate::keys::{DirectionKeys, DirectionState};
use crate::pid_recv::{PacketIdReceive, RecvConfig};
use crate::static_key::StaticKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RekeyType {
    ActivatePrimary,
    DeactivateSecondary,
    PromoteSecondaryToPrimary,
    DeactivateAll,
}

impl RekeyType {
    pub const fn name(self) -> &'static str {
        match self {
            RekeyType::ActivatePrimary => "ACTIVATE_PRIMARY",
            RekeyType::DeactivateSecondary => "DEACTIVATE_SECONDARY",
            RekeyType::PromoteSecondaryToPrimary => "PROMOTE_SECONDARY_TO_PRIMARY",
            RekeyType::DeactivateAll => "DEACTIVATE_ALL",
        }
    }
}

/// Occupancy of the two key slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    NoKeys,
    PrimaryOnly,
    PrimaryAndSecondary,
}

impl SlotState {
    pub const fn name(self) -> &'static str {
        match self {
            SlotState::NoKeys => "NoKeys",
            SlotState::PrimaryOnly => "PrimaryOnly",
            SlotState::PrimaryAndSecondary => "PrimaryAndSecondary",
        }
    }
}

/// One live key generation: both directions, keyed once at activation, plus
/// their packet-id state.
struct KeyGeneration {
    encrypt: DirectionState,
    decrypt: DirectionState,
    send: PacketIdSend,
    recv: PacketIdReceive,
    /// CBC IV source.
    rng: StdRng,
    /// Send-side settings may still be replaced until this flips.
    has_sent: bool,
    exhaustion_reported: bool,
}

impl KeyGeneration {
    /// Clears replay state and drops the key schedules, which erase
    /// themselves on drop.
    fn retire(mut self) {
        self.recv.clear();
    }

    #[inline]
    fn seal(&mut self, pid: PacketId, buf: &mut PacketBuf) -> Result<(), DcError> {
        let form = self.send.form();
        match &self.encrypt {
            DirectionState::Aead(state) => aead::seal(state, pid, form, buf),
            DirectionState::Chm(state) => chm::seal(state, &mut self.rng, pid, form, buf),
        }
    }

    #[inline]
    fn open(&mut self, buf: &mut PacketBuf, now: u64, stats: &SessionStats) -> DecryptStatus {
        let form = self.recv.form();
        let opened = match &self.decrypt {
            DirectionState::Aead(state) => aead::open(state, form, buf),
            DirectionState::Chm(state) => chm::open(state, form, buf),
        };
        let pid = match opened {
            Ok(pid) => pid,
            Err(status) => return status,
        };
        if self.recv.test_add(pid, now, stats) {
            DecryptStatus::Success
        } else {
            DecryptStatus::ReplayDetected
        }
    }
}

/// Per-key-id data channel state.
///
/// Driven by one packet path at a time: every mutating call takes
/// `&mut self` and nothing inside locks.
pub struct SessionInstance {
    ctx: Arc<AlgorithmContext>,
    key_id: u32,
    staged_encrypt: DirectionKeys,
    staged_decrypt: DirectionKeys,
    send_form: PacketIdForm,
    send_resume: u32,
    wrap_margin: u32,
    recv_config: RecvConfig,
    primary: Option<KeyGeneration>,
    secondary: Option<KeyGeneration>,
}

impl SessionInstance {
    pub(crate) fn new(ctx: Arc<AlgorithmContext>, key_id: u32) -> Self {
        let defaults = DataChannelConfig::default();
        Self {
            ctx,
            key_id,
            staged_encrypt: DirectionKeys::default(),
            staged_decrypt: DirectionKeys::default(),
            send_form: PacketIdForm::Short,
            send_resume: 0,
            wrap_margin: DEFAULT_WRAP_MARGIN,
            recv_config: RecvConfig {
                mode: defaults.replay_mode,
                form: PacketIdForm::Short,
                seq_backtrack: defaults.seq_backtrack,
                time_backtrack: defaults.time_backtrack,
                reap_interval: defaults.reap_interval,
                name: "data".to_string(),
                unit: key_id as i32,
                stats: SessionStats::new(),
            },
            primary: None,
            secondary: None,
        }
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn context(&self) -> &Arc<AlgorithmContext> {
        &self.ctx
    }

    pub fn cipher_defined(&self) -> bool {
        self.ctx.cipher_defined()
    }

    pub fn digest_defined(&self) -> bool {
        self.ctx.digest_defined()
    }

    pub fn slot_state(&self) -> SlotState {
        match (&self.primary, &self.secondary) {
            (None, _) => SlotState::NoKeys,
            (Some(_), None) => SlotState::PrimaryOnly,
            (Some(_), Some(_)) => SlotState::PrimaryAndSecondary,
        }
    }

    /// Last packet id sent under the Primary generation.
    pub fn last_sent_packet_id(&self) -> Option<u32> {
        self.primary.as_ref().map(|g| g.send.last())
    }

    pub fn stats(&self) -> &Arc<SessionStats> {
        &self.recv_config.stats
    }

    // Encrypt/Decrypt

    /// Frames and encrypts `buf` in place under the Primary generation.
    ///
    /// Returns `true` once the send counter is inside the wrap margin: the
    /// caller must rekey before the counter runs out.
    pub fn encrypt(&mut self, buf: &mut PacketBuf, now: u64) -> Result<bool, DcError> {
        let generation = self.primary.as_mut().ok_or(DcError::NoKey)?;
        let form = generation.send.form();

        let (head, tail) = self.ctx.framing(form);
        if buf.headroom() < head {
            return Err(BufferError::HeadroomExhausted { needed: head, available: buf.headroom() }.into());
        }
        if buf.tailroom() < tail {
            return Err(BufferError::TailroomExhausted { needed: tail, available: buf.tailroom() }.into());
        }

        let pid = generation.send.next(now)?;
        generation.has_sent = true;
        generation.seal(pid, buf)?;
        self.recv_config.stats.inc(StatKind::PacketsEncrypted);

        let exhausted = generation.send.wrap_warning();
        if exhausted && !generation.exhaustion_reported {
            generation.exhaustion_reported = true;
            self.recv_config.stats.inc(StatKind::KeyExhaustionHint);
            tracing::warn!(
                "{}[{}]: packet id {} inside wrap margin, rekey required (key_id {})",
                self.recv_config.name,
                self.recv_config.unit,
                pid.id,
                self.key_id
            );
        }
        Ok(exhausted)
    }

    /// Authenticates, decrypts and replay-checks `buf` in place.
    pub fn decrypt(&mut self, buf: &mut PacketBuf, now: u64) -> DecryptStatus {
        let stats = &self.recv_config.stats;
        let Some(primary) = self.primary.as_mut() else {
            return DecryptStatus::NoKey;
        };

        let mut status = primary.open(buf, now, stats);
        if status == DecryptStatus::AuthenticationFailed {
            if let Some(secondary) = self.secondary.as_mut() {
                status = secondary.open(buf, now, stats);
            }
        }

        match status {
            DecryptStatus::Success => self.recv_config.stats.inc(StatKind::PacketsDecrypted),
            DecryptStatus::AuthenticationFailed => {
                self.recv_config.stats.inc(StatKind::AuthFailed);
                tracing::debug!(
                    "{}[{}]: packet authentication failed (key_id {})",
                    self.recv_config.name,
                    self.recv_config.unit,
                    self.key_id
                );
            }
            DecryptStatus::DecryptFailed => {
                self.recv_config.stats.inc(StatKind::DecryptFailed);
                tracing::debug!(
                    "{}[{}]: packet decrypt failed (key_id {})",
                    self.recv_config.name,
                    self.recv_config.unit,
                    self.key_id
                );
            }
            DecryptStatus::ReplayDetected | DecryptStatus::NoKey => {}
        }
        status
    }

    // Initialization

    fn load_cipher(ctx: &AlgorithmContext, key: &StaticKey, into: &mut DirectionKeys) -> Result<(), DcError> {
        if !ctx.cipher_defined() {
            return Ok(());
        }
        let len = ctx.key_size();
        let cipher = key.prefix(len).ok_or(DcError::KeyLength { expected: len, actual: key.len() })?;
        if ctx.is_aead() {
            into.nonce_salt = [0u8; 8];
            if let Some(salt) = key.as_bytes().get(len..len + 8) {
                into.nonce_salt.copy_from_slice(salt);
            }
        }
        if let Some(mut superseded) = into.cipher.replace(cipher) {
            superseded.wipe();
        }
        Ok(())
    }

    fn load_hmac(ctx: &AlgorithmContext, key: &StaticKey, into: &mut DirectionKeys) -> Result<(), DcError> {
        if !ctx.digest_defined() {
            return Ok(());
        }
        let len = ctx.digest().key_length();
        let hmac = key.prefix(len).ok_or(DcError::KeyLength { expected: len, actual: key.len() })?;
        if let Some(mut superseded) = into.hmac.replace(hmac) {
            superseded.wipe();
        }
        Ok(())
    }

    pub fn init_encrypt_cipher(&mut self, key: &StaticKey) -> Result<(), DcError> {
        Self::load_cipher(&self.ctx, key, &mut self.staged_encrypt)
    }

    /// No-op for AEAD pairings and a `NONE` digest.
    pub fn init_encrypt_hmac(&mut self, key: &StaticKey) -> Result<(), DcError> {
        Self::load_hmac(&self.ctx, key, &mut self.staged_encrypt)
    }

    pub fn init_decrypt_cipher(&mut self, key: &StaticKey) -> Result<(), DcError> {
        Self::load_cipher(&self.ctx, key, &mut self.staged_decrypt)
    }

    /// No-op for AEAD pairings and a `NONE` digest.
    pub fn init_decrypt_hmac(&mut self, key: &StaticKey) -> Result<(), DcError> {
        Self::load_hmac(&self.ctx, key, &mut self.staged_decrypt)
    }

    /// Re-applies the send-side settings to live generations that have not
    /// sent a packet yet. `restart_at` replaces their counter; `None` keeps it.
    fn refresh_send(&mut self, restart_at: Option<u32>) {
        let (form, margin) = (self.send_form, self.wrap_margin);
        let mut applied = false;
        for generation in [self.primary.as_mut(), self.secondary.as_mut()].into_iter().flatten() {
            if generation.has_sent {
                continue;
            }
            let last = restart_at.unwrap_or_else(|| generation.send.last());
            generation.send = PacketIdSend::resume(form, margin, last);
            applied = true;
        }
        if applied && restart_at.is_some() {
            self.send_resume = 0;
        }
    }

    /// Re-applies the receive-side settings to live generations whose window
    /// is still empty.
    fn refresh_recv(&mut self) {
        let config = &self.recv_config;
        for generation in [self.primary.as_mut(), self.secondary.as_mut()].into_iter().flatten() {
            if generation.recv.is_fresh() {
                generation.recv = PacketIdReceive::new(config);
            }
        }
    }

    /// Sets the outgoing packet-id form. Takes effect for the staged
    /// generation and for any live generation that has not sent yet; a
    /// generation already sending keeps its form until it is replaced.
    pub fn init_encrypt_pid_send(&mut self, form: PacketIdForm) {
        self.send_form = form;
        self.send_resume = 0;
        self.refresh_send(Some(0));
    }

    /// Like `init_encrypt_pid_send`, but the counter continues from a last
    /// emitted id of `last_id`.
    pub fn init_encrypt_pid_send_from(&mut self, form: PacketIdForm, last_id: u32) {
        self.send_form = form;
        self.send_resume = last_id;
        self.refresh_send(Some(last_id));
    }

    /// Distance from `u32::MAX` at which `encrypt` starts returning `true`.
    pub fn set_wrap_margin(&mut self, margin: u32) {
        self.wrap_margin = margin;
        self.refresh_send(None);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn init_decrypt_pid_recv(
        &mut self,
        mode: ReplayMode,
        form: PacketIdForm,
        seq_backtrack: u32,
        time_backtrack: u32,
        name: &str,
        unit: i32,
        stats: Arc<SessionStats>,
    ) -> Result<(), DcError> {
        if seq_backtrack > MAX_SEQ_BACKTRACK {
            return Err(DcError::Config(format!(
                "seq_backtrack {} exceeds {}",
                seq_backtrack, MAX_SEQ_BACKTRACK
            )));
        }
        let reap_interval = self.recv_config.reap_interval;
        self.recv_config = RecvConfig {
            mode,
            form,
            seq_backtrack,
            time_backtrack,
            reap_interval,
            name: name.to_string(),
            unit,
            stats,
        };
        self.refresh_recv();
        Ok(())
    }

    /// Applies the packet-id settings of `config` to both directions.
    pub fn init_pid_from_config(
        &mut self,
        config: &DataChannelConfig,
        name: &str,
        unit: i32,
        stats: Arc<SessionStats>,
    ) -> Result<(), DcError> {
        config.validate()?;
        self.wrap_margin = config.wrap_margin;
        self.init_encrypt_pid_send(config.pid_form);
        self.recv_config.reap_interval = config.reap_interval;
        self.init_decrypt_pid_recv(
            config.replay_mode,
            config.pid_form,
            config.seq_backtrack,
            config.time_backtrack,
            name,
            unit,
            stats,
        )
    }

    // Rekeying

    /// Moves the staged keys into a live generation. Every key the pairing
    /// needs must have been installed.
    fn take_staged(&mut self) -> Result<KeyGeneration, DcError> {
        let need_cipher = self.ctx.cipher_defined();
        let need_hmac = self.ctx.digest_defined();
        let complete = |keys: &DirectionKeys| (!need_cipher || keys.has_cipher()) && (!need_hmac || keys.has_hmac());
        if !complete(&self.staged_encrypt) || !complete(&self.staged_decrypt) {
            tracing::error!(
                "{}[{}]: ACTIVATE_PRIMARY with incomplete key material (key_id {})",
                self.recv_config.name,
                self.recv_config.unit,
                self.key_id
            );
            return Err(DcError::NoKey);
        }

        let transform = self.ctx.transform();
        let encrypt = DirectionState::prepare(transform, &self.staged_encrypt)?;
        let decrypt = DirectionState::prepare(transform, &self.staged_decrypt)?;
        self.staged_encrypt.zeroize();
        self.staged_decrypt.zeroize();

        Ok(KeyGeneration {
            encrypt,
            decrypt,
            send: PacketIdSend::resume(self.send_form, self.wrap_margin, core::mem::take(&mut self.send_resume)),
            recv: PacketIdReceive::new(&self.recv_config),
            rng: StdRng::from_entropy(),
            has_sent: false,
            exhaustion_reported: false,
        })
    }

    fn wipe_all(&mut self) {
        if let Some(generation) = self.primary.take() {
            generation.retire();
        }
        if let Some(generation) = self.secondary.take() {
            generation.retire();
        }
        self.staged_encrypt.zeroize();
        self.staged_decrypt.zeroize();
        self.send_resume = 0;
    }

    /// Applies a rekey transition. Transitions that are not legal from the
    /// current slot state fail with `DcError::InvalidRekey` and change nothing.
    pub fn rekey(&mut self, kind: RekeyType) -> Result<(), DcError> {
        let from = self.slot_state();
        match (kind, from) {
            (RekeyType::ActivatePrimary, SlotState::NoKeys) => {
                self.primary = Some(self.take_staged()?);
            }
            (RekeyType::ActivatePrimary, SlotState::PrimaryOnly) => {
                self.secondary = Some(self.take_staged()?);
            }
            (RekeyType::PromoteSecondaryToPrimary, SlotState::PrimaryAndSecondary) => {
                core::mem::swap(&mut self.primary, &mut self.secondary);
            }
            (RekeyType::DeactivateSecondary, SlotState::PrimaryAndSecondary) => {
                if let Some(generation) = self.secondary.take() {
                    generation.retire();
                }
            }
            (RekeyType::DeactivateAll, _) => self.wipe_all(),
            _ => {
                tracing::error!(
                    "{}[{}]: illegal rekey {} in state {} (key_id {})",
                    self.recv_config.name,
                    self.recv_config.unit,
                    kind.name(),
                    from.name(),
                    self.key_id
                );
                return Err(DcError::InvalidRekey { from: from.name(), requested: kind.name() });
            }
        }

        tracing::info!(
            "{}[{}]: {} ({} -> {}, key_id {})",
            self.recv_config.name,
            self.recv_config.unit,
            kind.name(),
            from.name(),
            self.slot_state().name(),
            self.key_id
        );
        Ok(())
    }
}

impl core::fmt::Debug for SessionInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionInstance")
            .field("key_id", &self.key_id)
            .field("pairing", &self.ctx.options_string())
            .field("slots", &self.slot_state())
            .finish()
    }
}
