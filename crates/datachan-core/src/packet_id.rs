//! # Packet-ID Wire Codec
//!
//! ```text
//! short form:  [ counter: u32 BE ]
//! long form:   [ counter: u32 BE ][ timestamp: u32 BE ]
//! ```
//!
//! The counter starts at 1. A zero counter never appears on the wire.

use bytes::{Buf, BufMut};
use serde::Deserialize;

use crate::error::DcError;

pub const SHORT_FORM_SIZE: usize = 4;
pub const LONG_FORM_SIZE: usize = 8;

/// Default distance from `u32::MAX` at which `encrypt` starts asking for a rekey.
pub const DEFAULT_WRAP_MARGIN: u32 = 0x0100_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketIdForm {
    #[default]
    Short,
    Long,
}

impl PacketIdForm {
    #[inline(always)]
    pub const fn size(self) -> usize {
        match self {
            PacketIdForm::Short => SHORT_FORM_SIZE,
            PacketIdForm::Long => LONG_FORM_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketId {
    pub id: u32,
    /// Sender timestamp; always zero in short form.
    pub time: u32,
}

impl PacketId {
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.id != 0
    }

    /// Encodes into the first `form.size()` bytes of `out`.
    /// Returns `None` when `out` is too short.
    #[inline]
    pub fn write(&self, form: PacketIdForm, out: &mut [u8]) -> Option<()> {
        if out.len() < form.size() {
            return None;
        }
        let mut cursor = &mut out[..form.size()];
        cursor.put_u32(self.id);
        if form == PacketIdForm::Long {
            cursor.put_u32(self.time);
        }
        Some(())
    }

    /// Decodes from the front of `input`.
    #[inline]
    pub fn read(form: PacketIdForm, input: &[u8]) -> Option<PacketId> {
        if input.len() < form.size() {
            return None;
        }
        let mut cursor = &input[..form.size()];
        let id = cursor.get_u32();
        let time = match form {
            PacketIdForm::Long => cursor.get_u32(),
            PacketIdForm::Short => 0,
        };
        Some(PacketId { id, time })
    }
}

/// Send-side counter for one key generation.
///
/// ## Invariant
/// Every id handed out is strictly greater than the previous one. The
/// counter never wraps: after `u32::MAX` every call fails until the key is
/// replaced.
#[derive(Debug, Clone)]
pub struct PacketIdSend {
    form: PacketIdForm,
    last: u32,
    time: u32,
    wrap_at: u64,
}

impl PacketIdSend {
    pub fn new(form: PacketIdForm, wrap_margin: u32) -> Self {
        Self::resume(form, wrap_margin, 0)
    }

    /// Continues a counter whose last emitted value was `last`.
    pub fn resume(form: PacketIdForm, wrap_margin: u32, last: u32) -> Self {
        Self {
            form,
            last,
            time: 0,
            wrap_at: u32::MAX as u64 + 1 - wrap_margin as u64,
        }
    }

    #[inline(always)]
    pub fn form(&self) -> PacketIdForm {
        self.form
    }

    /// Last id handed out (0 before the first packet).
    #[inline(always)]
    pub fn last(&self) -> u32 {
        self.last
    }

    /// Allocates the next id. In long form the timestamp is pinned to the
    /// time of the first packet sent under this key.
    #[inline]
    pub fn next(&mut self, now: u64) -> Result<PacketId, DcError> {
        if self.last == u32::MAX {
            return Err(DcError::PacketIdExhausted);
        }
        if self.form == PacketIdForm::Long && self.time == 0 {
            self.time = now as u32;
        }
        self.last += 1;
        Ok(PacketId { id: self.last, time: self.time })
    }

    /// True once the last id handed out is inside the wrap margin.
    #[inline(always)]
    pub fn wrap_warning(&self) -> bool {
        self.last as u64 >= self.wrap_at
    }
}
