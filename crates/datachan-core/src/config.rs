use serde::Deserialize;
use std::path::Path;

use crate::error::DcError;
use crate::packet_id::{PacketIdForm, DEFAULT_WRAP_MARGIN};

pub const MAX_SEQ_BACKTRACK: u32 = 65_536;
pub const MAX_TIME_BACKTRACK: u32 = 600;

/// What the receive window does with a rejected id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayMode {
    /// Reject replays and ids outside the window.
    #[default]
    Enforce,
    /// Count rejections but let the packet through.
    TrackOnly,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct DataChannelConfig {
    pub cipher: String,
    pub digest: String,
    pub pid_form: PacketIdForm,
    pub replay_mode: ReplayMode,
    pub seq_backtrack: u32,
    /// Seconds; 0 disables time-based expiry.
    pub time_backtrack: u32,
    pub wrap_margin: u32,
    /// Seconds between expiry sweeps of the receive window.
    pub reap_interval: u32,
}

impl Default for DataChannelConfig {
    fn default() -> Self {
        Self {
            cipher: "AES-256-GCM".to_string(),
            digest: "NONE".to_string(),
            pid_form: PacketIdForm::Short,
            replay_mode: ReplayMode::Enforce,
            seq_backtrack: 64,
            time_backtrack: 15,
            wrap_margin: DEFAULT_WRAP_MARGIN,
            reap_interval: 5,
        }
    }
}

impl DataChannelConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, DcError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DcError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("DataChannelConfig: loading {}", path.as_ref().display());
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), DcError> {
        if self.seq_backtrack > MAX_SEQ_BACKTRACK {
            return Err(DcError::Config(format!(
                "seq_backtrack {} exceeds {}",
                self.seq_backtrack, MAX_SEQ_BACKTRACK
            )));
        }
        if self.time_backtrack > MAX_TIME_BACKTRACK {
            return Err(DcError::Config(format!(
                "time_backtrack {} exceeds {}",
                self.time_backtrack, MAX_TIME_BACKTRACK
            )));
        }
        if self.reap_interval == 0 {
            return Err(DcError::Config("reap_interval must be non-zero".to_string()));
        }
        Ok(())
    }
}
