//! # datachan-core: Packet-Path Foundations
//!
//! Shared vocabulary of the data channel: the error taxonomy, the fixed
//! headroom packet buffer, the packet-id wire codec, configuration and the
//! statistics sink.

pub mod buffer;
pub mod config;
pub mod error;
pub mod packet_id;
pub mod stats;

pub use buffer::PacketBuf;
pub use config::{DataChannelConfig, ReplayMode};
pub use error::{BufferError, DcError, DecryptStatus};
pub use packet_id::{PacketId, PacketIdForm, PacketIdSend};
pub use stats::{SessionStats, StatKind};
