//! # datachan
//!
//! Data channel packet crypto for a VPN-style tunnel: negotiated algorithm
//! pairing, per-key-id session instances with two key slots, packet-id
//! sequencing and a sliding replay window.

pub use datachan_core as base;
pub use datachan_crypto as crypto;
pub use datachan_dsa as dsa;

pub use datachan_core::{
    DataChannelConfig, DcError, DecryptStatus, PacketBuf, PacketIdForm, ReplayMode, SessionStats, StatKind,
};
pub use datachan_crypto::{
    AlgorithmContext, CryptoAlg, EngineFactory, RekeyType, RustCryptoFactory, SessionInstance, SlotState, StaticKey,
};
