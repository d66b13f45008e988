use datachan_core::DcError;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::AeadState;
use crate::chm::ChmState;
use crate::context::Transform;
use crate::static_key::StaticKey;

/// Key material for one direction of one key generation.
#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub(crate) struct DirectionKeys {
    /// Exactly `key_length` bytes of the negotiated cipher.
    pub(crate) cipher: Option<StaticKey>,
    /// Exactly the digest output length.
    pub(crate) hmac: Option<StaticKey>,
    /// Implicit AEAD nonce tail.
    pub(crate) nonce_salt: [u8; 8],
}

impl DirectionKeys {
    pub(crate) fn has_cipher(&self) -> bool {
        self.cipher.is_some()
    }

    pub(crate) fn has_hmac(&self) -> bool {
        self.hmac.is_some()
    }
}

/// Keyed primitives for one direction of a live generation, built once from
/// `DirectionKeys` at activation.
pub(crate) enum DirectionState {
    Aead(AeadState),
    Chm(ChmState),
}

impl DirectionState {
    pub(crate) fn prepare(transform: Transform, keys: &DirectionKeys) -> Result<Self, DcError> {
        Ok(match transform {
            Transform::Aead(alg) => DirectionState::Aead(AeadState::new(alg, keys)?),
            Transform::Chm { cipher, digest } => DirectionState::Chm(ChmState::new(cipher, digest, keys)?),
        })
    }
}
