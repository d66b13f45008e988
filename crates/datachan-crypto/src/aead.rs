//! # AEAD Framing
//!
//! ```text
//! [ packet-id (4|8) ][ ciphertext ][ tag (16) ]
//! nonce = counter (4, BE) || implicit salt (8)
//! aad   = packet-id field as sent
//! ```
//!
//! The explicit part of the nonce is the packet-id field itself, so no
//! separate nonce travels on the wire.

use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use datachan_core::error::BufferError;
use datachan_core::packet_id::LONG_FORM_SIZE;
use datachan_core::{DcError, DecryptStatus, PacketBuf, PacketId, PacketIdForm};
use zeroize::Zeroize;

use crate::algs::{CryptoAlg, AEAD_TAG_LEN};
use crate::in_place::{AeadStack, CryptoError};
use crate::keys::DirectionKeys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadAlg {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl AeadAlg {
    pub fn from_alg(alg: CryptoAlg) -> Option<Self> {
        match alg {
            CryptoAlg::Aes128Gcm => Some(AeadAlg::Aes128Gcm),
            CryptoAlg::Aes256Gcm => Some(AeadAlg::Aes256Gcm),
            CryptoAlg::ChaCha20Poly1305 => Some(AeadAlg::ChaCha20Poly1305),
            _ => None,
        }
    }
}

#[inline(always)]
fn nonce(id: u32, salt: &[u8; 8]) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(&id.to_be_bytes());
    nonce[4..].copy_from_slice(salt);
    nonce
}

/// One direction's AEAD, keyed once when its generation is activated.
pub(crate) enum AeadCipher {
    Aes128Gcm(Aes128Gcm),
    Aes256Gcm(Aes256Gcm),
    ChaCha20Poly1305(ChaCha20Poly1305),
}

/// Keyed AEAD plus the implicit nonce tail for one direction.
pub(crate) struct AeadState {
    cipher: AeadCipher,
    nonce_salt: [u8; 8],
}

impl AeadState {
    pub(crate) fn new(alg: AeadAlg, keys: &DirectionKeys) -> Result<Self, DcError> {
        let key = keys.cipher.as_ref().ok_or(DcError::NoKey)?.as_bytes();
        let cipher = match alg {
            AeadAlg::Aes128Gcm => AeadStack::keyed(key).map(AeadCipher::Aes128Gcm),
            AeadAlg::Aes256Gcm => AeadStack::keyed(key).map(AeadCipher::Aes256Gcm),
            AeadAlg::ChaCha20Poly1305 => AeadStack::keyed(key).map(AeadCipher::ChaCha20Poly1305),
        }
        .map_err(|_| DcError::Crypto("AEAD key rejected"))?;
        Ok(Self { cipher, nonce_salt: keys.nonce_salt })
    }

    #[inline(always)]
    fn seal_with(&self, id: u32, aad: &[u8], payload: &mut [u8], tag: &mut [u8]) -> Result<(), CryptoError> {
        let nonce = nonce(id, &self.nonce_salt);
        match &self.cipher {
            AeadCipher::Aes128Gcm(c) => AeadStack::seal(c, &nonce, aad, payload, tag),
            AeadCipher::Aes256Gcm(c) => AeadStack::seal(c, &nonce, aad, payload, tag),
            AeadCipher::ChaCha20Poly1305(c) => AeadStack::seal(c, &nonce, aad, payload, tag),
        }
    }

    #[inline(always)]
    fn open_with(&self, id: u32, aad: &[u8], payload: &mut [u8], tag: &[u8]) -> Result<(), CryptoError> {
        let nonce = nonce(id, &self.nonce_salt);
        match &self.cipher {
            AeadCipher::Aes128Gcm(c) => AeadStack::open(c, &nonce, aad, payload, tag),
            AeadCipher::Aes256Gcm(c) => AeadStack::open(c, &nonce, aad, payload, tag),
            AeadCipher::ChaCha20Poly1305(c) => AeadStack::open(c, &nonce, aad, payload, tag),
        }
    }
}

impl Drop for AeadState {
    fn drop(&mut self) {
        self.nonce_salt.zeroize();
    }
}

pub(crate) fn seal(
    state: &AeadState,
    pid: PacketId,
    form: PacketIdForm,
    buf: &mut PacketBuf,
) -> Result<(), DcError> {
    let pid_len = form.size();
    if buf.headroom() < pid_len {
        return Err(BufferError::HeadroomExhausted { needed: pid_len, available: buf.headroom() }.into());
    }

    let mut pid_bytes = [0u8; LONG_FORM_SIZE];
    pid.write(form, &mut pid_bytes);
    let aad = &pid_bytes[..pid_len];

    let msg_len = buf.len();
    let region = buf.content_with_tailroom(AEAD_TAG_LEN)?;
    let (payload, tag) = region.split_at_mut(msg_len);
    state
        .seal_with(pid.id, aad, payload, tag)
        .map_err(|_| DcError::Crypto("AEAD seal rejected"))?;

    buf.set_len(msg_len + AEAD_TAG_LEN)?;
    buf.prepend_from(aad)?;
    Ok(())
}

/// Authenticates and decrypts in place, leaving only the plaintext.
/// On `AuthenticationFailed` the buffer is untouched.
pub(crate) fn open(
    state: &AeadState,
    form: PacketIdForm,
    buf: &mut PacketBuf,
) -> Result<PacketId, DecryptStatus> {
    let pid_len = form.size();
    if buf.len() < pid_len + AEAD_TAG_LEN {
        return Err(DecryptStatus::DecryptFailed);
    }
    let pid = PacketId::read(form, buf.as_slice()).ok_or(DecryptStatus::DecryptFailed)?;

    let data = buf.as_mut_slice();
    let (aad, rest) = data.split_at_mut(pid_len);
    let ct_len = rest.len() - AEAD_TAG_LEN;
    let (payload, tag) = rest.split_at_mut(ct_len);
    state
        .open_with(pid.id, aad, payload, tag)
        .map_err(|_| DecryptStatus::AuthenticationFailed)?;

    buf.advance(pid_len).map_err(|_| DecryptStatus::DecryptFailed)?;
    buf.truncate_back(AEAD_TAG_LEN).map_err(|_| DecryptStatus::DecryptFailed)?;
    Ok(pid)
}
