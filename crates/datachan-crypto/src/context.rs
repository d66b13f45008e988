//! # AlgorithmContext
//!
//! Immutable facts about one negotiated pairing. Instances hold it through
//! an `Arc`; nothing in it changes after the factory builds it.

use std::sync::Arc;

use datachan_core::{DcError, PacketIdForm};

use crate::aead::AeadAlg;
use crate::algs::{CryptoAlg, AEAD_TAG_LEN};
use crate::chm::{CbcAlg, DigestAlg, CBC_BLOCK, CBC_IV_LEN};
use crate::instance::SessionInstance;

/// Highest key id the 3-bit wire field can carry.
pub const KEY_ID_MAX: u32 = 7;

/// The primitive family resolved once by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transform {
    Aead(AeadAlg),
    Chm { cipher: Option<CbcAlg>, digest: Option<DigestAlg> },
}

#[derive(Debug)]
pub struct AlgorithmContext {
    cipher: CryptoAlg,
    digest: CryptoAlg,
    transform: Transform,
}

impl AlgorithmContext {
    pub(crate) fn new(cipher: CryptoAlg, digest: CryptoAlg, transform: Transform) -> Self {
        Self { cipher, digest, transform }
    }

    /// Creates the instance serving wire key id `key_id`.
    pub fn new_obj(self: &Arc<Self>, key_id: u32) -> Result<SessionInstance, DcError> {
        if key_id > KEY_ID_MAX {
            return Err(DcError::Config(format!("key id {} exceeds {}", key_id, KEY_ID_MAX)));
        }
        tracing::debug!("AlgorithmContext: new instance key_id={} ({})", key_id, self.options_string());
        Ok(SessionInstance::new(Arc::clone(self), key_id))
    }

    pub fn cipher(&self) -> CryptoAlg {
        self.cipher
    }

    pub fn digest(&self) -> CryptoAlg {
        self.digest
    }

    pub fn cipher_name(&self) -> &'static str {
        self.cipher.name()
    }

    /// Digest name as negotiated; AEAD pairings report `NONE`.
    pub fn digest_name(&self) -> &'static str {
        self.digest.name()
    }

    /// Cipher key length in bytes.
    pub fn key_size(&self) -> usize {
        self.cipher.key_length()
    }

    pub fn cipher_defined(&self) -> bool {
        !self.cipher.is_none()
    }

    pub fn digest_defined(&self) -> bool {
        matches!(self.transform, Transform::Chm { digest: Some(_), .. })
    }

    pub fn is_aead(&self) -> bool {
        matches!(self.transform, Transform::Aead(_))
    }

    pub(crate) fn transform(&self) -> Transform {
        self.transform
    }

    /// Worst-case bytes added in front of / behind the plaintext for `form`.
    pub(crate) fn framing(&self, form: PacketIdForm) -> (usize, usize) {
        match self.transform {
            Transform::Aead(_) => (form.size(), AEAD_TAG_LEN),
            Transform::Chm { cipher, digest } => {
                let hmac = digest.map_or(0, DigestAlg::output_len);
                let (iv, pad) = if cipher.is_some() { (CBC_IV_LEN, CBC_BLOCK) } else { (0, 0) };
                (hmac + form.size() + iv, pad)
            }
        }
    }

    /// Exact worst-case expansion for a given packet-id form.
    pub fn encap_overhead_for(&self, form: PacketIdForm) -> usize {
        let (head, tail) = self.framing(form);
        head + tail
    }

    /// Worst-case per-packet expansion, sized for the long packet-id form so
    /// it bounds either form.
    pub fn encap_overhead(&self) -> usize {
        self.encap_overhead_for(PacketIdForm::Long)
    }

    /// Negotiated configuration as reported to logs and the peer.
    pub fn options_string(&self) -> String {
        format!(
            "cipher {}, auth {}, keysize {}",
            self.cipher_name(),
            self.digest_name(),
            self.key_size() * 8
        )
    }
}
