use std::sync::Arc;

use datachan_core::{DataChannelConfig, DcError};

use crate::aead::AeadAlg;
use crate::algs::{AlgMode, CryptoAlg};
use crate::chm::{CbcAlg, DigestAlg};
use crate::context::{AlgorithmContext, Transform};

/// Resolves a negotiated cipher/digest pairing into an [`AlgorithmContext`].
///
/// All validation happens here; a context that exists is always usable.
pub trait EngineFactory: Send + Sync {
    fn new_obj(&self, cipher: CryptoAlg, digest: CryptoAlg) -> Result<Arc<AlgorithmContext>, DcError>;

    /// Resolves algorithm names (case-insensitive) before calling `new_obj`.
    fn new_obj_by_name(&self, cipher: &str, digest: &str) -> Result<Arc<AlgorithmContext>, DcError> {
        match (CryptoAlg::lookup(cipher), CryptoAlg::lookup(digest)) {
            (Some(c), Some(d)) => self.new_obj(c, d),
            _ => Err(DcError::UnsupportedAlgorithm { cipher: cipher.to_string(), digest: digest.to_string() }),
        }
    }

    fn from_config(&self, config: &DataChannelConfig) -> Result<Arc<AlgorithmContext>, DcError> {
        config.validate()?;
        self.new_obj_by_name(&config.cipher, &config.digest)
    }
}

/// Provider backed by the RustCrypto primitives linked into this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoFactory;

impl RustCryptoFactory {
    pub fn new() -> Self {
        Self
    }

    fn resolve(cipher: CryptoAlg, digest: CryptoAlg) -> Option<Transform> {
        let digest = match digest.mode() {
            AlgMode::None => None,
            AlgMode::Digest => Some(DigestAlg::from_alg(digest)?),
            _ => return None,
        };
        match cipher.mode() {
            // AEAD authenticates on its own; a separate HMAC is a negotiation error.
            AlgMode::Aead if digest.is_none() => Some(Transform::Aead(AeadAlg::from_alg(cipher)?)),
            AlgMode::Aead => None,
            AlgMode::CipherCbc => Some(Transform::Chm { cipher: Some(CbcAlg::from_alg(cipher)?), digest }),
            AlgMode::None => Some(Transform::Chm { cipher: None, digest }),
            AlgMode::Digest => None,
        }
    }
}

impl EngineFactory for RustCryptoFactory {
    fn new_obj(&self, cipher: CryptoAlg, digest: CryptoAlg) -> Result<Arc<AlgorithmContext>, DcError> {
        let Some(transform) = Self::resolve(cipher, digest) else {
            tracing::error!("RustCryptoFactory: unsupported pairing cipher={} digest={}", cipher, digest);
            return Err(DcError::UnsupportedAlgorithm {
                cipher: cipher.name().to_string(),
                digest: digest.name().to_string(),
            });
        };

        let ctx = AlgorithmContext::new(cipher, digest, transform);
        tracing::info!("RustCryptoFactory: resolved {}", ctx.options_string());
        Ok(Arc::new(ctx))
    }
}
