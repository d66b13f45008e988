use core::fmt;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

/// Raw key material handed over by the negotiation layer.
///
/// ## Erasure
/// Bytes live in a `Zeroizing` buffer: `wipe` overwrites them with volatile
/// writes on demand, and the same happens on drop.
#[derive(Clone)]
pub struct StaticKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl StaticKey {
    pub fn new(bytes: &[u8]) -> Self {
        Self { bytes: Zeroizing::new(bytes.to_vec()) }
    }

    /// Fresh random material from the OS generator.
    pub fn random(len: usize) -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; len]);
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copies the leading `len` bytes into a key of exactly that length.
    pub fn prefix(&self, len: usize) -> Option<StaticKey> {
        self.bytes.get(..len).map(StaticKey::new)
    }

    /// Overwrites and truncates the material.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl Zeroize for StaticKey {
    fn zeroize(&mut self) {
        self.wipe();
    }
}

impl From<Vec<u8>> for StaticKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes: Zeroizing::new(bytes) }
    }
}

impl fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaticKey([REDACTED; {}])", self.bytes.len())
    }
}
