//! Algorithm identifiers as negotiated on the control channel.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoAlg {
    None,
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
    Sha1,
    Sha256,
    Sha512,
}

/// Role an identifier can play in a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgMode {
    None,
    CipherCbc,
    Aead,
    Digest,
}

/// AEAD tag length shared by every supported AEAD.
pub const AEAD_TAG_LEN: usize = 16;

impl CryptoAlg {
    pub const ALL: [CryptoAlg; 10] = [
        CryptoAlg::None,
        CryptoAlg::Aes128Cbc,
        CryptoAlg::Aes192Cbc,
        CryptoAlg::Aes256Cbc,
        CryptoAlg::Aes128Gcm,
        CryptoAlg::Aes256Gcm,
        CryptoAlg::ChaCha20Poly1305,
        CryptoAlg::Sha1,
        CryptoAlg::Sha256,
        CryptoAlg::Sha512,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            CryptoAlg::None => "NONE",
            CryptoAlg::Aes128Cbc => "AES-128-CBC",
            CryptoAlg::Aes192Cbc => "AES-192-CBC",
            CryptoAlg::Aes256Cbc => "AES-256-CBC",
            CryptoAlg::Aes128Gcm => "AES-128-GCM",
            CryptoAlg::Aes256Gcm => "AES-256-GCM",
            CryptoAlg::ChaCha20Poly1305 => "CHACHA20-POLY1305",
            CryptoAlg::Sha1 => "SHA1",
            CryptoAlg::Sha256 => "SHA256",
            CryptoAlg::Sha512 => "SHA512",
        }
    }

    pub const fn mode(self) -> AlgMode {
        match self {
            CryptoAlg::None => AlgMode::None,
            CryptoAlg::Aes128Cbc | CryptoAlg::Aes192Cbc | CryptoAlg::Aes256Cbc => AlgMode::CipherCbc,
            CryptoAlg::Aes128Gcm | CryptoAlg::Aes256Gcm | CryptoAlg::ChaCha20Poly1305 => AlgMode::Aead,
            CryptoAlg::Sha1 | CryptoAlg::Sha256 | CryptoAlg::Sha512 => AlgMode::Digest,
        }
    }

    /// Cipher key length in bytes; HMAC key length for digests.
    pub const fn key_length(self) -> usize {
        match self {
            CryptoAlg::None => 0,
            CryptoAlg::Aes128Cbc | CryptoAlg::Aes128Gcm => 16,
            CryptoAlg::Aes192Cbc => 24,
            CryptoAlg::Aes256Cbc | CryptoAlg::Aes256Gcm | CryptoAlg::ChaCha20Poly1305 => 32,
            CryptoAlg::Sha1 => 20,
            CryptoAlg::Sha256 => 32,
            CryptoAlg::Sha512 => 64,
        }
    }

    /// Explicit per-packet IV carried on the wire.
    pub const fn iv_length(self) -> usize {
        match self.mode() {
            AlgMode::CipherCbc => 16,
            _ => 0,
        }
    }

    pub const fn block_size(self) -> usize {
        match self.mode() {
            AlgMode::CipherCbc => 16,
            _ => 0,
        }
    }

    /// Authentication output on the wire: HMAC length or AEAD tag length.
    pub const fn size(self) -> usize {
        match self {
            CryptoAlg::Sha1 => 20,
            CryptoAlg::Sha256 => 32,
            CryptoAlg::Sha512 => 64,
            _ => match self.mode() {
                AlgMode::Aead => AEAD_TAG_LEN,
                _ => 0,
            },
        }
    }

    #[inline(always)]
    pub const fn is_none(self) -> bool {
        matches!(self, CryptoAlg::None)
    }

    /// Case-insensitive lookup by canonical name.
    pub fn lookup(name: &str) -> Option<CryptoAlg> {
        Self::ALL.iter().copied().find(|alg| alg.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for CryptoAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
