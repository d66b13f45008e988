use chacha20poly1305::aead::generic_array::typenum::{U12, U16};
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::{AeadInPlace, KeyInit};

/// Primitive-level failures. Never leaves the crate; the packet path maps
/// them onto `DecryptStatus` / `DcError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptoError {
    InvalidKey,
    IntegrityCheckFailed,
    Padding,
}

/// Any RustCrypto AEAD with a 96-bit nonce and a 128-bit tag.
pub(crate) trait InPlaceAead: AeadInPlace<NonceSize = U12, TagSize = U16> + KeyInit {}

impl<T> InPlaceAead for T where T: AeadInPlace<NonceSize = U12, TagSize = U16> + KeyInit {}

/// High-Performance In-Place Secure Transformation.
///
/// Generic methods use STATIC DISPATCH so each AEAD family is inlined into
/// the packet path. The cipher arrives already keyed: key expansion happens
/// once per key generation, never per packet.
pub(crate) struct AeadStack;

impl AeadStack {
    /// Expands `key` into a ready-to-use AEAD instance.
    pub(crate) fn keyed<A: InPlaceAead>(key: &[u8]) -> Result<A, CryptoError> {
        A::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)
    }

    /// Encrypts `buffer` in place and writes the detached tag into `tag_out`.
    /// ZERO heap allocations. ZERO memory copies of the payload.
    #[inline(always)]
    pub(crate) fn seal<A: InPlaceAead>(
        aead: &A,
        nonce: &[u8; 12],
        aad: &[u8],
        buffer: &mut [u8],
        tag_out: &mut [u8],
    ) -> Result<(), CryptoError> {
        let tag = aead
            .encrypt_in_place_detached(GenericArray::from_slice(&nonce[..]), aad, buffer)
            .map_err(|_| CryptoError::IntegrityCheckFailed)?;
        tag_out.copy_from_slice(&tag);
        Ok(())
    }

    /// Verifies `tag` and decrypts `buffer` in place. The tag is checked
    /// before any byte of `buffer` is touched, so a failed open leaves the
    /// ciphertext intact for a retry under another key.
    #[inline(always)]
    pub(crate) fn open<A: InPlaceAead>(
        aead: &A,
        nonce: &[u8; 12],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> Result<(), CryptoError> {
        aead.decrypt_in_place_detached(GenericArray::from_slice(&nonce[..]), aad, buffer, GenericArray::from_slice(tag))
            .map_err(|_| CryptoError::IntegrityCheckFailed)
    }
}
