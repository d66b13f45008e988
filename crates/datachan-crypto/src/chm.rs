//! # Cipher + HMAC Framing
//!
//! ```text
//! [ HMAC tag ][ packet-id (4|8) ][ IV (16) ][ CBC ciphertext, PKCS#7 ]
//!             \________________ authenticated ________________/
//! ```
//!
//! A `NONE` cipher drops the IV and padding and carries the payload as is;
//! a `NONE` digest drops the tag.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit};
use datachan_core::error::BufferError;
use datachan_core::{DcError, DecryptStatus, PacketBuf, PacketId, PacketIdForm};
use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::algs::CryptoAlg;
use crate::in_place::CryptoError;
use crate::keys::DirectionKeys;

pub(crate) const CBC_BLOCK: usize = 16;
pub(crate) const CBC_IV_LEN: usize = 16;
const MAX_HMAC_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbcAlg {
    Aes128,
    Aes192,
    Aes256,
}

impl CbcAlg {
    pub fn from_alg(alg: CryptoAlg) -> Option<Self> {
        match alg {
            CryptoAlg::Aes128Cbc => Some(CbcAlg::Aes128),
            CryptoAlg::Aes192Cbc => Some(CbcAlg::Aes192),
            CryptoAlg::Aes256Cbc => Some(CbcAlg::Aes256),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlg {
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlg {
    pub fn from_alg(alg: CryptoAlg) -> Option<Self> {
        match alg {
            CryptoAlg::Sha1 => Some(DigestAlg::Sha1),
            CryptoAlg::Sha256 => Some(DigestAlg::Sha256),
            CryptoAlg::Sha512 => Some(DigestAlg::Sha512),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn output_len(self) -> usize {
        match self {
            DigestAlg::Sha1 => 20,
            DigestAlg::Sha256 => 32,
            DigestAlg::Sha512 => 64,
        }
    }
}

/// AES key schedule, expanded once per generation and cloned into a fresh
/// CBC chain for every packet.
enum CbcCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

fn cbc_seal_with<C>(cipher: &C, iv: &[u8], region: &mut [u8], msg_len: usize) -> Result<usize, CryptoError>
where
    C: BlockEncryptMut + BlockCipher + Clone,
{
    let encryptor = cbc::Encryptor::<C>::inner_iv_slice_init(cipher.clone(), iv).map_err(|_| CryptoError::InvalidKey)?;
    encryptor
        .encrypt_padded_mut::<Pkcs7>(region, msg_len)
        .map(|ct| ct.len())
        .map_err(|_| CryptoError::Padding)
}

fn cbc_open_with<C>(cipher: &C, iv: &[u8], buffer: &mut [u8]) -> Result<usize, CryptoError>
where
    C: BlockDecryptMut + BlockCipher + Clone,
{
    let decryptor = cbc::Decryptor::<C>::inner_iv_slice_init(cipher.clone(), iv).map_err(|_| CryptoError::InvalidKey)?;
    decryptor
        .decrypt_padded_mut::<Pkcs7>(buffer)
        .map(|pt| pt.len())
        .map_err(|_| CryptoError::Padding)
}

impl CbcCipher {
    fn new(alg: CbcAlg, key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |_| CryptoError::InvalidKey;
        Ok(match alg {
            CbcAlg::Aes128 => CbcCipher::Aes128(Aes128::new_from_slice(key).map_err(invalid)?),
            CbcAlg::Aes192 => CbcCipher::Aes192(Aes192::new_from_slice(key).map_err(invalid)?),
            CbcAlg::Aes256 => CbcCipher::Aes256(Aes256::new_from_slice(key).map_err(invalid)?),
        })
    }

    fn seal(&self, iv: &[u8], region: &mut [u8], msg_len: usize) -> Result<usize, CryptoError> {
        match self {
            CbcCipher::Aes128(c) => cbc_seal_with(c, iv, region, msg_len),
            CbcCipher::Aes192(c) => cbc_seal_with(c, iv, region, msg_len),
            CbcCipher::Aes256(c) => cbc_seal_with(c, iv, region, msg_len),
        }
    }

    fn open(&self, iv: &[u8], buffer: &mut [u8]) -> Result<usize, CryptoError> {
        match self {
            CbcCipher::Aes128(c) => cbc_open_with(c, iv, buffer),
            CbcCipher::Aes192(c) => cbc_open_with(c, iv, buffer),
            CbcCipher::Aes256(c) => cbc_open_with(c, iv, buffer),
        }
    }
}

/// HMAC with the ipad/opad blocks already absorbed.
enum HmacKey {
    Sha1(Hmac<Sha1>),
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
}

fn keyed_mac<M: Mac + KeyInit>(key: &[u8]) -> Result<M, CryptoError> {
    <M as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)
}

fn mac_over<M: Mac + Clone>(keyed: &M, data: &[u8]) -> M {
    let mut mac = keyed.clone();
    mac.update(data);
    mac
}

impl HmacKey {
    fn new(alg: DigestAlg, key: &[u8]) -> Result<Self, CryptoError> {
        Ok(match alg {
            DigestAlg::Sha1 => HmacKey::Sha1(keyed_mac(key)?),
            DigestAlg::Sha256 => HmacKey::Sha256(keyed_mac(key)?),
            DigestAlg::Sha512 => HmacKey::Sha512(keyed_mac(key)?),
        })
    }

    fn output_len(&self) -> usize {
        match self {
            HmacKey::Sha1(_) => DigestAlg::Sha1.output_len(),
            HmacKey::Sha256(_) => DigestAlg::Sha256.output_len(),
            HmacKey::Sha512(_) => DigestAlg::Sha512.output_len(),
        }
    }

    fn sign(&self, data: &[u8], out: &mut [u8]) {
        match self {
            HmacKey::Sha1(m) => out.copy_from_slice(&mac_over(m, data).finalize().into_bytes()),
            HmacKey::Sha256(m) => out.copy_from_slice(&mac_over(m, data).finalize().into_bytes()),
            HmacKey::Sha512(m) => out.copy_from_slice(&mac_over(m, data).finalize().into_bytes()),
        }
    }

    /// Constant-time tag comparison.
    fn verify(&self, data: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
        let verdict = match self {
            HmacKey::Sha1(m) => mac_over(m, data).verify_slice(tag),
            HmacKey::Sha256(m) => mac_over(m, data).verify_slice(tag),
            HmacKey::Sha512(m) => mac_over(m, data).verify_slice(tag),
        };
        verdict.map_err(|_| CryptoError::IntegrityCheckFailed)
    }
}

/// Keyed cipher and MAC for one direction. Either half is absent under a
/// `NONE` cipher or digest.
pub(crate) struct ChmState {
    cipher: Option<CbcCipher>,
    hmac: Option<HmacKey>,
}

impl ChmState {
    pub(crate) fn new(cipher: Option<CbcAlg>, digest: Option<DigestAlg>, keys: &DirectionKeys) -> Result<Self, DcError> {
        let cipher = match cipher {
            Some(alg) => {
                let key = keys.cipher.as_ref().ok_or(DcError::NoKey)?;
                Some(CbcCipher::new(alg, key.as_bytes()).map_err(|_| DcError::Crypto("CBC key rejected"))?)
            }
            None => None,
        };
        let hmac = match digest {
            Some(alg) => {
                let key = keys.hmac.as_ref().ok_or(DcError::NoKey)?;
                Some(HmacKey::new(alg, key.as_bytes()).map_err(|_| DcError::Crypto("HMAC key rejected"))?)
            }
            None => None,
        };
        Ok(Self { cipher, hmac })
    }
}

pub(crate) fn seal(
    state: &ChmState,
    rng: &mut StdRng,
    pid: PacketId,
    form: PacketIdForm,
    buf: &mut PacketBuf,
) -> Result<(), DcError> {
    let hmac_len = state.hmac.as_ref().map_or(0, HmacKey::output_len);
    let iv_len = if state.cipher.is_some() { CBC_IV_LEN } else { 0 };
    let head = hmac_len + form.size() + iv_len;
    if buf.headroom() < head {
        return Err(BufferError::HeadroomExhausted { needed: head, available: buf.headroom() }.into());
    }

    if let Some(cipher) = &state.cipher {
        let mut iv = [0u8; CBC_IV_LEN];
        rng.fill_bytes(&mut iv);

        let msg_len = buf.len();
        let pad = CBC_BLOCK - msg_len % CBC_BLOCK;
        let region = buf.content_with_tailroom(pad)?;
        let ct_len = cipher
            .seal(&iv, region, msg_len)
            .map_err(|_| DcError::Crypto("CBC encrypt rejected"))?;
        buf.set_len(ct_len)?;
        buf.prepend_from(&iv)?;
    }

    pid.write(form, buf.prepend(form.size())?);

    if let Some(hmac) = &state.hmac {
        let mut tag = [0u8; MAX_HMAC_LEN];
        hmac.sign(buf.as_slice(), &mut tag[..hmac_len]);
        buf.prepend_from(&tag[..hmac_len])?;
    }
    Ok(())
}

/// Verifies, strips framing and decrypts in place. On
/// `AuthenticationFailed` the buffer is untouched.
pub(crate) fn open(
    state: &ChmState,
    form: PacketIdForm,
    buf: &mut PacketBuf,
) -> Result<PacketId, DecryptStatus> {
    let hmac_len = state.hmac.as_ref().map_or(0, HmacKey::output_len);
    let pid_len = form.size();
    let cipher_min = if state.cipher.is_some() { CBC_IV_LEN + CBC_BLOCK } else { 0 };
    if buf.len() < hmac_len + pid_len + cipher_min {
        return Err(DecryptStatus::DecryptFailed);
    }

    if let Some(hmac) = &state.hmac {
        let (tag, signed) = buf.as_slice().split_at(hmac_len);
        hmac.verify(signed, tag).map_err(|_| DecryptStatus::AuthenticationFailed)?;
        buf.advance(hmac_len).map_err(|_| DecryptStatus::DecryptFailed)?;
    }

    let pid = PacketId::read(form, buf.as_slice()).ok_or(DecryptStatus::DecryptFailed)?;
    buf.advance(pid_len).map_err(|_| DecryptStatus::DecryptFailed)?;

    if let Some(cipher) = &state.cipher {
        if (buf.len() - CBC_IV_LEN) % CBC_BLOCK != 0 {
            return Err(DecryptStatus::DecryptFailed);
        }
        let mut iv = [0u8; CBC_IV_LEN];
        iv.copy_from_slice(&buf.as_slice()[..CBC_IV_LEN]);
        buf.advance(CBC_IV_LEN).map_err(|_| DecryptStatus::DecryptFailed)?;

        let pt_len = cipher
            .open(&iv, buf.as_mut_slice())
            .map_err(|_| DecryptStatus::DecryptFailed)?;
        buf.set_len(pt_len).map_err(|_| DecryptStatus::DecryptFailed)?;
    }
    Ok(pid)
}
