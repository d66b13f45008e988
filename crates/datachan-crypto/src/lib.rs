//! # datachan-crypto: Data Channel Packet Crypto
//!
//! ```text
//!   EngineFactory::new_obj(cipher, digest) ──► Arc<AlgorithmContext>
//!   AlgorithmContext::new_obj(key_id)      ──► SessionInstance
//!   SessionInstance::{encrypt, decrypt}    ──► packet path
//! ```
//!
//! Two transform families share one instance layer:
//! - **AEAD** (AES-GCM, ChaCha20-Poly1305): `[pid][ciphertext][tag]`, nonce
//!   built from the packet id and a per-key salt.
//! - **Cipher + HMAC** (AES-CBC, SHA-1/256/512, either side may be `NONE`):
//!   `[hmac][pid][iv][ciphertext]`.

mod aead;
pub mod algs;
mod chm;
pub mod context;
pub mod factory;
mod in_place;
pub mod instance;
mod keys;
mod pid_recv;
pub mod static_key;

pub use aead::AeadAlg;
pub use algs::{AlgMode, CryptoAlg, AEAD_TAG_LEN};
pub use chm::{CbcAlg, DigestAlg};
pub use context::{AlgorithmContext, KEY_ID_MAX};
pub use factory::{EngineFactory, RustCryptoFactory};
pub use instance::{RekeyType, SessionInstance, SlotState};
pub use static_key::StaticKey;
