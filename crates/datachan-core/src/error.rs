use core::fmt;

/// Control-path failures of the data channel.
///
/// Everything here is a caller bug or a negotiation outcome and must be
/// surfaced. Per-packet results live in [`DecryptStatus`] instead.
#[derive(Debug)]
pub enum DcError {
    /// An operation needed key material that was never installed.
    NoKey,
    /// The cipher/digest pairing cannot be served by the linked provider.
    UnsupportedAlgorithm { cipher: String, digest: String },
    /// Key material shorter than the algorithm requires.
    KeyLength { expected: usize, actual: usize },
    /// A rekey transition that is not legal from the current slot state.
    InvalidRekey { from: &'static str, requested: &'static str },
    /// The send counter reached its last value under the current key.
    PacketIdExhausted,
    /// The primitive refused an operation the framing layer had validated.
    Crypto(&'static str),
    Buffer(BufferError),
    Config(String),
}

/// Headroom/tailroom violations on a [`crate::PacketBuf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    HeadroomExhausted { needed: usize, available: usize },
    TailroomExhausted { needed: usize, available: usize },
    Underflow { needed: usize, available: usize },
}

/// Outcome of a single `decrypt` call.
///
/// Only `NoKey` signals a sequencing problem; the others are recovered by
/// dropping the one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStatus {
    Success,
    AuthenticationFailed,
    ReplayDetected,
    DecryptFailed,
    NoKey,
}

impl DecryptStatus {
    #[inline(always)]
    pub fn is_success(self) -> bool {
        self == DecryptStatus::Success
    }
}

impl fmt::Display for DcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DcError::NoKey => f.write_str("no key material installed"),
            DcError::UnsupportedAlgorithm { cipher, digest } => {
                write!(f, "unsupported algorithm pairing: cipher {} / digest {}", cipher, digest)
            }
            DcError::KeyLength { expected, actual } => {
                write!(f, "key material too short: need {} bytes, have {}", expected, actual)
            }
            DcError::InvalidRekey { from, requested } => {
                write!(f, "rekey {} is not valid in state {}", requested, from)
            }
            DcError::PacketIdExhausted => f.write_str("packet id space exhausted, rekey required"),
            DcError::Crypto(what) => write!(f, "crypto primitive failure: {}", what),
            DcError::Buffer(e) => write!(f, "buffer: {}", e),
            DcError::Config(msg) => write!(f, "config: {}", msg),
        }
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::HeadroomExhausted { needed, available } => {
                write!(f, "headroom exhausted ({} needed, {} available)", needed, available)
            }
            BufferError::TailroomExhausted { needed, available } => {
                write!(f, "tailroom exhausted ({} needed, {} available)", needed, available)
            }
            BufferError::Underflow { needed, available } => {
                write!(f, "underflow ({} needed, {} available)", needed, available)
            }
        }
    }
}

impl std::error::Error for DcError {}
impl std::error::Error for BufferError {}

impl From<BufferError> for DcError {
    fn from(e: BufferError) -> Self {
        DcError::Buffer(e)
    }
}

impl From<toml::de::Error> for DcError {
    fn from(e: toml::de::Error) -> Self {
        DcError::Config(e.to_string())
    }
}

impl From<std::io::Error> for DcError {
    fn from(e: std::io::Error) -> Self {
        DcError::Config(e.to_string())
    }
}
