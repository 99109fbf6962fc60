use thiserror::Error;

use whisper_crypto::CryptoError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaddingError {
    /// Encrypt-side failure: the message does not fit the largest bucket.
    #[error("Message too large: {actual} bytes exceeds the {max}-byte maximum")]
    MessageTooLarge { actual: usize, max: usize },

    /// Single generic violation for every unpad failure. Short buffer, bad
    /// length prefix and nonzero fill are deliberately indistinguishable.
    #[error("Invalid padding")]
    InvalidPadding,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Invalid envelope format: {0}")]
    InvalidFormat(&'static str),

    /// Hard reject. This engine never negotiates or downgrades versions.
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(String),
}

/// Combined error for the seal/open pipeline.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Padding(#[from] PaddingError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
