//! Facade error taxonomy.
//!
//! Two opposite disclosure rules live here. Crypto and padding failures are
//! collapsed into generic variants with fixed messages; finer detail would
//! hand an attacker a decryption oracle. Policy violations carry their
//! specific kind, because they are not secret-dependent and the user can
//! act on them. Nothing is ever silently recovered.

use std::fmt;

use thiserror::Error;

use whisper_crypto::CryptoError;
use whisper_proto::{CodecError, EnvelopeError, PaddingError};
use whisper_store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolationKind {
    ContactRequired,
    SignatureRequired,
    RawKeyBlocked,
    BiometricRequired,
}

impl fmt::Display for PolicyViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PolicyViolationKind::ContactRequired => "add this person as a contact first",
            PolicyViolationKind::SignatureRequired => {
                "messages to verified contacts must be signed"
            }
            PolicyViolationKind::RawKeyBlocked => {
                "sending to raw public keys is disabled by policy"
            }
            PolicyViolationKind::BiometricRequired => "signing requires biometric confirmation",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Error)]
pub enum WhisperError {
    /// Bad key, bad tag and bad ciphertext alike. The split is withheld on
    /// purpose; distinguishing them would leak what an attacker changed.
    #[error("Cryptographic operation failed")]
    CryptographicFailure,

    #[error("Invalid envelope format")]
    InvalidEnvelopeFormat,

    #[error("Message already received")]
    ReplayDetected,

    #[error("Message is outside the freshness window")]
    MessageExpired,

    #[error("Message is not addressed to this device")]
    MessageNotForMe,

    #[error("Invalid padding")]
    InvalidPadding,

    #[error("Message too large to encrypt")]
    MessageTooLarge,

    #[error("Policy violation: {0}")]
    PolicyViolation(PolicyViolationKind),

    #[error("Signing authorization failed or is unavailable")]
    BiometricAuthenticationFailed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CryptoError> for WhisperError {
    fn from(_: CryptoError) -> Self {
        WhisperError::CryptographicFailure
    }
}

impl From<EnvelopeError> for WhisperError {
    fn from(_: EnvelopeError) -> Self {
        WhisperError::InvalidEnvelopeFormat
    }
}

impl From<PaddingError> for WhisperError {
    fn from(e: PaddingError) -> Self {
        match e {
            PaddingError::MessageTooLarge { .. } => WhisperError::MessageTooLarge,
            PaddingError::InvalidPadding => WhisperError::InvalidPadding,
        }
    }
}

impl From<CodecError> for WhisperError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Envelope(e) => e.into(),
            CodecError::Padding(e) => e.into(),
            CodecError::Crypto(e) => e.into(),
        }
    }
}
