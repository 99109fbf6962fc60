//! Send-time policy checks: four independent flags, four pure predicates.
//!
//! Policy is an explicit value the caller passes in, never ambient state.
//! Each flag stands alone; no flag implies another.

use serde::{Deserialize, Serialize};

use whisper_store::{Contact, TrustLevel};

use crate::error::{PolicyViolationKind, WhisperError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Refuse raw-public-key sends; recipients must be contacts.
    pub contact_required_to_send: bool,
    /// Refuse unsigned sends to contacts the user has verified.
    pub require_signature_for_verified: bool,
    /// Archive the local identity when its key rotates (consulted by the
    /// rotation flow, which lives outside this crate).
    pub auto_archive_on_rotation: bool,
    /// Route signing through the interactive signer instead of the
    /// identity's in-memory key.
    pub biometric_gated_signing: bool,
}

/// Send gate. A blocked recipient is refused whatever the flags say;
/// raw-key sends are refused only under `contact_required_to_send`.
pub fn validate_send_policy(
    config: &PolicyConfig,
    recipient: Option<&Contact>,
) -> Result<(), WhisperError> {
    match recipient {
        Some(contact) if contact.is_blocked => Err(WhisperError::PolicyViolation(
            PolicyViolationKind::ContactRequired,
        )),
        Some(_) => Ok(()),
        None if config.contact_required_to_send => Err(WhisperError::PolicyViolation(
            PolicyViolationKind::RawKeyBlocked,
        )),
        None => Ok(()),
    }
}

/// Signature gate. Only a verified recipient can be owed a signature, and
/// only while `require_signature_for_verified` is set; unverified, revoked
/// and absent recipients are never forced.
pub fn validate_signature_policy(
    config: &PolicyConfig,
    recipient: Option<&Contact>,
    has_signature: bool,
) -> Result<(), WhisperError> {
    if !config.require_signature_for_verified || has_signature {
        return Ok(());
    }
    match recipient {
        Some(contact) if contact.trust_level == TrustLevel::Verified => Err(
            WhisperError::PolicyViolation(PolicyViolationKind::SignatureRequired),
        ),
        _ => Ok(()),
    }
}

pub fn should_archive_on_rotation(config: &PolicyConfig) -> bool {
    config.auto_archive_on_rotation
}

pub fn requires_biometric_for_signing(config: &PolicyConfig) -> bool {
    config.biometric_gated_signing
}
