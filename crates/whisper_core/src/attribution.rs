//! Sender attribution for signed envelopes.
//!
//! Envelopes never name their sender, so attribution tries the signature
//! against every contact that carries a signing key. The outcome is always
//! the weakest honest claim: a revoked contact's valid signature presents
//! as unverified, and "no one to test against" is kept apart from
//! "tested and failed".

use whisper_store::{Contact, TrustLevel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Envelope carried no signature.
    Unsigned,
    /// A verified contact's key verifies the signature.
    SignedVerified { contact_id: String },
    /// An unverified (or revoked) contact's key verifies the signature.
    SignedUnverified { contact_id: String },
    /// Signed, but no contact carries a signing key; never tested.
    SignedUnknownSender,
    /// Signed, candidates existed, none verified.
    InvalidSignature,
}

/// Resolve a signature over `payload` against the signing candidates.
/// Contacts without a signing key are skipped; they were never candidates.
pub fn resolve(candidates: &[Contact], payload: &[u8], signature: &[u8; 64]) -> Attribution {
    let mut tested = false;
    for contact in candidates {
        let Some(key) = &contact.ed25519_public else {
            continue;
        };
        tested = true;
        if key.verify(payload, signature) {
            return match contact.trust_level {
                TrustLevel::Verified => {
                    Attribution::SignedVerified { contact_id: contact.id.clone() }
                }
                TrustLevel::Unverified | TrustLevel::Revoked => {
                    Attribution::SignedUnverified { contact_id: contact.id.clone() }
                }
            };
        }
    }
    if tested {
        Attribution::InvalidSignature
    } else {
        Attribution::SignedUnknownSender
    }
}
