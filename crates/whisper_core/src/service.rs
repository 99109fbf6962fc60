//! The encrypt/decrypt facade.
//!
//! Composes the codec, the replay guard, the contact trust store, the
//! identity store and the signing seam into the two user-facing pipelines.
//! Policy is checked before any cryptography; the replay commit happens
//! strictly after a successful decrypt so a failed open never burns a
//! message id.

use std::sync::Arc;

use zeroize::Zeroizing;

use whisper_crypto::X25519PublicKey;
use whisper_proto::{codec, detect, Envelope};
use whisper_store::{
    CommitDecision, Contact, ContactTrustStore, Identity, IdentityStore, ReplayGuard,
};

use crate::attribution::{self, Attribution};
use crate::error::{PolicyViolationKind, WhisperError};
use crate::policy::{self, PolicyConfig};
use crate::signer::{SecureSigner, SignerError};

/// Where an encrypted message is headed: a known contact, or a bare key
/// the user pasted (subject to `contact_required_to_send`).
pub enum SendTarget<'a> {
    Contact(&'a Contact),
    RawKey(X25519PublicKey),
}

/// Decrypt output. The plaintext buffer zeroizes on drop.
pub struct Decrypted {
    pub plaintext: Zeroizing<Vec<u8>>,
    pub attribution: Attribution,
}

pub struct WhisperService {
    identities: Arc<dyn IdentityStore>,
    contacts: ContactTrustStore,
    replay: ReplayGuard,
    signer: Arc<dyn SecureSigner>,
    policy: PolicyConfig,
}

impl WhisperService {
    /// Build the service and run the replay store's startup cleanup.
    /// Policy is fixed for the service's lifetime; rebuild to change it.
    pub async fn new(
        identities: Arc<dyn IdentityStore>,
        contacts: ContactTrustStore,
        replay: ReplayGuard,
        signer: Arc<dyn SecureSigner>,
        policy: PolicyConfig,
    ) -> Result<Self, WhisperError> {
        replay.cleanup().await?;
        Ok(Self { identities, contacts, replay, signer, policy })
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn contacts(&self) -> &ContactTrustStore {
        &self.contacts
    }

    /// Cheap check whether `text` is shaped like one of our envelopes.
    /// No decoding, no crypto, no allocation.
    pub fn detect(text: &str) -> bool {
        detect(text)
    }

    /// Encrypt `plaintext` from `from` to `to`, optionally signed.
    /// Returns the serialized envelope string.
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        from: &Identity,
        to: SendTarget<'_>,
        include_signature: bool,
    ) -> Result<String, WhisperError> {
        let recipient_contact = match &to {
            SendTarget::Contact(c) => Some(*c),
            SendTarget::RawKey(_) => None,
        };
        policy::validate_send_policy(&self.policy, recipient_contact)?;
        policy::validate_signature_policy(&self.policy, recipient_contact, include_signature)?;

        let recipient_key = match &to {
            SendTarget::Contact(c) => c.x25519_public,
            SendTarget::RawKey(key) => *key,
        };

        let mut sealed = codec::seal(plaintext, &recipient_key, include_signature)?;

        if include_signature {
            let payload = codec::signing_payload(&sealed.context, &sealed.envelope.ciphertext);
            let signature = self.sign(from, &payload).await?;
            sealed.envelope.signature = Some(signature);
        }

        tracing::info!(
            target: "whisper_core",
            event = "encrypt_ok",
            rkid = %sealed.envelope.rkid,
            signed = include_signature,
            "Envelope sealed"
        );

        Ok(sealed.envelope.serialize())
    }

    /// Decrypt an envelope string addressed to one of our identities.
    ///
    /// Pipeline order is fixed: parse, identity lookup by rkid, freshness
    /// precheck, AEAD open, attribution, atomic replay commit. Each step
    /// short-circuits; the commit is last so only messages that actually
    /// decrypted consume their id.
    pub async fn decrypt(&self, envelope_str: &str) -> Result<Decrypted, WhisperError> {
        let envelope = Envelope::parse(envelope_str)?;

        // Uniform MessageNotForMe whether the rkid is foreign or simply
        // unknown; the error must not reveal which rkids exist here.
        let identity = self
            .identities
            .identity_for_rkid(&envelope.rkid)
            .await?
            .ok_or(WhisperError::MessageNotForMe)?;

        // Early window check saves the key agreement for stale traffic.
        // The authoritative check is the atomic commit below.
        if !ReplayGuard::is_fresh(envelope.timestamp) {
            return Err(WhisperError::MessageExpired);
        }

        let opened = codec::open(&envelope, &identity.x25519)?;

        let attribution = match &envelope.signature {
            None => Attribution::Unsigned,
            Some(signature) => {
                let payload = codec::signing_payload(&opened.context, &envelope.ciphertext);
                let candidates = self.contacts.signing_candidates().await?;
                attribution::resolve(&candidates, &payload, signature)
            }
        };

        match self.replay.check_and_commit(&envelope.msg_id, envelope.timestamp).await? {
            CommitDecision::Accepted => {}
            CommitDecision::Expired => return Err(WhisperError::MessageExpired),
            CommitDecision::ReplayDetected => {
                tracing::warn!(
                    target: "whisper_core",
                    event = "decrypt_replay_rejected",
                    msg_id = %hex::encode(envelope.msg_id),
                    "Envelope replayed"
                );
                return Err(WhisperError::ReplayDetected);
            }
        }

        tracing::info!(
            target: "whisper_core",
            event = "decrypt_ok",
            rkid = %envelope.rkid,
            signed = envelope.is_signed(),
            "Envelope opened"
        );

        Ok(Decrypted { plaintext: opened.plaintext, attribution })
    }

    /// Sign through the interactive signer when policy gates signing, with
    /// the identity's in-memory key otherwise. Cancellation is a policy
    /// outcome and aborts the whole encrypt; no partial envelope escapes.
    async fn sign(&self, from: &Identity, payload: &[u8]) -> Result<[u8; 64], WhisperError> {
        let outcome = if policy::requires_biometric_for_signing(&self.policy) {
            self.signer.sign(payload, &from.id).await
        } else {
            from.ed25519
                .as_ref()
                .map(|key| key.sign(payload))
                .ok_or(SignerError::NotAvailable)
        };

        match outcome {
            Ok(signature) => Ok(signature),
            Err(SignerError::UserCancelled) => {
                tracing::info!(
                    target: "whisper_core",
                    event = "signing_cancelled",
                    identity_id = %from.id,
                    "User cancelled signing"
                );
                Err(WhisperError::PolicyViolation(PolicyViolationKind::BiometricRequired))
            }
            Err(SignerError::NotAvailable | SignerError::AuthenticationFailed) => {
                Err(WhisperError::BiometricAuthenticationFailed)
            }
        }
    }
}
