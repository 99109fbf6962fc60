//! Seal/open: the envelope pipeline over whisper_crypto.
//!
//! seal():  pad → fresh ephemeral/salt/msgId → canonical context →
//!          ECDH + HKDF → AEAD → Envelope (unsigned; the caller attaches
//!          any signature afterwards)
//! open():  rebuild context from envelope fields → ECDH + HKDF →
//!          AEAD open → unpad
//!
//! Signing stays out of this crate: it can suspend on an OS authentication
//! prompt, which is a facade collaborator. Both directions hand back the
//! context bytes so the signature payload can be built and checked.

use chrono::Utc;
use rand::RngCore;
use zeroize::Zeroizing;

use whisper_crypto::{aead, kdf, EphemeralKeyPair, X25519KeyPair, X25519PublicKey};

use crate::context::{canonical_context, ContextInputs};
use crate::envelope::{Envelope, FLAG_SIGNED};
use crate::error::CodecError;
use crate::padding;

pub struct SealedEnvelope {
    /// Envelope with `signature: None`; the facade fills it in when signing.
    pub envelope: Envelope,
    /// Canonical context bytes, for the signature payload.
    pub context: Vec<u8>,
}

pub struct OpenedEnvelope {
    pub plaintext: Zeroizing<Vec<u8>>,
    /// Canonical context bytes, for signature verification.
    pub context: Vec<u8>,
}

/// Seal `plaintext` to `recipient` with the current clock.
pub fn seal(
    plaintext: &[u8],
    recipient: &X25519PublicKey,
    signed: bool,
) -> Result<SealedEnvelope, CodecError> {
    seal_at(plaintext, recipient, signed, Utc::now().timestamp())
}

/// Seal with an explicit timestamp. The envelope timestamp feeds both the
/// canonical context and the recipient's freshness window.
pub fn seal_at(
    plaintext: &[u8],
    recipient: &X25519PublicKey,
    signed: bool,
    timestamp: i64,
) -> Result<SealedEnvelope, CodecError> {
    let padded = padding::pad(plaintext)?;

    let ephemeral = EphemeralKeyPair::generate();
    let ephemeral_public = ephemeral.public;
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let mut msg_id = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut msg_id);
    let flags = if signed { FLAG_SIGNED } else { 0 };

    let recipient_fingerprint = recipient.fingerprint();
    let rkid = recipient_fingerprint.rkid();
    let sender_fingerprint = ephemeral_public.fingerprint();

    let context = canonical_context(&ContextInputs {
        sender_fingerprint: &sender_fingerprint,
        recipient_fingerprint: &recipient_fingerprint,
        flags,
        rkid: &rkid,
        ephemeral_public: &ephemeral_public,
        salt: &salt,
        msg_id: &msg_id,
        timestamp,
    });

    // The DH consumes the ephemeral pair; its secret is gone from memory
    // before the AEAD runs.
    let shared = ephemeral.diffie_hellman(recipient)?;
    let key = kdf::derive_message_key(&shared, &salt, &context)?;
    let ciphertext = aead::seal(&key, &msg_id, &padded, &context)?;

    Ok(SealedEnvelope {
        envelope: Envelope {
            rkid,
            flags,
            ephemeral_public,
            salt,
            msg_id,
            timestamp,
            ciphertext,
            signature: None,
        },
        context,
    })
}

/// Open an envelope with the local identity's agreement keypair. The caller
/// has already matched `envelope.rkid` against this identity.
pub fn open(envelope: &Envelope, local: &X25519KeyPair) -> Result<OpenedEnvelope, CodecError> {
    let sender_fingerprint = envelope.ephemeral_public.fingerprint();
    let recipient_fingerprint = local.public.fingerprint();

    let context = canonical_context(&ContextInputs {
        sender_fingerprint: &sender_fingerprint,
        recipient_fingerprint: &recipient_fingerprint,
        flags: envelope.flags,
        rkid: &envelope.rkid,
        ephemeral_public: &envelope.ephemeral_public,
        salt: &envelope.salt,
        msg_id: &envelope.msg_id,
        timestamp: envelope.timestamp,
    });

    let shared = local.diffie_hellman(&envelope.ephemeral_public)?;
    let key = kdf::derive_message_key(&shared, &envelope.salt, &context)?;
    let padded = aead::open(&key, &envelope.msg_id, &envelope.ciphertext, &context)?;
    let plaintext = Zeroizing::new(padding::unpad(&padded)?);

    Ok(OpenedEnvelope { plaintext, context })
}

/// Bytes covered by an envelope signature: canonical context, then
/// ciphertext.
pub fn signing_payload(context: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(context.len() + ciphertext.len());
    payload.extend_from_slice(context);
    payload.extend_from_slice(ciphertext);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaddingError;
    use whisper_crypto::{CryptoError, Ed25519KeyPair};

    #[test]
    fn seal_open_roundtrip_through_the_wire() {
        let recipient = X25519KeyPair::generate();
        let sealed = seal(b"hello", &recipient.public, false).unwrap();

        let wire = sealed.envelope.serialize();
        let parsed = Envelope::parse(&wire).unwrap();
        let opened = open(&parsed, &recipient).unwrap();

        assert_eq!(&opened.plaintext[..], b"hello");
        assert_eq!(opened.context, sealed.context);
        // Padded to the smallest bucket plus the AEAD tag.
        assert_eq!(parsed.ciphertext.len(), 256 + 16);
    }

    #[test]
    fn rkid_targets_the_recipient() {
        let recipient = X25519KeyPair::generate();
        let sealed = seal(b"x", &recipient.public, false).unwrap();
        assert_eq!(
            sealed.envelope.rkid,
            recipient.public.fingerprint().rkid()
        );
    }

    #[test]
    fn wrong_recipient_fails_opaquely() {
        let recipient = X25519KeyPair::generate();
        let interloper = X25519KeyPair::generate();
        let sealed = seal(b"secret", &recipient.public, false).unwrap();

        assert!(matches!(
            open(&sealed.envelope, &interloper),
            Err(CodecError::Crypto(CryptoError::OperationFailed))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_opaquely() {
        let recipient = X25519KeyPair::generate();
        let mut sealed = seal(b"secret", &recipient.public, false).unwrap();
        sealed.envelope.ciphertext[40] ^= 0x80;

        assert!(matches!(
            open(&sealed.envelope, &recipient),
            Err(CodecError::Crypto(CryptoError::OperationFailed))
        ));
    }

    #[test]
    fn tampered_timestamp_breaks_the_context_binding() {
        let recipient = X25519KeyPair::generate();
        let mut sealed = seal(b"secret", &recipient.public, false).unwrap();
        sealed.envelope.timestamp += 1;
        assert!(open(&sealed.envelope, &recipient).is_err());
    }

    #[test]
    fn seal_at_uses_the_given_timestamp() {
        let recipient = X25519KeyPair::generate();
        let sealed = seal_at(b"old", &recipient.public, false, 1_000_000).unwrap();
        assert_eq!(sealed.envelope.timestamp, 1_000_000);
        // Still opens: freshness is the caller's policy, not the codec's.
        assert_eq!(&open(&sealed.envelope, &recipient).unwrap().plaintext[..], b"old");
    }

    #[test]
    fn oversized_plaintext_is_rejected_before_any_crypto() {
        let recipient = X25519KeyPair::generate();
        let big = vec![0u8; 1023];
        assert!(matches!(
            seal(&big, &recipient.public, false),
            Err(CodecError::Padding(PaddingError::MessageTooLarge { .. }))
        ));
    }

    #[test]
    fn signature_payload_binds_context_and_ciphertext() {
        let recipient = X25519KeyPair::generate();
        let signer = Ed25519KeyPair::generate();

        let mut sealed = seal(b"signed hello", &recipient.public, true).unwrap();
        let sig = signer.sign(&signing_payload(&sealed.context, &sealed.envelope.ciphertext));
        sealed.envelope.signature = Some(sig);

        let parsed = Envelope::parse(&sealed.envelope.serialize()).unwrap();
        let opened = open(&parsed, &recipient).unwrap();

        let payload = signing_payload(&opened.context, &parsed.ciphertext);
        assert!(signer.public.verify(&payload, &parsed.signature.unwrap()));

        // A different ciphertext must not verify under the same signature.
        let other = signing_payload(&opened.context, b"other ciphertext");
        assert!(!signer.public.verify(&other, &parsed.signature.unwrap()));
    }

    #[test]
    fn each_seal_is_unique() {
        let recipient = X25519KeyPair::generate();
        let a = seal(b"same plaintext", &recipient.public, false).unwrap();
        let b = seal(b"same plaintext", &recipient.public, false).unwrap();
        assert_ne!(a.envelope.msg_id, b.envelope.msg_id);
        assert_ne!(a.envelope.salt, b.envelope.salt);
        assert_ne!(a.envelope.ciphertext, b.envelope.ciphertext);
    }
}
