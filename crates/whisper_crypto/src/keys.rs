//! Key material newtypes and keypairs.
//!
//! Public halves are plain 32-byte newtypes, base64url-encoded on the wire.
//! Secret halves live inside keypair structs that zeroize on drop and are
//! only reachable through `secret_bytes()` (for the external key store) and
//! the DH/sign operations defined here.
//!
//! Identities carry an X25519 agreement key and an optional Ed25519 signing
//! key as independent keypairs; there is no cross-curve conversion anywhere.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as DalekX25519Public, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::fingerprint::Fingerprint;
use crate::kdf::SharedSecret;

// ── Public key newtypes ───────────────────────────────────────────────────────

/// 32-byte X25519 public key (key agreement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("X25519 key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// BLAKE3 fingerprint of this key. Everything a user sees about a key
    /// (hex, short form, SAS words, rkid) is derived from this.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

/// 32-byte Ed25519 public key (signature verification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("Ed25519 key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Verify a 64-byte Ed25519 signature. A boolean, not an error: callers
    /// attribute unverifiable signatures, they do not abort on them.
    pub fn verify(&self, msg: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(vk) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = Signature::from_bytes(signature);
        vk.verify(msg, &sig).is_ok()
    }
}

// ── X25519 keypairs ───────────────────────────────────────────────────────────

fn dh(secret_bytes: &[u8; 32], peer: &X25519PublicKey) -> Result<SharedSecret, CryptoError> {
    let secret = StaticSecret::from(*secret_bytes);
    let shared = secret.diffie_hellman(&DalekX25519Public::from(peer.0));
    // Reject low-order peer keys that force an all-zero shared secret.
    if !shared.was_contributory() {
        return Err(CryptoError::OperationFailed);
    }
    Ok(SharedSecret::new(*shared.as_bytes()))
}

/// Long-term X25519 agreement keypair. Drop clears memory via ZeroizeOnDrop.
#[derive(ZeroizeOnDrop)]
pub struct X25519KeyPair {
    #[zeroize(skip)]
    pub public: X25519PublicKey,
    secret_bytes: [u8; 32],
}

impl X25519KeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey(DalekX25519Public::from(&secret).to_bytes());
        Self { public, secret_bytes: secret.to_bytes() }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("X25519 secret must be 32 bytes, got {}", bytes.len()))
        })?;
        let secret = StaticSecret::from(arr);
        let public = X25519PublicKey(DalekX25519Public::from(&secret).to_bytes());
        Ok(Self { public, secret_bytes: arr })
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }

    /// Recipient-side DH: local long-term secret x sender's ephemeral public.
    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> Result<SharedSecret, CryptoError> {
        dh(&self.secret_bytes, peer)
    }
}

impl fmt::Debug for X25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X25519KeyPair")
            .field("public", &self.public)
            .field("secret_bytes", &"<redacted>")
            .finish()
    }
}

/// Per-message X25519 keypair. Generated fresh for every envelope and
/// dropped (zeroized) as soon as the message key is derived.
#[derive(ZeroizeOnDrop)]
pub struct EphemeralKeyPair {
    #[zeroize(skip)]
    pub public: X25519PublicKey,
    secret_bytes: [u8; 32],
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey(DalekX25519Public::from(&secret).to_bytes());
        Self { public, secret_bytes: secret.to_bytes() }
    }

    /// Sender-side DH: ephemeral secret x recipient's long-term public.
    /// Consumes the pair; the secret is zeroized here, not at scope end.
    pub fn diffie_hellman(self, peer: &X25519PublicKey) -> Result<SharedSecret, CryptoError> {
        dh(&self.secret_bytes, peer)
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public)
            .field("secret_bytes", &"<redacted>")
            .finish()
    }
}

// ── Ed25519 keypair ───────────────────────────────────────────────────────────

/// Optional signing keypair attached to an identity.
#[derive(ZeroizeOnDrop)]
pub struct Ed25519KeyPair {
    #[zeroize(skip)]
    pub public: Ed25519PublicKey,
    secret_bytes: [u8; 32],
}

impl Ed25519KeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public = Ed25519PublicKey(signing_key.verifying_key().to_bytes());
        Self { public, secret_bytes: signing_key.to_bytes() }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("Ed25519 secret must be 32 bytes, got {}", bytes.len()))
        })?;
        let signing_key = SigningKey::from_bytes(&arr);
        let public = Ed25519PublicKey(signing_key.verifying_key().to_bytes());
        Ok(Self { public, secret_bytes: arr })
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret_bytes)
    }

    /// Sign arbitrary bytes; returns the raw 64-byte Ed25519 signature.
    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing_key().sign(msg).to_bytes()
    }
}

impl fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public", &self.public)
            .field("secret_bytes", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_b64_roundtrip() {
        let pair = X25519KeyPair::generate();
        let b64 = pair.public.to_b64();
        let back = X25519PublicKey::from_b64(&b64).unwrap();
        assert_eq!(back, pair.public);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        let short = URL_SAFE_NO_PAD.encode([0u8; 31]);
        assert!(matches!(
            X25519PublicKey::from_b64(&short),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(Ed25519PublicKey::from_slice(&[0u8; 33]).is_err());
    }

    #[test]
    fn dh_agrees_between_sender_and_recipient() {
        let recipient = X25519KeyPair::generate();
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public;

        let sender_side = ephemeral.diffie_hellman(&recipient.public).unwrap();
        let recipient_side = recipient.diffie_hellman(&ephemeral_public).unwrap();

        assert_eq!(sender_side.as_bytes(), recipient_side.as_bytes());
    }

    #[test]
    fn dh_rejects_low_order_peer() {
        let ours = X25519KeyPair::generate();
        // The identity point: DH against it yields an all-zero shared secret.
        let low_order = X25519PublicKey([0u8; 32]);
        assert!(matches!(
            ours.diffie_hellman(&low_order),
            Err(CryptoError::OperationFailed)
        ));
    }

    #[test]
    fn sign_verify_roundtrip() {
        let pair = Ed25519KeyPair::generate();
        let sig = pair.sign(b"attribution payload");
        assert!(pair.public.verify(b"attribution payload", &sig));
        assert!(!pair.public.verify(b"attribution payloaD", &sig));
    }

    #[test]
    fn verify_with_wrong_key_fails() {
        let signer = Ed25519KeyPair::generate();
        let other = Ed25519KeyPair::generate();
        let sig = signer.sign(b"data");
        assert!(!other.public.verify(b"data", &sig));
    }

    #[test]
    fn keypair_restores_from_secret_bytes() {
        let pair = X25519KeyPair::generate();
        let restored = X25519KeyPair::from_secret_bytes(pair.secret_bytes()).unwrap();
        assert_eq!(restored.public, pair.public);

        let ed = Ed25519KeyPair::generate();
        let restored = Ed25519KeyPair::from_secret_bytes(ed.secret_bytes()).unwrap();
        assert_eq!(restored.public, ed.public);
    }
}
