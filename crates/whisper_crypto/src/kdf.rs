//! Key derivation: DH shared secret → per-message symmetric key.
//!
//! HKDF-SHA256, extract-then-expand. The envelope's random 16-byte salt is
//! the extract salt; the canonical authenticated context is the expand info,
//! so the derived key is bound to every authenticated envelope field before
//! the AEAD even runs.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

/// 32-byte X25519 DH output. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub(crate) fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// 32-byte AEAD key for exactly one envelope. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct MessageKey([u8; 32]);

impl MessageKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn for_tests(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Derive the per-message AEAD key from the DH output.
pub fn derive_message_key(
    shared: &SharedSecret,
    salt: &[u8; 16],
    context: &[u8],
) -> Result<MessageKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(context, &mut key)
        .map_err(|_| CryptoError::OperationFailed)?;
    Ok(MessageKey(key))
}
