//! Authenticated Encryption with Associated Data
//!
//! IETF ChaCha20-Poly1305 — the `c20p` in the wire version tag.
//! Key: 32 bytes (one per envelope, from `kdf`).  Nonce: 12 bytes.  Tag: 16 bytes.
//!
//! The wire format carries no nonce field: the nonce is derived from the
//! envelope's random 16-byte msgId with a domain-separated BLAKE3 hash.
//! Every envelope gets a fresh key (fresh ephemeral + fresh salt), so a
//! key/nonce pair can never repeat.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::kdf::MessageKey;

const NONCE_DOMAIN: &[u8] = b"whisper-nonce-v1\x00";

/// Poly1305 tag length. `open` rejects anything shorter outright.
pub const TAG_LEN: usize = 16;

/// Derive the 12-byte AEAD nonce from arbitrary nonce material (the msgId).
pub fn nonce_from_material(material: &[u8]) -> [u8; 12] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(NONCE_DOMAIN);
    hasher.update(material);
    let hash = hasher.finalize();
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&hash.as_bytes()[..12]);
    nonce
}

/// Encrypt `plaintext`, authenticating `aad` (the canonical context).
/// Returns ciphertext with the 16-byte tag appended.
pub fn seal(
    key: &MessageKey,
    nonce_material: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::OperationFailed)?;
    let nonce = nonce_from_material(nonce_material);

    cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            chacha20poly1305::aead::Payload { msg: plaintext, aad },
        )
        .map_err(|_| CryptoError::OperationFailed)
}

/// Decrypt and authenticate. Any failure (wrong key, truncated input,
/// tag mismatch, mismatched aad) is the same opaque error.
pub fn open(
    key: &MessageKey,
    nonce_material: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::OperationFailed);
    }
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::OperationFailed)?;
    let nonce = nonce_from_material(nonce_material);

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            chacha20poly1305::aead::Payload { msg: ciphertext, aad },
        )
        .map_err(|_| CryptoError::OperationFailed)?;

    Ok(Zeroizing::new(plaintext))
}
