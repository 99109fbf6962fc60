//! whisper_crypto — cryptographic primitives for the Whisper envelope core
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Runtime crypto failures collapse into one opaque error. Success or
//!   failure is the only signal that leaves this crate; bad key, bad tag
//!   and bad ciphertext are indistinguishable by contract.
//!
//! # Module layout
//! - `keys`        — X25519/Ed25519 newtypes, keypairs, sign/verify
//! - `kdf`         — Diffie-Hellman output + HKDF-SHA256 message keys
//! - `aead`        — ChaCha20-Poly1305 seal/open with derived nonces
//! - `fingerprint` — BLAKE3 key fingerprints, rkid, short/SAS display forms
//! - `error`       — unified error type

pub mod aead;
pub mod error;
pub mod fingerprint;
pub mod kdf;
pub mod keys;

pub use error::CryptoError;
pub use fingerprint::{Fingerprint, Rkid};
pub use kdf::{MessageKey, SharedSecret};
pub use keys::{
    Ed25519KeyPair, Ed25519PublicKey, EphemeralKeyPair, X25519KeyPair, X25519PublicKey,
};
