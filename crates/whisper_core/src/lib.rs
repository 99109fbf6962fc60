//! whisper_core — the Whisper facade and the policy that governs it
//!
//! Wires the lower crates into the two operations the application calls:
//! `encrypt` and `decrypt`, plus the cheap `detect` probe. Everything a
//! caller observes funnels through `WhisperError`, which deliberately
//! collapses cryptographic failure detail.
//!
//! # Modules
//! - `service`     — `WhisperService`: the encrypt/decrypt/detect facade
//! - `policy`      — send-time policy flags and their enforcement
//! - `attribution` — who signed an envelope, resolved against contacts
//! - `signer`      — the interactive signing seam (biometric gating)
//! - `error`       — user-facing error type with fixed disclosure rules

pub mod attribution;
pub mod error;
pub mod policy;
pub mod service;
pub mod signer;

pub use attribution::Attribution;
pub use error::{PolicyViolationKind, WhisperError};
pub use policy::{
    requires_biometric_for_signing, should_archive_on_rotation, validate_send_policy,
    validate_signature_policy, PolicyConfig,
};
pub use service::{Decrypted, SendTarget, WhisperService};
pub use signer::{IdentitySigner, ScriptedSigner, SecureSigner, SignerError};
