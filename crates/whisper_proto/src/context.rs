//! Canonical authenticated context.
//!
//! The deterministic byte string that binds an envelope together. It is fed
//! to HKDF as the expand info AND to the AEAD as associated data, so both
//! sides must rebuild it independently and byte-identically before any
//! decryption can succeed.
//!
//! Layout, fixed order:
//!   lp(app id) lp(version) lp(sender fingerprint) lp(recipient fingerprint)
//!   policy-flags word (u32 BE)
//!   lp(rkid) lp(ephemeral public) lp(salt) lp(msgId)
//!   timestamp (u64 BE, unix seconds)
//! where lp(x) is a 4-byte BE length of x followed by x itself.
//!
//! The sender fingerprint is the fingerprint of the EPHEMERAL key: the
//! envelope carries no sender identity (attribution happens after open,
//! via signatures), so the ephemeral key is the only sender-side value
//! both parties hold before decryption.

use whisper_crypto::{Fingerprint, Rkid, X25519PublicKey};

use crate::envelope::VERSION_TAG;

/// Application identifier bound into every context.
pub const APP_ID: &[u8] = b"whisper";

pub struct ContextInputs<'a> {
    pub sender_fingerprint: &'a Fingerprint,
    pub recipient_fingerprint: &'a Fingerprint,
    pub flags: u8,
    pub rkid: &'a Rkid,
    pub ephemeral_public: &'a X25519PublicKey,
    pub salt: &'a [u8; 16],
    pub msg_id: &'a [u8; 16],
    pub timestamp: i64,
}

pub fn canonical_context(inputs: &ContextInputs<'_>) -> Vec<u8> {
    let mut out = Vec::with_capacity(200);
    push_prefixed(&mut out, APP_ID);
    push_prefixed(&mut out, VERSION_TAG.as_bytes());
    push_prefixed(&mut out, inputs.sender_fingerprint.as_bytes());
    push_prefixed(&mut out, inputs.recipient_fingerprint.as_bytes());
    // Flags byte zero-extended to the 4-byte policy-flags word.
    out.extend_from_slice(&(inputs.flags as u32).to_be_bytes());
    push_prefixed(&mut out, inputs.rkid.as_bytes());
    push_prefixed(&mut out, inputs.ephemeral_public.as_bytes());
    push_prefixed(&mut out, inputs.salt);
    push_prefixed(&mut out, inputs.msg_id);
    out.extend_from_slice(&(inputs.timestamp as u64).to_be_bytes());
    out
}

fn push_prefixed(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u32).to_be_bytes());
    out.extend_from_slice(field);
}
