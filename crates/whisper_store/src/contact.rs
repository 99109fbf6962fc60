//! Contact model and trust state machine.
//!
//! Trust is a property of a specific key, not of a person: any change of
//! key material resets trust to unverified and the old keys are kept as
//! owned copies in the history. Blocking is an orthogonal flag and never
//! interacts with trust transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use whisper_crypto::{Ed25519PublicKey, Fingerprint, Rkid, X25519PublicKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Unverified,
    Verified,
    Revoked,
}

impl TrustLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Unverified => "unverified",
            TrustLevel::Verified => "verified",
            TrustLevel::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unverified" => Some(TrustLevel::Unverified),
            "verified" => Some(TrustLevel::Verified),
            "revoked" => Some(TrustLevel::Revoked),
            _ => None,
        }
    }
}

/// A superseded key, kept as owned encoded copies so history entries stay
/// valid however the live contact changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHistoryEntry {
    /// base64url, no padding
    pub x25519_public: String,
    /// base64url, no padding
    pub ed25519_public: Option<String>,
    /// hex
    pub fingerprint: String,
    pub key_version: u32,
    pub replaced_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Contact {
    pub id: String,
    pub x25519_public: X25519PublicKey,
    pub ed25519_public: Option<Ed25519PublicKey>,
    pub fingerprint: Fingerprint,
    pub short_fingerprint: String,
    pub sas_words: [&'static str; 6],
    pub rkid: Rkid,
    pub trust_level: TrustLevel,
    pub is_blocked: bool,
    pub key_version: u32,
    pub key_history: Vec<KeyHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// New unverified, unblocked contact at key version 1. Every derived
    /// field comes from the X25519 key's fingerprint.
    pub fn new(x25519_public: X25519PublicKey, ed25519_public: Option<Ed25519PublicKey>) -> Self {
        let fingerprint = x25519_public.fingerprint();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            x25519_public,
            ed25519_public,
            short_fingerprint: fingerprint.short(),
            sas_words: fingerprint.sas_words(),
            rkid: fingerprint.rkid(),
            fingerprint,
            trust_level: TrustLevel::Unverified,
            is_blocked: false,
            key_version: 1,
            key_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Out-of-band verification succeeded (fingerprint/SAS/QR comparison).
    /// Valid from Unverified and from Revoked (re-verification).
    pub fn verify(&mut self) {
        self.trust_level = TrustLevel::Verified;
        self.touch();
    }

    /// Explicit distrust. Valid from any state.
    pub fn revoke(&mut self) {
        self.trust_level = TrustLevel::Revoked;
        self.touch();
    }

    pub fn block(&mut self) {
        self.is_blocked = true;
        self.touch();
    }

    pub fn unblock(&mut self) {
        self.is_blocked = false;
        self.touch();
    }

    /// True when `new_x` differs from the current agreement key.
    pub fn is_rotation(&self, new_x: &X25519PublicKey) -> bool {
        *new_x != self.x25519_public
    }

    /// Adopt new key material. The previous keys move into the history, all
    /// fingerprint-derived fields are recomputed, the version is bumped and
    /// trust resets to Unverified; verification never survives a key
    /// change, whatever the previous level was. Returns false (and changes
    /// nothing) when the material is identical.
    pub fn apply_rotation(
        &mut self,
        new_x: X25519PublicKey,
        new_ed: Option<Ed25519PublicKey>,
    ) -> bool {
        if new_x == self.x25519_public && new_ed == self.ed25519_public {
            return false;
        }

        self.key_history.push(KeyHistoryEntry {
            x25519_public: self.x25519_public.to_b64(),
            ed25519_public: self.ed25519_public.as_ref().map(Ed25519PublicKey::to_b64),
            fingerprint: self.fingerprint.to_hex(),
            key_version: self.key_version,
            replaced_at: Utc::now(),
        });

        let fingerprint = new_x.fingerprint();
        self.x25519_public = new_x;
        self.ed25519_public = new_ed;
        self.short_fingerprint = fingerprint.short();
        self.sas_words = fingerprint.sas_words();
        self.rkid = fingerprint.rkid();
        self.fingerprint = fingerprint;
        self.key_version += 1;
        self.trust_level = TrustLevel::Unverified;
        self.touch();
        true
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
