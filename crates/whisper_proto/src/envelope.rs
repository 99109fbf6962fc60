//! Wire envelope: the serialized, versioned unit exchanged between parties.
//!
//! Format (all binary fields unpadded base64url):
//!
//!   whisper1:v1.c20p.<rkid>.<flags>.<epk>.<salt>.<msgid>.<ts>.<ct>[.<sig>]
//!
//! The version tag itself contains a dot, so the parser strips the prefix,
//! splits on `.`, reassembles the first two fragments into the version tag,
//! then expects exactly 7 (unsigned) or 8 (signed) remaining fields. Any
//! other count, any other version, any decode or length violation is a hard
//! reject. There is no negotiation and no fallback.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use whisper_crypto::{Rkid, X25519PublicKey};

use crate::error::EnvelopeError;

pub const WIRE_PREFIX: &str = "whisper1:";
pub const VERSION_TAG: &str = "v1.c20p";

/// flags bit 0: envelope carries an Ed25519 signature.
pub const FLAG_SIGNED: u8 = 0b0000_0001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub rkid: Rkid,
    pub flags: u8,
    pub ephemeral_public: X25519PublicKey,
    pub salt: [u8; 16],
    /// Random per-envelope id; replay key and AEAD nonce material.
    pub msg_id: [u8; 16],
    /// Unix seconds at seal time.
    pub timestamp: i64,
    /// AEAD output: padded plaintext + 16-byte tag.
    pub ciphertext: Vec<u8>,
    pub signature: Option<[u8; 64]>,
}

impl Envelope {
    pub fn is_signed(&self) -> bool {
        self.flags & FLAG_SIGNED != 0
    }

    pub fn serialize(&self) -> String {
        debug_assert_eq!(self.is_signed(), self.signature.is_some());

        let mut out = String::with_capacity(128 + self.ciphertext.len() * 4 / 3);
        out.push_str(WIRE_PREFIX);
        out.push_str(VERSION_TAG);
        for field in [
            URL_SAFE_NO_PAD.encode(self.rkid.as_bytes()),
            URL_SAFE_NO_PAD.encode([self.flags]),
            URL_SAFE_NO_PAD.encode(self.ephemeral_public.as_bytes()),
            URL_SAFE_NO_PAD.encode(self.salt),
            URL_SAFE_NO_PAD.encode(self.msg_id),
            URL_SAFE_NO_PAD.encode((self.timestamp as u64).to_be_bytes()),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        ] {
            out.push('.');
            out.push_str(&field);
        }
        if let Some(sig) = &self.signature {
            out.push('.');
            out.push_str(&URL_SAFE_NO_PAD.encode(sig));
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let rest = text
            .strip_prefix(WIRE_PREFIX)
            .ok_or(EnvelopeError::InvalidFormat("missing envelope prefix"))?;

        let fields: Vec<&str> = rest.split('.').collect();
        if fields.len() < 2 {
            return Err(EnvelopeError::InvalidFormat("missing version tag"));
        }
        // The version tag spans the first two dot-fields.
        let version = format!("{}.{}", fields[0], fields[1]);
        if version != VERSION_TAG {
            return Err(EnvelopeError::UnsupportedVersion(version));
        }

        let body = &fields[2..];
        let signed = match body.len() {
            7 => false,
            8 => true,
            _ => return Err(EnvelopeError::InvalidFormat("wrong field count")),
        };

        let rkid = Rkid::from_slice(&b64_field(body[0])?)
            .map_err(|_| EnvelopeError::InvalidFormat("rkid must be 8 bytes"))?;

        let flags_bytes = b64_field(body[1])?;
        let [flags] = flags_bytes[..] else {
            return Err(EnvelopeError::InvalidFormat("flags must be 1 byte"));
        };

        let ephemeral_public = X25519PublicKey::from_slice(&b64_field(body[2])?)
            .map_err(|_| EnvelopeError::InvalidFormat("ephemeral key must be 32 bytes"))?;

        let salt = fixed::<16>(b64_field(body[3])?, "salt must be 16 bytes")?;
        let msg_id = fixed::<16>(b64_field(body[4])?, "msgId must be 16 bytes")?;
        let ts_bytes = fixed::<8>(b64_field(body[5])?, "timestamp must be 8 bytes")?;
        let timestamp = u64::from_be_bytes(ts_bytes) as i64;

        let ciphertext = b64_field(body[6])?;
        if ciphertext.is_empty() {
            return Err(EnvelopeError::InvalidFormat("empty ciphertext"));
        }

        let signature = if signed {
            Some(fixed::<64>(
                b64_field(body[7])?,
                "signature must be 64 bytes",
            )?)
        } else {
            None
        };

        if (flags & FLAG_SIGNED != 0) != signed {
            return Err(EnvelopeError::InvalidFormat(
                "flags disagree with signature presence",
            ));
        }

        Ok(Self {
            rkid,
            flags,
            ephemeral_public,
            salt,
            msg_id,
            timestamp,
            ciphertext,
            signature,
        })
    }
}

/// Cheap probe for paste/scan handlers: prefix and dot-field shape only.
/// No base64 decoding, no crypto, no allocation.
pub fn detect(text: &str) -> bool {
    let Some(rest) = text.trim().strip_prefix(WIRE_PREFIX) else {
        return false;
    };
    let dots = rest.bytes().filter(|&b| b == b'.').count();
    (dots == 8 || dots == 9) && !rest.split('.').any(str::is_empty)
}

fn b64_field(s: &str) -> Result<Vec<u8>, EnvelopeError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| EnvelopeError::InvalidFormat("invalid base64 field"))
}

fn fixed<const N: usize>(bytes: Vec<u8>, what: &'static str) -> Result<[u8; N], EnvelopeError> {
    bytes
        .try_into()
        .map_err(|_| EnvelopeError::InvalidFormat(what))
}
