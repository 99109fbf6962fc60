//! Key fingerprints and their display forms.
//!
//! A fingerprint is the BLAKE3-256 hash of an X25519 public key. Everything
//! shown to a user for out-of-band verification is derived from it:
//! - hex: full 64-char form for power users
//! - short: first 12 chars of unpadded base32, for compact display
//! - SAS words: 6 words from a fixed 256-word table, pronounceable over a call
//!
//! The rkid (recipient key id, trailing 8 fingerprint bytes) travels in every
//! envelope so the recipient can pick the right local identity; it reveals
//! nothing beyond those 8 hash bytes.

use std::fmt;

use crate::error::CryptoError;
use crate::keys::X25519PublicKey;

// ── Fingerprint ───────────────────────────────────────────────────────────────

/// 32-byte BLAKE3 hash of an X25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(key: &X25519PublicKey) -> Self {
        Self(blake3::hash(key.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey("fingerprint must be 32 bytes".into())
        })?;
        Ok(Self(arr))
    }

    /// Recipient key id: the trailing 8 bytes of the fingerprint.
    pub fn rkid(&self) -> Rkid {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[24..]);
        Rkid(id)
    }

    /// Compact display form: first 12 characters of unpadded base32.
    pub fn short(&self) -> String {
        base32_prefix(&self.0, 12)
    }

    /// Six words for spoken out-of-band comparison, one per leading byte.
    pub fn sas_words(&self) -> [&'static str; 6] {
        let mut words = [""; 6];
        for (i, word) in words.iter_mut().enumerate() {
            *word = SAS_WORDS[self.0[i] as usize];
        }
        words
    }

    /// Constant-time comparison for verification flows: the full 32 bytes
    /// are always folded, no early exit on the first differing byte.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ── Recipient key id ──────────────────────────────────────────────────────────

/// 8-byte envelope routing id derived from a fingerprint. Non-secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rkid([u8; 8]);

impl Rkid {
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("rkid must be 8 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Rkid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ── Base32 (RFC 4648 alphabet, unpadded prefix) ───────────────────────────────

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn base32_prefix(bytes: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &b in bytes {
        buffer = (buffer << 8) | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
            if out.len() == chars {
                return out;
            }
        }
    }
    // Final partial group, zero-filled on the right per RFC 4648.
    if bits > 0 && out.len() < chars {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

// ── SAS word table ────────────────────────────────────────────────────────────

/// Fixed 256-word table, one word per byte value. Two-syllable, phonetically
/// distinct words chosen for spoken verification. NEVER reorder or edit:
/// both parties must map bytes identically or verification breaks.
const SAS_WORDS: [&str; 256] = [
    "aardvark", "absurd", "accrue", "acme", "adrift", "adult", "afflict", "ahead",
    "aimless", "algol", "allow", "alone", "ammo", "ancient", "apple", "artist",
    "assume", "athens", "atlas", "aztec", "baboon", "backfield", "backward", "banjo",
    "beaming", "bedlamp", "beehive", "beeswax", "befriend", "belfast", "berserk", "billiard",
    "bison", "blackjack", "blockade", "blowtorch", "bluebird", "bombast", "bookshelf", "brackish",
    "breadline", "breakup", "brickyard", "briefcase", "burbank", "button", "buzzard", "cement",
    "chairlift", "chatter", "checkup", "chisel", "choking", "chopper", "christmas", "clamshell",
    "classic", "classroom", "cleanup", "clockwork", "cobra", "commence", "concert", "cowbell",
    "crackdown", "cranky", "crowfoot", "crucial", "crumpled", "crusade", "cubic", "dashboard",
    "deadbolt", "deckhand", "dogsled", "dragnet", "drainage", "dreadful", "drifter", "dropper",
    "drumbeat", "drunken", "dupont", "dwelling", "eating", "edict", "egghead", "eightball",
    "endorse", "endow", "enlist", "erase", "escape", "exceed", "eyeglass", "eyetooth",
    "facial", "fallout", "flagpole", "flatfoot", "flytrap", "fracture", "framework", "freedom",
    "frighten", "gazelle", "geiger", "glitter", "glucose", "goggles", "goldfish", "gremlin",
    "guidance", "hamlet", "highchair", "hockey", "indoors", "indulge", "inverse", "involve",
    "island", "jawbone", "keyboard", "kickoff", "kiwi", "klaxon", "locale", "lockup",
    "merit", "minnow", "miser", "mohawk", "mural", "music", "necklace", "neptune",
    "newborn", "nightbird", "oakland", "obtuse", "offload", "optic", "orca", "payday",
    "peachy", "pheasant", "physique", "playhouse", "pluto", "preclude", "prefer", "preshrunk",
    "printer", "prowler", "pupil", "puppy", "python", "quadrant", "quiver", "quota",
    "ragtime", "ratchet", "rebirth", "reform", "regain", "reindeer", "rematch", "repay",
    "retouch", "revenge", "reward", "rhythm", "ribcage", "ringbolt", "ringside", "robust",
    "rocker", "ruffled", "sailboat", "sawdust", "scallion", "scenic", "scorecard", "scotland",
    "seabird", "select", "sentence", "shadow", "shamrock", "showgirl", "skullcap", "skydive",
    "slingshot", "slowdown", "snapline", "snapshot", "snowcap", "snowslide", "solo", "southward",
    "soybean", "spaniel", "spearhead", "spellbind", "spheroid", "spigot", "spindle", "spyglass",
    "stagehand", "stagnate", "stairway", "standard", "stapler", "steamship", "sterling", "stockman",
    "stopwatch", "stormy", "sugar", "surmount", "suspense", "sweatband", "swelter", "tactics",
    "talon", "tapeworm", "tempest", "tiger", "tissue", "tonic", "topmost", "tracker",
    "transit", "trauma", "treadmill", "trojan", "trouble", "tumor", "tunnel", "tycoon",
    "uncut", "unearth", "unwind", "uproot", "upset", "upshot", "vapor", "village",
    "virus", "vulcan", "waffle", "wallet", "watchword", "wayside", "willow", "woodlark",
];
