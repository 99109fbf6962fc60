//! Fixed-bucket length hiding.
//!
//! Padding is applied INSIDE the plaintext before encryption, so an
//! observer of the wire only ever sees one of three ciphertext sizes.
//!
//! Layout: [original_len: u16 BE] [message] [zero fill to bucket size]
//!
//! Unpadding validates the zero fill with a constant-time OR-accumulation
//! over the full tail. An early-exit comparison would leak, through timing,
//! how much padding a given ciphertext carried.

use crate::error::PaddingError;

/// Bucket sizes in bytes. Every padded message is exactly one of these.
pub const BUCKETS: [usize; 3] = [256, 512, 1024];

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX: usize = 2;

/// Largest message that fits the largest bucket.
pub const MAX_MESSAGE_LEN: usize = BUCKETS[2] - LENGTH_PREFIX;

/// Smallest bucket that holds `len` message bytes plus the prefix.
pub fn bucket_for(len: usize) -> Option<usize> {
    let needed = len.saturating_add(LENGTH_PREFIX);
    BUCKETS.iter().copied().find(|&b| needed <= b)
}

/// Pad `msg` to its bucket: length prefix, message, zero fill.
pub fn pad(msg: &[u8]) -> Result<Vec<u8>, PaddingError> {
    let bucket = bucket_for(msg.len()).ok_or(PaddingError::MessageTooLarge {
        actual: msg.len(),
        max: MAX_MESSAGE_LEN,
    })?;

    let mut out = vec![0u8; bucket];
    out[..LENGTH_PREFIX].copy_from_slice(&(msg.len() as u16).to_be_bytes());
    out[LENGTH_PREFIX..LENGTH_PREFIX + msg.len()].copy_from_slice(msg);
    Ok(out)
}

/// Recover the message. Validates the length prefix bounds and that every
/// fill byte is zero; the zero check folds the whole tail regardless of
/// where the first violation sits.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>, PaddingError> {
    if padded.len() < LENGTH_PREFIX {
        return Err(PaddingError::InvalidPadding);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if LENGTH_PREFIX + len > padded.len() {
        return Err(PaddingError::InvalidPadding);
    }

    let mut nonzero = 0u8;
    for &b in &padded[LENGTH_PREFIX + len..] {
        nonzero |= b;
    }
    if nonzero != 0 {
        return Err(PaddingError::InvalidPadding);
    }

    Ok(padded[LENGTH_PREFIX..LENGTH_PREFIX + len].to_vec())
}
