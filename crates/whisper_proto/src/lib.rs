//! whisper_proto — wire envelope, canonical context, and padding
//!
//! Everything needed to turn plaintext into a self-contained envelope
//! string and back. The envelope travels over out-of-band channels (QR,
//! clipboard, file); there is no transport and no negotiation in here.
//!
//! # Modules
//! - `envelope` — strict `whisper1:v1.c20p` wire format + `detect()`
//! - `context`  — canonical authenticated context (KDF info / AEAD aad)
//! - `padding`  — fixed-bucket length hiding inside the AEAD plaintext
//! - `codec`    — seal/open orchestration over whisper_crypto
//! - `error`    — padding, envelope, and combined codec errors

pub mod codec;
pub mod context;
pub mod envelope;
pub mod error;
pub mod padding;

pub use codec::{open, seal, seal_at, signing_payload, OpenedEnvelope, SealedEnvelope};
pub use envelope::{detect, Envelope, FLAG_SIGNED, VERSION_TAG, WIRE_PREFIX};
pub use error::{CodecError, EnvelopeError, PaddingError};
