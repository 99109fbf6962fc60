use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed public key material at a parse boundary (wrong length,
    /// bad encoding). Not secret-dependent; safe to surface verbatim.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Any runtime failure of a key agreement, derivation, seal or open.
    /// Deliberately carries no detail: distinguishing bad key from bad tag
    /// from bad ciphertext would hand an attacker a decryption oracle.
    #[error("Cryptographic operation failed")]
    OperationFailed,

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
