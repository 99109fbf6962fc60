//! The signing seam.
//!
//! Producing an envelope signature may suspend on an OS authentication
//! prompt, so it lives behind a trait the application implements. The
//! policy engine only decides whether signing routes through here; it
//! never performs authentication itself. A user cancelling the prompt is a
//! distinct outcome from the prompt failing: callers map the former to a
//! policy violation, never to a hard failure.

use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use whisper_crypto::Ed25519KeyPair;
use whisper_store::IdentityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The user dismissed the authentication prompt.
    #[error("Signing cancelled by user")]
    UserCancelled,

    /// No signing authority for this key id (no key, no enrolled biometry).
    #[error("Signing authority not available")]
    NotAvailable,

    /// The prompt ran and authentication did not succeed.
    #[error("Authentication failed")]
    AuthenticationFailed,
}

#[async_trait::async_trait]
pub trait SecureSigner: Send + Sync {
    /// Sign `data` with the signing key named by `key_id`. May suspend on
    /// user interaction; cancellation surfaces as [`SignerError::UserCancelled`].
    async fn sign(&self, data: &[u8], key_id: &str) -> Result<[u8; 64], SignerError>;
}

/// Signs immediately with the identity's in-memory Ed25519 key. The
/// production signer where no OS-level gating is configured.
pub struct IdentitySigner {
    identities: Arc<dyn IdentityStore>,
}

impl IdentitySigner {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }
}

#[async_trait::async_trait]
impl SecureSigner for IdentitySigner {
    async fn sign(&self, data: &[u8], key_id: &str) -> Result<[u8; 64], SignerError> {
        let identity = self
            .identities
            .get(key_id)
            .await
            .map_err(|_| SignerError::NotAvailable)?
            .ok_or(SignerError::NotAvailable)?;
        let key = identity.ed25519.as_ref().ok_or(SignerError::NotAvailable)?;
        Ok(key.sign(data))
    }
}

/// Deterministic test double. Outcomes are scripted per call: `Ok` signs
/// with the held key, `Err` returns that error. An empty script signs.
pub struct ScriptedSigner {
    key: Ed25519KeyPair,
    script: Mutex<VecDeque<Result<(), SignerError>>>,
}

impl ScriptedSigner {
    pub fn new(key: Ed25519KeyPair) -> Self {
        Self { key, script: Mutex::new(VecDeque::new()) }
    }

    /// Queue an outcome for the next `sign` call.
    pub async fn push_outcome(&self, outcome: Result<(), SignerError>) {
        self.script.lock().await.push_back(outcome);
    }
}

#[async_trait::async_trait]
impl SecureSigner for ScriptedSigner {
    async fn sign(&self, data: &[u8], _key_id: &str) -> Result<[u8; 64], SignerError> {
        match self.script.lock().await.pop_front() {
            Some(Err(e)) => Err(e),
            Some(Ok(())) | None => Ok(self.key.sign(data)),
        }
    }
}
