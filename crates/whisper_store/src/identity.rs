//! Local identities: the keypairs this endpoint decrypts and signs with.
//!
//! Private key material never leaves process memory through this module;
//! there is deliberately no SQLite backend here. A production app keeps the
//! secrets in its OS keystore and adapts it behind [`IdentityStore`]; the
//! in-memory implementation below is the reference and the test double.
//!
//! At most one identity is active at a time. Archived identities keep
//! decrypting the traffic that was encrypted to them (rkid lookup spans
//! both states); only `active()` is restricted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use whisper_crypto::{Ed25519KeyPair, Fingerprint, Rkid, X25519KeyPair};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    Active,
    Archived,
}

#[derive(Debug)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub x25519: X25519KeyPair,
    pub ed25519: Option<Ed25519KeyPair>,
    pub fingerprint: Fingerprint,
    pub rkid: Rkid,
    pub status: IdentityStatus,
    pub key_version: u32,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// New active identity around existing keypairs. Fingerprint and rkid
    /// are derived from the X25519 public key, never supplied.
    pub fn new(
        name: impl Into<String>,
        x25519: X25519KeyPair,
        ed25519: Option<Ed25519KeyPair>,
    ) -> Self {
        let fingerprint = x25519.public.fingerprint();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            x25519,
            ed25519,
            rkid: fingerprint.rkid(),
            fingerprint,
            status: IdentityStatus::Active,
            key_version: 1,
            created_at: Utc::now(),
        }
    }

    /// Fresh identity with newly generated agreement and signing keys.
    pub fn generate(name: impl Into<String>) -> Self {
        Self::new(name, X25519KeyPair::generate(), Some(Ed25519KeyPair::generate()))
    }

    /// Copy with a different status. Keypairs are rebuilt from their secret
    /// bytes; the stored 32-byte secrets always reconstruct.
    fn with_status(&self, status: IdentityStatus) -> Result<Self, StoreError> {
        let bad_key =
            || StoreError::Corrupt(format!("identity {}: unusable key material", self.id));
        let x25519 =
            X25519KeyPair::from_secret_bytes(self.x25519.secret_bytes()).map_err(|_| bad_key())?;
        let ed25519 = match &self.ed25519 {
            Some(kp) => {
                Some(Ed25519KeyPair::from_secret_bytes(kp.secret_bytes()).map_err(|_| bad_key())?)
            }
            None => None,
        };
        Ok(Self {
            id: self.id.clone(),
            name: self.name.clone(),
            x25519,
            ed25519,
            fingerprint: self.fingerprint,
            rkid: self.rkid,
            status,
            key_version: self.key_version,
            created_at: self.created_at,
        })
    }
}

#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert an identity. Inserting one that is active archives whichever
    /// identity was active before.
    async fn insert(&self, identity: Identity) -> Result<Arc<Identity>, StoreError>;

    /// The single active identity, if any.
    async fn active(&self) -> Result<Option<Arc<Identity>>, StoreError>;

    /// Identity whose rkid matches, searching active and archived alike.
    /// An active match wins over an archived one.
    async fn identity_for_rkid(&self, rkid: &Rkid) -> Result<Option<Arc<Identity>>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Arc<Identity>>, StoreError>;

    async fn archive(&self, id: &str) -> Result<(), StoreError>;

    /// Promote `id` to active, archiving the previous active identity.
    async fn set_active(&self, id: &str) -> Result<(), StoreError>;
}

/// In-memory identity store. Status changes replace the stored entry; handles
/// already given out keep the snapshot they loaded.
#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<String, Arc<Identity>>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn insert(&self, identity: Identity) -> Result<Arc<Identity>, StoreError> {
        let mut identities = self.identities.write().await;
        if identity.status == IdentityStatus::Active {
            demote_active(&mut identities)?;
        }
        let identity = Arc::new(identity);
        identities.insert(identity.id.clone(), identity.clone());
        Ok(identity)
    }

    async fn active(&self) -> Result<Option<Arc<Identity>>, StoreError> {
        Ok(self
            .identities
            .read()
            .await
            .values()
            .find(|i| i.status == IdentityStatus::Active)
            .cloned())
    }

    async fn identity_for_rkid(&self, rkid: &Rkid) -> Result<Option<Arc<Identity>>, StoreError> {
        let identities = self.identities.read().await;
        let mut archived_match = None;
        for identity in identities.values() {
            if identity.rkid != *rkid {
                continue;
            }
            if identity.status == IdentityStatus::Active {
                return Ok(Some(identity.clone()));
            }
            archived_match = Some(identity.clone());
        }
        Ok(archived_match)
    }

    async fn get(&self, id: &str) -> Result<Option<Arc<Identity>>, StoreError> {
        Ok(self.identities.read().await.get(id).cloned())
    }

    async fn archive(&self, id: &str) -> Result<(), StoreError> {
        let mut identities = self.identities.write().await;
        let identity = identities
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("identity {id}")))?;
        let archived = identity.with_status(IdentityStatus::Archived)?;
        identities.insert(id.to_string(), Arc::new(archived));
        Ok(())
    }

    async fn set_active(&self, id: &str) -> Result<(), StoreError> {
        let mut identities = self.identities.write().await;
        let identity = identities
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("identity {id}")))?;
        if identity.status == IdentityStatus::Active {
            return Ok(());
        }
        let promoted = identity.with_status(IdentityStatus::Active)?;
        demote_active(&mut identities)?;
        identities.insert(id.to_string(), Arc::new(promoted));
        Ok(())
    }
}

fn demote_active(identities: &mut HashMap<String, Arc<Identity>>) -> Result<(), StoreError> {
    let archived = identities
        .values()
        .find(|i| i.status == IdentityStatus::Active)
        .map(|i| i.with_status(IdentityStatus::Archived))
        .transpose()?;
    if let Some(archived) = archived {
        identities.insert(archived.id.clone(), Arc::new(archived));
    }
    Ok(())
}
