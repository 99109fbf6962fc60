//! Contact persistence and the trust-store service.
//!
//! Two backends behind one trait: SQLite for production, an in-memory map
//! for tests and embedding. Key history is stored as a JSON column; derived
//! fields (fingerprint, short form, rkid) are recomputed from the stored
//! key on load and cross-checked, so an edited row surfaces as `Corrupt`
//! instead of silently changing what the user verified.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use whisper_crypto::{Ed25519PublicKey, X25519PublicKey};

use crate::contact::{Contact, KeyHistoryEntry, TrustLevel};
use crate::error::StoreError;

#[async_trait::async_trait]
pub trait ContactStore: Send + Sync {
    async fn upsert(&self, contact: &Contact) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Contact>, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn all(&self) -> Result<Vec<Contact>, StoreError>;
    /// Contacts carrying a signing key, for signature attribution.
    async fn signing_candidates(&self) -> Result<Vec<Contact>, StoreError>;
}

// ── SQLite implementation ───────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
struct ContactRow {
    id: String,
    x25519_public: String,
    ed25519_public: Option<String>,
    fingerprint: String,
    short_fingerprint: String,
    rkid: String,
    trust_level: String,
    is_blocked: bool,
    key_version: i64,
    key_history: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ContactRow {
    fn into_contact(self) -> Result<Contact, StoreError> {
        let corrupt = |what: &str| StoreError::Corrupt(format!("contact {}: {what}", self.id));

        let x25519_public = X25519PublicKey::from_b64(&self.x25519_public)
            .map_err(|_| corrupt("bad x25519 key"))?;
        let ed25519_public = match &self.ed25519_public {
            Some(b64) => {
                Some(Ed25519PublicKey::from_b64(b64).map_err(|_| corrupt("bad ed25519 key"))?)
            }
            None => None,
        };

        // Derived fields are recomputed; a mismatch with the stored columns
        // means the row no longer describes the key the user saw.
        let fingerprint = x25519_public.fingerprint();
        if fingerprint.to_hex() != self.fingerprint {
            return Err(corrupt("fingerprint mismatch"));
        }
        let short_fingerprint = fingerprint.short();
        if short_fingerprint != self.short_fingerprint {
            return Err(corrupt("short fingerprint mismatch"));
        }
        if fingerprint.rkid().to_hex() != self.rkid {
            return Err(corrupt("rkid mismatch"));
        }

        let trust_level =
            TrustLevel::parse(&self.trust_level).ok_or_else(|| corrupt("unknown trust level"))?;
        let key_version =
            u32::try_from(self.key_version).map_err(|_| corrupt("bad key version"))?;
        let key_history: Vec<KeyHistoryEntry> = serde_json::from_str(&self.key_history)?;

        Ok(Contact {
            id: self.id,
            x25519_public,
            ed25519_public,
            short_fingerprint,
            sas_words: fingerprint.sas_words(),
            rkid: fingerprint.rkid(),
            fingerprint,
            trust_level,
            is_blocked: self.is_blocked,
            key_version,
            key_history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct SqliteContactStore {
    pool: sqlx::SqlitePool,
}

impl SqliteContactStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContactStore for SqliteContactStore {
    async fn upsert(&self, contact: &Contact) -> Result<(), StoreError> {
        let key_history = serde_json::to_string(&contact.key_history)?;
        sqlx::query(
            "INSERT INTO contacts (id, x25519_public, ed25519_public, fingerprint, \
             short_fingerprint, rkid, trust_level, is_blocked, key_version, key_history, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             x25519_public = excluded.x25519_public, \
             ed25519_public = excluded.ed25519_public, \
             fingerprint = excluded.fingerprint, \
             short_fingerprint = excluded.short_fingerprint, \
             rkid = excluded.rkid, \
             trust_level = excluded.trust_level, \
             is_blocked = excluded.is_blocked, \
             key_version = excluded.key_version, \
             key_history = excluded.key_history, \
             updated_at = excluded.updated_at",
        )
        .bind(&contact.id)
        .bind(contact.x25519_public.to_b64())
        .bind(contact.ed25519_public.as_ref().map(Ed25519PublicKey::to_b64))
        .bind(contact.fingerprint.to_hex())
        .bind(&contact.short_fingerprint)
        .bind(contact.rkid.to_hex())
        .bind(contact.trust_level.as_str())
        .bind(contact.is_blocked)
        .bind(contact.key_version as i64)
        .bind(key_history)
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Contact>, StoreError> {
        let row = sqlx::query_as::<_, ContactRow>("SELECT * FROM contacts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ContactRow::into_contact).transpose()
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Contact>, StoreError> {
        let rows =
            sqlx::query_as::<_, ContactRow>("SELECT * FROM contacts ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(ContactRow::into_contact).collect()
    }

    async fn signing_candidates(&self) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query_as::<_, ContactRow>(
            "SELECT * FROM contacts WHERE ed25519_public IS NOT NULL ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ContactRow::into_contact).collect()
    }
}

// ── In-memory double ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryContactStore {
    contacts: RwLock<HashMap<String, Contact>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ContactStore for MemoryContactStore {
    async fn upsert(&self, contact: &Contact) -> Result<(), StoreError> {
        self.contacts
            .write()
            .await
            .insert(contact.id.clone(), contact.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Contact>, StoreError> {
        Ok(self.contacts.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.contacts.write().await.remove(id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Contact>, StoreError> {
        let mut contacts: Vec<Contact> = self.contacts.read().await.values().cloned().collect();
        contacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(contacts)
    }

    async fn signing_candidates(&self) -> Result<Vec<Contact>, StoreError> {
        let mut contacts = self.all().await?;
        contacts.retain(|c| c.ed25519_public.is_some());
        Ok(contacts)
    }
}

// ── Service ─────────────────────────────────────────────────────────────────

/// Trust operations over a [`ContactStore`]: every mutation goes through the
/// contact state machine and is persisted in one step.
#[derive(Clone)]
pub struct ContactTrustStore {
    store: Arc<dyn ContactStore>,
}

impl ContactTrustStore {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    pub async fn add_contact(&self, contact: Contact) -> Result<Contact, StoreError> {
        self.store.upsert(&contact).await?;
        tracing::debug!(
            target: "whisper_store",
            event = "contact_added",
            contact_id = %contact.id,
            rkid = %contact.rkid,
        );
        Ok(contact)
    }

    pub async fn contact(&self, id: &str) -> Result<Option<Contact>, StoreError> {
        self.store.get(id).await
    }

    pub async fn all(&self) -> Result<Vec<Contact>, StoreError> {
        self.store.all().await
    }

    pub async fn signing_candidates(&self) -> Result<Vec<Contact>, StoreError> {
        self.store.signing_candidates().await
    }

    pub async fn delete_contact(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(id).await
    }

    pub async fn verify_contact(&self, id: &str) -> Result<Contact, StoreError> {
        let mut contact = self.load(id).await?;
        contact.verify();
        self.store.upsert(&contact).await?;
        Ok(contact)
    }

    pub async fn revoke_contact(&self, id: &str) -> Result<Contact, StoreError> {
        let mut contact = self.load(id).await?;
        contact.revoke();
        self.store.upsert(&contact).await?;
        Ok(contact)
    }

    pub async fn set_blocked(&self, id: &str, blocked: bool) -> Result<Contact, StoreError> {
        let mut contact = self.load(id).await?;
        if blocked {
            contact.block();
        } else {
            contact.unblock();
        }
        self.store.upsert(&contact).await?;
        Ok(contact)
    }

    /// Rotation entry point. A key change demotes the contact to unverified
    /// and is worth a warning in the log; identical material is a no-op.
    pub async fn update_contact_key(
        &self,
        id: &str,
        new_x: X25519PublicKey,
        new_ed: Option<Ed25519PublicKey>,
    ) -> Result<Contact, StoreError> {
        let mut contact = self.load(id).await?;
        if contact.apply_rotation(new_x, new_ed) {
            tracing::warn!(
                target: "whisper_store",
                event = "contact_key_rotated",
                contact_id = %contact.id,
                key_version = contact.key_version,
                rkid = %contact.rkid,
            );
            self.store.upsert(&contact).await?;
        }
        Ok(contact)
    }

    async fn load(&self, id: &str) -> Result<Contact, StoreError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("contact {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::{remove_db, temp_db_path};
    use crate::db::Store;
    use whisper_crypto::{Ed25519KeyPair, X25519KeyPair};

    fn sample_contact() -> Contact {
        let x = X25519KeyPair::generate();
        let ed = Ed25519KeyPair::generate();
        Contact::new(x.public, Some(ed.public))
    }

    async fn assert_backend_contract(store: Arc<dyn ContactStore>) {
        let mut contact = sample_contact();
        // A rotation gives the contact a non-trivial history to persist.
        let new_x = X25519KeyPair::generate();
        contact.apply_rotation(new_x.public, contact.ed25519_public);
        contact.verify();

        store.upsert(&contact).await.unwrap();
        let loaded = store.get(&contact.id).await.unwrap().expect("contact exists");

        assert_eq!(loaded.id, contact.id);
        assert_eq!(loaded.x25519_public, contact.x25519_public);
        assert_eq!(loaded.ed25519_public, contact.ed25519_public);
        assert_eq!(loaded.fingerprint, contact.fingerprint);
        assert_eq!(loaded.short_fingerprint, contact.short_fingerprint);
        assert_eq!(loaded.sas_words, contact.sas_words);
        assert_eq!(loaded.rkid, contact.rkid);
        assert_eq!(loaded.trust_level, TrustLevel::Verified);
        assert!(!loaded.is_blocked);
        assert_eq!(loaded.key_version, 2);
        assert_eq!(loaded.key_history, contact.key_history);
        assert_eq!(loaded.created_at.timestamp_millis(), contact.created_at.timestamp_millis());

        // Second upsert overwrites.
        let mut updated = loaded.clone();
        updated.block();
        store.upsert(&updated).await.unwrap();
        assert!(store.get(&contact.id).await.unwrap().unwrap().is_blocked);

        // Unknown id.
        assert!(store.get("no-such-id").await.unwrap().is_none());

        // Candidates: only contacts with a signing key.
        let keyless = Contact::new(X25519KeyPair::generate().public, None);
        store.upsert(&keyless).await.unwrap();
        let candidates = store.signing_candidates().await.unwrap();
        assert!(candidates.iter().any(|c| c.id == contact.id));
        assert!(!candidates.iter().any(|c| c.id == keyless.id));
        assert_eq!(store.all().await.unwrap().len(), 2);

        store.delete(&contact.id).await.unwrap();
        assert!(store.get(&contact.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_backend_contract() {
        assert_backend_contract(Arc::new(MemoryContactStore::new())).await;
    }

    #[tokio::test]
    async fn sqlite_backend_contract() {
        let db_path = temp_db_path();
        let store = Store::open(&db_path).await.expect("open store");
        assert_backend_contract(Arc::new(store.contacts())).await;
        remove_db(&db_path);
    }

    #[tokio::test]
    async fn tampered_row_reports_corrupt() {
        let db_path = temp_db_path();
        let store = Store::open(&db_path).await.expect("open store");
        let contacts = store.contacts();

        let contact = sample_contact();
        contacts.upsert(&contact).await.unwrap();

        // Swap in a different key under the same fingerprint columns.
        let other = X25519KeyPair::generate();
        sqlx::query("UPDATE contacts SET x25519_public = ? WHERE id = ?")
            .bind(other.public.to_b64())
            .bind(&contact.id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            contacts.get(&contact.id).await,
            Err(StoreError::Corrupt(_))
        ));

        remove_db(&db_path);
    }

    #[tokio::test]
    async fn tampered_short_fingerprint_reports_corrupt() {
        let db_path = temp_db_path();
        let store = Store::open(&db_path).await.expect("open store");
        let contacts = store.contacts();

        let contact = sample_contact();
        contacts.upsert(&contact).await.unwrap();

        // Right shape (12 base32 characters), wrong content.
        sqlx::query("UPDATE contacts SET short_fingerprint = 'AAAAAAAAAAAA' WHERE id = ?")
            .bind(&contact.id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            contacts.get(&contact.id).await,
            Err(StoreError::Corrupt(_))
        ));

        remove_db(&db_path);
    }

    #[tokio::test]
    async fn unknown_trust_level_reports_corrupt() {
        let db_path = temp_db_path();
        let store = Store::open(&db_path).await.expect("open store");
        let contacts = store.contacts();

        let contact = sample_contact();
        contacts.upsert(&contact).await.unwrap();
        sqlx::query("UPDATE contacts SET trust_level = 'trusted' WHERE id = ?")
            .bind(&contact.id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            contacts.get(&contact.id).await,
            Err(StoreError::Corrupt(_))
        ));

        remove_db(&db_path);
    }

    #[tokio::test]
    async fn service_persists_state_machine_transitions() {
        let service = ContactTrustStore::new(Arc::new(MemoryContactStore::new()));
        let contact = service.add_contact(sample_contact()).await.unwrap();

        let verified = service.verify_contact(&contact.id).await.unwrap();
        assert_eq!(verified.trust_level, TrustLevel::Verified);

        let blocked = service.set_blocked(&contact.id, true).await.unwrap();
        assert!(blocked.is_blocked);
        assert_eq!(blocked.trust_level, TrustLevel::Verified);

        let revoked = service.revoke_contact(&contact.id).await.unwrap();
        assert_eq!(revoked.trust_level, TrustLevel::Revoked);

        let stored = service.contact(&contact.id).await.unwrap().unwrap();
        assert_eq!(stored.trust_level, TrustLevel::Revoked);
        assert!(stored.is_blocked);
    }

    #[tokio::test]
    async fn service_rotation_demotes_and_persists() {
        let service = ContactTrustStore::new(Arc::new(MemoryContactStore::new()));
        let contact = service.add_contact(sample_contact()).await.unwrap();
        service.verify_contact(&contact.id).await.unwrap();

        let new_x = X25519KeyPair::generate();
        let new_ed = Ed25519KeyPair::generate();
        let rotated = service
            .update_contact_key(&contact.id, new_x.public, Some(new_ed.public))
            .await
            .unwrap();

        assert_eq!(rotated.trust_level, TrustLevel::Unverified);
        assert_eq!(rotated.key_version, 2);
        assert_eq!(rotated.x25519_public, new_x.public);

        let stored = service.contact(&contact.id).await.unwrap().unwrap();
        assert_eq!(stored.trust_level, TrustLevel::Unverified);
        assert_eq!(stored.key_history.len(), 1);
    }

    #[tokio::test]
    async fn service_same_key_update_is_a_noop() {
        let service = ContactTrustStore::new(Arc::new(MemoryContactStore::new()));
        let contact = service.add_contact(sample_contact()).await.unwrap();
        service.verify_contact(&contact.id).await.unwrap();

        let unchanged = service
            .update_contact_key(&contact.id, contact.x25519_public, contact.ed25519_public)
            .await
            .unwrap();

        assert_eq!(unchanged.trust_level, TrustLevel::Verified);
        assert_eq!(unchanged.key_version, 1);
    }

    #[tokio::test]
    async fn service_missing_contact_is_not_found() {
        let service = ContactTrustStore::new(Arc::new(MemoryContactStore::new()));
        assert!(matches!(
            service.verify_contact("ghost").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
