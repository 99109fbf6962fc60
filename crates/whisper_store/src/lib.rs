//! whisper_store — Replay guard, contact trust store and identity store
//!
//! # Storage strategy
//! Replay records and contacts persist in SQLite via sqlx (WAL mode,
//! migrations in `migrations/`). Both live behind async traits with an
//! in-memory double next to the SQLite implementation, so the higher
//! layers and their tests never depend on a database file.
//!
//! Identity private keys are the exception: they are never written to
//! SQLite by this crate. The [`identity::IdentityStore`] trait is the seam
//! where an application plugs in its OS keystore; the in-repo backend is
//! memory-only.
//!
//! # Atomicity
//! The replay guard's check-and-insert is a single atomic operation in
//! every backend; that property is what makes "accept each message id
//! exactly once" hold under concurrent deliveries.

pub mod contact;
pub mod db;
pub mod error;
pub mod identity;
pub mod replay;
pub mod trust;

pub use contact::{Contact, KeyHistoryEntry, TrustLevel};
pub use db::Store;
pub use error::StoreError;
pub use identity::{Identity, IdentityStatus, IdentityStore, MemoryIdentityStore};
pub use replay::{
    spawn_cleanup, CommitDecision, MemoryReplayStore, ReplayGuard, ReplayStore, SqliteReplayStore,
    CLEANUP_INTERVAL, FRESHNESS_WINDOW_SECS,
};
pub use trust::{ContactStore, ContactTrustStore, MemoryContactStore, SqliteContactStore};
