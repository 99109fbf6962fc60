//! Replay protection: every accepted message id is recorded exactly once.
//!
//! The security-critical operation is `insert_if_absent`: the duplicate
//! check and the insert are a single atomic step, so two concurrent
//! deliveries of the same envelope can never both be accepted. SQLite gives
//! this via a conflict-free insert on the primary key; the in-memory double
//! holds its write lock across check and insert.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Accept window around the local clock, inclusive on both edges.
pub const FRESHNESS_WINDOW_SECS: i64 = 48 * 3_600;
/// Records older than this (by `seen_at`) are purged on cleanup.
pub const RETENTION_SECS: i64 = 30 * 86_400;
/// Cap on stored records; beyond it the oldest are evicted.
pub const MAX_RECORDS: u64 = 10_000;
/// Eviction deletes this many records per round.
pub const EVICTION_BATCH: u64 = 1_000;
/// Suggested cadence for `spawn_cleanup`.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 3_600);

/// Outcome of the atomic freshness + uniqueness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    /// First sighting inside the freshness window; the id is now recorded.
    Accepted,
    /// Outside the freshness window. The store is left untouched.
    Expired,
    /// The id was already recorded.
    ReplayDetected,
}

#[async_trait::async_trait]
pub trait ReplayStore: Send + Sync {
    /// Record `msg_id` if it is unseen. Returns true when this call inserted
    /// it. Check and insert are one atomic step.
    async fn insert_if_absent(
        &self,
        msg_id: &[u8; 16],
        msg_timestamp: i64,
        seen_at: i64,
    ) -> Result<bool, StoreError>;

    /// Delete records seen before `cutoff`. Returns how many went.
    async fn delete_older_than(&self, cutoff: i64) -> Result<u64, StoreError>;

    /// Delete the `n` oldest records by `seen_at`. Returns how many went.
    async fn delete_oldest(&self, n: u64) -> Result<u64, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

// ── SQLite implementation ───────────────────────────────────────────────────

pub struct SqliteReplayStore {
    pool: sqlx::SqlitePool,
}

impl SqliteReplayStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReplayStore for SqliteReplayStore {
    async fn insert_if_absent(
        &self,
        msg_id: &[u8; 16],
        msg_timestamp: i64,
        seen_at: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO replay_records (msg_id, msg_timestamp, seen_at) VALUES (?, ?, ?) \
             ON CONFLICT(msg_id) DO NOTHING",
        )
        .bind(hex::encode(msg_id))
        .bind(msg_timestamp)
        .bind(seen_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM replay_records WHERE seen_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_oldest(&self, n: u64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM replay_records WHERE msg_id IN \
             (SELECT msg_id FROM replay_records ORDER BY seen_at ASC, msg_id ASC LIMIT ?)",
        )
        .bind(n as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replay_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

// ── In-memory double ────────────────────────────────────────────────────────

/// Deterministic in-memory store for tests and embedding without SQLite.
#[derive(Default)]
pub struct MemoryReplayStore {
    records: RwLock<HashMap<[u8; 16], (i64, i64)>>, // msg_id -> (msg_timestamp, seen_at)
}

impl MemoryReplayStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ReplayStore for MemoryReplayStore {
    async fn insert_if_absent(
        &self,
        msg_id: &[u8; 16],
        msg_timestamp: i64,
        seen_at: i64,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(msg_id) {
            return Ok(false);
        }
        records.insert(*msg_id, (msg_timestamp, seen_at));
        Ok(true)
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, (_, seen_at)| *seen_at >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn delete_oldest(&self, n: u64) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let mut order: Vec<([u8; 16], i64)> =
            records.iter().map(|(id, (_, seen))| (*id, *seen)).collect();
        order.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        let victims: Vec<[u8; 16]> = order.into_iter().take(n as usize).map(|(id, _)| id).collect();
        for id in &victims {
            records.remove(id);
        }
        Ok(victims.len() as u64)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().await.len() as u64)
    }
}

// ── Guard ───────────────────────────────────────────────────────────────────

/// Freshness window plus one-time acceptance over a [`ReplayStore`].
#[derive(Clone)]
pub struct ReplayGuard {
    store: Arc<dyn ReplayStore>,
}

impl ReplayGuard {
    pub fn new(store: Arc<dyn ReplayStore>) -> Self {
        Self { store }
    }

    /// Window predicate, inclusive on both edges. Pure; used by the decrypt
    /// pipeline for its early check before any store access.
    pub fn is_fresh_at(timestamp: i64, now: i64) -> bool {
        let skew = (i128::from(now) - i128::from(timestamp)).unsigned_abs();
        skew <= FRESHNESS_WINDOW_SECS as u128
    }

    pub fn is_fresh(timestamp: i64) -> bool {
        Self::is_fresh_at(timestamp, Utc::now().timestamp())
    }

    /// Atomically accept `msg_id` at most once while it is fresh.
    /// Expired ids never reach the store.
    pub async fn check_and_commit(
        &self,
        msg_id: &[u8; 16],
        timestamp: i64,
    ) -> Result<CommitDecision, StoreError> {
        self.check_and_commit_at(msg_id, timestamp, Utc::now().timestamp())
            .await
    }

    pub async fn check_and_commit_at(
        &self,
        msg_id: &[u8; 16],
        timestamp: i64,
        now: i64,
    ) -> Result<CommitDecision, StoreError> {
        if !Self::is_fresh_at(timestamp, now) {
            return Ok(CommitDecision::Expired);
        }
        if self.store.insert_if_absent(msg_id, timestamp, now).await? {
            Ok(CommitDecision::Accepted)
        } else {
            tracing::warn!(
                target: "whisper_store",
                event = "replay_detected",
                msg_id = %hex::encode(msg_id),
            );
            Ok(CommitDecision::ReplayDetected)
        }
    }

    /// Purge records past retention, then evict oldest-first down to the cap.
    pub async fn cleanup(&self) -> Result<(), StoreError> {
        self.cleanup_at(Utc::now().timestamp()).await
    }

    pub async fn cleanup_at(&self, now: i64) -> Result<(), StoreError> {
        let purged = self.store.delete_older_than(now - RETENTION_SECS).await?;

        let mut count = self.store.count().await?;
        let mut evicted = 0u64;
        while count > MAX_RECORDS {
            let removed = self.store.delete_oldest(EVICTION_BATCH).await?;
            if removed == 0 {
                break;
            }
            evicted += removed;
            count = count.saturating_sub(removed);
        }

        if purged > 0 || evicted > 0 {
            tracing::info!(
                target: "whisper_store",
                event = "replay_cleanup",
                purged,
                evicted,
                remaining = count,
            );
        }
        Ok(())
    }
}

/// Run `guard.cleanup()` on a fixed cadence until the handle is aborted.
/// The first run fires immediately.
pub fn spawn_cleanup(guard: ReplayGuard, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = guard.cleanup().await {
                tracing::warn!(
                    target: "whisper_store",
                    event = "replay_cleanup_failed",
                    error = %e,
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::{remove_db, temp_db_path};
    use crate::db::Store;

    const NOW: i64 = 1_700_000_000;

    fn guard() -> ReplayGuard {
        ReplayGuard::new(Arc::new(MemoryReplayStore::new()))
    }

    /// Poll until the cleanup task empties the store; panics after five
    /// seconds.
    async fn wait_until_empty(store: &MemoryReplayStore) {
        let drained = async {
            while store.count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), drained)
            .await
            .expect("stale records were never purged");
    }

    #[test]
    fn window_is_inclusive_on_both_edges() {
        assert!(ReplayGuard::is_fresh_at(NOW, NOW));
        assert!(ReplayGuard::is_fresh_at(NOW - FRESHNESS_WINDOW_SECS, NOW));
        assert!(ReplayGuard::is_fresh_at(NOW + FRESHNESS_WINDOW_SECS, NOW));
        assert!(!ReplayGuard::is_fresh_at(NOW - FRESHNESS_WINDOW_SECS - 1, NOW));
        assert!(!ReplayGuard::is_fresh_at(NOW + FRESHNESS_WINDOW_SECS + 1, NOW));
    }

    #[test]
    fn window_check_survives_extreme_timestamps() {
        assert!(!ReplayGuard::is_fresh_at(i64::MIN, NOW));
        assert!(!ReplayGuard::is_fresh_at(i64::MAX, NOW));
    }

    #[tokio::test]
    async fn same_id_is_accepted_exactly_once() {
        let guard = guard();
        let id = [7u8; 16];

        let first = guard.check_and_commit_at(&id, NOW, NOW).await.unwrap();
        let second = guard.check_and_commit_at(&id, NOW, NOW).await.unwrap();

        assert_eq!(first, CommitDecision::Accepted);
        assert_eq!(second, CommitDecision::ReplayDetected);
    }

    #[tokio::test]
    async fn expired_ids_never_touch_the_store() {
        let store = Arc::new(MemoryReplayStore::new());
        let guard = ReplayGuard::new(store.clone());
        let id = [9u8; 16];

        let stale = NOW - FRESHNESS_WINDOW_SECS - 1;
        let decision = guard.check_and_commit_at(&id, stale, NOW).await.unwrap();
        assert_eq!(decision, CommitDecision::Expired);
        assert_eq!(store.count().await.unwrap(), 0);

        // The same id is still acceptable once it arrives fresh.
        let decision = guard.check_and_commit_at(&id, NOW, NOW).await.unwrap();
        assert_eq!(decision, CommitDecision::Accepted);
    }

    #[tokio::test]
    async fn cleanup_purges_past_retention() {
        let store = Arc::new(MemoryReplayStore::new());
        let guard = ReplayGuard::new(store.clone());

        store
            .insert_if_absent(&[1u8; 16], NOW - RETENTION_SECS - 10, NOW - RETENTION_SECS - 10)
            .await
            .unwrap();
        store.insert_if_absent(&[2u8; 16], NOW, NOW).await.unwrap();

        guard.cleanup_at(NOW).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        // The surviving record is the fresh one.
        assert!(!store.insert_if_absent(&[2u8; 16], NOW, NOW).await.unwrap());
    }

    #[tokio::test]
    async fn cleanup_evicts_oldest_down_to_the_cap() {
        let store = Arc::new(MemoryReplayStore::new());
        let guard = ReplayGuard::new(store.clone());

        let extra = 42u64;
        for i in 0..(MAX_RECORDS + extra) {
            let mut id = [0u8; 16];
            id[..8].copy_from_slice(&i.to_be_bytes());
            // seen_at ascending: record 0 is the oldest.
            store.insert_if_absent(&id, NOW, NOW - 20_000 + i as i64).await.unwrap();
        }

        guard.cleanup_at(NOW).await.unwrap();

        let count = store.count().await.unwrap();
        assert!(count <= MAX_RECORDS);
        // Eviction works in whole batches, so at most one batch below the cap.
        assert!(count > MAX_RECORDS - EVICTION_BATCH);

        // The oldest record is gone, the newest survived.
        let oldest = [0u8; 16];
        assert!(store.insert_if_absent(&oldest, NOW, NOW).await.unwrap());
        let mut newest = [0u8; 16];
        newest[..8].copy_from_slice(&(MAX_RECORDS + extra - 1).to_be_bytes());
        assert!(!store.insert_if_absent(&newest, NOW, NOW).await.unwrap());
    }

    #[tokio::test]
    async fn cleanup_task_first_run_fires_immediately() {
        let store = Arc::new(MemoryReplayStore::new());
        let now = Utc::now().timestamp();
        let stale = now - RETENTION_SECS - 10;
        store.insert_if_absent(&[1u8; 16], stale, stale).await.unwrap();

        // At the shipped cadence the next tick is a day out, so only the
        // startup run can purge within the wait ceiling.
        let task = spawn_cleanup(ReplayGuard::new(store.clone()), CLEANUP_INTERVAL);
        wait_until_empty(&store).await;

        task.abort();
    }

    #[tokio::test]
    async fn cleanup_task_runs_again_on_its_cadence() {
        let store = Arc::new(MemoryReplayStore::new());
        let now = Utc::now().timestamp();
        let stale = now - RETENTION_SECS - 10;
        store.insert_if_absent(&[1u8; 16], stale, stale).await.unwrap();

        let task = spawn_cleanup(ReplayGuard::new(store.clone()), Duration::from_millis(50));
        wait_until_empty(&store).await;

        // A record going stale after startup is caught by a later run.
        store.insert_if_absent(&[2u8; 16], stale, stale).await.unwrap();
        wait_until_empty(&store).await;

        task.abort();
    }

    #[tokio::test]
    async fn sqlite_store_accepts_each_id_once() {
        let db_path = temp_db_path();
        let store = Store::open(&db_path).await.expect("open store");
        let guard = ReplayGuard::new(Arc::new(store.replay()));

        let id = [3u8; 16];
        assert_eq!(
            guard.check_and_commit_at(&id, NOW, NOW).await.unwrap(),
            CommitDecision::Accepted
        );
        assert_eq!(
            guard.check_and_commit_at(&id, NOW, NOW).await.unwrap(),
            CommitDecision::ReplayDetected
        );

        remove_db(&db_path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_submissions_accept_exactly_one() {
        let db_path = temp_db_path();
        let store = Store::open(&db_path).await.expect("open store");
        let guard = ReplayGuard::new(Arc::new(store.replay()));

        let id = [0xabu8; 16];
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            tasks.push(tokio::spawn(async move {
                guard.check_and_commit_at(&id, NOW, NOW).await.unwrap()
            }));
        }

        let mut accepted = 0;
        let mut replayed = 0;
        for task in tasks {
            match task.await.unwrap() {
                CommitDecision::Accepted => accepted += 1,
                CommitDecision::ReplayDetected => replayed += 1,
                CommitDecision::Expired => panic!("fresh timestamp reported expired"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(replayed, 7);

        remove_db(&db_path);
    }

    #[tokio::test]
    async fn sqlite_cleanup_matches_memory_semantics() {
        let db_path = temp_db_path();
        let store = Store::open(&db_path).await.expect("open store");
        let replay = Arc::new(store.replay());
        let guard = ReplayGuard::new(replay.clone());

        replay
            .insert_if_absent(&[1u8; 16], NOW - RETENTION_SECS - 10, NOW - RETENTION_SECS - 10)
            .await
            .unwrap();
        replay.insert_if_absent(&[2u8; 16], NOW, NOW).await.unwrap();

        guard.cleanup_at(NOW).await.unwrap();
        assert_eq!(replay.count().await.unwrap(), 1);

        remove_db(&db_path);
    }
}
