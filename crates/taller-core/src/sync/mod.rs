//! Merge engine reconciling the local store with the remote row store.
//!
//! Whole-row last-write-wins by `updated_at`: per table the cycle pulls
//! remote changes after the checkpoint, applies whichever copy carries the
//! later timestamp, then pushes local changes from the same window. The
//! checkpoint only advances when every table finished cleanly, so a partial
//! cycle is retried over the same window and the whole process stays
//! idempotent.

mod remote;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::DEFAULT_TABLE_TIMEOUT;
use crate::db::{ConfigRepository, Database, EntityStore};
use crate::error::{Error, Result};
use crate::models::{Client, EntityKind, Invoice, Repair, SyncEntity, User};
use crate::util::now_ms;

pub use remote::{RemoteStore, RestRemote};

/// Advisory flag keeping sync cycles and imports mutually exclusive.
///
/// Overlapping cycles over the same checkpoint window would double-push and
/// race the checkpoint advance; an import racing a cycle is just as bad.
#[derive(Debug, Default)]
pub struct SyncGuard {
    in_flight: AtomicBool,
}

impl SyncGuard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    /// Take the guard, or `None` when another cycle/import holds it.
    pub fn try_acquire(&self) -> Option<SyncPermit<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(SyncPermit { guard: self })
    }
}

/// RAII permit; releases the guard on drop.
pub struct SyncPermit<'a> {
    guard: &'a SyncGuard,
}

impl Drop for SyncPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

/// Outcome of one cycle, summarized for the user instead of raw backend
/// errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Remote rows applied locally
    pub pulled: usize,
    /// Local rows accepted by the backend
    pub pushed: usize,
    /// Rows or tables that failed and will be retried next cycle
    pub failed: usize,
    /// Malformed remote rows skipped with a data-integrity warning
    pub skipped: usize,
    /// Checkpoint in effect after the cycle (Unix ms)
    pub checkpoint: i64,
    pub checkpoint_advanced: bool,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pulled {}, pushed {}, failed {}, skipped {} ({})",
            self.pulled,
            self.pushed,
            self.failed,
            self.skipped,
            if self.checkpoint_advanced {
                "checkpoint advanced"
            } else {
                "checkpoint withheld, will retry"
            }
        )
    }
}

/// Drives sync cycles against a remote transport.
pub struct SyncEngine<R: RemoteStore> {
    remote: R,
    table_timeout: Duration,
}

impl<R: RemoteStore> SyncEngine<R> {
    #[must_use]
    pub const fn new(remote: R) -> Self {
        Self {
            remote,
            table_timeout: DEFAULT_TABLE_TIMEOUT,
        }
    }

    /// Override the per-table budget (each table fails independently rather
    /// than one slow table stalling the whole cycle).
    #[must_use]
    pub const fn with_table_timeout(mut self, table_timeout: Duration) -> Self {
        self.table_timeout = table_timeout;
        self
    }

    /// Run one pull-then-push cycle over all syncable tables.
    ///
    /// Tables are processed in an order that satisfies foreign-key insertion
    /// (clients before the rows referencing them). Row-level failures are
    /// isolated: they are counted, the checkpoint is withheld, and the next
    /// cycle retries the same window.
    pub async fn run_cycle(&self, db: &Database, guard: &SyncGuard) -> Result<SyncSummary> {
        let _permit = guard.try_acquire().ok_or_else(|| {
            Error::Conflict("another sync or import is already in progress".to_string())
        })?;

        let config = ConfigRepository::new(db.connection());
        let store = EntityStore::new(db.connection());
        let checkpoint = config.last_sync()?;
        let cycle_start = now_ms();

        tracing::info!(checkpoint, "Starting sync cycle");

        let mut summary = SyncSummary {
            checkpoint,
            ..SyncSummary::default()
        };
        let mut clean = true;

        for kind in EntityKind::ALL {
            let table_clean = match kind {
                EntityKind::Clients => {
                    self.sync_table::<Client>(&store, checkpoint, &mut summary)
                        .await?
                }
                EntityKind::Repairs => {
                    self.sync_table::<Repair>(&store, checkpoint, &mut summary)
                        .await?
                }
                EntityKind::Invoices => {
                    self.sync_table::<Invoice>(&store, checkpoint, &mut summary)
                        .await?
                }
                EntityKind::Users => {
                    self.sync_table::<User>(&store, checkpoint, &mut summary)
                        .await?
                }
            };
            clean &= table_clean;
        }

        if clean {
            config.set_last_sync(cycle_start)?;
            summary.checkpoint = cycle_start;
            summary.checkpoint_advanced = true;
            tracing::info!(checkpoint = cycle_start, %summary, "Sync cycle complete");
        } else {
            tracing::warn!(%summary, "Sync cycle had failures; checkpoint withheld");
        }

        Ok(summary)
    }

    /// Administrative hard delete of a fully propagated tombstone, remote
    /// side first. Never part of the automatic cycle.
    pub async fn purge(
        &self,
        db: &Database,
        guard: &SyncGuard,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<()> {
        let _permit = guard.try_acquire().ok_or_else(|| {
            Error::Conflict("another sync or import is already in progress".to_string())
        })?;

        let store = EntityStore::new(db.connection());
        match store.tombstone_state(kind, id)? {
            None => Err(Error::NotFound(format!("{kind}/{id}"))),
            Some(false) => Err(Error::Conflict(format!(
                "{kind}/{id} is not soft-deleted; refusing hard delete"
            ))),
            Some(true) => {
                self.remote.delete_row(kind, id).await?;
                store.purge(kind, id)?;
                tracing::info!(table = %kind, %id, "Purged tombstone");
                Ok(())
            }
        }
    }

    async fn sync_table<E: SyncEntity>(
        &self,
        store: &EntityStore<'_>,
        checkpoint: i64,
        summary: &mut SyncSummary,
    ) -> Result<bool> {
        let kind = E::KIND;

        // Pull first so newer remote rows settle before we push ours.
        match timeout(self.table_timeout, self.remote.fetch_since(kind, checkpoint)).await {
            Ok(Ok(rows)) => {
                for row in rows {
                    match serde_json::from_value::<E>(row) {
                        Ok(incoming) => {
                            if apply_lww(store, &incoming)? {
                                summary.pulled += 1;
                            }
                        }
                        Err(error) => {
                            summary.skipped += 1;
                            let warning = Error::SchemaMismatch {
                                table: kind.table_name().to_string(),
                                reason: error.to_string(),
                            };
                            tracing::warn!(%warning, "Skipping malformed remote row");
                        }
                    }
                }
            }
            Ok(Err(error)) => {
                summary.failed += 1;
                tracing::warn!(table = %kind, %error, "Pull failed");
                // Pushing without the pull could clobber newer remote rows;
                // the table retries whole next cycle.
                return Ok(false);
            }
            Err(_) => {
                summary.failed += 1;
                tracing::warn!(table = %kind, "Pull timed out");
                return Ok(false);
            }
        }

        let mut clean = true;
        let deadline = tokio::time::Instant::now() + self.table_timeout;

        for entity in store.modified_after::<E>(checkpoint)? {
            let row = serde_json::to_value(&entity)?;
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match timeout(remaining, self.remote.push_row(kind, &row)).await {
                Ok(Ok(())) => summary.pushed += 1,
                Ok(Err(error)) => {
                    summary.failed += 1;
                    clean = false;
                    tracing::warn!(table = %kind, id = %entity.id(), %error, "Push failed");
                }
                Err(_) => {
                    summary.failed += 1;
                    clean = false;
                    tracing::warn!(table = %kind, id = %entity.id(), "Push timed out");
                }
            }
        }

        Ok(clean)
    }
}

/// Apply one remote row under last-write-wins. Returns whether the local
/// copy changed.
fn apply_lww<E: SyncEntity>(store: &EntityStore<'_>, incoming: &E) -> Result<bool> {
    match store.find::<E>(incoming.id())? {
        None => {
            store.apply(incoming)?;
            Ok(true)
        }
        Some(local) if incoming.updated_at() > local.updated_at() => {
            tracing::debug!(
                table = %E::KIND,
                id = %incoming.id(),
                local = local.updated_at(),
                incoming = incoming.updated_at(),
                "Remote row wins; overwriting local copy whole"
            );
            store.apply(incoming)?;
            Ok(true)
        }
        Some(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;
    use crate::models::RESCUE_USER_NAME;

    /// In-memory stand-in for the remote row store.
    #[derive(Default)]
    struct FakeRemote {
        rows: Mutex<HashMap<&'static str, HashMap<String, Value>>>,
        fail_pull: Mutex<HashSet<&'static str>>,
        fail_push: Mutex<HashSet<&'static str>>,
    }

    impl FakeRemote {
        fn seed(&self, kind: EntityKind, row: Value) {
            let id = row["id"].as_str().unwrap().to_string();
            self.rows
                .lock()
                .unwrap()
                .entry(kind.table_name())
                .or_default()
                .insert(id, row);
        }

        fn rows_for(&self, kind: EntityKind) -> Vec<Value> {
            self.rows
                .lock()
                .unwrap()
                .get(kind.table_name())
                .map(|table| table.values().cloned().collect())
                .unwrap_or_default()
        }

        fn fail_push_on(&self, kind: EntityKind) {
            self.fail_push.lock().unwrap().insert(kind.table_name());
        }

        fn fail_pull_on(&self, kind: EntityKind) {
            self.fail_pull.lock().unwrap().insert(kind.table_name());
        }
    }

    impl RemoteStore for FakeRemote {
        async fn fetch_since(&self, kind: EntityKind, since_ms: i64) -> Result<Vec<Value>> {
            if self.fail_pull.lock().unwrap().contains(kind.table_name()) {
                return Err(Error::RemoteUnavailable("injected pull failure".into()));
            }
            Ok(self
                .rows_for(kind)
                .into_iter()
                .filter(|row| row["updated_at"].as_i64().unwrap_or(0) > since_ms)
                .collect())
        }

        async fn push_row(&self, kind: EntityKind, row: &Value) -> Result<()> {
            if self.fail_push.lock().unwrap().contains(kind.table_name()) {
                return Err(Error::RemoteUnavailable("injected push failure".into()));
            }
            self.seed(kind, row.clone());
            Ok(())
        }

        async fn delete_row(&self, kind: EntityKind, id: Uuid) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .entry(kind.table_name())
                .or_default()
                .remove(&id.to_string());
            Ok(())
        }
    }

    fn setup() -> (Database, SyncGuard) {
        (Database::open_in_memory().unwrap(), SyncGuard::new())
    }

    fn remote_client_row(name: &str, updated_at: i64) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "name": name,
            "phone": "600111222",
            "email": "",
            "created_at": updated_at,
            "updated_at": updated_at,
            "deleted": false,
        })
    }

    #[tokio::test]
    async fn cycle_pulls_remote_rows_and_advances_checkpoint() {
        let (db, guard) = setup();
        let remote = FakeRemote::default();
        remote.seed(EntityKind::Clients, remote_client_row("Ana", 1000));

        let start = now_ms();
        let engine = SyncEngine::new(remote);
        let summary = engine.run_cycle(&db, &guard).await.unwrap();

        assert_eq!(summary.pulled, 1);
        assert!(summary.checkpoint_advanced);
        assert!(summary.checkpoint >= start);

        let config = ConfigRepository::new(db.connection());
        assert_eq!(config.last_sync().unwrap(), summary.checkpoint);

        let store = EntityStore::new(db.connection());
        let clients: Vec<Client> = store.list(10).unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].name, "Ana");
    }

    #[tokio::test]
    async fn cycle_pushes_local_rows() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());
        let mut client = Client::new("Berta", "", "");
        store.save(&mut client).unwrap();

        let engine = SyncEngine::new(FakeRemote::default());
        let summary = engine.run_cycle(&db, &guard).await.unwrap();

        // The client plus the seeded rescue account
        assert_eq!(summary.pushed, 2);
        let pushed = engine.remote.rows_for(EntityKind::Clients);
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0]["name"], "Berta");
    }

    #[tokio::test]
    async fn newer_remote_row_overwrites_local_whole() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());

        let mut local = Client::new("Local name", "600000000", "");
        local.updated_at = 1000;
        store.apply(&local).unwrap();

        let remote = FakeRemote::default();
        remote.seed(
            EntityKind::Clients,
            json!({
                "id": local.id.to_string(),
                "name": "Remote name",
                "phone": "",
                "email": "remote@example.com",
                "created_at": 500,
                "updated_at": 2000,
                "deleted": false,
            }),
        );

        let engine = SyncEngine::new(remote);
        engine.run_cycle(&db, &guard).await.unwrap();

        let merged: Client = store.get(local.id).unwrap();
        assert_eq!(merged.name, "Remote name");
        // No field-level merge: the losing row's phone is gone
        assert_eq!(merged.phone, "");
        assert_eq!(merged.updated_at, 2000);
    }

    #[tokio::test]
    async fn older_remote_row_loses_and_local_copy_survives() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());

        let mut local = Client::new("Kept", "", "");
        local.updated_at = 2000;
        store.apply(&local).unwrap();

        let remote = FakeRemote::default();
        remote.seed(
            EntityKind::Clients,
            json!({
                "id": local.id.to_string(),
                "name": "Stale",
                "created_at": 500,
                "updated_at": 1000,
                "deleted": false,
            }),
        );

        let engine = SyncEngine::new(remote);
        let summary = engine.run_cycle(&db, &guard).await.unwrap();

        assert_eq!(summary.pulled, 0);
        let kept: Client = store.get(local.id).unwrap();
        assert_eq!(kept.name, "Kept");
    }

    #[test]
    fn lww_is_commutative() {
        let newer = {
            let mut client = Client::new("Newer", "", "");
            client.updated_at = 2000;
            client
        };
        let older = {
            let mut client = Client::new("Older", "", "");
            client.id = newer.id;
            client.updated_at = 1000;
            client
        };

        for pair in [[&older, &newer], [&newer, &older]] {
            let db = Database::open_in_memory().unwrap();
            let store = EntityStore::new(db.connection());
            apply_lww(&store, pair[0]).unwrap();
            apply_lww(&store, pair[1]).unwrap();

            let winner: Client = store.get(newer.id).unwrap();
            assert_eq!(winner.name, "Newer");
            assert_eq!(winner.updated_at, 2000);
        }
    }

    #[tokio::test]
    async fn failed_push_withholds_checkpoint() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());
        let mut client = Client::new("Carla", "", "");
        store.save(&mut client).unwrap();

        let remote = FakeRemote::default();
        remote.fail_push_on(EntityKind::Clients);

        let engine = SyncEngine::new(remote);
        let summary = engine.run_cycle(&db, &guard).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(!summary.checkpoint_advanced);

        let config = ConfigRepository::new(db.connection());
        assert_eq!(config.last_sync().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_pull_skips_that_tables_push() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());
        let mut client = Client::new("Diana", "", "");
        store.save(&mut client).unwrap();

        let remote = FakeRemote::default();
        remote.fail_pull_on(EntityKind::Clients);

        let engine = SyncEngine::new(remote);
        let summary = engine.run_cycle(&db, &guard).await.unwrap();

        assert!(!summary.checkpoint_advanced);
        assert!(engine.remote.rows_for(EntityKind::Clients).is_empty());
        // Other tables still ran: the rescue account went out
        assert!(!engine.remote.rows_for(EntityKind::Users).is_empty());
    }

    #[tokio::test]
    async fn malformed_remote_row_is_skipped_not_fatal() {
        let (db, guard) = setup();
        let remote = FakeRemote::default();
        remote.seed(
            EntityKind::Clients,
            json!({
                "id": Uuid::new_v4().to_string(),
                // no "name": required field missing
                "updated_at": 1000,
            }),
        );
        remote.seed(EntityKind::Clients, remote_client_row("Eva", 1500));

        let engine = SyncEngine::new(remote);
        let summary = engine.run_cycle(&db, &guard).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.pulled, 1);
        assert!(summary.checkpoint_advanced);
    }

    #[tokio::test]
    async fn tombstones_propagate_like_ordinary_rows() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());
        let mut client = Client::new("Fina", "", "");
        store.save(&mut client).unwrap();
        store.soft_delete::<Client>(client.id).unwrap();

        let engine = SyncEngine::new(FakeRemote::default());
        engine.run_cycle(&db, &guard).await.unwrap();

        let pushed = engine.remote.rows_for(EntityKind::Clients);
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0]["deleted"], json!(true));
    }

    #[tokio::test]
    async fn concurrent_cycle_is_rejected_by_guard() {
        let (db, guard) = setup();
        let engine = SyncEngine::new(FakeRemote::default());

        let _held = guard.try_acquire().unwrap();
        let error = engine.run_cycle(&db, &guard).await.unwrap_err();
        assert!(matches!(error, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn second_cycle_retries_window_after_failure() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());
        let mut client = Client::new("Gema", "", "");
        store.save(&mut client).unwrap();

        let remote = FakeRemote::default();
        remote.fail_push_on(EntityKind::Clients);
        let engine = SyncEngine::new(remote);

        let first = engine.run_cycle(&db, &guard).await.unwrap();
        assert!(!first.checkpoint_advanced);

        engine
            .remote
            .fail_push
            .lock()
            .unwrap()
            .remove(EntityKind::Clients.table_name());

        let second = engine.run_cycle(&db, &guard).await.unwrap();
        assert!(second.checkpoint_advanced);
        assert_eq!(engine.remote.rows_for(EntityKind::Clients).len(), 1);
    }

    #[tokio::test]
    async fn purge_requires_a_tombstone() {
        let (db, guard) = setup();
        let store = EntityStore::new(db.connection());
        let mut client = Client::new("Hugo", "", "");
        store.save(&mut client).unwrap();

        let engine = SyncEngine::new(FakeRemote::default());

        let error = engine
            .purge(&db, &guard, EntityKind::Clients, client.id)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Conflict(_)));

        store.soft_delete::<Client>(client.id).unwrap();
        engine
            .purge(&db, &guard, EntityKind::Clients, client.id)
            .await
            .unwrap();

        assert!(store.find::<Client>(client.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn rescue_user_flows_through_sync() {
        let (db, guard) = setup();
        let engine = SyncEngine::new(FakeRemote::default());
        engine.run_cycle(&db, &guard).await.unwrap();

        let users = engine.remote.rows_for(EntityKind::Users);
        assert!(users
            .iter()
            .any(|row| row["name"] == json!(RESCUE_USER_NAME)));
    }
}
