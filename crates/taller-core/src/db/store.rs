//! Entity store: UUID-keyed persistence shared by all syncable tables.

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{EntityKind, SyncEntity, User, RESCUE_USER_NAME};
use crate::util::now_ms;

/// Storage for the syncable tables plus the lookups sync and import need.
///
/// Rows are kept whole as a JSON body with the replication envelope
/// (id, `updated_at`, deleted) denormalized into indexed columns. Writes are
/// full replacements by id; partial field merges never happen here.
pub struct EntityStore<'a> {
    conn: &'a Connection,
}

impl<'a> EntityStore<'a> {
    /// Create a new store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Look up an entity by id, tombstones included.
    pub fn find<E: SyncEntity>(&self, id: Uuid) -> Result<Option<E>> {
        let table = E::KIND.table_name();
        let body: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT body FROM {table} WHERE id = ?"),
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Look up an entity by id, raising `NotFound` when absent.
    pub fn get<E: SyncEntity>(&self, id: Uuid) -> Result<E> {
        self.find(id)?
            .ok_or_else(|| Error::NotFound(format!("{}/{id}", E::KIND)))
    }

    /// Insert or fully replace a locally mutated entity.
    ///
    /// Stamps `updated_at` with the current time, kept strictly greater than
    /// the previous value so repeated mutations within one millisecond still
    /// order correctly.
    pub fn save<E: SyncEntity>(&self, entity: &mut E) -> Result<()> {
        let stamp = now_ms().max(entity.updated_at() + 1);
        entity.set_updated_at(stamp);
        self.write(entity)
    }

    /// Insert or fully replace an entity whose timestamps were assigned by
    /// the other side (sync pull, backup import).
    pub fn apply<E: SyncEntity>(&self, entity: &E) -> Result<()> {
        self.write(entity)
    }

    fn write<E: SyncEntity>(&self, entity: &E) -> Result<()> {
        let table = E::KIND.table_name();
        let body = serde_json::to_string(entity)?;
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {table} (id, updated_at, deleted, body)
                 VALUES (?, ?, ?, ?)"
            ),
            params![
                entity.id().to_string(),
                entity.updated_at(),
                i32::from(entity.is_deleted()),
                body
            ],
        )?;
        Ok(())
    }

    /// Entities touched after the given timestamp, tombstones included.
    ///
    /// Callers decide whether to filter by `deleted`; sync must not.
    pub fn modified_after<E: SyncEntity>(&self, timestamp_ms: i64) -> Result<Vec<E>> {
        let table = E::KIND.table_name();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT body FROM {table} WHERE updated_at > ? ORDER BY updated_at ASC"
        ))?;

        let bodies = stmt
            .query_map(params![timestamp_ms], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Error::from))
            .collect()
    }

    /// Flip the tombstone flag and refresh `updated_at`; the row stays put.
    pub fn soft_delete<E: SyncEntity>(&self, id: Uuid) -> Result<()> {
        let mut entity: E = self.get(id)?;
        entity.set_deleted(true);
        self.save(&mut entity)
    }

    /// List non-deleted entities, most recently updated first.
    pub fn list<E: SyncEntity>(&self, limit: usize) -> Result<Vec<E>> {
        let table = E::KIND.table_name();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT body FROM {table}
             WHERE deleted = 0
             ORDER BY updated_at DESC
             LIMIT ?"
        ))?;

        let bodies = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Error::from))
            .collect()
    }

    /// Count of non-deleted rows in a table.
    pub fn count(&self, kind: EntityKind) -> Result<u64> {
        let table = kind.table_name();
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE deleted = 0"),
            [],
            |row| row.get(0),
        )?;
        Ok(count.unsigned_abs())
    }

    /// Tombstone state of a row: `None` when absent, otherwise the flag.
    pub fn tombstone_state(&self, kind: EntityKind, id: Uuid) -> Result<Option<bool>> {
        let table = kind.table_name();
        let deleted: Option<i32> = self
            .conn
            .query_row(
                &format!("SELECT deleted FROM {table} WHERE id = ?"),
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(deleted.map(|flag| flag != 0))
    }

    /// Physically remove a row. Administrative escape hatch only; ordinary
    /// deletion is `soft_delete` so the tombstone can propagate first.
    pub fn purge(&self, kind: EntityKind, id: Uuid) -> Result<()> {
        let table = kind.table_name();
        let rows = self.conn.execute(
            &format!("DELETE FROM {table} WHERE id = ?"),
            params![id.to_string()],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("{kind}/{id}")));
        }
        Ok(())
    }

    /// Whether a non-deleted client exists (repair/invoice FK check).
    pub fn client_exists(&self, id: Uuid) -> Result<bool> {
        let exists: i32 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE id = ? AND deleted = 0)",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// Guard the human-facing invoice sequence: a different id upserted under
    /// an existing number is a conflict. Kept separate from `save` so the
    /// policy stays with the caller.
    pub fn ensure_unique_invoice_number(&self, number: &str, id: Uuid) -> Result<()> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM invoices
                 WHERE deleted = 0 AND json_extract(body, '$.number') = ?",
                params![number],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(existing_id) if existing_id != id.to_string() => Err(Error::Conflict(format!(
                "invoice number '{number}' already belongs to {existing_id}"
            ))),
            _ => Ok(()),
        }
    }

    /// Find a non-deleted user by exact name.
    pub fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM users
                 WHERE deleted = 0 AND json_extract(body, '$.name') = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Seed the fixed rescue account while no real admin exists.
    ///
    /// Invariant: until first-run setup creates an admin, the rescue account
    /// must be present so the shop can always get in.
    pub fn ensure_rescue_user(&self) -> Result<()> {
        if self.admin_exists()? || self.find_user_by_name(RESCUE_USER_NAME)?.is_some() {
            return Ok(());
        }

        let mut rescue = User::rescue();
        self.save(&mut rescue)?;
        tracing::info!("Seeded rescue account");
        Ok(())
    }

    /// Tombstone the rescue account once a real admin exists.
    pub fn retire_rescue_user(&self) -> Result<()> {
        if let Some(rescue) = self.find_user_by_name(RESCUE_USER_NAME)? {
            self.soft_delete::<User>(rescue.id)?;
            tracing::info!("Retired rescue account");
        }
        Ok(())
    }

    fn admin_exists(&self) -> Result<bool> {
        let exists: i32 = self.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM users
                 WHERE deleted = 0
                   AND json_extract(body, '$.role') = 'admin'
                   AND json_extract(body, '$.name') != ?
             )",
            params![RESCUE_USER_NAME],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }
}
