//! Database migrations

use std::fmt::Write as _;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::EntityKind;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
///
/// Every syncable table stores the replication envelope as real columns so
/// `modified_after` scans stay indexed, with the full record as a JSON body.
fn migrate_v1(conn: &Connection) -> Result<()> {
    let mut sql = String::from(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY
         );\n",
    );

    for kind in EntityKind::ALL {
        let table = kind.table_name();
        let _ = write!(
            sql,
            "CREATE TABLE IF NOT EXISTS {table} (
                 id TEXT PRIMARY KEY,
                 updated_at INTEGER NOT NULL,
                 deleted INTEGER NOT NULL DEFAULT 0,
                 body TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_{table}_updated ON {table}(updated_at);
             CREATE INDEX IF NOT EXISTS idx_{table}_deleted ON {table}(deleted);\n"
        );
    }

    sql.push_str(
        "CREATE TABLE IF NOT EXISTS config (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );
         INSERT INTO schema_version (version) VALUES (1);
         COMMIT;",
    );

    conn.execute_batch(&sql)?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v1_creates_entity_tables() {
        let conn = setup();
        run(&conn).unwrap();

        for kind in EntityKind::ALL {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM sqlite_master
                        WHERE type = 'table' AND name = ?
                    )",
                    [kind.table_name()],
                    |row| row.get::<_, i32>(0).map(|v| v != 0),
                )
                .unwrap();
            assert!(exists, "missing table {kind}");
        }
    }
}
