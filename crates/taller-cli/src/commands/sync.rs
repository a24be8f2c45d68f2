use std::path::Path;

use taller_core::sync::{RestRemote, SyncEngine, SyncGuard};
use taller_core::EntityKind;
use uuid::Uuid;

use super::{open_database, remote_config_from_env};
use crate::error::CliError;

pub async fn run_sync(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let config = remote_config_from_env().ok_or(CliError::SyncNotConfigured)?;
    let db = open_database(db_path)?;

    let remote = RestRemote::new(&config)?;
    let engine = SyncEngine::new(remote);
    let guard = SyncGuard::new();

    let summary = engine.run_cycle(&db, &guard).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Sync: {summary}");
    }

    Ok(())
}

pub async fn run_purge(table: EntityKind, id: Uuid, db_path: &Path) -> Result<(), CliError> {
    let config = remote_config_from_env().ok_or(CliError::SyncNotConfigured)?;
    let db = open_database(db_path)?;

    let remote = RestRemote::new(&config)?;
    let engine = SyncEngine::new(remote);
    let guard = SyncGuard::new();

    engine.purge(&db, &guard, table, id).await?;
    println!("Purged {table}/{id}");
    Ok(())
}
