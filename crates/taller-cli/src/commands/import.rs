use std::path::Path;

use taller_core::import::import_archive;
use taller_core::sync::SyncGuard;

use super::open_database;
use crate::error::CliError;

pub fn run_import(archive_path: &Path, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = SyncGuard::new();

    let report = import_archive(&db, &guard, archive_path)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(())
}
