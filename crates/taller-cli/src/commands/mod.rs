//! Command implementations.

mod clients;
mod import;
mod invoices;
mod message;
mod repairs;
mod setup;
mod sync;

pub use clients::{run_client_add, run_client_delete, run_client_list};
pub use import::run_import;
pub use invoices::{run_invoice_add, run_invoice_list};
pub use message::run_message;
pub use repairs::{run_repair_add, run_repair_delete, run_repair_list, run_repair_status};
pub use setup::run_setup;
pub use sync::{run_purge, run_sync};

use std::env;
use std::path::Path;

use taller_core::config::RemoteConfig;
use taller_core::db::Database;

use crate::error::CliError;

pub(crate) fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::debug!(path = %path.display(), "Opening database");
    Ok(Database::open(path)?)
}

pub(crate) fn remote_config_from_env() -> Option<RemoteConfig> {
    let base_url = env::var("TALLER_SYNC_URL").ok()?;
    let api_key = env::var("TALLER_SYNC_API_KEY").ok()?;
    let bearer_token = env::var("TALLER_SYNC_TOKEN").ok()?;

    let config = RemoteConfig::new(base_url, api_key, bearer_token);
    config.is_configured().then_some(config)
}

/// First block of a UUID, enough to eyeball rows in a terminal.
pub(crate) fn short_id(id: uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}
