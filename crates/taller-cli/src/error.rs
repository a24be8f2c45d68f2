use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] taller_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid line item '{0}'; expected CONCEPT:PRICE[:QTY]")]
    InvalidLineItem(String),
    #[error("Client not found: {0}")]
    ClientNotFound(String),
    #[error("An invoice needs at least one line item")]
    EmptyInvoice,
    #[error(
        "Sync is not configured. Set TALLER_SYNC_URL, TALLER_SYNC_API_KEY and TALLER_SYNC_TOKEN to enable `taller sync`."
    )]
    SyncNotConfigured,
}
