//! Error types for taller-core

use thiserror::Error;

/// Result type alias using taller-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in taller-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Id or unique-field collision
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network/backend failure, retryable on the next cycle
    #[error("Remote backend unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote row missing required fields; skipped, never fatal
    #[error("Schema mismatch in remote {table} row: {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// Backup archive could not be classified
    #[error("Unknown backup format: {0}")]
    UnknownBackupFormat(String),

    /// Rendered message still carried a loopback address
    #[error("Message sanitizer postcondition violated: {0}")]
    TemplatePostcondition(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::RemoteUnavailable(error.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(error: zip::result::ZipError) -> Self {
        Self::InvalidInput(format!("backup archive could not be read: {error}"))
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::InvalidInput(format!("backup table could not be parsed: {error}"))
    }
}
