//! Config repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::AppConfig;
use crate::error::Result;
use crate::util::normalize_text_option;

/// Config key holding the sync checkpoint (Unix ms).
pub const LAST_SYNC_KEY: &str = "last_sync";

const COMPANY_NAME_KEY: &str = "company_name";
const TAX_ID_KEY: &str = "tax_id";
const ADDRESS_KEY: &str = "address";
const TRACKING_BASE_KEY: &str = "tracking_base_url";

/// Key/value access to the config table.
///
/// Config entries are never deleted, only overwritten.
pub struct ConfigRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ConfigRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Sync checkpoint; 0 means "sync everything".
    pub fn last_sync(&self) -> Result<i64> {
        Ok(self
            .get(LAST_SYNC_KEY)?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    pub fn set_last_sync(&self, timestamp_ms: i64) -> Result<()> {
        self.set(LAST_SYNC_KEY, &timestamp_ms.to_string())
    }

    /// Load the settings snapshot handed to the rest of the process.
    pub fn load(&self) -> Result<AppConfig> {
        Ok(AppConfig {
            company_name: self.get(COMPANY_NAME_KEY)?,
            tax_id: self.get(TAX_ID_KEY)?,
            address: self.get(ADDRESS_KEY)?,
            tracking_base_url: self.get(TRACKING_BASE_KEY)?,
        })
    }

    /// Persist a settings snapshot produced by the settings flow.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        self.set_optional(COMPANY_NAME_KEY, config.company_name.clone())?;
        self.set_optional(TAX_ID_KEY, config.tax_id.clone())?;
        self.set_optional(ADDRESS_KEY, config.address.clone())?;
        self.set_optional(TRACKING_BASE_KEY, config.tracking_base_url.clone())?;
        Ok(())
    }

    fn set_optional(&self, key: &str, value: Option<String>) -> Result<()> {
        if let Some(value) = normalize_text_option(value) {
            self.set(key, &value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn last_sync_defaults_to_zero() {
        let db = setup();
        let repo = ConfigRepository::new(db.connection());
        assert_eq!(repo.last_sync().unwrap(), 0);
    }

    #[test]
    fn last_sync_round_trips() {
        let db = setup();
        let repo = ConfigRepository::new(db.connection());

        repo.set_last_sync(1_700_000_000_000).unwrap();
        assert_eq!(repo.last_sync().unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn overwriting_keeps_single_row() {
        let db = setup();
        let repo = ConfigRepository::new(db.connection());

        repo.set("company_name", "Taller Uno").unwrap();
        repo.set("company_name", "Taller Dos").unwrap();

        assert_eq!(
            repo.get("company_name").unwrap().as_deref(),
            Some("Taller Dos")
        );
    }

    #[test]
    fn save_and_load_snapshot() {
        let db = setup();
        let repo = ConfigRepository::new(db.connection());

        let config = AppConfig {
            company_name: Some("Reparaciones García".to_string()),
            tax_id: Some("B12345678".to_string()),
            address: Some("Calle Mayor 1".to_string()),
            tracking_base_url: Some("https://tracking.example.com".to_string()),
        };
        repo.save(&config).unwrap();

        let loaded = repo.load().unwrap();
        assert_eq!(loaded, config);
    }
}
