use std::path::Path;

use taller_core::db::EntityStore;
use taller_core::models::Role;
use taller_core::User;

use super::open_database;
use crate::error::CliError;

/// First-run setup: create the real admin, then retire the rescue account so
/// its tombstone propagates on the next sync.
pub fn run_setup(name: &str, pin: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = EntityStore::new(db.connection());

    let mut admin = User::new(name, Role::Admin, pin)?;
    store.save(&mut admin)?;
    store.retire_rescue_user()?;

    println!("{}", admin.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use taller_core::db::{Database, EntityStore};
    use taller_core::models::RESCUE_USER_NAME;

    use super::run_setup;

    #[test]
    fn setup_creates_admin_and_retires_rescue() {
        let db_path = unique_test_db_path();

        run_setup("Marta", "4321", &db_path).unwrap();

        let db = Database::open(&db_path).unwrap();
        let store = EntityStore::new(db.connection());
        assert!(store.find_user_by_name("Marta").unwrap().is_some());
        assert!(store.find_user_by_name(RESCUE_USER_NAME).unwrap().is_none());

        cleanup_db_files(&db_path);
    }

    #[test]
    fn setup_rejects_bad_pin() {
        let db_path = unique_test_db_path();
        assert!(run_setup("Marta", "43210", &db_path).is_err());
        cleanup_db_files(&db_path);
    }

    fn unique_test_db_path() -> PathBuf {
        static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("taller-setup-test-{timestamp}-{sequence}.db"))
    }

    fn cleanup_db_files(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }
}
