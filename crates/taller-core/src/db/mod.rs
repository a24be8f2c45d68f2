//! Database layer for Taller

mod config_repository;
mod connection;
mod migrations;
mod store;

pub use config_repository::{ConfigRepository, LAST_SYNC_KEY};
pub use connection::Database;
pub use store::EntityStore;
