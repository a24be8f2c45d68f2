//! Sync envelope shared by every replicated record.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Tables that participate in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Clients,
    Repairs,
    Invoices,
    Users,
}

impl EntityKind {
    /// All syncable kinds, ordered so rows referencing clients land after them.
    pub const ALL: [Self; 4] = [Self::Clients, Self::Repairs, Self::Invoices, Self::Users];

    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Repairs => "repairs",
            Self::Invoices => "invoices",
            Self::Users => "users",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clients" => Ok(Self::Clients),
            "repairs" => Ok(Self::Repairs),
            "invoices" => Ok(Self::Invoices),
            "users" => Ok(Self::Users),
            other => Err(format!("unknown table '{other}'")),
        }
    }
}

/// Accessors for the replication envelope carried by every syncable record.
///
/// Ids are client-generated UUID v4 and immutable once assigned; `updated_at`
/// (Unix ms) is the only conflict-resolution signal; `deleted` rows are
/// tombstones that keep flowing through sync until an administrative purge.
pub trait SyncEntity: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn updated_at(&self) -> i64;
    fn set_updated_at(&mut self, timestamp_ms: i64);
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);
}
