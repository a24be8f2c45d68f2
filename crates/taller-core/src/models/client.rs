//! Client model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::{EntityKind, SyncEntity};
use crate::util::now_ms;

/// A repair-shop customer.
///
/// Repairs and invoices reference a client by id only; deleting a client is a
/// soft delete and never cascades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier (UUID v4, merge key)
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub deleted: bool,
}

impl Client {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }
}

impl SyncEntity for Client {
    const KIND: EntityKind = EntityKind::Clients;

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn set_updated_at(&mut self, timestamp_ms: i64) {
        self.updated_at = timestamp_ms;
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
