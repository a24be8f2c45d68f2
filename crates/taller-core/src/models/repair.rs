//! Repair model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::entity::{EntityKind, SyncEntity};
use crate::util::now_ms;

/// Repair workflow status.
///
/// The set is open: values coming from other devices or older exports that we
/// do not recognize are preserved untouched in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RepairStatus {
    Pending,
    InProgress,
    Ready,
    Delivered,
    Other(String),
}

impl RepairStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for RepairStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "ready" => Self::Ready,
            "delivered" => Self::Delivered,
            _ => Self::Other(value),
        }
    }
}

impl From<RepairStatus> for String {
    fn from(status: RepairStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A replacement part fitted during a repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

/// A device intake and its repair lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repair {
    /// Unique identifier (UUID v4, merge key)
    pub id: Uuid,
    /// Owning client; must exist at creation time, never cascaded
    pub client_id: Uuid,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    pub description: String,
    pub status: RepairStatus,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub estimated_date: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    /// Free-form intake checklist (screen cracked, turns on, ...)
    #[serde(default)]
    pub checklist: Map<String, Value>,
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub deleted: bool,
}

impl Repair {
    #[must_use]
    pub fn new(
        client_id: Uuid,
        brand: impl Into<String>,
        model: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            client_id,
            brand: brand.into(),
            model: model.into(),
            description: description.into(),
            status: RepairStatus::Pending,
            price: 0.0,
            estimated_date: None,
            solution: None,
            checklist: Map::new(),
            parts: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// Total price of fitted parts.
    #[must_use]
    pub fn parts_total(&self) -> f64 {
        self.parts.iter().map(|part| part.price).sum()
    }
}

impl SyncEntity for Repair {
    const KIND: EntityKind = EntityKind::Repairs;

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
