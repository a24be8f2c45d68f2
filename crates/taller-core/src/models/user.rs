//! User model and the bootstrap rescue account

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::{EntityKind, SyncEntity};
use crate::error::{Error, Result};
use crate::util::now_ms;

/// Name of the bootstrap account available before first-run setup completes.
pub const RESCUE_USER_NAME: &str = "rescate";
/// Fixed PIN of the bootstrap account.
pub const RESCUE_USER_PIN: &str = "0000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

/// An operator of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUID v4, merge key)
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// 4-digit login credential
    pub pin: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub deleted: bool,
}

impl User {
    pub fn new(name: impl Into<String>, role: Role, pin: impl Into<String>) -> Result<Self> {
        let pin = pin.into();
        validate_pin(&pin)?;

        let now = now_ms();
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
            pin,
            created_at: now,
            updated_at: now,
            deleted: false,
        })
    }

    /// The fixed bootstrap account seeded until a real admin exists.
    #[must_use]
    pub fn rescue() -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            name: RESCUE_USER_NAME.to_string(),
            role: Role::Admin,
            pin: RESCUE_USER_PIN.to_string(),
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    #[must_use]
    pub fn is_rescue(&self) -> bool {
        self.name == RESCUE_USER_NAME
    }
}

/// PINs are exactly four ASCII digits.
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.len() == 4 && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "PIN must be exactly 4 digits".to_string(),
        ))
    }
}

impl SyncEntity for User {
    const KIND: EntityKind = EntityKind::Users;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_validates_pin() {
        assert!(User::new("Marta", Role::Admin, "1234").is_ok());
        assert!(User::new("Marta", Role::Admin, "12345").is_err());
        assert!(User::new("Marta", Role::Admin, "12a4").is_err());
        assert!(User::new("Marta", Role::Admin, "").is_err());
    }

    #[test]
    fn rescue_account_uses_fixed_credentials() {
        let rescue = User::rescue();
        assert!(rescue.is_rescue());
        assert_eq!(rescue.pin, RESCUE_USER_PIN);
        assert_eq!(rescue.role, Role::Admin);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Employee).unwrap(), "\"employee\"");
    }
}
