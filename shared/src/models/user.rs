//! Actors and the role permission table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trading customer who receives lot assignments and books shipments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Identity issued by the authentication provider
    pub external_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A back-office account attributed on administrative history rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Caller roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    /// Compliance staff who move shipments through customs and delivery
    Enforce,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Enforce => "enforce",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "enforce" => Some(Role::Enforce),
            _ => None,
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Enforce)
    }

    pub fn can(&self, operation: Operation) -> bool {
        operation.allowed_roles().contains(self)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations exposed by the ledger services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateStock,
    UpdateStock,
    DeleteStock,
    ViewStock,
    AdjustStock,
    AssignStock,
    CreateShipment,
    UpdateShipment,
    UpdateShipmentStatus,
    DeleteShipment,
    ViewShipment,
    ViewHistory,
}

impl Operation {
    /// Permission table. Ownership rules on shipments are checked separately.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Operation::CreateStock
            | Operation::UpdateStock
            | Operation::DeleteStock
            | Operation::AdjustStock
            | Operation::AssignStock => &[Role::Admin],
            Operation::CreateShipment | Operation::UpdateShipment => &[Role::User],
            Operation::UpdateShipmentStatus => &[Role::Admin, Role::Enforce],
            Operation::DeleteShipment => &[Role::User, Role::Admin],
            Operation::ViewStock | Operation::ViewShipment | Operation::ViewHistory => {
                &[Role::Admin, Role::User, Role::Enforce]
            }
        }
    }
}

/// The authenticated caller of a ledger operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Internal record id of the user or admin
    pub id: Uuid,
    pub external_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, external_id: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            external_id: external_id.into(),
            role,
        }
    }
}
