//! Append-only audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Action tags written to stock history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockAction {
    Created,
    Updated,
    Deleted,
    Assigned,
    Unassigned,
    Restored,
    Reduced,
}

impl StockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAction::Created => "Stock Created",
            StockAction::Updated => "Stock Updated",
            StockAction::Deleted => "Stock Deleted",
            StockAction::Assigned => "Stock Assigned",
            StockAction::Unassigned => "Stock Unassigned",
            StockAction::Restored => "RESTORED",
            StockAction::Reduced => "REDUCED",
        }
    }
}

/// Action tags written to shipment history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentAction {
    Created,
    Updated,
    StatusUpdated,
    Deleted,
}

impl ShipmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentAction::Created => "CREATED",
            ShipmentAction::Updated => "UPDATED",
            ShipmentAction::StatusUpdated => "STATUS_UPDATED",
            ShipmentAction::Deleted => "DELETED",
        }
    }
}

/// One recorded mutation of a stock lot.
///
/// `stock_id` is kept after the lot itself is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockHistory {
    pub id: Uuid,
    pub stock_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub actor_role: Role,
    pub shipment_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStockHistory {
    pub stock_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub actor_role: Role,
    pub shipment_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// One recorded mutation of a shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentHistory {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub actor_role: Role,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShipmentHistory {
    pub shipment_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub actor_role: Role,
    pub details: serde_json::Value,
}

/// Audit row for changes to the actor registry itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorHistory {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub external_id: String,
    pub requested_by_role: Role,
    pub created_at: DateTime<Utc>,
}

pub const ADMIN_PROVISIONED: &str = "ADMIN_PROVISIONED";
