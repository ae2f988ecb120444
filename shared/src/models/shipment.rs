//! Shipment models and status lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shipment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Pending,
    Approved,
    Shipped,
    Delivered,
    Cancelled,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 5] = [
        ShipmentStatus::Pending,
        ShipmentStatus::Approved,
        ShipmentStatus::Shipped,
        ShipmentStatus::Delivered,
        ShipmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "Pending",
            ShipmentStatus::Approved => "Approved",
            ShipmentStatus::Shipped => "Shipped",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }

    /// No further changes are accepted once a shipment is here
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Cancelled | ShipmentStatus::Delivered)
    }

    /// Statuses reachable in one step
    pub fn next_statuses(&self) -> &'static [ShipmentStatus] {
        match self {
            ShipmentStatus::Pending => &[ShipmentStatus::Approved, ShipmentStatus::Cancelled],
            ShipmentStatus::Approved => &[ShipmentStatus::Shipped, ShipmentStatus::Cancelled],
            ShipmentStatus::Shipped => &[ShipmentStatus::Delivered],
            ShipmentStatus::Delivered | ShipmentStatus::Cancelled => &[],
        }
    }

    /// Staying in a non-terminal status is allowed so metadata-only edits
    /// can restate the current status.
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self == next || self.next_statuses().contains(&next)
    }

    /// Statuses the owning user may request; everything else needs an elevated role
    pub fn is_owner_settable(&self) -> bool {
        matches!(self, ShipmentStatus::Pending | ShipmentStatus::Cancelled)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's request to export a set of stock lots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: ShipmentStatus,
    pub shipment_date: NaiveDate,
    pub consignee: String,
    pub vessel: String,
    pub shipmark: String,
    pub packaging_instructions: Option<String>,
    pub additional_instructions: Option<String>,
    pub items: Vec<ShipmentItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn total_weight(&self) -> Decimal {
        self.items.iter().map(|item| item.assigned_weight).sum()
    }

    /// Shipment fields and items as recorded in history rows
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "user_id": self.user_id,
            "status": self.status,
            "shipment_date": self.shipment_date,
            "consignee": self.consignee,
            "vessel": self.vessel,
            "shipmark": self.shipmark,
            "packaging_instructions": self.packaging_instructions,
            "additional_instructions": self.additional_instructions,
            "items": self.items.iter().map(|item| serde_json::json!({
                "stock_id": item.stock_id,
                "assigned_weight": item.assigned_weight,
            })).collect::<Vec<_>>(),
        })
    }
}

/// Editable shipment fields, shared by create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentDetails {
    pub shipment_date: NaiveDate,
    pub consignee: String,
    pub vessel: String,
    pub shipmark: String,
    pub packaging_instructions: Option<String>,
    pub additional_instructions: Option<String>,
}

/// One lot consumed by a shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub stock_id: Uuid,
    pub assigned_weight: Decimal,
}

/// Requested lot and weight for a shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItemRequest {
    pub stock_id: Uuid,
    pub weight: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_accept_nothing() {
        for next in ShipmentStatus::ALL {
            assert!(!ShipmentStatus::Cancelled.can_transition_to(next));
            assert!(!ShipmentStatus::Delivered.can_transition_to(next));
        }
    }

    #[test]
    fn forward_transitions() {
        use ShipmentStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Shipped));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Approved.can_transition_to(Pending));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ShipmentStatus::parse("shipped"), Some(ShipmentStatus::Shipped));
        assert_eq!(ShipmentStatus::parse("CANCELLED"), Some(ShipmentStatus::Cancelled));
        assert_eq!(ShipmentStatus::parse("lost"), None);
    }

    #[test]
    fn owner_settable() {
        let settable: Vec<_> = ShipmentStatus::ALL
            .into_iter()
            .filter(ShipmentStatus::is_owner_settable)
            .collect();
        assert_eq!(settable, vec![ShipmentStatus::Pending, ShipmentStatus::Cancelled]);
    }
}
