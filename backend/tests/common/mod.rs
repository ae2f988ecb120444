//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::models::{Actor, Role, ShipmentItemRequest, StockLot};
use tea_ledger_backend::db::{MemoryStore, RetryPolicy};
use tea_ledger_backend::services::shipment::CreateShipmentInput;
use tea_ledger_backend::services::stock::{CreateStockInput, StockFields};
use tea_ledger_backend::services::{
    AssignmentService, HistoryService, ShipmentService, StockService,
};

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Services wired to one in-process store
pub struct Ledger {
    pub store: MemoryStore,
    pub stock: StockService<MemoryStore>,
    pub assignments: AssignmentService<MemoryStore>,
    pub shipments: ShipmentService<MemoryStore>,
    pub history: HistoryService<MemoryStore>,
}

impl Ledger {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        Self {
            stock: StockService::new(store.clone(), policy),
            assignments: AssignmentService::new(store.clone(), policy),
            shipments: ShipmentService::new(store.clone(), policy),
            history: HistoryService::new(store.clone(), policy),
            store,
        }
    }

    /// Admin caller; the admin record itself is provisioned on first use
    pub fn admin(&self) -> Actor {
        Actor::new(Uuid::new_v4(), "admin|ops", Role::Admin)
    }

    pub fn enforcer(&self) -> Actor {
        Actor::new(Uuid::new_v4(), "enforce|customs", Role::Enforce)
    }

    /// Seed a user record and return it as a caller
    pub fn user(&self, external_id: &str) -> Actor {
        let user = self.store.seed_user(external_id, external_id);
        Actor::new(user.id, user.external_id, Role::User)
    }

    /// Create a lot through the catalog service
    pub async fn lot(&self, lot_number: &str, weight: &str, bags: i32) -> StockLot {
        let input = CreateStockInput {
            stock: fields(lot_number, weight, bags),
            assign_to: None,
        };
        self.stock
            .create_stock(&self.admin(), input)
            .await
            .unwrap()
            .stock
    }

    /// Current committed copy of a lot
    pub fn lot_now(&self, id: Uuid) -> StockLot {
        self.store.committed().lots[&id].clone()
    }
}

pub fn fields(lot_number: &str, weight: &str, bags: i32) -> StockFields {
    StockFields {
        lot_number: lot_number.to_string(),
        bags,
        weight: dec(weight),
        purchase_value: dec("4.50"),
        commission_rate: dec("2.5"),
        penalty: Decimal::ZERO,
        low_stock_threshold: None,
    }
}

pub fn item(stock_id: Uuid, weight: &str) -> ShipmentItemRequest {
    ShipmentItemRequest {
        stock_id,
        weight: dec(weight),
    }
}

pub fn shipment_input(items: Vec<ShipmentItemRequest>) -> CreateShipmentInput {
    CreateShipmentInput {
        shipment_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        consignee: "Harbour Tea Traders".to_string(),
        vessel: "MV Darjeeling".to_string(),
        shipmark: "HTT/24/06".to_string(),
        packaging_instructions: Some("Palletise, max 20 bags".to_string()),
        additional_instructions: None,
        items,
    }
}
