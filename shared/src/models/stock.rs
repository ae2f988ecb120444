//! Stock lot and assignment models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{price_lot, PricingOverflow, StockQuantities};

/// A purchased tea lot available for shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLot {
    pub id: Uuid,
    /// Business key printed on the bags (e.g. "LOT-2024-0137"), never changes
    pub lot_number: String,
    pub bags: i32,
    /// Net weight in kilograms
    pub weight: Decimal,
    /// Purchase price per kg
    pub purchase_value: Decimal,
    /// Broker commission as a percentage of the purchase value
    pub commission_rate: Decimal,
    pub commission: Decimal,
    /// Quality penalty per kg
    pub penalty: Decimal,
    pub net_price: Decimal,
    pub total: Decimal,
    pub low_stock_threshold: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockLot {
    pub fn quantities(&self) -> StockQuantities {
        StockQuantities {
            weight: self.weight,
            bags: self.bags,
        }
    }

    /// Apply new quantities and refresh the weight-dependent total
    pub fn with_quantities(mut self, quantities: StockQuantities) -> Result<Self, PricingOverflow> {
        self.weight = quantities.weight;
        self.bags = quantities.bags;
        self.total = price_lot(
            self.purchase_value,
            self.commission_rate,
            self.penalty,
            self.weight,
        )?
        .total;
        Ok(self)
    }

    pub fn is_low(&self) -> bool {
        self.low_stock_threshold
            .map(|threshold| self.weight <= threshold)
            .unwrap_or(false)
    }

    /// Identifying fields copied into history rows
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "lot_number": self.lot_number,
            "bags": self.bags,
            "weight": self.weight,
            "net_price": self.net_price,
        })
    }
}

/// Values for a lot about to be inserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStockLot {
    pub lot_number: String,
    pub bags: i32,
    pub weight: Decimal,
    pub purchase_value: Decimal,
    pub commission_rate: Decimal,
    pub penalty: Decimal,
    pub low_stock_threshold: Option<Decimal>,
}

impl NewStockLot {
    /// Materialize the row with computed pricing fields
    pub fn into_lot(self, id: Uuid, now: DateTime<Utc>) -> Result<StockLot, PricingOverflow> {
        let pricing = price_lot(
            self.purchase_value,
            self.commission_rate,
            self.penalty,
            self.weight,
        )?;

        Ok(StockLot {
            id,
            lot_number: self.lot_number,
            bags: self.bags,
            weight: self.weight,
            purchase_value: self.purchase_value,
            commission_rate: self.commission_rate,
            commission: pricing.commission,
            penalty: self.penalty,
            net_price: pricing.net_price,
            total: pricing.total,
            low_stock_threshold: self.low_stock_threshold,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Exclusive binding of a lot to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAssignment {
    pub id: Uuid,
    pub stock_id: Uuid,
    pub user_id: Uuid,
    pub assigned_weight: Decimal,
    pub assigned_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StockLot {
        NewStockLot {
            lot_number: "LOT-1".to_string(),
            bags: 10,
            weight: Decimal::from(100),
            purchase_value: Decimal::from(4),
            commission_rate: Decimal::from(5),
            penalty: Decimal::ZERO,
            low_stock_threshold: Some(Decimal::from(50)),
        }
        .into_lot(Uuid::new_v4(), Utc::now())
        .unwrap()
    }

    #[test]
    fn total_follows_weight() {
        let lot = sample();
        assert_eq!(lot.net_price, Decimal::new(420, 2));
        assert_eq!(lot.total, Decimal::from(420));

        let lot = lot
            .with_quantities(StockQuantities {
                weight: Decimal::from(50),
                bags: 5,
            })
            .unwrap();
        assert_eq!(lot.total, Decimal::from(210));
        assert!(lot.is_low());
    }
}
