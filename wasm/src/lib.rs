//! WebAssembly module for the tea ledger admin UI
//!
//! Provides client-side previews for:
//! - Stock adjustments (weight and bag movement before submitting)
//! - Shipment status changes allowed from a given status
//! - Lot pricing

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

use shared::ledger::{plan_adjustment, price_lot, StockQuantities};
use shared::models::ShipmentStatus;

/// Preview the effect of a weight change on a lot.
///
/// Decimal arguments are strings so no precision is lost crossing into JS.
/// Returns the planned adjustment as JSON, or the violation message.
#[wasm_bindgen]
pub fn preview_stock_adjustment(weight: &str, bags: i32, weight_delta: &str) -> Result<String, JsValue> {
    preview_adjustment_json(weight, bags, weight_delta).map_err(|e| JsValue::from_str(&e))
}

/// Whether a shipment may move from `from` to `to`
#[wasm_bindgen]
pub fn can_transition_status(from: &str, to: &str) -> bool {
    match (ShipmentStatus::parse(from), ShipmentStatus::parse(to)) {
        (Some(from), Some(to)) => from.can_transition_to(to),
        _ => false,
    }
}

/// Statuses reachable from `from`, as a JSON array
#[wasm_bindgen]
pub fn next_shipment_statuses(from: &str) -> String {
    let next: Vec<&str> = ShipmentStatus::parse(from)
        .map(|status| status.next_statuses().iter().map(|s| s.as_str()).collect())
        .unwrap_or_default();
    serde_json::to_string(&next).unwrap_or_else(|_| "[]".to_string())
}

/// Commission, net price and total for a lot, as JSON
#[wasm_bindgen]
pub fn preview_lot_pricing(
    purchase_value: &str,
    commission_rate: &str,
    penalty: &str,
    weight: &str,
) -> Result<String, JsValue> {
    pricing_json(purchase_value, commission_rate, penalty, weight).map_err(|e| JsValue::from_str(&e))
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn preview_adjustment_json(weight: &str, bags: i32, weight_delta: &str) -> Result<String, String> {
    let current = StockQuantities {
        weight: parse_decimal("weight", weight)?,
        bags,
    };
    let delta = parse_decimal("weight_delta", weight_delta)?;

    let plan = plan_adjustment(current, delta).map_err(|e| e.to_string())?;
    serde_json::to_string(&plan).map_err(|e| e.to_string())
}

fn pricing_json(
    purchase_value: &str,
    commission_rate: &str,
    penalty: &str,
    weight: &str,
) -> Result<String, String> {
    let pricing = price_lot(
        parse_decimal("purchase_value", purchase_value)?,
        parse_decimal("commission_rate", commission_rate)?,
        parse_decimal("penalty", penalty)?,
        parse_decimal("weight", weight)?,
    )
    .map_err(|e| e.to_string())?;
    serde_json::to_string(&pricing).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_preview() {
        let json = preview_adjustment_json("100", 10, "-35").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["new_bags"], 6);
        assert_eq!(value["bags_delta"], -4);
    }

    #[test]
    fn test_adjustment_preview_rejects_overdraw() {
        assert!(preview_adjustment_json("10", 1, "-20").is_err());
        assert!(preview_adjustment_json("ten", 1, "-2").is_err());
    }

    #[test]
    fn test_status_transitions() {
        assert!(can_transition_status("Pending", "Approved"));
        assert!(can_transition_status("approved", "shipped"));
        assert!(!can_transition_status("Cancelled", "Pending"));
        assert!(!can_transition_status("Unknown", "Pending"));
        assert_eq!(next_shipment_statuses("Shipped"), r#"["Delivered"]"#);
        assert_eq!(next_shipment_statuses("Delivered"), "[]");
    }

    #[test]
    fn test_pricing_preview() {
        let json = pricing_json("4.50", "2.5", "0.10", "200").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["net_price"], "4.51");
    }

    #[test]
    fn test_out_of_range_previews_are_errors() {
        let max = "79228162514264337593543950335";
        assert!(pricing_json("4.50", "0", "0", max).is_err());
        assert!(preview_adjustment_json("0.01", 1, max).is_err());
    }
}
