//! Validation utilities for the tea ledger

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::ShipmentItemRequest;

// ============================================================================
// Amount Validations
// ============================================================================

/// Decimal places stored for every weight, price and rate
pub const AMOUNT_SCALE: u32 = 2;

/// Largest weight or price the ledger columns hold (NUMERIC(14, 2))
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_99, AMOUNT_SCALE)
}

/// Validate that an amount fits the stored precision and range
pub fn validate_amount_precision(value: Decimal) -> Result<(), &'static str> {
    if value.normalize().scale() > AMOUNT_SCALE {
        return Err("At most two decimal places are allowed");
    }
    if value.abs() > max_amount() {
        return Err("Value is out of range");
    }
    Ok(())
}

// ============================================================================
// Stock Validations
// ============================================================================

/// Validate a lot number: 1-64 characters of letters, digits, '-', '/' or '_'
pub fn validate_lot_number(lot_number: &str) -> Result<(), &'static str> {
    let trimmed = lot_number.trim();
    if trimmed.is_empty() {
        return Err("Lot number cannot be empty");
    }
    if trimmed.len() > 64 {
        return Err("Lot number must be at most 64 characters");
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '_'))
    {
        return Err("Lot number may only contain letters, digits, '-', '/' and '_'");
    }
    Ok(())
}

/// Validate a weight that is about to be moved or reserved
pub fn validate_positive_weight(weight: Decimal) -> Result<(), &'static str> {
    if weight <= Decimal::ZERO {
        return Err("Weight must be greater than zero");
    }
    validate_amount_precision(weight)
}

/// Validate a signed weight change: non-zero, stored precision
pub fn validate_weight_delta(delta: Decimal) -> Result<(), &'static str> {
    if delta.is_zero() {
        return Err("Weight change cannot be zero");
    }
    validate_amount_precision(delta)
}

/// Validate a stored quantity or price (zero allowed)
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value cannot be negative");
    }
    validate_amount_precision(value)
}

/// Validate a commission percentage (0-100)
pub fn validate_commission_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err("Commission rate must be between 0 and 100");
    }
    validate_amount_precision(rate)
}

/// Validate that a lot with weight has bags to carry it and vice versa
pub fn validate_bags_for_weight(bags: i32, weight: Decimal) -> Result<(), &'static str> {
    if bags < 0 {
        return Err("Bag count cannot be negative");
    }
    if bags == 0 && weight > Decimal::ZERO {
        return Err("A lot with weight must have at least one bag");
    }
    Ok(())
}

// ============================================================================
// Shipment Validations
// ============================================================================

/// Validate a shipment item list: at least one item, every weight positive
pub fn validate_shipment_items(items: &[ShipmentItemRequest]) -> Result<(), &'static str> {
    if items.is_empty() {
        return Err("A shipment needs at least one item");
    }
    if items.iter().any(|item| item.weight <= Decimal::ZERO) {
        return Err("Item weight must be greater than zero");
    }
    items
        .iter()
        .try_for_each(|item| validate_amount_precision(item.weight))
}

/// Total requested weight per lot, so repeated lots are checked as one draw
pub fn requested_weight_by_lot(items: &[ShipmentItemRequest]) -> BTreeMap<Uuid, Decimal> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.stock_id).or_insert(Decimal::ZERO) += item.weight;
    }
    totals
}
