//! Stock adjustment tests
//!
//! Tests for the weight/bag movement of a lot including:
//! - Bags follow weight at the current weight per bag, rounded up
//! - Quantities never go negative and a rejected movement writes nothing
//! - Every movement leaves exactly one history row

mod common;

use axum::http::StatusCode;
use proptest::prelude::*;
use rust_decimal::Decimal;

use common::{dec, Ledger};
use shared::ledger::{plan_adjustment, weight_per_bag, AdjustmentError, StockQuantities};
use tea_ledger_backend::error::AppError;
use tea_ledger_backend::services::stock::AdjustStockInput;

fn adjust(delta: &str, reason: &str) -> AdjustStockInput {
    AdjustStockInput {
        weight_delta: dec(delta),
        reason: reason.to_string(),
        shipment_id: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Worked example: 100 kg in 10 bags, take 35 kg
    #[tokio::test]
    async fn test_deduction_rounds_bags_up() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0001", "100", 10).await;

        let updated = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("-35", "sample draw"))
            .await
            .unwrap();

        assert_eq!(updated.weight, dec("65"));
        assert_eq!(updated.bags, 6);
        // 4.50 + 0.11 commission = 4.61 per kg
        assert_eq!(updated.total, dec("299.65"));

        let history = ledger.history.stock_history(&admin, lot.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "REDUCED");
        assert_eq!(history[0].details["reason"], "sample draw");
        assert_eq!(history[0].details["bags_delta"], -4);
        assert_eq!(history[1].action, "Stock Created");
    }

    /// Restoring the same weight does not necessarily restore the same bags
    #[tokio::test]
    async fn test_round_trip_uses_current_bag_weight() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0002", "100", 10).await;

        ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("-35", "draw"))
            .await
            .unwrap();
        let restored = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("35", "return"))
            .await
            .unwrap();

        // 65 / 6 = 10.83 per bag; 35 / 10.83 rounds up to 4 bags
        assert_eq!(restored.weight, dec("100"));
        assert_eq!(restored.bags, 10);

        let history = ledger.history.stock_history(&admin, lot.id).await.unwrap();
        assert_eq!(history[0].action, "RESTORED");
        assert_eq!(history[0].details["weight_per_bag"], "10.83");
    }

    /// Irregular bags drift: 10 kg over 3 bags
    #[tokio::test]
    async fn test_irregular_bags_drift() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0003", "10", 3).await;

        let updated = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("-1", "draw"))
            .await
            .unwrap();

        // 3.33 per bag, so one kilogram still costs a whole bag
        assert_eq!(updated.weight, dec("9"));
        assert_eq!(updated.bags, 2);
    }

    /// An overdraw is rejected and leaves the lot and its history untouched
    #[tokio::test]
    async fn test_overdraw_writes_nothing() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0004", "20", 2).await;
        let commits_before = ledger.store.commits();

        let err = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("-20.5", "too much"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::StockInvariant {
                source: AdjustmentError::NegativeWeight { .. },
                ..
            }
        ));
        assert_eq!(ledger.lot_now(lot.id), lot);
        assert_eq!(ledger.store.commits(), commits_before);
        assert_eq!(ledger.store.committed().stock_history.len(), 1);
    }

    /// Weight fits but the rounded bag count does not
    #[tokio::test]
    async fn test_bag_shortfall_is_rejected() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0005", "10", 3).await;

        let err = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("-10", "empty it"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::StockInvariant {
                source: AdjustmentError::NegativeBags { .. },
                ..
            }
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ledger.lot_now(lot.id).weight, dec("10"));
    }

    /// A lot with no bags moves weight only
    #[tokio::test]
    async fn test_empty_lot_moves_weight_only() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0006", "0", 0).await;

        let updated = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("12.5", "found in warehouse"))
            .await
            .unwrap();

        assert_eq!(updated.weight, dec("12.5"));
        assert_eq!(updated.bags, 0);
    }

    /// Input and role checks happen before any transaction
    #[tokio::test]
    async fn test_rejections_before_transaction() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let user = ledger.user("auth0|buyer");
        let lot = ledger.lot("LOT-2024-0007", "50", 5).await;
        let begun = ledger.store.transactions_begun();

        let err = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("0", "nothing"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "weight_delta"));

        let err = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("-1", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "reason"));

        let err = ledger
            .stock
            .adjust_stock(&user, lot.id, adjust("-1", "mine now"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientPermissions));

        assert_eq!(ledger.store.transactions_begun(), begun);
    }

    /// Deltas finer than a hundredth of a kg, or too large to store, are rejected
    #[tokio::test]
    async fn test_delta_precision_and_range() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0009", "10", 1).await;
        let begun = ledger.store.transactions_begun();

        for delta in ["-0.005", "0.001", "79228162514264337593543950335"] {
            let err = ledger
                .stock
                .adjust_stock(&admin, lot.id, adjust(delta, "scale"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, AppError::Validation { ref field, .. } if field == "weight_delta"),
                "expected {} to be rejected, got {:?}",
                delta,
                err
            );
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }

        assert_eq!(ledger.store.transactions_begun(), begun);
        assert_eq!(ledger.lot_now(lot.id), lot);
    }

    /// Adjusting an unknown lot is a not-found error
    #[tokio::test]
    async fn test_unknown_lot() {
        let ledger = Ledger::new();
        let err = ledger
            .stock
            .adjust_stock(&ledger.admin(), uuid::Uuid::new_v4(), adjust("-1", "ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    /// A conflicting commit is retried and the movement lands once
    #[tokio::test]
    async fn test_conflict_is_retried_once_applied() {
        let ledger = Ledger::new();
        let admin = ledger.admin();
        let lot = ledger.lot("LOT-2024-0008", "100", 10).await;

        ledger.store.inject_write_conflicts(2);
        let updated = ledger
            .stock
            .adjust_stock(&admin, lot.id, adjust("-10", "draw"))
            .await
            .unwrap();

        assert_eq!(updated.weight, dec("90"));
        assert_eq!(updated.bags, 9);
        let reduced = ledger
            .store
            .committed()
            .stock_history
            .iter()
            .filter(|row| row.action == "REDUCED")
            .count();
        assert_eq!(reduced, 1);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn quantities_strategy() -> impl Strategy<Value = StockQuantities> {
    (0i64..1_000_000, 0i32..500).prop_map(|(cents, bags)| StockQuantities {
        weight: Decimal::new(cents, 2),
        bags,
    })
}

fn delta_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Accepted adjustments never leave negative quantities
    #[test]
    fn prop_accepted_adjustments_stay_non_negative(
        current in quantities_strategy(),
        delta in delta_strategy(),
    ) {
        if let Ok(plan) = plan_adjustment(current, delta) {
            prop_assert!(plan.new_weight >= Decimal::ZERO);
            prop_assert!(plan.new_bags >= 0);
            prop_assert_eq!(plan.new_weight, current.weight + delta);
            prop_assert_eq!(plan.new_bags, current.bags + plan.bags_delta);
        }
    }

    /// Bag movement is the weight movement over the bag weight, rounded up
    #[test]
    fn prop_bag_delta_rounds_up(
        current in quantities_strategy(),
        delta in delta_strategy(),
    ) {
        let per_bag = weight_per_bag(current);
        if let Ok(plan) = plan_adjustment(current, delta) {
            if per_bag.is_zero() {
                prop_assert_eq!(plan.bags_delta, 0);
            } else {
                let magnitude = Decimal::from(plan.bags_delta.abs());
                prop_assert!(magnitude * per_bag >= delta.abs());
                prop_assert!((magnitude - Decimal::ONE) * per_bag < delta.abs() || magnitude.is_zero());
                if delta < Decimal::ZERO {
                    prop_assert!(plan.bags_delta <= 0);
                } else {
                    prop_assert!(plan.bags_delta >= 0);
                }
            }
        }
    }

    /// Restorations never fail
    #[test]
    fn prop_restoration_always_applies(
        current in quantities_strategy(),
        cents in 0i64..1_000_000,
    ) {
        let plan = plan_adjustment(current, Decimal::new(cents, 2));
        prop_assert!(plan.is_ok());
    }

    /// Deductions beyond the available weight are always rejected
    #[test]
    fn prop_overdraw_is_rejected(
        current in quantities_strategy(),
        extra in 1i64..100_000,
    ) {
        let delta = -(current.weight + Decimal::new(extra, 2));
        let rejected = matches!(
            plan_adjustment(current, delta),
            Err(AdjustmentError::NegativeWeight { .. })
        );
        prop_assert!(rejected);
    }
}
