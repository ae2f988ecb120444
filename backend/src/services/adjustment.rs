//! Stock adjustment primitive
//!
//! The only code path that changes a lot's weight and bag count. It runs on
//! the caller's open transaction and always writes the lot and its history
//! row together.

use rust_decimal::Decimal;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared::ledger::plan_adjustment;
use shared::models::{Actor, NewStockHistory, StockAction, StockLot};

use crate::db::LedgerTx;
use crate::error::{AppError, AppResult};

/// Move `weight_delta` kg into (positive) or out of (negative) a lot.
///
/// Bags follow the weight using the lot's current weight per bag, rounded up
/// to whole bags. If either resulting quantity would be negative nothing is
/// written and [`AppError::StockInvariant`] is returned.
pub async fn apply_adjustment<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    lot_id: Uuid,
    weight_delta: Decimal,
    reason: &str,
    shipment_id: Option<Uuid>,
) -> AppResult<StockLot> {
    let lot = tx
        .find_lot(lot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock lot {}", lot_id)))?;

    let plan = plan_adjustment(lot.quantities(), weight_delta)
        .map_err(|source| AppError::StockInvariant { lot_id, source })?;

    let adjusted = lot.with_quantities(plan.quantities())?;
    let updated = tx
        .update_lot_quantities(lot_id, plan.quantities(), adjusted.total)
        .await?;

    let action = if plan.is_restoration() {
        StockAction::Restored
    } else {
        StockAction::Reduced
    };

    tx.append_stock_history(NewStockHistory {
        stock_id: lot_id,
        action: action.as_str().to_string(),
        actor_id: actor.id,
        actor_role: actor.role,
        shipment_id,
        details: json!({
            "reason": reason,
            "weight_delta": plan.weight_delta,
            "bags_delta": plan.bags_delta,
            "weight_per_bag": plan.weight_per_bag,
            "previous": { "weight": plan.previous_weight, "bags": plan.previous_bags },
            "stock": updated.snapshot(),
        }),
    })
    .await?;

    debug!(
        lot_id = %lot_id,
        weight_delta = %weight_delta,
        bags_delta = plan.bags_delta,
        new_weight = %plan.new_weight,
        new_bags = plan.new_bags,
        "Stock adjusted"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LedgerStore, MemoryStore};
    use chrono::Utc;
    use shared::ledger::AdjustmentError;
    use shared::models::{NewStockLot, Role};

    async fn seeded(store: &MemoryStore, weight: i64, bags: i32) -> StockLot {
        let lot = NewStockLot {
            lot_number: "LOT-ADJ".to_string(),
            bags,
            weight: Decimal::from(weight),
            purchase_value: Decimal::from(4),
            commission_rate: Decimal::ZERO,
            penalty: Decimal::ZERO,
            low_stock_threshold: None,
        }
        .into_lot(Uuid::new_v4(), Utc::now())
        .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_lot(&lot).await.unwrap();
        tx.commit().await.unwrap();
        lot
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), "ops", Role::Admin)
    }

    #[tokio::test]
    async fn reduction_moves_bags_and_total_and_records_history() {
        let store = MemoryStore::new();
        let lot = seeded(&store, 100, 10).await;

        let mut tx = store.begin().await.unwrap();
        let updated = apply_adjustment(&mut tx, &admin(), lot.id, Decimal::from(-35), "test", None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(updated.weight, Decimal::from(65));
        assert_eq!(updated.bags, 6);
        assert_eq!(updated.total, Decimal::from(260));

        let state = store.committed();
        assert_eq!(state.stock_history.len(), 1);
        assert_eq!(state.stock_history[0].action, "REDUCED");
        assert_eq!(state.stock_history[0].details["reason"], "test");
    }

    #[tokio::test]
    async fn violation_writes_nothing() {
        let store = MemoryStore::new();
        let lot = seeded(&store, 10, 3).await;

        let mut tx = store.begin().await.unwrap();
        let err = apply_adjustment(&mut tx, &admin(), lot.id, Decimal::from(-10), "test", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::StockInvariant {
                source: AdjustmentError::NegativeBags { .. },
                ..
            }
        ));
        tx.commit().await.unwrap();

        let state = store.committed();
        assert_eq!(state.lots[&lot.id].weight, Decimal::from(10));
        assert_eq!(state.lots[&lot.id].bags, 3);
        assert!(state.stock_history.is_empty());
    }

    #[tokio::test]
    async fn missing_lot_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = apply_adjustment(&mut tx, &admin(), Uuid::new_v4(), Decimal::ONE, "test", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
