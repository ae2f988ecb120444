//! Stock catalog service
//!
//! Lot creation, import, pricing updates, deletion, reads, and the direct
//! admin adjustment. Quantities are never patched directly; they only move
//! through [`apply_adjustment`].

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use shared::ledger::price_lot;
use shared::models::{
    Actor, NewStockHistory, NewStockLot, Operation, Role, StockAction, StockAssignment, StockLot,
};
use shared::validation::validate_bags_for_weight;

use super::assignment::{assign_in_tx, BulkAssignItem};
use super::{
    apply_adjustment, authorize, check_field, validate_amount, validate_commission, validate_delta,
    validate_lot, validate_weight,
};
use crate::db::{retry_transaction, LedgerStore, LedgerTx, RetryPolicy};
use crate::error::{AppError, AppResult};

/// Fields of a lot as entered by an admin or read from an import file
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StockFields {
    #[validate(custom = "validate_lot")]
    pub lot_number: String,
    pub bags: i32,
    #[validate(custom = "validate_amount")]
    pub weight: Decimal,
    /// Price per kg
    #[validate(custom = "validate_amount")]
    pub purchase_value: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_commission")]
    pub commission_rate: Decimal,
    /// Deduction per kg
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub penalty: Decimal,
    #[validate(custom = "validate_amount")]
    pub low_stock_threshold: Option<Decimal>,
}

impl StockFields {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        check_field("bags", validate_bags_for_weight(self.bags, self.weight))
    }

    fn into_new_lot(self) -> NewStockLot {
        NewStockLot {
            lot_number: self.lot_number.trim().to_string(),
            bags: self.bags,
            weight: self.weight,
            purchase_value: self.purchase_value,
            commission_rate: self.commission_rate,
            penalty: self.penalty,
            low_stock_threshold: self.low_stock_threshold,
        }
    }
}

/// Initial assignment made together with lot creation
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct AssignTo {
    pub user_id: Uuid,
    #[validate(custom = "validate_weight")]
    pub weight: Option<Decimal>,
}

/// Input for creating a lot
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStockInput {
    #[serde(flatten)]
    pub stock: StockFields,
    pub assign_to: Option<AssignTo>,
}

/// Input for importing already-parsed rows
#[derive(Debug, Clone, Deserialize)]
pub struct ImportStocksInput {
    pub rows: Vec<StockFields>,
}

/// Input for updating pricing terms; quantities cannot be patched
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateStockInput {
    #[validate(custom = "validate_amount")]
    pub purchase_value: Option<Decimal>,
    #[validate(custom = "validate_commission")]
    pub commission_rate: Option<Decimal>,
    #[validate(custom = "validate_amount")]
    pub penalty: Option<Decimal>,
    #[validate(custom = "validate_amount")]
    pub low_stock_threshold: Option<Decimal>,
}

/// Input for a direct admin adjustment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustStockInput {
    /// Signed kg; negative removes stock
    #[validate(custom = "validate_delta")]
    pub weight_delta: Decimal,
    #[validate(length(min = 1, max = 500, message = "A reason is required"))]
    pub reason: String,
    pub shipment_id: Option<Uuid>,
}

/// A lot created with its optional initial assignment
#[derive(Debug, Clone, Serialize)]
pub struct CreatedStock {
    pub stock: StockLot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<StockAssignment>,
}

/// Stock catalog service
#[derive(Clone)]
pub struct StockService<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: LedgerStore> StockService<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Create a lot, optionally assigning it in the same transaction
    pub async fn create_stock(&self, actor: &Actor, input: CreateStockInput) -> AppResult<CreatedStock> {
        authorize(actor, Operation::CreateStock)?;
        input.stock.check()?;
        if let Some(assign_to) = &input.assign_to {
            assign_to.validate()?;
            authorize(actor, Operation::AssignStock)?;
        }

        let actor = actor.clone();
        let created = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let input = input.clone();
            Box::pin(async move {
                let stock = insert_lot_in_tx(tx, &actor, input.stock.into_new_lot()).await?;

                let assignment = match input.assign_to {
                    Some(target) => {
                        let request = [BulkAssignItem {
                            stock_id: stock.id,
                            weight: target.weight,
                        }];
                        assign_in_tx(tx, &actor, target.user_id, &request).await?.pop()
                    }
                    None => None,
                };

                Ok(CreatedStock { stock, assignment })
            })
        })
        .await?;

        info!(lot_id = %created.stock.id, lot_number = %created.stock.lot_number, "Stock created");
        Ok(created)
    }

    /// Create every row in one transaction; any duplicate lot number aborts the batch
    pub async fn import_stocks(&self, actor: &Actor, input: ImportStocksInput) -> AppResult<Vec<StockLot>> {
        authorize(actor, Operation::CreateStock)?;
        if input.rows.is_empty() {
            return Err(AppError::validation("rows", "At least one row is required"));
        }

        let mut seen = HashSet::new();
        for (index, row) in input.rows.iter().enumerate() {
            row.check().map_err(|err| match err {
                AppError::Validation { field, message } => AppError::Validation {
                    field: format!("rows[{}].{}", index, field),
                    message,
                },
                other => other,
            })?;
            if !seen.insert(row.lot_number.trim().to_string()) {
                return Err(AppError::Conflict {
                    resource: "lot_number".to_string(),
                    message: format!("Lot number {} appears more than once", row.lot_number.trim()),
                });
            }
        }

        let actor = actor.clone();
        let lots = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let rows = input.rows.clone();
            Box::pin(async move {
                let mut lots = Vec::with_capacity(rows.len());
                for row in rows {
                    lots.push(insert_lot_in_tx(tx, &actor, row.into_new_lot()).await?);
                }
                Ok(lots)
            })
        })
        .await?;

        info!(count = lots.len(), "Stock imported");
        Ok(lots)
    }

    /// Update pricing terms and the low-stock threshold
    pub async fn update_stock(
        &self,
        actor: &Actor,
        lot_id: Uuid,
        input: UpdateStockInput,
    ) -> AppResult<StockLot> {
        authorize(actor, Operation::UpdateStock)?;
        input.validate()?;

        let actor = actor.clone();
        let updated = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let input = input.clone();
            Box::pin(async move {
                let before = find_lot_or_404(tx, lot_id).await?;

                let mut lot = before.clone();
                lot.purchase_value = input.purchase_value.unwrap_or(lot.purchase_value);
                lot.commission_rate = input.commission_rate.unwrap_or(lot.commission_rate);
                lot.penalty = input.penalty.unwrap_or(lot.penalty);
                if input.low_stock_threshold.is_some() {
                    lot.low_stock_threshold = input.low_stock_threshold;
                }
                let pricing = price_lot(lot.purchase_value, lot.commission_rate, lot.penalty, lot.weight)?;
                lot.commission = pricing.commission;
                lot.net_price = pricing.net_price;
                lot.total = pricing.total;

                let updated = tx.update_lot_terms(&lot).await?;

                tx.append_stock_history(NewStockHistory {
                    stock_id: lot_id,
                    action: StockAction::Updated.as_str().to_string(),
                    actor_id: actor.id,
                    actor_role: actor.role,
                    shipment_id: None,
                    details: json!({
                        "changes": input,
                        "before": before.snapshot(),
                        "stock": updated.snapshot(),
                    }),
                })
                .await?;

                Ok(updated)
            })
        })
        .await?;

        info!(lot_id = %lot_id, "Stock updated");
        Ok(updated)
    }

    /// Delete a lot that no shipment references
    pub async fn delete_stock(&self, actor: &Actor, lot_id: Uuid) -> AppResult<StockLot> {
        authorize(actor, Operation::DeleteStock)?;

        let actor = actor.clone();
        let deleted = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move {
                let lot = find_lot_or_404(tx, lot_id).await?;

                let references = tx.count_items_for_lot(lot_id).await?;
                if references > 0 {
                    return Err(AppError::Conflict {
                        resource: "stock".to_string(),
                        message: format!(
                            "Lot {} is used by {} shipment item(s)",
                            lot.lot_number, references
                        ),
                    });
                }

                tx.delete_lot(lot_id).await?;

                tx.append_stock_history(NewStockHistory {
                    stock_id: lot_id,
                    action: StockAction::Deleted.as_str().to_string(),
                    actor_id: actor.id,
                    actor_role: actor.role,
                    shipment_id: None,
                    details: json!({ "stock": lot.snapshot() }),
                })
                .await?;

                Ok(lot)
            })
        })
        .await?;

        info!(lot_id = %lot_id, lot_number = %deleted.lot_number, "Stock deleted");
        Ok(deleted)
    }

    /// Apply a signed weight change to a lot
    pub async fn adjust_stock(
        &self,
        actor: &Actor,
        lot_id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<StockLot> {
        authorize(actor, Operation::AdjustStock)?;
        input.validate()?;

        let actor = actor.clone();
        let lot = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let input = input.clone();
            Box::pin(async move {
                apply_adjustment(
                    tx,
                    &actor,
                    lot_id,
                    input.weight_delta,
                    &input.reason,
                    input.shipment_id,
                )
                .await
            })
        })
        .await?;

        info!(lot_id = %lot_id, weight = %lot.weight, bags = lot.bags, "Stock adjusted by admin");
        Ok(lot)
    }

    /// A lot visible to the caller; users only see lots assigned to them
    pub async fn get_stock(&self, actor: &Actor, lot_id: Uuid) -> AppResult<StockLot> {
        authorize(actor, Operation::ViewStock)?;
        debug!(lot_id = %lot_id, "Fetching stock");

        let actor = actor.clone();
        retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move {
                let lot = find_lot_or_404(tx, lot_id).await?;
                if actor.role == Role::User {
                    let assigned = tx
                        .assignments_for_lots(&[lot_id])
                        .await?
                        .iter()
                        .any(|assignment| assignment.user_id == actor.id);
                    if !assigned {
                        return Err(AppError::NotFound(format!("Stock lot {}", lot_id)));
                    }
                }
                Ok(lot)
            })
        })
        .await
    }

    /// Lots visible to the caller
    pub async fn list_stocks(&self, actor: &Actor) -> AppResult<Vec<StockLot>> {
        authorize(actor, Operation::ViewStock)?;

        let actor = actor.clone();
        retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move { visible_lots(tx, &actor).await })
        })
        .await
    }

    /// Visible lots at or below their low-stock threshold
    pub async fn low_stock_report(&self, actor: &Actor) -> AppResult<Vec<StockLot>> {
        let lots = self.list_stocks(actor).await?;
        Ok(lots.into_iter().filter(StockLot::is_low).collect())
    }
}

async fn insert_lot_in_tx<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    new_lot: NewStockLot,
) -> AppResult<StockLot> {
    let lot = new_lot.into_lot(Uuid::new_v4(), Utc::now())?;
    tx.insert_lot(&lot).await?;

    tx.append_stock_history(NewStockHistory {
        stock_id: lot.id,
        action: StockAction::Created.as_str().to_string(),
        actor_id: actor.id,
        actor_role: actor.role,
        shipment_id: None,
        details: json!({ "stock": lot.snapshot() }),
    })
    .await?;

    Ok(lot)
}

async fn find_lot_or_404<T: LedgerTx>(tx: &mut T, lot_id: Uuid) -> AppResult<StockLot> {
    tx.find_lot(lot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock lot {}", lot_id)))
}

async fn visible_lots<T: LedgerTx>(tx: &mut T, actor: &Actor) -> AppResult<Vec<StockLot>> {
    let lots = match actor.role {
        Role::User => tx.list_lots_assigned_to(actor.id).await?,
        Role::Admin | Role::Enforce => tx.list_lots().await?,
    };
    Ok(lots)
}
