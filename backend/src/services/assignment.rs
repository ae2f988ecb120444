//! Stock assignment service
//!
//! A lot is bound to at most one user at a time. The store has no unique
//! index for this: it is an application invariant, checked by reading the
//! lot's assignments and inserting in the same transaction. Under
//! serializable isolation two racing assigners cannot both commit, but a
//! writer that bypasses this service could still break the rule.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use shared::models::{Actor, NewStockHistory, Operation, StockAction, StockAssignment};

use super::{authorize, validate_weight};
use crate::db::{retry_transaction, LedgerStore, LedgerTx, RetryPolicy};
use crate::error::{AppError, AppResult};

/// Input for assigning one lot
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignStockInput {
    pub user_id: Uuid,
    /// Defaults to the lot's full current weight
    #[validate(custom = "validate_weight")]
    pub weight: Option<Decimal>,
}

/// One lot of a bulk assignment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct BulkAssignItem {
    pub stock_id: Uuid,
    #[validate(custom = "validate_weight")]
    pub weight: Option<Decimal>,
}

/// Input for assigning several lots to one user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkAssignInput {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "At least one lot is required"))]
    pub items: Vec<BulkAssignItem>,
}

/// Stock assignment service
#[derive(Clone)]
pub struct AssignmentService<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: LedgerStore> AssignmentService<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Assign one lot to a user
    pub async fn assign_stock(
        &self,
        actor: &Actor,
        lot_id: Uuid,
        input: AssignStockInput,
    ) -> AppResult<StockAssignment> {
        authorize(actor, Operation::AssignStock)?;
        input.validate()?;

        let actor = actor.clone();
        let mut assignments = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let user_id = input.user_id;
            let requests = vec![BulkAssignItem {
                stock_id: lot_id,
                weight: input.weight,
            }];
            Box::pin(async move { assign_in_tx(tx, &actor, user_id, &requests).await })
        })
        .await?;

        assignments
            .pop()
            .ok_or_else(|| AppError::Internal("assignment was not created".to_string()))
    }

    /// Assign several lots to one user; either every lot is assigned or none
    pub async fn bulk_assign_stocks(
        &self,
        actor: &Actor,
        input: BulkAssignInput,
    ) -> AppResult<Vec<StockAssignment>> {
        authorize(actor, Operation::AssignStock)?;
        input.validate()?;
        for item in &input.items {
            item.validate()?;
        }

        let actor = actor.clone();
        retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let input = input.clone();
            Box::pin(async move { assign_in_tx(tx, &actor, input.user_id, &input.items).await })
        })
        .await
    }

    /// Remove a user's assignment of a lot
    pub async fn unassign_stock(
        &self,
        actor: &Actor,
        lot_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<StockAssignment> {
        authorize(actor, Operation::AssignStock)?;

        let actor = actor.clone();
        retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move { unassign_in_tx(tx, &actor, lot_id, user_id).await })
        })
        .await
    }
}

/// Assign the requested lots to `user_id` on an open transaction.
///
/// Requests for the same lot are merged into one assignment. A request
/// without a weight reserves the lot's whole current weight.
pub(crate) async fn assign_in_tx<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    user_id: Uuid,
    requests: &[BulkAssignItem],
) -> AppResult<Vec<StockAssignment>> {
    tx.find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

    let mut lot_ids: Vec<Uuid> = Vec::new();
    for request in requests {
        if !lot_ids.contains(&request.stock_id) {
            lot_ids.push(request.stock_id);
        }
    }

    let lots: HashMap<Uuid, _> = tx
        .find_lots(&lot_ids)
        .await?
        .into_iter()
        .map(|lot| (lot.id, lot))
        .collect();

    let missing: Vec<Uuid> = lot_ids
        .iter()
        .copied()
        .filter(|id| !lots.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::MissingRecords {
            resource: "Stock lots".to_string(),
            ids: missing,
        });
    }

    let existing = tx.assignments_for_lots(&lot_ids).await?;
    if !existing.is_empty() {
        return Err(AppError::AlreadyAssigned {
            assignments: existing
                .iter()
                .map(|assignment| (assignment.stock_id, assignment.user_id))
                .collect(),
        });
    }

    // Validate every lot before the first insert
    let mut planned = Vec::with_capacity(lot_ids.len());
    for lot_id in &lot_ids {
        let lot = &lots[lot_id];
        let requested: Decimal = requests
            .iter()
            .filter(|request| request.stock_id == *lot_id)
            .map(|request| request.weight.unwrap_or(lot.weight))
            .sum();

        if requested > lot.weight {
            return Err(AppError::InsufficientStock {
                lot_id: lot.id,
                lot_number: lot.lot_number.clone(),
                requested,
                available: lot.weight,
            });
        }
        planned.push((lot, requested));
    }

    let mut created = Vec::with_capacity(planned.len());
    for (lot, weight) in planned {
        let assignment = StockAssignment {
            id: Uuid::new_v4(),
            stock_id: lot.id,
            user_id,
            assigned_weight: weight,
            assigned_by: actor.id,
            created_at: Utc::now(),
        };
        tx.insert_assignment(&assignment).await?;

        tx.append_stock_history(NewStockHistory {
            stock_id: lot.id,
            action: StockAction::Assigned.as_str().to_string(),
            actor_id: actor.id,
            actor_role: actor.role,
            shipment_id: None,
            details: json!({
                "user_id": user_id,
                "assigned_weight": weight,
                "stock": lot.snapshot(),
            }),
        })
        .await?;

        info!(
            lot_id = %lot.id,
            user_id = %user_id,
            assigned_weight = %weight,
            "Stock assigned"
        );
        created.push(assignment);
    }

    Ok(created)
}

async fn unassign_in_tx<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    lot_id: Uuid,
    user_id: Uuid,
) -> AppResult<StockAssignment> {
    let assignment = tx
        .assignments_for_lots(&[lot_id])
        .await?
        .into_iter()
        .find(|assignment| assignment.user_id == user_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("Assignment of lot {} to user {}", lot_id, user_id))
        })?;

    tx.delete_assignment(assignment.id).await?;

    let snapshot = tx.find_lot(lot_id).await?.map(|lot| lot.snapshot());
    tx.append_stock_history(NewStockHistory {
        stock_id: lot_id,
        action: StockAction::Unassigned.as_str().to_string(),
        actor_id: actor.id,
        actor_role: actor.role,
        shipment_id: None,
        details: json!({
            "user_id": user_id,
            "assigned_weight": assignment.assigned_weight,
            "stock": snapshot,
        }),
    })
    .await?;

    info!(lot_id = %lot_id, user_id = %user_id, "Stock unassigned");

    Ok(assignment)
}
