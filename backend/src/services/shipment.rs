//! Shipment lifecycle service
//!
//! Stock is reserved when a shipment is created and released when it is
//! deleted or its items are replaced. Every step of an operation, the stock
//! movements included, runs in one transaction: a failure anywhere leaves
//! lots, items, and history exactly as they were.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use shared::models::{
    Actor, NewShipmentHistory, Operation, Role, Shipment, ShipmentAction, ShipmentDetails,
    ShipmentItem, ShipmentItemRequest, ShipmentStatus,
};
use shared::validation::{requested_weight_by_lot, validate_shipment_items};

use super::{apply_adjustment, authorize, check_field, ensure_admin};
use crate::db::{retry_transaction, LedgerStore, LedgerTx, RetryPolicy};
use crate::error::{AppError, AppResult};

/// Input for booking a shipment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateShipmentInput {
    pub shipment_date: NaiveDate,
    #[validate(length(min = 1, max = 200, message = "Consignee is required"))]
    pub consignee: String,
    #[validate(length(min = 1, max = 200, message = "Vessel is required"))]
    pub vessel: String,
    #[validate(length(min = 1, max = 200, message = "Shipmark is required"))]
    pub shipmark: String,
    #[validate(length(max = 2000))]
    pub packaging_instructions: Option<String>,
    #[validate(length(max = 2000))]
    pub additional_instructions: Option<String>,
    pub items: Vec<ShipmentItemRequest>,
}

impl CreateShipmentInput {
    fn details(&self) -> ShipmentDetails {
        ShipmentDetails {
            shipment_date: self.shipment_date,
            consignee: self.consignee.trim().to_string(),
            vessel: self.vessel.trim().to_string(),
            shipmark: self.shipmark.trim().to_string(),
            packaging_instructions: self.packaging_instructions.clone(),
            additional_instructions: self.additional_instructions.clone(),
        }
    }
}

/// Owner's patch of a shipment; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateShipmentInput {
    pub status: Option<ShipmentStatus>,
    pub shipment_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 200))]
    pub consignee: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub vessel: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub shipmark: Option<String>,
    #[validate(length(max = 2000))]
    pub packaging_instructions: Option<String>,
    #[validate(length(max = 2000))]
    pub additional_instructions: Option<String>,
    /// Replaces the whole item list when present
    pub items: Option<Vec<ShipmentItemRequest>>,
}

/// Input for a status change by back-office staff
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UpdateShipmentStatusInput {
    pub status: ShipmentStatus,
}

/// Shipment lifecycle service
#[derive(Clone)]
pub struct ShipmentService<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: LedgerStore> ShipmentService<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Book a shipment for the calling user and reserve its stock
    pub async fn create_shipment(
        &self,
        actor: &Actor,
        input: CreateShipmentInput,
    ) -> AppResult<Shipment> {
        authorize(actor, Operation::CreateShipment)?;
        input.validate()?;
        check_field("items", validate_shipment_items(&input.items))?;

        let actor = actor.clone();
        let shipment = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let input = input.clone();
            Box::pin(async move {
                tx.find_user(actor.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("User {}", actor.id)))?;

                let now = Utc::now();
                let details = input.details();
                let mut shipment = Shipment {
                    id: Uuid::new_v4(),
                    user_id: actor.id,
                    status: ShipmentStatus::Pending,
                    shipment_date: details.shipment_date,
                    consignee: details.consignee,
                    vessel: details.vessel,
                    shipmark: details.shipmark,
                    packaging_instructions: details.packaging_instructions,
                    additional_instructions: details.additional_instructions,
                    items: Vec::new(),
                    created_at: now,
                    updated_at: now,
                };

                check_availability(tx, &input.items).await?;
                tx.insert_shipment(&shipment).await?;
                shipment.items = reserve_items(tx, &actor, shipment.id, &input.items).await?;

                append_shipment_history(tx, &actor, actor.id, &shipment, ShipmentAction::Created, json!({}))
                    .await?;

                Ok(shipment)
            })
        })
        .await?;

        info!(
            shipment_id = %shipment.id,
            user_id = %shipment.user_id,
            items = shipment.items.len(),
            total_weight = %shipment.total_weight(),
            "Shipment created"
        );
        Ok(shipment)
    }

    /// Owner update of details, status (Pending or Cancelled only) and items
    pub async fn update_shipment(
        &self,
        actor: &Actor,
        shipment_id: Uuid,
        input: UpdateShipmentInput,
    ) -> AppResult<Shipment> {
        authorize(actor, Operation::UpdateShipment)?;
        input.validate()?;
        if let Some(status) = input.status {
            if !status.is_owner_settable() {
                return Err(AppError::InsufficientPermissions);
            }
        }
        if let Some(items) = &input.items {
            check_field("items", validate_shipment_items(items))?;
        }

        let actor = actor.clone();
        let shipment = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            let input = input.clone();
            Box::pin(async move { update_in_tx(tx, &actor, shipment_id, input).await })
        })
        .await?;

        info!(shipment_id = %shipment.id, status = %shipment.status, "Shipment updated");
        Ok(shipment)
    }

    /// Move a shipment along the status table; back-office roles only
    pub async fn update_shipment_status(
        &self,
        actor: &Actor,
        shipment_id: Uuid,
        input: UpdateShipmentStatusInput,
    ) -> AppResult<Shipment> {
        authorize(actor, Operation::UpdateShipmentStatus)?;

        let actor = actor.clone();
        let shipment = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move {
                let admin = ensure_admin(tx, &actor).await?;
                let mut shipment = find_shipment_or_404(tx, shipment_id).await?;

                let from = shipment.status;
                if !from.can_transition_to(input.status) {
                    return Err(AppError::InvalidStateTransition {
                        from,
                        to: input.status,
                    });
                }

                shipment.status = input.status;
                shipment.updated_at = Utc::now();
                tx.update_shipment(&shipment).await?;

                append_shipment_history(
                    tx,
                    &actor,
                    admin.id,
                    &shipment,
                    ShipmentAction::StatusUpdated,
                    json!({ "from": from, "to": input.status }),
                )
                .await?;

                Ok(shipment)
            })
        })
        .await?;

        info!(shipment_id = %shipment.id, status = %shipment.status, "Shipment status updated");
        Ok(shipment)
    }

    /// Delete a shipment and restore its stock; returns the deleted shipment
    pub async fn delete_shipment(&self, actor: &Actor, shipment_id: Uuid) -> AppResult<Shipment> {
        authorize(actor, Operation::DeleteShipment)?;

        let actor = actor.clone();
        let shipment = retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move {
                let shipment = find_shipment_or_404(tx, shipment_id).await?;
                ensure_owner_or_elevated(&actor, &shipment)?;

                release_items(tx, &actor, &shipment, "restored for deleted shipment").await?;
                tx.delete_shipment_items(shipment_id).await?;
                tx.delete_shipment(shipment_id).await?;

                append_shipment_history(tx, &actor, actor.id, &shipment, ShipmentAction::Deleted, json!({}))
                    .await?;

                Ok(shipment)
            })
        })
        .await?;

        info!(shipment_id = %shipment.id, items = shipment.items.len(), "Shipment deleted");
        Ok(shipment)
    }

    /// A shipment visible to the caller; users only see their own
    pub async fn get_shipment(&self, actor: &Actor, shipment_id: Uuid) -> AppResult<Shipment> {
        authorize(actor, Operation::ViewShipment)?;
        debug!(shipment_id = %shipment_id, "Fetching shipment");

        let actor = actor.clone();
        retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move {
                let shipment = find_shipment_or_404(tx, shipment_id).await?;
                if actor.role == Role::User && shipment.user_id != actor.id {
                    return Err(AppError::NotFound(format!("Shipment {}", shipment_id)));
                }
                Ok(shipment)
            })
        })
        .await
    }

    /// Shipments visible to the caller, newest first
    pub async fn list_shipments(&self, actor: &Actor) -> AppResult<Vec<Shipment>> {
        authorize(actor, Operation::ViewShipment)?;

        let owner = match actor.role {
            Role::User => Some(actor.id),
            Role::Admin | Role::Enforce => None,
        };
        retry_transaction(&self.store, &self.policy, move |tx| {
            Box::pin(async move { Ok(tx.list_shipments(owner).await?) })
        })
        .await
    }
}

async fn update_in_tx<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    shipment_id: Uuid,
    input: UpdateShipmentInput,
) -> AppResult<Shipment> {
    let mut shipment = find_shipment_or_404(tx, shipment_id).await?;
    if shipment.user_id != actor.id {
        return Err(AppError::InsufficientPermissions);
    }
    if shipment.status.is_terminal() {
        return Err(AppError::ShipmentClosed(shipment.status));
    }

    let previous_status = shipment.status;
    if let Some(status) = input.status {
        if !shipment.status.can_transition_to(status) {
            return Err(AppError::InvalidStateTransition {
                from: shipment.status,
                to: status,
            });
        }
        shipment.status = status;
    }

    if let Some(date) = input.shipment_date {
        shipment.shipment_date = date;
    }
    if let Some(consignee) = input.consignee {
        shipment.consignee = consignee.trim().to_string();
    }
    if let Some(vessel) = input.vessel {
        shipment.vessel = vessel.trim().to_string();
    }
    if let Some(shipmark) = input.shipmark {
        shipment.shipmark = shipmark.trim().to_string();
    }
    if input.packaging_instructions.is_some() {
        shipment.packaging_instructions = input.packaging_instructions;
    }
    if input.additional_instructions.is_some() {
        shipment.additional_instructions = input.additional_instructions;
    }

    let items_replaced = input.items.is_some();
    if let Some(items) = input.items {
        // Release first so the shipment's own reservation counts as available
        release_items(tx, actor, &shipment, "restored for shipment update").await?;
        tx.delete_shipment_items(shipment.id).await?;

        check_availability(tx, &items).await?;
        shipment.items = reserve_items(tx, actor, shipment.id, &items).await?;
    }

    shipment.updated_at = Utc::now();
    tx.update_shipment(&shipment).await?;

    append_shipment_history(
        tx,
        actor,
        actor.id,
        &shipment,
        ShipmentAction::Updated,
        json!({ "previous_status": previous_status, "items_replaced": items_replaced }),
    )
    .await?;

    Ok(shipment)
}

/// Fail unless every requested lot exists and holds the total requested from it
async fn check_availability<T: LedgerTx>(
    tx: &mut T,
    items: &[ShipmentItemRequest],
) -> AppResult<()> {
    let requested = requested_weight_by_lot(items);
    let lot_ids: Vec<Uuid> = requested.keys().copied().collect();
    let lots = tx.find_lots(&lot_ids).await?;

    let missing: Vec<Uuid> = lot_ids
        .iter()
        .copied()
        .filter(|id| !lots.iter().any(|lot| lot.id == *id))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::MissingRecords {
            resource: "Stock lots".to_string(),
            ids: missing,
        });
    }

    for lot in &lots {
        let wanted = requested[&lot.id];
        if wanted > lot.weight {
            return Err(AppError::InsufficientStock {
                lot_id: lot.id,
                lot_number: lot.lot_number.clone(),
                requested: wanted,
                available: lot.weight,
            });
        }
    }

    Ok(())
}

/// Insert item rows and deduct each item's weight from its lot
async fn reserve_items<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    shipment_id: Uuid,
    items: &[ShipmentItemRequest],
) -> AppResult<Vec<ShipmentItem>> {
    let reason = format!("reserved for shipment {}", shipment_id);
    let mut created = Vec::with_capacity(items.len());

    for request in items {
        let item = ShipmentItem {
            id: Uuid::new_v4(),
            shipment_id,
            stock_id: request.stock_id,
            assigned_weight: request.weight,
        };
        tx.insert_shipment_item(&item).await?;
        apply_adjustment(
            tx,
            actor,
            request.stock_id,
            -request.weight,
            &reason,
            Some(shipment_id),
        )
        .await?;
        created.push(item);
    }

    Ok(created)
}

/// Give each item's weight back to its lot
async fn release_items<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    shipment: &Shipment,
    reason: &str,
) -> AppResult<()> {
    for item in &shipment.items {
        apply_adjustment(
            tx,
            actor,
            item.stock_id,
            item.assigned_weight,
            reason,
            Some(shipment.id),
        )
        .await?;
    }
    Ok(())
}

async fn find_shipment_or_404<T: LedgerTx>(tx: &mut T, shipment_id: Uuid) -> AppResult<Shipment> {
    tx.find_shipment(shipment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Shipment {}", shipment_id)))
}

fn ensure_owner_or_elevated(actor: &Actor, shipment: &Shipment) -> AppResult<()> {
    if actor.role == Role::User && shipment.user_id != actor.id {
        return Err(AppError::InsufficientPermissions);
    }
    Ok(())
}

async fn append_shipment_history<T: LedgerTx>(
    tx: &mut T,
    actor: &Actor,
    attributed_to: Uuid,
    shipment: &Shipment,
    action: ShipmentAction,
    extra: serde_json::Value,
) -> AppResult<()> {
    let mut details = json!({
        "shipment": shipment.snapshot(),
        "total_weight": shipment.total_weight(),
    });
    if let (Some(fields), serde_json::Value::Object(extra)) = (details.as_object_mut(), extra) {
        fields.extend(extra);
    }

    tx.append_shipment_history(NewShipmentHistory {
        shipment_id: shipment.id,
        action: action.as_str().to_string(),
        actor_id: attributed_to,
        actor_role: actor.role,
        details,
    })
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn create_input_trims_details() {
        let input = CreateShipmentInput {
            shipment_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            consignee: " Tea House Ltd ".to_string(),
            vessel: "MV Assam".to_string(),
            shipmark: "TH/01".to_string(),
            packaging_instructions: None,
            additional_instructions: None,
            items: vec![ShipmentItemRequest {
                stock_id: Uuid::new_v4(),
                weight: Decimal::from(10),
            }],
        };
        assert_eq!(input.details().consignee, "Tea House Ltd");
    }
}
