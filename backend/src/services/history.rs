//! Audit history queries

use uuid::Uuid;

use shared::models::{Actor, ActorHistory, Operation, Role, ShipmentHistory, StockHistory};

use super::authorize;
use crate::db::{retry_transaction, LedgerStore, LedgerTx, RetryPolicy};
use crate::error::{AppError, AppResult};

/// Read access to the append-only history tables
#[derive(Clone)]
pub struct HistoryService<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: LedgerStore> HistoryService<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// History of one lot, newest first; back-office roles only
    pub async fn stock_history(&self, actor: &Actor, lot_id: Uuid) -> AppResult<Vec<StockHistory>> {
        authorize(actor, Operation::ViewHistory)?;
        require_elevated(actor)?;

        retry_transaction(&self.store, &self.policy, move |tx| {
            Box::pin(async move { Ok(tx.stock_history(lot_id).await?) })
        })
        .await
    }

    /// History of one shipment, newest first. Users may read their own
    /// shipments' history, including after the shipment was deleted.
    pub async fn shipment_history(
        &self,
        actor: &Actor,
        shipment_id: Uuid,
    ) -> AppResult<Vec<ShipmentHistory>> {
        authorize(actor, Operation::ViewHistory)?;

        let actor = actor.clone();
        retry_transaction(&self.store, &self.policy, move |tx| {
            let actor = actor.clone();
            Box::pin(async move {
                let rows = tx.shipment_history(shipment_id).await?;
                if actor.role == Role::User {
                    let owner = match tx.find_shipment(shipment_id).await? {
                        Some(shipment) => Some(shipment.user_id),
                        // Deleted shipments keep their owner in the history snapshot
                        None => rows.iter().find_map(|row| {
                            row.details["shipment"]["user_id"]
                                .as_str()
                                .and_then(|id| Uuid::parse_str(id).ok())
                        }),
                    };
                    if owner != Some(actor.id) {
                        return Err(AppError::NotFound(format!("Shipment {}", shipment_id)));
                    }
                }
                Ok(rows)
            })
        })
        .await
    }

    /// Admin provisioning events, newest first
    pub async fn actor_history(&self, actor: &Actor) -> AppResult<Vec<ActorHistory>> {
        authorize(actor, Operation::ViewHistory)?;
        require_elevated(actor)?;

        retry_transaction(&self.store, &self.policy, |tx| {
            Box::pin(async move { Ok(tx.actor_history().await?) })
        })
        .await
    }
}

fn require_elevated(actor: &Actor) -> AppResult<()> {
    if actor.role.is_elevated() {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}
