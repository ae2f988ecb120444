//! HTTP handlers for audit history endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::{ActorHistory, ShipmentHistory, StockHistory};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

/// History of a lot, newest first
pub async fn get_stock_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockHistory>>> {
    let rows = state
        .history_service()
        .stock_history(current_user.actor(), lot_id)
        .await?;
    Ok(Json(rows))
}

/// History of a shipment, newest first
pub async fn get_shipment_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<Vec<ShipmentHistory>>> {
    let rows = state
        .history_service()
        .shipment_history(current_user.actor(), shipment_id)
        .await?;
    Ok(Json(rows))
}

/// Admin provisioning events, newest first
pub async fn get_actor_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<ActorHistory>>> {
    let rows = state
        .history_service()
        .actor_history(current_user.actor())
        .await?;
    Ok(Json(rows))
}
