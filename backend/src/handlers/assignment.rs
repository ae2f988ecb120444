//! HTTP handlers for stock assignment endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::StockAssignment;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::assignment::{AssignStockInput, BulkAssignInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UnassignQuery {
    pub user_id: Uuid,
}

/// Assign a lot to a user
pub async fn assign_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<AssignStockInput>,
) -> AppResult<(StatusCode, Json<StockAssignment>)> {
    let assignment = state
        .assignment_service()
        .assign_stock(current_user.actor(), lot_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Remove a user's assignment of a lot
pub async fn unassign_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Query(query): Query<UnassignQuery>,
) -> AppResult<Json<StockAssignment>> {
    let assignment = state
        .assignment_service()
        .unassign_stock(current_user.actor(), lot_id, query.user_id)
        .await?;
    Ok(Json(assignment))
}

/// Assign several lots to one user
pub async fn bulk_assign_stocks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkAssignInput>,
) -> AppResult<(StatusCode, Json<Vec<StockAssignment>>)> {
    let assignments = state
        .assignment_service()
        .bulk_assign_stocks(current_user.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(assignments)))
}
