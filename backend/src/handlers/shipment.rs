//! HTTP handlers for shipment endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::models::Shipment;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::shipment::{
    CreateShipmentInput, UpdateShipmentInput, UpdateShipmentStatusInput,
};
use crate::AppState;

/// Book a shipment and reserve its stock
pub async fn create_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateShipmentInput>,
) -> AppResult<(StatusCode, Json<Shipment>)> {
    let shipment = state
        .shipment_service()
        .create_shipment(current_user.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

/// List shipments visible to the caller
pub async fn list_shipments(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Shipment>>> {
    let shipments = state
        .shipment_service()
        .list_shipments(current_user.actor())
        .await?;
    Ok(Json(shipments))
}

/// Get a shipment by id
pub async fn get_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<Shipment>> {
    let shipment = state
        .shipment_service()
        .get_shipment(current_user.actor(), shipment_id)
        .await?;
    Ok(Json(shipment))
}

/// Owner update of a shipment
pub async fn update_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
    Json(input): Json<UpdateShipmentInput>,
) -> AppResult<Json<Shipment>> {
    let shipment = state
        .shipment_service()
        .update_shipment(current_user.actor(), shipment_id, input)
        .await?;
    Ok(Json(shipment))
}

/// Status change by back-office staff
pub async fn update_shipment_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
    Json(input): Json<UpdateShipmentStatusInput>,
) -> AppResult<Json<Shipment>> {
    let shipment = state
        .shipment_service()
        .update_shipment_status(current_user.actor(), shipment_id, input)
        .await?;
    Ok(Json(shipment))
}

/// Delete a shipment and restore its stock
pub async fn delete_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<Shipment>> {
    let shipment = state
        .shipment_service()
        .delete_shipment(current_user.actor(), shipment_id)
        .await?;
    Ok(Json(shipment))
}
