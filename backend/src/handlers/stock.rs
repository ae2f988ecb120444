//! HTTP handlers for stock lot endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::models::StockLot;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stock::{
    AdjustStockInput, CreateStockInput, CreatedStock, ImportStocksInput, UpdateStockInput,
};
use crate::AppState;

/// Create a lot, optionally with an initial assignment
pub async fn create_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateStockInput>,
) -> AppResult<(StatusCode, Json<CreatedStock>)> {
    let created = state
        .stock_service()
        .create_stock(current_user.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Import already-parsed lot rows in one transaction
pub async fn import_stocks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ImportStocksInput>,
) -> AppResult<(StatusCode, Json<Vec<StockLot>>)> {
    let lots = state
        .stock_service()
        .import_stocks(current_user.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(lots)))
}

/// List lots visible to the caller
pub async fn list_stocks(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<StockLot>>> {
    let lots = state.stock_service().list_stocks(current_user.actor()).await?;
    Ok(Json(lots))
}

/// Lots at or below their low-stock threshold
pub async fn low_stock_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<StockLot>>> {
    let lots = state
        .stock_service()
        .low_stock_report(current_user.actor())
        .await?;
    Ok(Json(lots))
}

/// Get a lot by id
pub async fn get_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<StockLot>> {
    let lot = state
        .stock_service()
        .get_stock(current_user.actor(), lot_id)
        .await?;
    Ok(Json(lot))
}

/// Update pricing terms of a lot
pub async fn update_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<UpdateStockInput>,
) -> AppResult<Json<StockLot>> {
    let lot = state
        .stock_service()
        .update_stock(current_user.actor(), lot_id, input)
        .await?;
    Ok(Json(lot))
}

/// Delete an unreferenced lot
pub async fn delete_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<StockLot>> {
    let lot = state
        .stock_service()
        .delete_stock(current_user.actor(), lot_id)
        .await?;
    Ok(Json(lot))
}

/// Apply a signed weight change to a lot
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<StockLot>> {
    let lot = state
        .stock_service()
        .adjust_stock(current_user.actor(), lot_id, input)
        .await?;
    Ok(Json(lot))
}
