//! Error handling for the tea ledger service
//!
//! Every failure a ledger operation can report, and the JSON body each one
//! turns into at the HTTP edge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use shared::ledger::{AdjustmentError, PricingOverflow};
use shared::models::ShipmentStatus;

use crate::db::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Several referenced records are missing; all of them are reported
    #[error("{resource} not found: {ids:?}")]
    MissingRecords { resource: String, ids: Vec<Uuid> },

    // Ledger rule violations
    #[error("Insufficient stock in lot {lot_number}: requested {requested}, available {available}")]
    InsufficientStock {
        lot_id: Uuid,
        lot_number: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Stock invariant violated for lot {lot_id}: {source}")]
    StockInvariant {
        lot_id: Uuid,
        #[source]
        source: AdjustmentError,
    },

    #[error("Stock already assigned: {assignments:?}")]
    AlreadyAssigned {
        /// (lot id, current assignee)
        assignments: Vec<(Uuid, Uuid)>,
    },

    #[error("Conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("Shipment is {0} and can no longer be modified")]
    ShipmentClosed(ShipmentStatus),

    // Storage errors
    #[error(transparent)]
    Store(#[from] StoreError),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// True for transient store races the retry wrapper may re-run
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, AppError::Store(err) if err.is_write_conflict())
    }
}

impl From<PricingOverflow> for AppError {
    fn from(err: PricingOverflow) -> Self {
        AppError::validation("total", err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("invalid {}", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("request".to_string(), errors.to_string()));

        AppError::Validation { field, message }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::MissingRecords { resource, ids } => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource))
                    .with_details(json!({ "missing_ids": ids })),
            ),
            AppError::InsufficientStock {
                lot_id,
                lot_number,
                requested,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INSUFFICIENT_STOCK",
                    format!("Not enough stock in lot {}", lot_number),
                )
                .with_details(json!({
                    "lot_id": lot_id,
                    "lot_number": lot_number,
                    "requested": requested,
                    "available": available,
                })),
            ),
            AppError::StockInvariant { lot_id, source } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("STOCK_INVARIANT_VIOLATION", source.to_string())
                    .with_details(json!({ "lot_id": lot_id })),
            ),
            AppError::AlreadyAssigned { assignments } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("STOCK_ALREADY_ASSIGNED", "Stock is already assigned")
                    .with_details(json!(assignments
                        .iter()
                        .map(|(lot_id, user_id)| json!({ "lot_id": lot_id, "user_id": user_id }))
                        .collect::<Vec<_>>())),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone()).with_field(resource.clone()),
            ),
            AppError::InvalidStateTransition { from, to } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INVALID_STATE_TRANSITION",
                    format!("Cannot move shipment from {} to {}", from, to),
                ),
            ),
            AppError::ShipmentClosed(status) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "SHIPMENT_CLOSED",
                    format!("Shipment is {} and can no longer be modified", status),
                ),
            ),
            AppError::Store(StoreError::WriteConflict(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(
                    "TRANSACTION_CONFLICT",
                    "The request conflicted with concurrent changes, please retry",
                ),
            ),
            AppError::Store(StoreError::UniqueViolation(constraint)) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("DUPLICATE_ENTRY", "A record with this key already exists")
                    .with_field(constraint.clone()),
            ),
            AppError::Store(StoreError::ForeignKeyViolation(constraint)) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", "The record is still referenced")
                    .with_field(constraint.clone()),
            ),
            AppError::Store(StoreError::RecordNotFound(resource)) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
        }
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        self.status_and_detail().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_conflicts_surface_as_service_unavailable() {
        let err = AppError::from(StoreError::WriteConflict("40001".into()));
        assert!(err.is_write_conflict());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.status_and_detail().1.code, "TRANSACTION_CONFLICT");
    }

    #[test]
    fn ledger_rule_violations_are_unprocessable() {
        let err = AppError::InsufficientStock {
            lot_id: Uuid::new_v4(),
            lot_number: "LOT-1".into(),
            requested: Decimal::from(120),
            available: Decimal::from(100),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.is_write_conflict());

        let err = AppError::InvalidStateTransition {
            from: ShipmentStatus::Cancelled,
            to: ShipmentStatus::Approved,
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn duplicates_and_assignments_conflict() {
        let err = AppError::from(StoreError::UniqueViolation("stock_lots_lot_number_key".into()));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = AppError::AlreadyAssigned {
            assignments: vec![(Uuid::new_v4(), Uuid::new_v4())],
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
