//! Business logic services for the tea ledger
//!
//! Services are generic over the [`LedgerStore`](crate::db::LedgerStore) so the
//! same code runs against PostgreSQL in production and the in-process store in
//! tests. Role checks run before a transaction is opened; everything that
//! reads or writes ledger rows runs inside one retryable transaction.

pub mod actor;
pub mod adjustment;
pub mod assignment;
pub mod history;
pub mod shipment;
pub mod stock;

pub use actor::ensure_admin;
pub use adjustment::apply_adjustment;
pub use assignment::AssignmentService;
pub use history::HistoryService;
pub use shipment::ShipmentService;
pub use stock::StockService;

use rust_decimal::Decimal;
use shared::models::{Actor, Operation};
use validator::ValidationError;

use crate::error::{AppError, AppResult};

/// Reject callers whose role is not allowed to run `operation`
pub(crate) fn authorize(actor: &Actor, operation: Operation) -> AppResult<()> {
    if actor.role.can(operation) {
        Ok(())
    } else {
        tracing::debug!(
            actor_id = %actor.id,
            role = %actor.role,
            ?operation,
            "Operation denied"
        );
        Err(AppError::InsufficientPermissions)
    }
}

/// Map a shared validation failure onto a field
pub(crate) fn check_field(field: &str, result: Result<(), &'static str>) -> AppResult<()> {
    result.map_err(|message| AppError::validation(field, message))
}

// validator adapters for decimal fields

pub(crate) fn validate_weight(value: &Decimal) -> Result<(), ValidationError> {
    as_validation_error(shared::validation::validate_positive_weight(*value))
}

pub(crate) fn validate_delta(value: &Decimal) -> Result<(), ValidationError> {
    as_validation_error(shared::validation::validate_weight_delta(*value))
}

pub(crate) fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    as_validation_error(shared::validation::validate_non_negative(*value))
}

pub(crate) fn validate_commission(value: &Decimal) -> Result<(), ValidationError> {
    as_validation_error(shared::validation::validate_commission_rate(*value))
}

pub(crate) fn validate_lot(value: &str) -> Result<(), ValidationError> {
    as_validation_error(shared::validation::validate_lot_number(value))
}

fn as_validation_error(result: Result<(), &'static str>) -> Result<(), ValidationError> {
    result.map_err(|message| {
        let mut err = ValidationError::new("invalid");
        err.message = Some(message.into());
        err
    })
}
