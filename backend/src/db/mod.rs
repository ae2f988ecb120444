//! Transactional data access for the ledger
//!
//! Services never talk to a connection directly. They open a [`LedgerTx`]
//! through a [`LedgerStore`], usually via [`retry_transaction`], and every
//! read and write of a unit of work goes through that one handle.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use shared::ledger::StockQuantities;
use shared::models::{
    ActorHistory, Admin, NewShipmentHistory, NewStockHistory, Role, Shipment, ShipmentHistory,
    ShipmentItem, StockAssignment, StockHistory, StockLot, User,
};

pub mod memory;
pub mod postgres;
pub mod retry;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use retry::{retry_transaction, retry_transaction_in, RetryPolicy};

/// Storage failures, classified so callers can tell races from data errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization failure or deadlock; the transaction may succeed if retried
    #[error("write conflict: {0}")]
    WriteConflict(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("could not decode stored value: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, StoreError::WriteConflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => {
                    return StoreError::WriteConflict(db_err.message().to_string())
                }
                Some("23505") => return StoreError::UniqueViolation(constraint),
                Some("23503") => return StoreError::ForeignKeyViolation(constraint),
                _ => {}
            }
        }

        match err {
            sqlx::Error::RowNotFound => StoreError::RecordNotFound("row".to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Entry point to the storage collaborator
#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTx;

    /// Open a transaction. Dropping the handle without committing rolls it back.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// Values for an actor registry audit row
#[derive(Debug, Clone)]
pub struct NewActorHistory {
    pub admin_id: Uuid,
    pub action: String,
    pub external_id: String,
    pub requested_by_role: Role,
}

/// One open transaction.
///
/// Lot and shipment lookups lock the rows they return until the transaction
/// ends, so a read-check-write sequence on one handle is not interleaved
/// with another writer on the same rows.
#[async_trait]
pub trait LedgerTx: Send {
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;

    // Actors
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_admin_by_external_id(
        &mut self,
        external_id: &str,
    ) -> Result<Option<Admin>, StoreError>;
    async fn insert_admin(&mut self, admin: &Admin) -> Result<(), StoreError>;
    async fn append_actor_history(
        &mut self,
        entry: NewActorHistory,
    ) -> Result<ActorHistory, StoreError>;
    async fn actor_history(&mut self) -> Result<Vec<ActorHistory>, StoreError>;

    // Stock lots
    async fn find_lot(&mut self, id: Uuid) -> Result<Option<StockLot>, StoreError>;
    async fn find_lots(&mut self, ids: &[Uuid]) -> Result<Vec<StockLot>, StoreError>;
    async fn list_lots(&mut self) -> Result<Vec<StockLot>, StoreError>;
    async fn list_lots_assigned_to(&mut self, user_id: Uuid) -> Result<Vec<StockLot>, StoreError>;
    async fn insert_lot(&mut self, lot: &StockLot) -> Result<(), StoreError>;
    /// Write weight, bags and the weight-dependent total together
    async fn update_lot_quantities(
        &mut self,
        id: Uuid,
        quantities: StockQuantities,
        total: Decimal,
    ) -> Result<StockLot, StoreError>;
    /// Write pricing fields and threshold; quantities are left untouched
    async fn update_lot_terms(&mut self, lot: &StockLot) -> Result<StockLot, StoreError>;
    async fn delete_lot(&mut self, id: Uuid) -> Result<bool, StoreError>;
    async fn count_items_for_lot(&mut self, id: Uuid) -> Result<i64, StoreError>;

    // Assignments
    async fn assignments_for_lots(
        &mut self,
        lot_ids: &[Uuid],
    ) -> Result<Vec<StockAssignment>, StoreError>;
    async fn insert_assignment(&mut self, assignment: &StockAssignment) -> Result<(), StoreError>;
    async fn delete_assignment(&mut self, id: Uuid) -> Result<bool, StoreError>;

    // Shipments
    /// Shipment with its items
    async fn find_shipment(&mut self, id: Uuid) -> Result<Option<Shipment>, StoreError>;
    async fn list_shipments(&mut self, user_id: Option<Uuid>) -> Result<Vec<Shipment>, StoreError>;
    /// Insert the shipment row only; items are inserted separately
    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError>;
    /// Update status, details and timestamp of the shipment row
    async fn update_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError>;
    async fn delete_shipment(&mut self, id: Uuid) -> Result<bool, StoreError>;
    async fn insert_shipment_item(&mut self, item: &ShipmentItem) -> Result<(), StoreError>;
    async fn delete_shipment_items(&mut self, shipment_id: Uuid) -> Result<u64, StoreError>;

    // History
    async fn append_stock_history(
        &mut self,
        entry: NewStockHistory,
    ) -> Result<StockHistory, StoreError>;
    async fn append_shipment_history(
        &mut self,
        entry: NewShipmentHistory,
    ) -> Result<ShipmentHistory, StoreError>;
    /// Newest first
    async fn stock_history(&mut self, stock_id: Uuid) -> Result<Vec<StockHistory>, StoreError>;
    /// Newest first
    async fn shipment_history(
        &mut self,
        shipment_id: Uuid,
    ) -> Result<Vec<ShipmentHistory>, StoreError>;
}
