//! PostgreSQL ledger store
//!
//! Every transaction runs at SERIALIZABLE isolation so concurrent
//! read-check-write sequences on the same lot surface as SQLSTATE 40001,
//! which [`StoreError`] classifies as a write conflict for the retry wrapper.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::ledger::StockQuantities;
use shared::models::{
    ActorHistory, Admin, NewShipmentHistory, NewStockHistory, Role, Shipment, ShipmentHistory,
    ShipmentItem, ShipmentStatus, StockAssignment, StockHistory, StockLot, User,
};

use super::{LedgerStore, LedgerTx, NewActorHistory, StoreError};

const LOT_COLUMNS: &str = "id, lot_number, bags, weight, purchase_value, commission_rate, \
     commission, penalty, net_price, total, low_stock_threshold, created_at, updated_at";

const SHIPMENT_COLUMNS: &str = "id, user_id, status, shipment_date, consignee, vessel, shipmark, \
     packaging_instructions, additional_instructions, created_at, updated_at";

/// Ledger store backed by a process-wide connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(PgLedgerTx { tx })
    }
}

/// Open PostgreSQL transaction; rolled back on drop unless committed
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    external_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct StockLotRow {
    id: Uuid,
    lot_number: String,
    bags: i32,
    weight: Decimal,
    purchase_value: Decimal,
    commission_rate: Decimal,
    commission: Decimal,
    penalty: Decimal,
    net_price: Decimal,
    total: Decimal,
    low_stock_threshold: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockLotRow> for StockLot {
    fn from(row: StockLotRow) -> Self {
        Self {
            id: row.id,
            lot_number: row.lot_number,
            bags: row.bags,
            weight: row.weight,
            purchase_value: row.purchase_value,
            commission_rate: row.commission_rate,
            commission: row.commission,
            penalty: row.penalty,
            net_price: row.net_price,
            total: row.total,
            low_stock_threshold: row.low_stock_threshold,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    stock_id: Uuid,
    user_id: Uuid,
    assigned_weight: Decimal,
    assigned_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<AssignmentRow> for StockAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            id: row.id,
            stock_id: row.stock_id,
            user_id: row.user_id,
            assigned_weight: row.assigned_weight,
            assigned_by: row.assigned_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    shipment_date: NaiveDate,
    consignee: String,
    vessel: String,
    shipmark: String,
    packaging_instructions: Option<String>,
    additional_instructions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShipmentRow {
    fn into_shipment(self, items: Vec<ShipmentItem>) -> Result<Shipment, StoreError> {
        let status = ShipmentStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Decode(format!("shipment status '{}'", self.status)))?;

        Ok(Shipment {
            id: self.id,
            user_id: self.user_id,
            status,
            shipment_date: self.shipment_date,
            consignee: self.consignee,
            vessel: self.vessel,
            shipmark: self.shipmark,
            packaging_instructions: self.packaging_instructions,
            additional_instructions: self.additional_instructions,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ShipmentItemRow {
    id: Uuid,
    shipment_id: Uuid,
    stock_id: Uuid,
    assigned_weight: Decimal,
}

impl From<ShipmentItemRow> for ShipmentItem {
    fn from(row: ShipmentItemRow) -> Self {
        Self {
            id: row.id,
            shipment_id: row.shipment_id,
            stock_id: row.stock_id,
            assigned_weight: row.assigned_weight,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockHistoryRow {
    id: Uuid,
    stock_id: Uuid,
    action: String,
    actor_id: Uuid,
    actor_role: String,
    shipment_id: Option<Uuid>,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<StockHistoryRow> for StockHistory {
    type Error = StoreError;

    fn try_from(row: StockHistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            stock_id: row.stock_id,
            action: row.action,
            actor_id: row.actor_id,
            actor_role: parse_role(&row.actor_role)?,
            shipment_id: row.shipment_id,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ShipmentHistoryRow {
    id: Uuid,
    shipment_id: Uuid,
    action: String,
    actor_id: Uuid,
    actor_role: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ShipmentHistoryRow> for ShipmentHistory {
    type Error = StoreError;

    fn try_from(row: ShipmentHistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            shipment_id: row.shipment_id,
            action: row.action,
            actor_id: row.actor_id,
            actor_role: parse_role(&row.actor_role)?,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ActorHistoryRow {
    id: Uuid,
    admin_id: Uuid,
    action: String,
    external_id: String,
    requested_by_role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActorHistoryRow> for ActorHistory {
    type Error = StoreError;

    fn try_from(row: ActorHistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            admin_id: row.admin_id,
            action: row.action,
            external_id: row.external_id,
            requested_by_role: parse_role(&row.requested_by_role)?,
            created_at: row.created_at,
        })
    }
}

fn parse_role(value: &str) -> Result<Role, StoreError> {
    Role::parse(value).ok_or_else(|| StoreError::Decode(format!("role '{}'", value)))
}

/// Items in insertion order; every item of one transaction shares `created_at`
const ITEMS_FOR_SHIPMENTS: &str = r#"
    SELECT id, shipment_id, stock_id, assigned_weight
    FROM shipment_items
    WHERE shipment_id = ANY($1)
    ORDER BY seq
"#;

impl PgLedgerTx {
    async fn items_for(&mut self, shipment_ids: &[Uuid]) -> Result<Vec<ShipmentItem>, StoreError> {
        let rows = sqlx::query_as::<_, ShipmentItemRow>(ITEMS_FOR_SHIPMENTS)
        .bind(shipment_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| User {
            id: r.id,
            external_id: r.external_id,
            name: r.name,
            created_at: r.created_at,
        }))
    }

    async fn find_admin_by_external_id(
        &mut self,
        external_id: &str,
    ) -> Result<Option<Admin>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, name, created_at FROM admins WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Admin {
            id: r.id,
            external_id: r.external_id,
            name: r.name,
            created_at: r.created_at,
        }))
    }

    async fn insert_admin(&mut self, admin: &Admin) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO admins (id, external_id, name, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(admin.id)
        .bind(&admin.external_id)
        .bind(&admin.name)
        .bind(admin.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_actor_history(
        &mut self,
        entry: NewActorHistory,
    ) -> Result<ActorHistory, StoreError> {
        let row = sqlx::query_as::<_, ActorHistoryRow>(
            r#"
            INSERT INTO actor_history (admin_id, action, external_id, requested_by_role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, admin_id, action, external_id, requested_by_role, created_at
            "#,
        )
        .bind(entry.admin_id)
        .bind(&entry.action)
        .bind(&entry.external_id)
        .bind(entry.requested_by_role.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn actor_history(&mut self) -> Result<Vec<ActorHistory>, StoreError> {
        let rows = sqlx::query_as::<_, ActorHistoryRow>(
            r#"
            SELECT id, admin_id, action, external_id, requested_by_role, created_at
            FROM actor_history
            ORDER BY seq DESC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_lot(&mut self, id: Uuid) -> Result<Option<StockLot>, StoreError> {
        let row = sqlx::query_as::<_, StockLotRow>(&format!(
            "SELECT {} FROM stock_lots WHERE id = $1 FOR UPDATE",
            LOT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_lots(&mut self, ids: &[Uuid]) -> Result<Vec<StockLot>, StoreError> {
        let rows = sqlx::query_as::<_, StockLotRow>(&format!(
            "SELECT {} FROM stock_lots WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            LOT_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_lots(&mut self) -> Result<Vec<StockLot>, StoreError> {
        let rows = sqlx::query_as::<_, StockLotRow>(&format!(
            "SELECT {} FROM stock_lots ORDER BY lot_number",
            LOT_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_lots_assigned_to(&mut self, user_id: Uuid) -> Result<Vec<StockLot>, StoreError> {
        let rows = sqlx::query_as::<_, StockLotRow>(&format!(
            r#"
            SELECT {} FROM stock_lots
            WHERE id IN (SELECT stock_id FROM stock_assignments WHERE user_id = $1)
            ORDER BY lot_number
            "#,
            LOT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_lot(&mut self, lot: &StockLot) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO stock_lots ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
            LOT_COLUMNS
        ))
        .bind(lot.id)
        .bind(&lot.lot_number)
        .bind(lot.bags)
        .bind(lot.weight)
        .bind(lot.purchase_value)
        .bind(lot.commission_rate)
        .bind(lot.commission)
        .bind(lot.penalty)
        .bind(lot.net_price)
        .bind(lot.total)
        .bind(lot.low_stock_threshold)
        .bind(lot.created_at)
        .bind(lot.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_lot_quantities(
        &mut self,
        id: Uuid,
        quantities: StockQuantities,
        total: Decimal,
    ) -> Result<StockLot, StoreError> {
        let row = sqlx::query_as::<_, StockLotRow>(&format!(
            r#"
            UPDATE stock_lots
            SET weight = $1, bags = $2, total = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            LOT_COLUMNS
        ))
        .bind(quantities.weight)
        .bind(quantities.bags)
        .bind(total)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::RecordNotFound(format!("stock lot {}", id)))?;

        Ok(row.into())
    }

    async fn update_lot_terms(&mut self, lot: &StockLot) -> Result<StockLot, StoreError> {
        let row = sqlx::query_as::<_, StockLotRow>(&format!(
            r#"
            UPDATE stock_lots
            SET purchase_value = $1, commission_rate = $2, commission = $3, penalty = $4,
                net_price = $5, total = $6, low_stock_threshold = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING {}
            "#,
            LOT_COLUMNS
        ))
        .bind(lot.purchase_value)
        .bind(lot.commission_rate)
        .bind(lot.commission)
        .bind(lot.penalty)
        .bind(lot.net_price)
        .bind(lot.total)
        .bind(lot.low_stock_threshold)
        .bind(lot.id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::RecordNotFound(format!("stock lot {}", lot.id)))?;

        Ok(row.into())
    }

    async fn delete_lot(&mut self, id: Uuid) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM stock_assignments WHERE stock_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        let result = sqlx::query("DELETE FROM stock_lots WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_items_for_lot(&mut self, id: Uuid) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shipment_items WHERE stock_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn assignments_for_lots(
        &mut self,
        lot_ids: &[Uuid],
    ) -> Result<Vec<StockAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, stock_id, user_id, assigned_weight, assigned_by, created_at
            FROM stock_assignments
            WHERE stock_id = ANY($1)
            ORDER BY seq
            "#,
        )
        .bind(lot_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_assignment(&mut self, assignment: &StockAssignment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_assignments (id, stock_id, user_id, assigned_weight, assigned_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.stock_id)
        .bind(assignment.user_id)
        .bind(assignment.assigned_weight)
        .bind(assignment.assigned_by)
        .bind(assignment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_assignment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM stock_assignments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_shipment(&mut self, id: Uuid) -> Result<Option<Shipment>, StoreError> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE id = $1 FOR UPDATE",
            SHIPMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let items = self.items_for(&[id]).await?;
                row.into_shipment(items).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_shipments(&mut self, user_id: Option<Uuid>) -> Result<Vec<Shipment>, StoreError> {
        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            SELECT {} FROM shipments
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut items = self.items_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let (own, rest): (Vec<_>, Vec<_>) = items
                    .drain(..)
                    .partition(|item| item.shipment_id == row.id);
                items = rest;
                row.into_shipment(own)
            })
            .collect()
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO shipments ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment.id)
        .bind(shipment.user_id)
        .bind(shipment.status.as_str())
        .bind(shipment.shipment_date)
        .bind(&shipment.consignee)
        .bind(&shipment.vessel)
        .bind(&shipment.shipmark)
        .bind(&shipment.packaging_instructions)
        .bind(&shipment.additional_instructions)
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET status = $1, shipment_date = $2, consignee = $3, vessel = $4, shipmark = $5,
                packaging_instructions = $6, additional_instructions = $7, updated_at = $8
            WHERE id = $9
            "#,
        )
        .bind(shipment.status.as_str())
        .bind(shipment.shipment_date)
        .bind(&shipment.consignee)
        .bind(&shipment.vessel)
        .bind(&shipment.shipmark)
        .bind(&shipment.packaging_instructions)
        .bind(&shipment.additional_instructions)
        .bind(shipment.updated_at)
        .bind(shipment.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(format!("shipment {}", shipment.id)));
        }
        Ok(())
    }

    async fn delete_shipment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM shipments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_shipment_item(&mut self, item: &ShipmentItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO shipment_items (id, shipment_id, stock_id, assigned_weight)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(item.id)
        .bind(item.shipment_id)
        .bind(item.stock_id)
        .bind(item.assigned_weight)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_shipment_items(&mut self, shipment_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM shipment_items WHERE shipment_id = $1")
            .bind(shipment_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn append_stock_history(
        &mut self,
        entry: NewStockHistory,
    ) -> Result<StockHistory, StoreError> {
        let row = sqlx::query_as::<_, StockHistoryRow>(
            r#"
            INSERT INTO stock_history (stock_id, action, actor_id, actor_role, shipment_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, stock_id, action, actor_id, actor_role, shipment_id, details, created_at
            "#,
        )
        .bind(entry.stock_id)
        .bind(&entry.action)
        .bind(entry.actor_id)
        .bind(entry.actor_role.as_str())
        .bind(entry.shipment_id)
        .bind(&entry.details)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn append_shipment_history(
        &mut self,
        entry: NewShipmentHistory,
    ) -> Result<ShipmentHistory, StoreError> {
        let row = sqlx::query_as::<_, ShipmentHistoryRow>(
            r#"
            INSERT INTO shipment_history (shipment_id, action, actor_id, actor_role, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, shipment_id, action, actor_id, actor_role, details, created_at
            "#,
        )
        .bind(entry.shipment_id)
        .bind(&entry.action)
        .bind(entry.actor_id)
        .bind(entry.actor_role.as_str())
        .bind(&entry.details)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn stock_history(&mut self, stock_id: Uuid) -> Result<Vec<StockHistory>, StoreError> {
        let rows = sqlx::query_as::<_, StockHistoryRow>(
            r#"
            SELECT id, stock_id, action, actor_id, actor_role, shipment_id, details, created_at
            FROM stock_history
            WHERE stock_id = $1
            ORDER BY seq DESC
            "#,
        )
        .bind(stock_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn shipment_history(
        &mut self,
        shipment_id: Uuid,
    ) -> Result<Vec<ShipmentHistory>, StoreError> {
        let rows = sqlx::query_as::<_, ShipmentHistoryRow>(
            r#"
            SELECT id, shipment_id, action, actor_id, actor_role, details, created_at
            FROM shipment_history
            WHERE shipment_id = $1
            ORDER BY seq DESC
            "#,
        )
        .bind(shipment_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = include_str!("../../migrations/20240301000000_ledger_init.sql");

    #[test]
    fn items_are_read_in_insertion_order() {
        let table = SCHEMA
            .split("CREATE TABLE shipment_items")
            .nth(1)
            .and_then(|rest| rest.split(");").next())
            .unwrap();
        assert!(table.contains("seq BIGSERIAL"));
        assert!(ITEMS_FOR_SHIPMENTS.trim_end().ends_with("ORDER BY seq"));
    }
}
