//! In-process ledger store
//!
//! Each transaction works on a private copy of the committed state taken at
//! `begin`. A commit that wrote anything is rejected with a write conflict if
//! another writing commit landed after that copy was taken
//! (first committer wins), which is how a serializable database reports the
//! same race. A writing commit yields to the scheduler first, as a database
//! round trip would, so units of work joined on one task really interleave.
//! Used by the test suite and for local tooling without Postgres.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::ledger::StockQuantities;
use shared::models::{
    ActorHistory, Admin, NewShipmentHistory, NewStockHistory, Shipment, ShipmentHistory,
    ShipmentItem, StockAssignment, StockHistory, StockLot, User,
};

use super::{LedgerStore, LedgerTx, NewActorHistory, StoreError};

/// Committed contents of a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub users: BTreeMap<Uuid, User>,
    pub admins: BTreeMap<Uuid, Admin>,
    pub lots: BTreeMap<Uuid, StockLot>,
    pub assignments: Vec<StockAssignment>,
    pub shipments: BTreeMap<Uuid, Shipment>,
    /// Oldest first
    pub stock_history: Vec<StockHistory>,
    /// Oldest first
    pub shipment_history: Vec<ShipmentHistory>,
    /// Oldest first
    pub actor_history: Vec<ActorHistory>,
}

#[derive(Debug, Default)]
struct Shared {
    state: MemoryState,
    version: u64,
    pending_conflicts: u32,
    begun: u64,
    commits: u64,
}

/// Shared handle to the in-process store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state
    pub fn committed(&self) -> MemoryState {
        lock(&self.shared).state.clone()
    }

    /// Make the next `count` writing commits fail with a write conflict
    pub fn inject_write_conflicts(&self, count: u32) {
        lock(&self.shared).pending_conflicts = count;
    }

    /// Number of transactions opened so far
    pub fn transactions_begun(&self) -> u64 {
        lock(&self.shared).begun
    }

    /// Number of successful commits that wrote something
    pub fn commits(&self) -> u64 {
        lock(&self.shared).commits
    }

    pub fn seed_user(&self, external_id: &str, name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let mut shared = lock(&self.shared);
        shared.state.users.insert(user.id, user.clone());
        shared.version += 1;
        user
    }

    pub fn seed_admin(&self, external_id: &str, name: &str) -> Admin {
        let admin = Admin {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let mut shared = lock(&self.shared);
        shared.state.admins.insert(admin.id, admin.clone());
        shared.version += 1;
        admin
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let mut shared = lock(&self.shared);
        shared.begun += 1;
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            base_version: shared.version,
            state: shared.state.clone(),
            dirty: false,
        })
    }
}

/// Open transaction on a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryTx {
    shared: Arc<Mutex<Shared>>,
    base_version: u64,
    state: MemoryState,
    dirty: bool,
}

impl MemoryTx {
    fn write(&mut self) -> &mut MemoryState {
        self.dirty = true;
        &mut self.state
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        tokio::task::yield_now().await;

        let mut shared = lock(&self.shared);
        if shared.pending_conflicts > 0 {
            shared.pending_conflicts -= 1;
            return Err(StoreError::WriteConflict(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }
        if shared.version != self.base_version {
            return Err(StoreError::WriteConflict(
                "could not serialize access due to read/write dependencies among transactions"
                    .to_string(),
            ));
        }

        shared.state = self.state;
        shared.version += 1;
        shared.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.users.get(&id).cloned())
    }

    async fn find_admin_by_external_id(
        &mut self,
        external_id: &str,
    ) -> Result<Option<Admin>, StoreError> {
        Ok(self
            .state
            .admins
            .values()
            .find(|admin| admin.external_id == external_id)
            .cloned())
    }

    async fn insert_admin(&mut self, admin: &Admin) -> Result<(), StoreError> {
        if self
            .state
            .admins
            .values()
            .any(|existing| existing.external_id == admin.external_id)
        {
            return Err(StoreError::UniqueViolation(
                "admins_external_id_key".to_string(),
            ));
        }
        self.write().admins.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn append_actor_history(
        &mut self,
        entry: NewActorHistory,
    ) -> Result<ActorHistory, StoreError> {
        let row = ActorHistory {
            id: Uuid::new_v4(),
            admin_id: entry.admin_id,
            action: entry.action,
            external_id: entry.external_id,
            requested_by_role: entry.requested_by_role,
            created_at: Utc::now(),
        };
        self.write().actor_history.push(row.clone());
        Ok(row)
    }

    async fn actor_history(&mut self) -> Result<Vec<ActorHistory>, StoreError> {
        Ok(self.state.actor_history.iter().rev().cloned().collect())
    }

    async fn find_lot(&mut self, id: Uuid) -> Result<Option<StockLot>, StoreError> {
        Ok(self.state.lots.get(&id).cloned())
    }

    async fn find_lots(&mut self, ids: &[Uuid]) -> Result<Vec<StockLot>, StoreError> {
        Ok(self
            .state
            .lots
            .values()
            .filter(|lot| ids.contains(&lot.id))
            .cloned()
            .collect())
    }

    async fn list_lots(&mut self) -> Result<Vec<StockLot>, StoreError> {
        let mut lots: Vec<_> = self.state.lots.values().cloned().collect();
        lots.sort_by(|a, b| a.lot_number.cmp(&b.lot_number));
        Ok(lots)
    }

    async fn list_lots_assigned_to(&mut self, user_id: Uuid) -> Result<Vec<StockLot>, StoreError> {
        let mut lots: Vec<_> = self
            .state
            .assignments
            .iter()
            .filter(|assignment| assignment.user_id == user_id)
            .filter_map(|assignment| self.state.lots.get(&assignment.stock_id))
            .cloned()
            .collect();
        lots.sort_by(|a, b| a.lot_number.cmp(&b.lot_number));
        Ok(lots)
    }

    async fn insert_lot(&mut self, lot: &StockLot) -> Result<(), StoreError> {
        if self
            .state
            .lots
            .values()
            .any(|existing| existing.lot_number == lot.lot_number)
        {
            return Err(StoreError::UniqueViolation(
                "stock_lots_lot_number_key".to_string(),
            ));
        }
        self.write().lots.insert(lot.id, lot.clone());
        Ok(())
    }

    async fn update_lot_quantities(
        &mut self,
        id: Uuid,
        quantities: StockQuantities,
        total: Decimal,
    ) -> Result<StockLot, StoreError> {
        let lot = self
            .write()
            .lots
            .get_mut(&id)
            .ok_or_else(|| StoreError::RecordNotFound(format!("stock lot {}", id)))?;
        lot.weight = quantities.weight;
        lot.bags = quantities.bags;
        lot.total = total;
        lot.updated_at = Utc::now();
        Ok(lot.clone())
    }

    async fn update_lot_terms(&mut self, lot: &StockLot) -> Result<StockLot, StoreError> {
        let stored = self
            .write()
            .lots
            .get_mut(&lot.id)
            .ok_or_else(|| StoreError::RecordNotFound(format!("stock lot {}", lot.id)))?;
        stored.purchase_value = lot.purchase_value;
        stored.commission_rate = lot.commission_rate;
        stored.commission = lot.commission;
        stored.penalty = lot.penalty;
        stored.net_price = lot.net_price;
        stored.total = lot.total;
        stored.low_stock_threshold = lot.low_stock_threshold;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_lot(&mut self, id: Uuid) -> Result<bool, StoreError> {
        if !self.state.lots.contains_key(&id) {
            return Ok(false);
        }
        if self
            .state
            .shipments
            .values()
            .flat_map(|shipment| shipment.items.iter())
            .any(|item| item.stock_id == id)
        {
            return Err(StoreError::ForeignKeyViolation(
                "shipment_items_stock_id_fkey".to_string(),
            ));
        }
        let state = self.write();
        state.lots.remove(&id);
        state.assignments.retain(|assignment| assignment.stock_id != id);
        Ok(true)
    }

    async fn count_items_for_lot(&mut self, id: Uuid) -> Result<i64, StoreError> {
        let count = self
            .state
            .shipments
            .values()
            .flat_map(|shipment| shipment.items.iter())
            .filter(|item| item.stock_id == id)
            .count();
        Ok(count as i64)
    }

    async fn assignments_for_lots(
        &mut self,
        lot_ids: &[Uuid],
    ) -> Result<Vec<StockAssignment>, StoreError> {
        Ok(self
            .state
            .assignments
            .iter()
            .filter(|assignment| lot_ids.contains(&assignment.stock_id))
            .cloned()
            .collect())
    }

    async fn insert_assignment(&mut self, assignment: &StockAssignment) -> Result<(), StoreError> {
        if !self.state.lots.contains_key(&assignment.stock_id) {
            return Err(StoreError::ForeignKeyViolation(
                "stock_assignments_stock_id_fkey".to_string(),
            ));
        }
        if !self.state.users.contains_key(&assignment.user_id) {
            return Err(StoreError::ForeignKeyViolation(
                "stock_assignments_user_id_fkey".to_string(),
            ));
        }
        self.write().assignments.push(assignment.clone());
        Ok(())
    }

    async fn delete_assignment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let before = self.state.assignments.len();
        if !self.state.assignments.iter().any(|a| a.id == id) {
            return Ok(false);
        }
        let state = self.write();
        state.assignments.retain(|assignment| assignment.id != id);
        Ok(state.assignments.len() < before)
    }

    async fn find_shipment(&mut self, id: Uuid) -> Result<Option<Shipment>, StoreError> {
        Ok(self.state.shipments.get(&id).cloned())
    }

    async fn list_shipments(&mut self, user_id: Option<Uuid>) -> Result<Vec<Shipment>, StoreError> {
        let mut shipments: Vec<_> = self
            .state
            .shipments
            .values()
            .filter(|shipment| user_id.map_or(true, |user_id| shipment.user_id == user_id))
            .cloned()
            .collect();
        shipments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shipments)
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        if !self.state.users.contains_key(&shipment.user_id) {
            return Err(StoreError::ForeignKeyViolation(
                "shipments_user_id_fkey".to_string(),
            ));
        }
        let mut row = shipment.clone();
        row.items.clear();
        self.write().shipments.insert(row.id, row);
        Ok(())
    }

    async fn update_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        let stored = self
            .write()
            .shipments
            .get_mut(&shipment.id)
            .ok_or_else(|| StoreError::RecordNotFound(format!("shipment {}", shipment.id)))?;
        stored.status = shipment.status;
        stored.shipment_date = shipment.shipment_date;
        stored.consignee = shipment.consignee.clone();
        stored.vessel = shipment.vessel.clone();
        stored.shipmark = shipment.shipmark.clone();
        stored.packaging_instructions = shipment.packaging_instructions.clone();
        stored.additional_instructions = shipment.additional_instructions.clone();
        stored.updated_at = shipment.updated_at;
        Ok(())
    }

    async fn delete_shipment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        if !self.state.shipments.contains_key(&id) {
            return Ok(false);
        }
        Ok(self.write().shipments.remove(&id).is_some())
    }

    async fn insert_shipment_item(&mut self, item: &ShipmentItem) -> Result<(), StoreError> {
        if !self.state.lots.contains_key(&item.stock_id) {
            return Err(StoreError::ForeignKeyViolation(
                "shipment_items_stock_id_fkey".to_string(),
            ));
        }
        let shipment = self
            .write()
            .shipments
            .get_mut(&item.shipment_id)
            .ok_or_else(|| {
                StoreError::ForeignKeyViolation("shipment_items_shipment_id_fkey".to_string())
            })?;
        shipment.items.push(item.clone());
        Ok(())
    }

    async fn delete_shipment_items(&mut self, shipment_id: Uuid) -> Result<u64, StoreError> {
        let Some(shipment) = self.write().shipments.get_mut(&shipment_id) else {
            return Ok(0);
        };
        let removed = shipment.items.len() as u64;
        shipment.items.clear();
        Ok(removed)
    }

    async fn append_stock_history(
        &mut self,
        entry: NewStockHistory,
    ) -> Result<StockHistory, StoreError> {
        let row = StockHistory {
            id: Uuid::new_v4(),
            stock_id: entry.stock_id,
            action: entry.action,
            actor_id: entry.actor_id,
            actor_role: entry.actor_role,
            shipment_id: entry.shipment_id,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.write().stock_history.push(row.clone());
        Ok(row)
    }

    async fn append_shipment_history(
        &mut self,
        entry: NewShipmentHistory,
    ) -> Result<ShipmentHistory, StoreError> {
        let row = ShipmentHistory {
            id: Uuid::new_v4(),
            shipment_id: entry.shipment_id,
            action: entry.action,
            actor_id: entry.actor_id,
            actor_role: entry.actor_role,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.write().shipment_history.push(row.clone());
        Ok(row)
    }

    async fn stock_history(&mut self, stock_id: Uuid) -> Result<Vec<StockHistory>, StoreError> {
        Ok(self
            .state
            .stock_history
            .iter()
            .rev()
            .filter(|row| row.stock_id == stock_id)
            .cloned()
            .collect())
    }

    async fn shipment_history(
        &mut self,
        shipment_id: Uuid,
    ) -> Result<Vec<ShipmentHistory>, StoreError> {
        Ok(self
            .state
            .shipment_history
            .iter()
            .rev()
            .filter(|row| row.shipment_id == shipment_id)
            .cloned()
            .collect())
    }
}
