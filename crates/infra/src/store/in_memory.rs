//! In-memory stock store for tests/dev.
//!
//! Row locks are per-(tenant, product, location) async mutexes held by the
//! transaction until commit/rollback, bounded by a lock-wait timeout. A row's
//! entry is pruned once no transaction holds or waits on it. Writes are staged
//! in the transaction and applied in one step at commit.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use stockroom_core::{OutletId, ProductId, TenantId};
use stockroom_inventory::{BranchStock, Location, MovementRecord, Outlet, Product, Transfer};

use super::r#trait::{StockStore, StockTx, StoreError};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    tenant_id: TenantId,
    product_id: ProductId,
    location: Location,
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<(TenantId, ProductId), Product>,
    outlets: HashMap<(TenantId, OutletId), Outlet>,
    branch_stocks: HashMap<(TenantId, OutletId, ProductId), BranchStock>,
    movements: Vec<MovementRecord>,
    transfers: Vec<Transfer>,
}

impl State {
    fn sku_taken(&self, tenant_id: TenantId, sku: &str) -> bool {
        self.products
            .values()
            .any(|p| p.tenant_id == tenant_id && p.sku.eq_ignore_ascii_case(sku))
    }

    fn code_taken(&self, tenant_id: TenantId, code: &str) -> bool {
        self.outlets
            .values()
            .any(|o| o.tenant_id == tenant_id && o.code.eq_ignore_ascii_case(code))
    }
}

#[derive(Debug, Default)]
struct LockTable {
    rows: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockTable {
    fn handle(&self, key: RowKey) -> Result<Arc<tokio::sync::Mutex<()>>, StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Backend("lock table poisoned".to_string()))?;
        Ok(rows.entry(key).or_default().clone())
    }

    /// Drop entries nobody else holds or waits on.
    fn release(&self, keys: impl IntoIterator<Item = RowKey>) {
        let Ok(mut rows) = self.rows.lock() else {
            return;
        };
        for key in keys {
            if rows.get(&key).is_some_and(|m| Arc::strong_count(m) == 1) {
                rows.remove(&key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }
}

/// In-memory `StockStore`.
#[derive(Debug, Clone)]
pub struct InMemoryStockStore {
    state: Arc<RwLock<State>>,
    locks: Arc<LockTable>,
    lock_timeout: Duration,
}

impl Default for InMemoryStockStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(2_000))
    }
}

impl InMemoryStockStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            locks: Arc::new(LockTable::default()),
            lock_timeout,
        }
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))
    }
}

/// Open transaction against `InMemoryStockStore`.
pub struct InMemoryStockTx {
    state: Arc<RwLock<State>>,
    locks: Arc<LockTable>,
    lock_timeout: Duration,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    central_writes: HashMap<(TenantId, ProductId), i64>,
    outlet_writes: HashMap<(TenantId, OutletId, ProductId), i64>,
    products: Vec<Product>,
    outlets: Vec<Outlet>,
    movements: Vec<MovementRecord>,
    transfers: Vec<Transfer>,
}

impl std::fmt::Debug for InMemoryStockTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStockTx")
            .field("held_locks", &self.held.len())
            .field("staged_movements", &self.movements.len())
            .finish()
    }
}

impl InMemoryStockTx {
    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))
    }

    async fn acquire(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let handle = self.locks.handle(key)?;
        let guard = tokio::time::timeout(self.lock_timeout, handle.lock_owned())
            .await
            .map_err(|_| {
                StoreError::Conflict(format!(
                    "lock wait timed out after {}ms on product {} at {}",
                    self.lock_timeout.as_millis(),
                    key.product_id,
                    key.location
                ))
            })?;
        self.held.insert(key, guard);
        Ok(())
    }

    /// Unlock every held row and prune its lock table entry.
    fn release_rows(&mut self) {
        let keys: Vec<RowKey> = self.held.keys().copied().collect();
        self.held.clear();
        self.locks.release(keys);
    }

    fn ensure_held(&self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains_key(&key) {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "write to product {} at {} without holding its lock",
                key.product_id, key.location
            )))
        }
    }

    fn staged_product(&self, tenant_id: TenantId, product_id: ProductId) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.id == product_id)
    }
}

#[async_trait]
impl StockTx for InMemoryStockTx {
    async fn product(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let mut product = match self.staged_product(tenant_id, product_id) {
            Some(p) => Some(p.clone()),
            None => self.read_state()?.products.get(&(tenant_id, product_id)).cloned(),
        };
        let staged = self.central_writes.get(&(tenant_id, product_id));
        if let (Some(p), Some(qty)) = (product.as_mut(), staged) {
            p.central_stock = *qty;
        }
        Ok(product)
    }

    async fn outlets(
        &mut self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<Outlet>, StoreError> {
        let state = self.read_state()?;
        let found = outlet_ids
            .iter()
            .filter_map(|id| {
                self.outlets
                    .iter()
                    .find(|o| o.tenant_id == tenant_id && o.id == *id)
                    .or_else(|| state.outlets.get(&(tenant_id, *id)))
                    .cloned()
            })
            .collect();
        Ok(found)
    }

    async fn lock_central(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<i64>, StoreError> {
        let exists = self.staged_product(tenant_id, product_id).is_some()
            || self.read_state()?.products.contains_key(&(tenant_id, product_id));
        if !exists {
            return Ok(None);
        }

        self.acquire(RowKey {
            tenant_id,
            product_id,
            location: Location::Central,
        })
        .await?;

        Ok(self.product(tenant_id, product_id).await?.map(|p| p.central_stock))
    }

    async fn lock_outlet(
        &mut self,
        tenant_id: TenantId,
        outlet_id: OutletId,
        product_id: ProductId,
    ) -> Result<i64, StoreError> {
        self.acquire(RowKey {
            tenant_id,
            product_id,
            location: Location::Outlet(outlet_id),
        })
        .await?;

        let row = (tenant_id, outlet_id, product_id);
        if let Some(qty) = self.outlet_writes.get(&row) {
            return Ok(*qty);
        }
        let current = self.read_state()?.branch_stocks.get(&row).map(|b| b.qty).unwrap_or(0);
        // Lazily materialise the row; discarded with the rest on rollback.
        self.outlet_writes.insert(row, current);
        Ok(current)
    }

    async fn write_central(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<(), StoreError> {
        self.ensure_held(RowKey {
            tenant_id,
            product_id,
            location: Location::Central,
        })?;
        self.central_writes.insert((tenant_id, product_id), qty);
        Ok(())
    }

    async fn write_outlet(
        &mut self,
        tenant_id: TenantId,
        outlet_id: OutletId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<(), StoreError> {
        self.ensure_held(RowKey {
            tenant_id,
            product_id,
            location: Location::Outlet(outlet_id),
        })?;
        self.outlet_writes.insert((tenant_id, outlet_id, product_id), qty);
        Ok(())
    }

    async fn append_movement(&mut self, record: &MovementRecord) -> Result<(), StoreError> {
        self.movements.push(record.clone());
        Ok(())
    }

    async fn insert_transfer(&mut self, transfer: &Transfer) -> Result<(), StoreError> {
        self.transfers.push(transfer.clone());
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.products.push(product.clone());
        Ok(())
    }

    async fn insert_outlet(&mut self, outlet: &Outlet) -> Result<(), StoreError> {
        self.outlets.push(outlet.clone());
        Ok(())
    }

    async fn sku_exists(&mut self, tenant_id: TenantId, sku: &str) -> Result<bool, StoreError> {
        let staged = self
            .products
            .iter()
            .any(|p| p.tenant_id == tenant_id && p.sku.eq_ignore_ascii_case(sku));
        Ok(staged || self.read_state()?.sku_taken(tenant_id, sku))
    }

    async fn outlet_code_exists(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<bool, StoreError> {
        let staged = self
            .outlets
            .iter()
            .any(|o| o.tenant_id == tenant_id && o.code.eq_ignore_ascii_case(code));
        Ok(staged || self.read_state()?.code_taken(tenant_id, code))
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))?;

        // Unique keys are re-checked here; a concurrent registration may have
        // committed since `sku_exists`/`outlet_code_exists` answered.
        for p in &self.products {
            if state.sku_taken(p.tenant_id, &p.sku) {
                return Err(StoreError::Conflict(format!("sku {} registered concurrently", p.sku)));
            }
        }
        for o in &self.outlets {
            if state.code_taken(o.tenant_id, &o.code) {
                let msg = format!("outlet code {} registered concurrently", o.code);
                return Err(StoreError::Conflict(msg));
            }
        }

        for p in self.products.drain(..) {
            state.products.insert((p.tenant_id, p.id), p);
        }
        for o in self.outlets.drain(..) {
            state.outlets.insert((o.tenant_id, o.id), o);
        }
        for ((tenant_id, product_id), qty) in self.central_writes.drain() {
            if let Some(p) = state.products.get_mut(&(tenant_id, product_id)) {
                p.central_stock = qty;
            }
        }
        let now = Utc::now();
        for ((tenant_id, outlet_id, product_id), qty) in self.outlet_writes.drain() {
            state
                .branch_stocks
                .entry((tenant_id, outlet_id, product_id))
                .and_modify(|row| {
                    if row.qty != qty {
                        row.qty = qty;
                        row.updated_at = now;
                    }
                })
                .or_insert(BranchStock {
                    tenant_id,
                    outlet_id,
                    product_id,
                    qty,
                    updated_at: now,
                });
        }
        state.movements.append(&mut self.movements);
        state.transfers.append(&mut self.transfers);
        drop(state);

        self.release_rows();
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // Staged writes and held guards are dropped with `self`.
        Ok(())
    }
}

impl Drop for InMemoryStockTx {
    fn drop(&mut self) {
        self.release_rows();
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    type Tx = InMemoryStockTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryStockTx {
            state: self.state.clone(),
            locks: self.locks.clone(),
            lock_timeout: self.lock_timeout,
            held: HashMap::new(),
            central_writes: HashMap::new(),
            outlet_writes: HashMap::new(),
            products: Vec::new(),
            outlets: Vec::new(),
            movements: Vec::new(),
            transfers: Vec::new(),
        })
    }

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        let state = self.read_state()?;
        Ok(state
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_outlets(&self, tenant_id: TenantId) -> Result<Vec<Outlet>, StoreError> {
        let state = self.read_state()?;
        Ok(state
            .outlets
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_branch_stocks(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<BranchStock>, StoreError> {
        let wanted: BTreeSet<OutletId> = outlet_ids.iter().copied().collect();
        let state = self.read_state()?;
        Ok(state
            .branch_stocks
            .values()
            .filter(|b| b.tenant_id == tenant_id && wanted.contains(&b.outlet_id))
            .cloned()
            .collect())
    }

    async fn touched_outlet_products(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<(OutletId, ProductId)>, StoreError> {
        let wanted: BTreeSet<OutletId> = outlet_ids.iter().copied().collect();
        let state = self.read_state()?;
        let mut pairs = BTreeSet::new();

        for m in state.movements.iter().filter(|m| m.tenant_id == tenant_id) {
            if let Some(outlet_id) = m.location.outlet_id().filter(|id| wanted.contains(id)) {
                pairs.insert((outlet_id, m.product_id));
            }
        }
        for t in state.transfers.iter().filter(|t| t.tenant_id == tenant_id) {
            if let Some(outlet_id) = t.source.outlet_id().filter(|id| wanted.contains(id)) {
                pairs.insert((outlet_id, t.product_id));
            }
            for d in t.destinations.iter().filter(|d| wanted.contains(&d.outlet_id)) {
                pairs.insert((d.outlet_id, t.product_id));
            }
        }

        Ok(pairs.into_iter().collect())
    }

    async fn list_movements(&self, tenant_id: TenantId) -> Result<Vec<MovementRecord>, StoreError> {
        let state = self.read_state()?;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_transfers(&self, tenant_id: TenantId) -> Result<Vec<Transfer>, StoreError> {
        let state = self.read_state()?;
        Ok(state
            .transfers
            .iter()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{CategoryId, UnitId};

    fn product(tenant_id: TenantId, central: i64) -> Product {
        Product {
            id: ProductId::new(),
            tenant_id,
            name: "Kopi".to_string(),
            sku: "KP-1".to_string(),
            category_id: CategoryId::new(),
            unit_id: UnitId::new(),
            central_stock: central,
            minimum_low_stock: 0,
        }
    }

    async fn seed(store: &InMemoryStockStore, p: &Product) {
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(p).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible_and_rollback_discards_them() {
        let store = InMemoryStockStore::default();
        let tenant = TenantId::new();
        let p = product(tenant, 10);
        seed(&store, &p).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_central(tenant, p.id).await.unwrap(), Some(10));
        tx.write_central(tenant, p.id, 4).await.unwrap();
        assert_eq!(tx.product(tenant, p.id).await.unwrap().unwrap().central_stock, 4);
        assert_eq!(store.list_products(tenant).await.unwrap()[0].central_stock, 10);
        tx.rollback().await.unwrap();

        assert_eq!(store.list_products(tenant).await.unwrap()[0].central_stock, 10);
    }

    #[tokio::test]
    async fn write_without_lock_is_rejected() {
        let store = InMemoryStockStore::default();
        let tenant = TenantId::new();
        let p = product(tenant, 1);
        seed(&store, &p).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.write_central(tenant, p.id, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn second_locker_times_out_with_conflict() {
        let store = InMemoryStockStore::new(Duration::from_millis(20));
        let tenant = TenantId::new();
        let p = product(tenant, 1);
        seed(&store, &p).await;

        let mut holder = store.begin().await.unwrap();
        holder.lock_central(tenant, p.id).await.unwrap();
        // Re-locking a held row does not block.
        holder.lock_central(tenant, p.id).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let err = waiter.lock_central(tenant, p.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        holder.commit().await.unwrap();
        let mut after = store.begin().await.unwrap();
        assert_eq!(after.lock_central(tenant, p.id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn lock_table_is_pruned_when_transactions_end() {
        let store = InMemoryStockStore::new(Duration::from_millis(20));
        let tenant = TenantId::new();
        let p = product(tenant, 5);
        seed(&store, &p).await;
        let outlet = OutletId::new();

        let mut tx = store.begin().await.unwrap();
        tx.lock_central(tenant, p.id).await.unwrap();
        tx.lock_outlet(tenant, outlet, p.id).await.unwrap();
        assert_eq!(store.locks.len(), 2);
        tx.commit().await.unwrap();
        assert_eq!(store.locks.len(), 0);

        let mut tx = store.begin().await.unwrap();
        tx.lock_outlet(tenant, outlet, p.id).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.locks.len(), 0);

        // A timed-out waiter leaves the entry to the holder, which prunes it.
        let mut holder = store.begin().await.unwrap();
        holder.lock_central(tenant, p.id).await.unwrap();
        let mut waiter = store.begin().await.unwrap();
        assert!(waiter.lock_central(tenant, p.id).await.is_err());
        drop(waiter);
        assert_eq!(store.locks.len(), 1);
        drop(holder);
        assert_eq!(store.locks.len(), 0);
    }

    #[tokio::test]
    async fn outlet_rows_are_created_lazily_on_commit() {
        let store = InMemoryStockStore::default();
        let tenant = TenantId::new();
        let p = product(tenant, 0);
        seed(&store, &p).await;
        let outlet = OutletId::new();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_outlet(tenant, outlet, p.id).await.unwrap(), 0);
        tx.commit().await.unwrap();

        let rows = store.list_branch_stocks(tenant, &[outlet]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].qty, 0);
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = InMemoryStockStore::default();
        let t1 = TenantId::new();
        let t2 = TenantId::new();
        let p = product(t1, 3);
        seed(&store, &p).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_central(t2, p.id).await.unwrap(), None);
        assert!(tx.product(t2, p.id).await.unwrap().is_none());
        assert!(store.list_products(t2).await.unwrap().is_empty());
    }
}
