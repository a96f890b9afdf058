use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::{OutletId, ProductId, TenantId};
use stockroom_inventory::{BranchStock, MovementRecord, Outlet, Product, Transfer};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Lock wait timeout, serialization failure or deadlock. Retryable.
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    /// Any other storage failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// One open transaction.
///
/// Locks taken through `lock_central`/`lock_outlet` are held until `commit` or
/// `rollback`. Dropping a transaction without committing discards its writes.
///
/// Only `StockLedger` may call the `lock_*`/`write_*` methods.
#[async_trait]
pub trait StockTx: Send {
    /// Product row as seen by this transaction (no lock).
    async fn product(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    /// The subset of `outlet_ids` that exist in the tenant.
    async fn outlets(
        &mut self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<Outlet>, StoreError>;

    /// Lock the product row and return its central balance, or `None` when the
    /// product does not exist in the tenant.
    async fn lock_central(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<i64>, StoreError>;

    /// Lock the branch-stock row, creating it with qty 0 when absent, and
    /// return the locked quantity.
    async fn lock_outlet(
        &mut self,
        tenant_id: TenantId,
        outlet_id: OutletId,
        product_id: ProductId,
    ) -> Result<i64, StoreError>;

    async fn write_central(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<(), StoreError>;

    async fn write_outlet(
        &mut self,
        tenant_id: TenantId,
        outlet_id: OutletId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<(), StoreError>;

    async fn append_movement(&mut self, record: &MovementRecord) -> Result<(), StoreError>;

    /// Persist a transfer header together with its destination rows.
    async fn insert_transfer(&mut self, transfer: &Transfer) -> Result<(), StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn insert_outlet(&mut self, outlet: &Outlet) -> Result<(), StoreError>;

    /// Case-insensitive SKU lookup within the tenant.
    async fn sku_exists(&mut self, tenant_id: TenantId, sku: &str) -> Result<bool, StoreError>;

    async fn outlet_code_exists(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<bool, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Transaction factory plus committed, lock-free reads.
#[async_trait]
pub trait StockStore: Send + Sync {
    type Tx: StockTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError>;

    async fn list_outlets(&self, tenant_id: TenantId) -> Result<Vec<Outlet>, StoreError>;

    /// Branch-stock rows for the given outlets.
    async fn list_branch_stocks(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<BranchStock>, StoreError>;

    /// `(outlet, product)` pairs that ever moved at, out of, or into one of
    /// the given outlets according to the movement log and transfer history.
    async fn touched_outlet_products(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<(OutletId, ProductId)>, StoreError>;

    async fn list_movements(&self, tenant_id: TenantId) -> Result<Vec<MovementRecord>, StoreError>;

    async fn list_transfers(&self, tenant_id: TenantId) -> Result<Vec<Transfer>, StoreError>;
}

#[async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        (**self).list_products(tenant_id).await
    }

    async fn list_outlets(&self, tenant_id: TenantId) -> Result<Vec<Outlet>, StoreError> {
        (**self).list_outlets(tenant_id).await
    }

    async fn list_branch_stocks(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<BranchStock>, StoreError> {
        (**self).list_branch_stocks(tenant_id, outlet_ids).await
    }

    async fn touched_outlet_products(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<(OutletId, ProductId)>, StoreError> {
        (**self).touched_outlet_products(tenant_id, outlet_ids).await
    }

    async fn list_movements(&self, tenant_id: TenantId) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).list_movements(tenant_id).await
    }

    async fn list_transfers(&self, tenant_id: TenantId) -> Result<Vec<Transfer>, StoreError> {
        (**self).list_transfers(tenant_id).await
    }
}
