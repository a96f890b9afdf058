//! Authoritative per-(product, location) balances.
//!
//! `StockLedger` is the only component that locks or writes a balance. Every
//! mutation locks the row first, checks the result against zero, then writes
//! it. Locks are held by the surrounding transaction until it ends.

use std::collections::BTreeMap;

use tracing::debug;

use stockroom_core::{DomainError, ProductId, TenantId};
use stockroom_inventory::Location;

use crate::error::StockError;
use crate::store::StockTx;

#[derive(Debug, Default, Clone, Copy)]
pub struct StockLedger;

impl StockLedger {
    /// Lock the `(product, location)` row and return its balance.
    ///
    /// Outlet rows are created lazily with qty 0. A missing product (central)
    /// is `NotFound`.
    pub async fn lock<T: StockTx>(
        &self,
        tx: &mut T,
        tenant_id: TenantId,
        product_id: ProductId,
        location: Location,
    ) -> Result<i64, StockError> {
        let balance = match location {
            Location::Central => tx
                .lock_central(tenant_id, product_id)
                .await?
                .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?,
            Location::Outlet(outlet_id) => tx.lock_outlet(tenant_id, outlet_id, product_id).await?,
        };
        debug!(%product_id, %location, balance, "locked balance");
        Ok(balance)
    }

    /// Balance under lock. Reading and locking are the same step: nothing
    /// else may change the value before this transaction ends.
    pub async fn balance<T: StockTx>(
        &self,
        tx: &mut T,
        tenant_id: TenantId,
        product_id: ProductId,
        location: Location,
    ) -> Result<i64, StockError> {
        self.lock(tx, tenant_id, product_id, location).await
    }

    /// Lock every location in global order (central, then outlets by id) and
    /// return the locked balances.
    pub async fn lock_in_order<T: StockTx>(
        &self,
        tx: &mut T,
        tenant_id: TenantId,
        product_id: ProductId,
        locations: &[Location],
    ) -> Result<BTreeMap<Location, i64>, StockError> {
        let mut ordered = locations.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut balances = BTreeMap::new();
        for location in ordered {
            let balance = self.lock(tx, tenant_id, product_id, location).await?;
            balances.insert(location, balance);
        }
        Ok(balances)
    }

    /// Add a signed delta and return the new balance.
    ///
    /// Fails with `InsufficientStock` when the result would be negative.
    pub async fn apply_delta<T: StockTx>(
        &self,
        tx: &mut T,
        tenant_id: TenantId,
        product_id: ProductId,
        location: Location,
        delta: i64,
    ) -> Result<i64, StockError> {
        let current = self.lock(tx, tenant_id, product_id, location).await?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("balance overflows"))?;
        if next < 0 {
            return Err(DomainError::insufficient(delta.saturating_neg(), current).into());
        }
        self.write(tx, tenant_id, product_id, location, next).await?;
        Ok(next)
    }

    /// Set an absolute balance and return `(prior, new)`.
    pub async fn set_balance<T: StockTx>(
        &self,
        tx: &mut T,
        tenant_id: TenantId,
        product_id: ProductId,
        location: Location,
        qty: i64,
    ) -> Result<(i64, i64), StockError> {
        if qty < 0 {
            return Err(DomainError::validation("balance cannot be negative").into());
        }
        let prior = self.lock(tx, tenant_id, product_id, location).await?;
        if prior != qty {
            self.write(tx, tenant_id, product_id, location, qty).await?;
        }
        Ok((prior, qty))
    }

    async fn write<T: StockTx>(
        &self,
        tx: &mut T,
        tenant_id: TenantId,
        product_id: ProductId,
        location: Location,
        qty: i64,
    ) -> Result<(), StockError> {
        match location {
            Location::Central => tx.write_central(tenant_id, product_id, qty).await?,
            Location::Outlet(outlet_id) => {
                tx.write_outlet(tenant_id, outlet_id, product_id, qty).await?
            }
        }
        Ok(())
    }
}
