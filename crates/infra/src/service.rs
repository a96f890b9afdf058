//! Operation surface of the stock core.
//!
//! `StockService` owns a store and a retry policy and composes the ledger
//! components into the tenant-facing operations. Every mutating operation:
//!
//! 1. rejects read-only tenants before taking any lock,
//! 2. validates its input,
//! 3. runs inside one transaction per attempt, re-validating tenant state
//!    (product, outlet ownership, scope) on every attempt,
//! 4. commits on success and rolls back on any error.
//!
//! Lock conflicts are retried per `RetryPolicy`; business errors are not.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockroom_auth::TenantAccess;
use stockroom_core::{MovementId, ProductId};
use stockroom_inventory::{
    resolve_note, CreateMovement, CreateOpname, CreateTransfer, Location, LowStockQuery, NewOutlet,
    NewProduct, Outlet, Product,
};

use crate::alerts::{LowStockAlertAggregator, LowStockAlerts};
use crate::catalog::CatalogRegistrar;
use crate::error::StockError;
use crate::ledger::StockLedger;
use crate::opname::{OpnameOutcome, OpnameReconciler};
use crate::recorder::{MovementRecorder, NewMovement};
use crate::retry::RetryPolicy;
use crate::scope::{location_label, require_product};
use crate::snapshot::{InventorySnapshot, SnapshotReader};
use crate::store::{StockStore, StockTx};
use crate::transfer::{TransferCoordinator, TransferOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementOutcome {
    pub movement_id: MovementId,
    pub balance_after: i64,
}

pub struct StockService<S> {
    store: S,
    retry: RetryPolicy,
    ledger: StockLedger,
    recorder: MovementRecorder,
    opname: OpnameReconciler,
    transfers: TransferCoordinator,
    alerts: LowStockAlertAggregator,
    snapshots: SnapshotReader,
    catalog: CatalogRegistrar,
}

impl<S: StockStore> StockService<S> {
    pub fn new(store: S) -> Self {
        let ledger = StockLedger;
        let recorder = MovementRecorder;
        Self {
            store,
            retry: RetryPolicy::default(),
            ledger,
            recorder,
            opname: OpnameReconciler::new(ledger, recorder),
            transfers: TransferCoordinator::new(ledger, recorder),
            alerts: LowStockAlertAggregator,
            snapshots: SnapshotReader,
            catalog: CatalogRegistrar::new(recorder),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record an inbound or outbound movement at one location.
    #[instrument(
        skip(self, access, cmd),
        fields(
            tenant_id = %access.tenant_id,
            product_id = %cmd.product_id,
            location = %cmd.location
        ),
        err
    )]
    pub async fn create_movement(
        &self,
        access: &TenantAccess,
        cmd: CreateMovement,
    ) -> Result<MovementOutcome, StockError> {
        access.ensure_writable()?;
        cmd.validate()?;

        let cmd = &cmd;
        let outcome = self
            .retry
            .run("create_movement", |_| self.movement_attempt(access, cmd))
            .await?;
        info!(
            movement_id = %outcome.movement_id,
            direction = cmd.direction.movement_type().as_str(),
            qty = cmd.qty,
            balance_after = outcome.balance_after,
            "stock movement recorded"
        );
        Ok(outcome)
    }

    /// Reconcile a location's balance against a physical count.
    #[instrument(
        skip(self, access, cmd),
        fields(
            tenant_id = %access.tenant_id,
            product_id = %cmd.product_id,
            location = %cmd.location
        ),
        err
    )]
    pub async fn create_opname(
        &self,
        access: &TenantAccess,
        cmd: CreateOpname,
    ) -> Result<OpnameOutcome, StockError> {
        access.ensure_writable()?;
        cmd.validate()?;

        let cmd = &cmd;
        let outcome = self
            .retry
            .run("create_opname", |_| self.opname_attempt(access, cmd))
            .await?;
        info!(
            movement_id = %outcome.movement_id,
            delta = outcome.delta,
            balance_after = outcome.balance_after,
            "opname recorded"
        );
        Ok(outcome)
    }

    /// Move stock from one source to one or more outlets atomically.
    #[instrument(
        skip(self, access, cmd),
        fields(
            tenant_id = %access.tenant_id,
            product_id = %cmd.product_id,
            source = %cmd.source,
            destinations = cmd.destinations.len()
        ),
        err
    )]
    pub async fn create_transfer(
        &self,
        access: &TenantAccess,
        cmd: CreateTransfer,
    ) -> Result<TransferOutcome, StockError> {
        access.ensure_writable()?;
        cmd.validate()?;

        let cmd = &cmd;
        let outcome = self
            .retry
            .run("create_transfer", |_| self.transfer_attempt(access, cmd))
            .await?;
        info!(
            transfer_id = %outcome.transfer_id,
            total_qty = outcome.total_qty,
            source_balance_after = outcome.source_balance_after,
            "transfer recorded"
        );
        Ok(outcome)
    }

    /// Ranked low-stock items for the dashboard. Read-only.
    #[instrument(
        skip(self, access),
        fields(tenant_id = %access.tenant_id, filter = %query.filter, limit = query.limit),
        err
    )]
    pub async fn low_stock_alerts(
        &self,
        access: &TenantAccess,
        query: LowStockQuery,
    ) -> Result<LowStockAlerts, StockError> {
        self.alerts.alerts(&self.store, access, query, Utc::now()).await
    }

    /// Audit view: products, outlets, balances, movements and transfers.
    #[instrument(skip(self, access), fields(tenant_id = %access.tenant_id), err)]
    pub async fn inventory_snapshot(
        &self,
        access: &TenantAccess,
    ) -> Result<InventorySnapshot, StockError> {
        self.snapshots.snapshot(&self.store, access).await
    }

    /// Current balance of `(product, location)`, read under lock.
    #[instrument(
        skip(self, access),
        fields(tenant_id = %access.tenant_id, product_id = %product_id, location = %location),
        err
    )]
    pub async fn balance(
        &self,
        access: &TenantAccess,
        product_id: ProductId,
        location: Location,
    ) -> Result<i64, StockError> {
        self.retry
            .run("balance", |_| self.balance_attempt(access, product_id, location))
            .await
    }

    #[instrument(skip(self, access, input), fields(tenant_id = %access.tenant_id), err)]
    pub async fn register_outlet(
        &self,
        access: &TenantAccess,
        input: NewOutlet,
    ) -> Result<Outlet, StockError> {
        access.ensure_writable()?;
        let input = &input;
        let outlet = self
            .retry
            .run("register_outlet", |_| async move {
                let mut tx = self.store.begin().await?;
                let result = self.catalog.register_outlet(&mut tx, access, input.clone()).await;
                finish(tx, result).await
            })
            .await?;
        info!(outlet_id = %outlet.id, code = %outlet.code, "outlet registered");
        Ok(outlet)
    }

    #[instrument(skip(self, access, input), fields(tenant_id = %access.tenant_id), err)]
    pub async fn register_product(
        &self,
        access: &TenantAccess,
        input: NewProduct,
    ) -> Result<Product, StockError> {
        access.ensure_writable()?;
        let input = &input;
        let product = self
            .retry
            .run("register_product", |_| async move {
                let mut tx = self.store.begin().await?;
                let result = self
                    .catalog
                    .register_product(&mut tx, access, input.clone(), Utc::now())
                    .await;
                finish(tx, result).await
            })
            .await?;
        info!(
            product_id = %product.id,
            sku = %product.sku,
            central_stock = product.central_stock,
            "product registered"
        );
        Ok(product)
    }

    async fn movement_attempt(
        &self,
        access: &TenantAccess,
        cmd: &CreateMovement,
    ) -> Result<MovementOutcome, StockError> {
        let mut tx = self.store.begin().await?;
        let result = self.apply_movement(&mut tx, access, cmd).await;
        finish(tx, result).await
    }

    async fn apply_movement(
        &self,
        tx: &mut S::Tx,
        access: &TenantAccess,
        cmd: &CreateMovement,
    ) -> Result<MovementOutcome, StockError> {
        let product = require_product(tx, access, cmd.product_id).await?;
        let label = location_label(tx, access, cmd.location).await?;

        let delta = cmd.direction.signed(cmd.qty);
        let balance_after = self
            .ledger
            .apply_delta(tx, access.tenant_id, product.id, cmd.location, delta)
            .await?;

        let record = self
            .recorder
            .append(
                tx,
                NewMovement {
                    tenant_id: access.tenant_id,
                    product_id: product.id,
                    location: cmd.location,
                    location_label: label,
                    movement_type: cmd.direction.movement_type(),
                    delta,
                    balance_after,
                    counted_stock: None,
                    note: resolve_note(cmd.note.as_deref(), cmd.direction.default_note()),
                    actor_id: access.actor,
                    occurred_at: Utc::now(),
                },
            )
            .await?;

        Ok(MovementOutcome {
            movement_id: record.id,
            balance_after,
        })
    }

    async fn opname_attempt(
        &self,
        access: &TenantAccess,
        cmd: &CreateOpname,
    ) -> Result<OpnameOutcome, StockError> {
        let mut tx = self.store.begin().await?;
        let result = self.opname.reconcile(&mut tx, access, cmd, Utc::now()).await;
        finish(tx, result).await
    }

    async fn transfer_attempt(
        &self,
        access: &TenantAccess,
        cmd: &CreateTransfer,
    ) -> Result<TransferOutcome, StockError> {
        let mut tx = self.store.begin().await?;
        let result = self.transfers.transfer(&mut tx, access, cmd, Utc::now()).await;
        finish(tx, result).await
    }

    async fn balance_attempt(
        &self,
        access: &TenantAccess,
        product_id: ProductId,
        location: Location,
    ) -> Result<i64, StockError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let product = require_product(&mut tx, access, product_id).await?;
            location_label(&mut tx, access, location).await?;
            self.ledger.balance(&mut tx, access.tenant_id, product.id, location).await
        }
        .await;
        // Nothing to keep: the lazily created outlet row is discarded too.
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "rollback after balance read failed");
        }
        result
    }
}

/// Commit on success, roll back on failure.
async fn finish<T: StockTx, R>(tx: T, result: Result<R, StockError>) -> Result<R, StockError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
