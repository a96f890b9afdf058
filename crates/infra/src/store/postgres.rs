//! Postgres-backed stock store.
//!
//! Row locks are real `SELECT ... FOR UPDATE` locks held until the
//! transaction ends. Every transaction sets `lock_timeout`, so a blocked
//! locker fails fast instead of waiting forever.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (serialization failure) | `40001` | `Conflict` | Could not serialize |
//! | Database (deadlock detected) | `40P01` | `Conflict` | Lock cycle broken by the server |
//! | Database (lock not available) | `55P03` | `Conflict` | `lock_timeout` elapsed |
//! | Database (unique violation) | `23505` | `Conflict` | Same SKU/code registered concurrently |
//! | Anything else | Any other | `Backend` | Network errors, constraint violations, closed pool |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_core::{
    CategoryId, MovementId, OutletId, ProductId, TenantId, TransferId, UnitId, UserId,
};
use stockroom_inventory::{
    BranchStock, Location, LocationKind, MovementRecord, Outlet, Product, Transfer,
    TransferDestination,
};

use super::r#trait::{StockStore, StockTx, StoreError};

const MIGRATION: &str = include_str!("../../migrations/0001_stock_ledger.sql");

/// Postgres-backed `StockStore`.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Connect a pool of at most `max_connections`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Apply the bundled schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Open transaction against `PostgresStockStore`.
pub struct PgStockTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTx for PgStockTx {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn product(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, sku, category_id, unit_id, central_stock, minimum_low_stock
            FROM inventory_products
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(
        skip(self, outlet_ids),
        fields(tenant_id = %tenant_id, count = outlet_ids.len()),
        err
    )]
    async fn outlets(
        &mut self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<Outlet>, StoreError> {
        let ids = outlet_uuids(outlet_ids);
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, code, address
            FROM outlets
            WHERE tenant_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("outlets", e))?;

        rows.iter().map(outlet_from_row).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn lock_central(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT central_stock
            FROM inventory_products
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_central", e))?;

        row.map(|r| r.try_get::<i64, _>("central_stock").map_err(decode_error))
            .transpose()
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, outlet_id = %outlet_id, product_id = %product_id),
        err
    )]
    async fn lock_outlet(
        &mut self,
        tenant_id: TenantId,
        outlet_id: OutletId,
        product_id: ProductId,
    ) -> Result<i64, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_branch_stocks (tenant_id, outlet_id, product_id, qty)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (tenant_id, outlet_id, product_id) DO NOTHING
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(outlet_id.as_uuid())
        .bind(product_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_outlet", e))?;

        let row = sqlx::query(
            r#"
            SELECT qty
            FROM inventory_branch_stocks
            WHERE tenant_id = $1 AND outlet_id = $2 AND product_id = $3
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(outlet_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_outlet", e))?;

        row.try_get::<i64, _>("qty").map_err(decode_error)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn write_central(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE inventory_products
            SET central_stock = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(qty)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("write_central", e))?;
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, outlet_id = %outlet_id, product_id = %product_id),
        err
    )]
    async fn write_outlet(
        &mut self,
        tenant_id: TenantId,
        outlet_id: OutletId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE inventory_branch_stocks
            SET qty = $4, updated_at = NOW()
            WHERE tenant_id = $1 AND outlet_id = $2 AND product_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(outlet_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(qty)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("write_outlet", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, record),
        fields(tenant_id = %record.tenant_id, movement_id = %record.id),
        err
    )]
    async fn append_movement(&mut self, record: &MovementRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, tenant_id, product_id, location_kind, outlet_id, location_label,
                type, qty, delta, balance_after, counted_stock, note, actor_id, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.tenant_id.as_uuid())
        .bind(record.product_id.as_uuid())
        .bind(record.location.kind().as_str())
        .bind(record.location.outlet_id().map(|id| *id.as_uuid()))
        .bind(&record.location_label)
        .bind(record.movement_type.as_str())
        .bind(record.qty)
        .bind(record.delta)
        .bind(record.balance_after)
        .bind(record.counted_stock)
        .bind(&record.note)
        .bind(record.actor_id.as_uuid())
        .bind(record.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, transfer),
        fields(tenant_id = %transfer.tenant_id, transfer_id = %transfer.id),
        err
    )]
    async fn insert_transfer(&mut self, transfer: &Transfer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transfers (
                id, tenant_id, product_id, source_kind, source_outlet_id, source_label,
                total_qty, note, actor_id, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transfer.id.as_uuid())
        .bind(transfer.tenant_id.as_uuid())
        .bind(transfer.product_id.as_uuid())
        .bind(transfer.source.kind().as_str())
        .bind(transfer.source.outlet_id().map(|id| *id.as_uuid()))
        .bind(&transfer.source_label)
        .bind(transfer.total_qty)
        .bind(&transfer.note)
        .bind(transfer.actor_id.as_uuid())
        .bind(transfer.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transfer", e))?;

        for (position, dest) in transfer.destinations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO inventory_transfer_destinations
                    (transfer_id, outlet_id, outlet_label, qty, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(transfer.id.as_uuid())
            .bind(dest.outlet_id.as_uuid())
            .bind(&dest.outlet_label)
            .bind(dest.qty)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_transfer", e))?;
        }
        Ok(())
    }

    #[instrument(
        skip(self, product),
        fields(tenant_id = %product.tenant_id, product_id = %product.id),
        err
    )]
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_products (
                id, tenant_id, category_id, unit_id, name, sku, central_stock, minimum_low_stock
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.tenant_id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(product.unit_id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.central_stock)
        .bind(product.minimum_low_stock)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, outlet),
        fields(tenant_id = %outlet.tenant_id, outlet_id = %outlet.id),
        err
    )]
    async fn insert_outlet(&mut self, outlet: &Outlet) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO outlets (id, tenant_id, name, code, address)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(outlet.id.as_uuid())
        .bind(outlet.tenant_id.as_uuid())
        .bind(&outlet.name)
        .bind(&outlet.code)
        .bind(&outlet.address)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_outlet", e))?;
        Ok(())
    }

    async fn sku_exists(&mut self, tenant_id: TenantId, sku: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM inventory_products WHERE tenant_id = $1 AND UPPER(sku) = UPPER($2)
            ) AS taken
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(sku)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("sku_exists", e))?;
        row.try_get::<bool, _>("taken").map_err(decode_error)
    }

    async fn outlet_code_exists(
        &mut self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM outlets WHERE tenant_id = $1 AND UPPER(code) = UPPER($2)
            ) AS taken
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("outlet_code_exists", e))?;
        row.try_get::<bool, _>("taken").map_err(decode_error)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    type Tx = PgStockTx;

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        // SET does not accept bind parameters; the value is a plain integer.
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PgStockTx { tx })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, sku, category_id, unit_id, central_stock, minimum_low_stock
            FROM inventory_products
            WHERE tenant_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_outlets(&self, tenant_id: TenantId) -> Result<Vec<Outlet>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, code, address
            FROM outlets
            WHERE tenant_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_outlets", e))?;

        rows.iter().map(outlet_from_row).collect()
    }

    #[instrument(skip(self, outlet_ids), fields(tenant_id = %tenant_id), err)]
    async fn list_branch_stocks(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<BranchStock>, StoreError> {
        let ids = outlet_uuids(outlet_ids);
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, outlet_id, product_id, qty, updated_at
            FROM inventory_branch_stocks
            WHERE tenant_id = $1 AND outlet_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_branch_stocks", e))?;

        rows.iter()
            .map(|row| {
                Ok(BranchStock {
                    tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
                    outlet_id: OutletId::from_uuid(get(row, "outlet_id")?),
                    product_id: ProductId::from_uuid(get(row, "product_id")?),
                    qty: get(row, "qty")?,
                    updated_at: get(row, "updated_at")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, outlet_ids), fields(tenant_id = %tenant_id), err)]
    async fn touched_outlet_products(
        &self,
        tenant_id: TenantId,
        outlet_ids: &[OutletId],
    ) -> Result<Vec<(OutletId, ProductId)>, StoreError> {
        let ids = outlet_uuids(outlet_ids);
        let rows = sqlx::query(
            r#"
            SELECT outlet_id, product_id
            FROM inventory_movements
            WHERE tenant_id = $1 AND location_kind = 'outlet' AND outlet_id = ANY($2)
            UNION
            SELECT source_outlet_id AS outlet_id, product_id
            FROM inventory_transfers
            WHERE tenant_id = $1 AND source_kind = 'outlet' AND source_outlet_id = ANY($2)
            UNION
            SELECT d.outlet_id, t.product_id
            FROM inventory_transfer_destinations d
            JOIN inventory_transfers t ON t.id = d.transfer_id
            WHERE t.tenant_id = $1 AND d.outlet_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("touched_outlet_products", e))?;

        rows.iter()
            .map(|row| {
                Ok((
                    OutletId::from_uuid(get(row, "outlet_id")?),
                    ProductId::from_uuid(get(row, "product_id")?),
                ))
            })
            .collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_movements(&self, tenant_id: TenantId) -> Result<Vec<MovementRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, product_id, location_kind, outlet_id, location_label, type,
                   qty, delta, balance_after, counted_stock, note, actor_id, occurred_at
            FROM inventory_movements
            WHERE tenant_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_transfers(&self, tenant_id: TenantId) -> Result<Vec<Transfer>, StoreError> {
        let headers = sqlx::query(
            r#"
            SELECT id, tenant_id, product_id, source_kind, source_outlet_id, source_label,
                   total_qty, note, actor_id, occurred_at
            FROM inventory_transfers
            WHERE tenant_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transfers", e))?;

        let dest_rows = sqlx::query(
            r#"
            SELECT d.transfer_id, d.outlet_id, d.outlet_label, d.qty
            FROM inventory_transfer_destinations d
            JOIN inventory_transfers t ON t.id = d.transfer_id
            WHERE t.tenant_id = $1
            ORDER BY d.transfer_id, d.position ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transfers", e))?;

        let mut destinations: HashMap<Uuid, Vec<TransferDestination>> = HashMap::new();
        for row in &dest_rows {
            let transfer_id: Uuid = get(row, "transfer_id")?;
            destinations.entry(transfer_id).or_default().push(TransferDestination {
                outlet_id: OutletId::from_uuid(get(row, "outlet_id")?),
                outlet_label: get(row, "outlet_label")?,
                qty: get(row, "qty")?,
            });
        }

        headers
            .iter()
            .map(|row| {
                let id: Uuid = get(row, "id")?;
                Ok(Transfer {
                    id: TransferId::from_uuid(id),
                    tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
                    product_id: ProductId::from_uuid(get(row, "product_id")?),
                    source: location_from_parts(
                        get(row, "source_kind")?,
                        get(row, "source_outlet_id")?,
                    )?,
                    source_label: get(row, "source_label")?,
                    total_qty: get(row, "total_qty")?,
                    note: get(row, "note")?,
                    actor_id: UserId::from_uuid(get(row, "actor_id")?),
                    occurred_at: get(row, "occurred_at")?,
                    destinations: destinations.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<T, _>(column).map_err(decode_error)
}

/// Owned uuids for an `= ANY($n)` bind.
fn outlet_uuids(outlet_ids: &[OutletId]) -> Vec<Uuid> {
    outlet_ids.iter().map(|id| *id.as_uuid()).collect()
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

fn location_from_parts(kind: String, outlet_id: Option<Uuid>) -> Result<Location, StoreError> {
    let kind: LocationKind = kind
        .parse()
        .map_err(|e| StoreError::Backend(format!("stored location kind: {e}")))?;
    Location::from_parts(kind, outlet_id.map(OutletId::from_uuid))
        .map_err(|e| StoreError::Backend(format!("stored location: {e}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        name: get(row, "name")?,
        sku: get(row, "sku")?,
        category_id: CategoryId::from_uuid(get(row, "category_id")?),
        unit_id: UnitId::from_uuid(get(row, "unit_id")?),
        central_stock: get(row, "central_stock")?,
        minimum_low_stock: get(row, "minimum_low_stock")?,
    })
}

fn outlet_from_row(row: &PgRow) -> Result<Outlet, StoreError> {
    Ok(Outlet {
        id: OutletId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        name: get(row, "name")?,
        code: get(row, "code")?,
        address: get(row, "address")?,
    })
}

fn movement_from_row(row: &PgRow) -> Result<MovementRecord, StoreError> {
    let movement_type: String = get(row, "type")?;
    let occurred_at: DateTime<Utc> = get(row, "occurred_at")?;
    Ok(MovementRecord {
        id: MovementId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        product_id: ProductId::from_uuid(get(row, "product_id")?),
        location: location_from_parts(get(row, "location_kind")?, get(row, "outlet_id")?)?,
        location_label: get(row, "location_label")?,
        movement_type: movement_type
            .parse()
            .map_err(|e| StoreError::Backend(format!("stored movement type: {e}")))?,
        qty: get(row, "qty")?,
        delta: get(row, "delta")?,
        balance_after: get(row, "balance_after")?,
        counted_stock: get(row, "counted_stock")?,
        note: get(row, "note")?,
        actor_id: UserId::from_uuid(get(row, "actor_id")?),
        occurred_at,
    })
}

/// Map SQLx errors to `StoreError`, keeping retryable conditions distinct.
fn map_sqlx_error(op: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(code) = db.code() {
            if matches!(code.as_ref(), "40001" | "40P01" | "55P03" | "23505") {
                return StoreError::Conflict(format!("{op}: {err}"));
            }
        }
    }
    StoreError::Backend(format!("{op}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlet_ids_bind_as_plain_uuids() {
        let a = OutletId::new();
        let b = OutletId::new();
        assert_eq!(outlet_uuids(&[a, b]), vec![*a.as_uuid(), *b.as_uuid()]);
        assert!(outlet_uuids(&[]).is_empty());
    }

    #[test]
    fn stored_locations_decode() {
        let outlet = OutletId::new();
        assert_eq!(location_from_parts("central".into(), None).unwrap(), Location::Central);
        assert_eq!(
            location_from_parts("outlet".into(), Some(*outlet.as_uuid())).unwrap(),
            Location::Outlet(outlet)
        );
        assert!(matches!(
            location_from_parts("outlet".into(), None),
            Err(StoreError::Backend(_))
        ));
        assert!(matches!(
            location_from_parts("warehouse".into(), None),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn history_tables_are_append_only() {
        for table in [
            "inventory_movements",
            "inventory_transfers",
            "inventory_transfer_destinations",
        ] {
            let trigger = format!(
                "CREATE TRIGGER {table}_append_only\n    BEFORE UPDATE OR DELETE ON {table}\n"
            );
            assert!(MIGRATION.contains(&trigger), "{table} accepts updates");
        }
    }

    #[test]
    fn non_database_errors_are_not_retryable() {
        assert!(matches!(
            map_sqlx_error("product", sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }
}
