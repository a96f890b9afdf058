use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use stockroom_auth::TenantAccess;
use stockroom_core::ProductId;
use stockroom_infra::{
    InMemoryKeyValue, InMemoryStockStore, InventorySnapshot, KeyValuePort, LowStockAlerts,
    MovementOutcome, OpnameOutcome, PostgresStockStore, StockConfig, StockError, StockService,
    TransferOutcome,
};
use stockroom_inventory::{
    CreateMovement, CreateOpname, CreateTransfer, Location, LowStockQuery, NewOutlet, NewProduct,
    Outlet, Product,
};

/// The operation surface behind the routes, over whichever store was selected
/// at startup.
pub enum AppServices {
    InMemory(StockService<InMemoryStockStore>),
    Persistent(StockService<PostgresStockStore>),
}

macro_rules! with_service {
    ($self:ident, $svc:ident => $body:expr) => {
        match $self {
            AppServices::InMemory($svc) => $body,
            AppServices::Persistent($svc) => $body,
        }
    };
}

impl AppServices {
    pub fn in_memory(config: &StockConfig) -> Self {
        let store = InMemoryStockStore::new(config.lock_timeout);
        AppServices::InMemory(StockService::new(store).with_retry(config.retry_policy()))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AppServices::InMemory(_) => "in_memory",
            AppServices::Persistent(_) => "postgres",
        }
    }

    pub async fn create_movement(
        &self,
        access: &TenantAccess,
        cmd: CreateMovement,
    ) -> Result<MovementOutcome, StockError> {
        with_service!(self, svc => svc.create_movement(access, cmd).await)
    }

    pub async fn create_opname(
        &self,
        access: &TenantAccess,
        cmd: CreateOpname,
    ) -> Result<OpnameOutcome, StockError> {
        with_service!(self, svc => svc.create_opname(access, cmd).await)
    }

    pub async fn create_transfer(
        &self,
        access: &TenantAccess,
        cmd: CreateTransfer,
    ) -> Result<TransferOutcome, StockError> {
        with_service!(self, svc => svc.create_transfer(access, cmd).await)
    }

    pub async fn low_stock_alerts(
        &self,
        access: &TenantAccess,
        query: LowStockQuery,
    ) -> Result<LowStockAlerts, StockError> {
        with_service!(self, svc => svc.low_stock_alerts(access, query).await)
    }

    pub async fn inventory_snapshot(
        &self,
        access: &TenantAccess,
    ) -> Result<InventorySnapshot, StockError> {
        with_service!(self, svc => svc.inventory_snapshot(access).await)
    }

    pub async fn balance(
        &self,
        access: &TenantAccess,
        product_id: ProductId,
        location: Location,
    ) -> Result<i64, StockError> {
        with_service!(self, svc => svc.balance(access, product_id, location).await)
    }

    pub async fn register_outlet(
        &self,
        access: &TenantAccess,
        input: NewOutlet,
    ) -> Result<Outlet, StockError> {
        with_service!(self, svc => svc.register_outlet(access, input).await)
    }

    pub async fn register_product(
        &self,
        access: &TenantAccess,
        input: NewProduct,
    ) -> Result<Product, StockError> {
        with_service!(self, svc => svc.register_product(access, input).await)
    }
}

/// Select the store from `USE_PERSISTENT_STORES`.
///
/// The Postgres store connects and applies its migrations before the router
/// is built, so a bad `DATABASE_URL` fails startup rather than the first request.
pub async fn build_services(config: &StockConfig) -> anyhow::Result<AppServices> {
    if !config.use_persistent_stores {
        info!("using in-memory stock store");
        return Ok(AppServices::in_memory(config));
    }

    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required when USE_PERSISTENT_STORES is enabled")?;
    let store =
        PostgresStockStore::connect(url, config.database_max_connections, config.lock_timeout)
            .await
            .context("failed to connect to Postgres")?;
    store.migrate().await.context("failed to apply stock ledger migrations")?;

    info!(max_connections = config.database_max_connections, "using Postgres stock store");
    Ok(AppServices::Persistent(
        StockService::new(store).with_retry(config.retry_policy()),
    ))
}

/// Key-value backend for idempotent replays: Redis when `REDIS_URL` is set
/// (feature `redis`), in-memory otherwise.
pub fn build_key_value(config: &StockConfig) -> anyhow::Result<Arc<dyn KeyValuePort>> {
    match config.redis_url.as_deref() {
        Some(url) => redis_key_value(url),
        None => Ok(Arc::new(InMemoryKeyValue::new())),
    }
}

#[cfg(feature = "redis")]
fn redis_key_value(url: &str) -> anyhow::Result<Arc<dyn KeyValuePort>> {
    let kv = stockroom_infra::RedisKeyValue::new(url).context("failed to open Redis client")?;
    info!("using Redis key-value store");
    Ok(Arc::new(kv))
}

#[cfg(not(feature = "redis"))]
fn redis_key_value(_url: &str) -> anyhow::Result<Arc<dyn KeyValuePort>> {
    tracing::warn!(
        "REDIS_URL is set but the redis feature is disabled; using in-memory key-value store"
    );
    Ok(Arc::new(InMemoryKeyValue::new()))
}
