//! Infrastructure layer: transactional stock ledger, store adapters,
//! operation service, configuration and key-value storage.

pub mod alerts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod kv;
pub mod ledger;
pub mod opname;
pub mod recorder;
pub mod retry;
mod scope;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod transfer;

pub use alerts::{LowStockAlertAggregator, LowStockAlerts};
pub use catalog::CatalogRegistrar;
pub use config::StockConfig;
pub use error::StockError;
pub use kv::{IdempotencyCache, InMemoryKeyValue, KeyValuePort, KvError};
pub use ledger::StockLedger;
pub use opname::{OpnameOutcome, OpnameReconciler};
pub use recorder::{MovementRecorder, NewMovement};
pub use retry::RetryPolicy;
pub use service::{MovementOutcome, StockService};
pub use snapshot::{InventorySnapshot, SnapshotReader};
pub use store::{InMemoryStockStore, PostgresStockStore, StockStore, StockTx, StoreError};
pub use transfer::{TransferCoordinator, TransferOutcome};

#[cfg(feature = "redis")]
pub use kv::RedisKeyValue;

#[cfg(test)]
mod integration_tests;
