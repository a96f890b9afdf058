//! Unit-of-work store boundary for the stock ledger.
//!
//! `StockStore` hands out transactions (`StockTx`) and serves committed reads.
//! Every mutating component receives the transaction explicitly; nothing
//! reaches for an ambient connection.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryStockStore, InMemoryStockTx};
pub use postgres::{PgStockTx, PostgresStockStore};
pub use r#trait::{StockStore, StockTx, StoreError};
