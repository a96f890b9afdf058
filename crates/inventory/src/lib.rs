//! Inventory domain module: locations, balances, the movement log, transfers
//! and low-stock ranking.
//!
//! This crate contains business rules for the stock ledger, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage). Locking,
//! transactions and persistence live in `stockroom-infra`.

pub mod alerts;
pub mod catalog;
pub mod command;
pub mod location;
pub mod movement;
pub mod transfer;

pub use alerts::{rank_candidates, LowStockCandidate, LowStockRanking, MAX_ALERT_LIMIT};
pub use catalog::{
    normalize_outlet_code, normalize_sku, BranchStock, NewOutlet, NewProduct, Outlet, Product,
};
pub use command::{CreateMovement, CreateOpname, CreateTransfer, LowStockQuery, StockDirection};
pub use location::{Location, LocationFilter, LocationKind, CENTRAL_LABEL, RESERVED_OUTLET_CODE};
pub use movement::{resolve_note, DefaultNote, MovementRecord, MovementType};
pub use transfer::{lock_order, validate_destinations, Transfer, TransferDestination};
