//! HTTP API: routing, authentication and request/response mapping for the
//! stock ledger.

pub mod app;
pub mod context;
pub mod middleware;
