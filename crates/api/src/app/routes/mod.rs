use axum::{routing::get, Router};

pub mod common;
pub mod dashboard;
pub mod inventory;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/inventory", inventory::router())
        .nest("/dashboard", dashboard::router())
}
