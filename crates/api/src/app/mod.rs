//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the operation surface handlers call
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and their mapping onto typed operation inputs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockroom_auth::{BillingGate, ClaimsAccessResolver, Hs256JwtValidator, InMemoryBillingGate};
use stockroom_infra::{IdempotencyCache, StockConfig};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router from configuration (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String, config: StockConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(&config).await?);
    tracing::info!(backend = services.backend(), "stock services ready");
    let billing = Arc::new(InMemoryBillingGate::new(config.billing_default_writable));
    let idempotency =
        IdempotencyCache::new(services::build_key_value(&config)?, config.idempotency_ttl);

    Ok(build_router(jwt_secret, services, billing, idempotency))
}

/// Assemble the router around already-built collaborators.
pub fn build_router(
    jwt_secret: String,
    services: Arc<AppServices>,
    billing: Arc<dyn BillingGate>,
    idempotency: IdempotencyCache,
) -> Router {
    let auth_state = middleware::AuthState {
        jwt: Arc::new(Hs256JwtValidator::new(jwt_secret.into_bytes())),
        access: Arc::new(ClaimsAccessResolver::new(billing)),
    };

    // Protected routes: require auth + tenant context.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(Extension(idempotency))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
