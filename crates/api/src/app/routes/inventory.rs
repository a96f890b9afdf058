use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Query,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_infra::IdempotencyCache;

use crate::app::dto;
use crate::app::errors;
use crate::app::routes::common::{idempotency_key, idempotent};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/products", post(register_product))
        .route("/outlets", post(register_outlet))
        .route("/movements", post(create_movement))
        .route("/opname", post(create_opname))
        .route("/transfers", post(create_transfer))
        .route("/snapshot", get(inventory_snapshot))
        .route("/balance", get(balance))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(cache): Extension<IdempotencyCache>,
    headers: HeaderMap,
    payload: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(b) => b,
        Err(r) => return errors::json_rejection(r),
    };
    idempotent(
        &cache,
        tenant.tenant_id(),
        "products",
        idempotency_key(&headers),
        StatusCode::CREATED,
        || services.register_product(tenant.access(), body.into()),
    )
    .await
}

pub async fn register_outlet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(cache): Extension<IdempotencyCache>,
    headers: HeaderMap,
    payload: Result<Json<dto::CreateOutletRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(b) => b,
        Err(r) => return errors::json_rejection(r),
    };
    idempotent(
        &cache,
        tenant.tenant_id(),
        "outlets",
        idempotency_key(&headers),
        StatusCode::CREATED,
        || services.register_outlet(tenant.access(), body.into()),
    )
    .await
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(cache): Extension<IdempotencyCache>,
    headers: HeaderMap,
    payload: Result<Json<dto::CreateMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(b) => b,
        Err(r) => return errors::json_rejection(r),
    };
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    idempotent(
        &cache,
        tenant.tenant_id(),
        "movements",
        idempotency_key(&headers),
        StatusCode::CREATED,
        || services.create_movement(tenant.access(), cmd),
    )
    .await
}

pub async fn create_opname(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(cache): Extension<IdempotencyCache>,
    headers: HeaderMap,
    payload: Result<Json<dto::CreateOpnameRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(b) => b,
        Err(r) => return errors::json_rejection(r),
    };
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    idempotent(
        &cache,
        tenant.tenant_id(),
        "opname",
        idempotency_key(&headers),
        StatusCode::CREATED,
        || services.create_opname(tenant.access(), cmd),
    )
    .await
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(cache): Extension<IdempotencyCache>,
    headers: HeaderMap,
    payload: Result<Json<dto::CreateTransferRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(b) => b,
        Err(r) => return errors::json_rejection(r),
    };
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    idempotent(
        &cache,
        tenant.tenant_id(),
        "transfers",
        idempotency_key(&headers),
        StatusCode::CREATED,
        || services.create_transfer(tenant.access(), cmd),
    )
    .await
}

pub async fn inventory_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.inventory_snapshot(tenant.access()).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}

pub async fn balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    params: Result<Query<dto::BalanceQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match params {
        Ok(q) => q,
        Err(r) => return errors::query_rejection(r),
    };
    let location = match query.location() {
        Ok(l) => l,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.balance(tenant.access(), query.product_id, location).await {
        Ok(balance) => Json(serde_json::json!({
            "productId": query.product_id,
            "location": location.key(),
            "balance": balance,
        }))
        .into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}
