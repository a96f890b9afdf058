use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::dto::AlertsQuery;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/alerts", get(low_stock_alerts))
}

/// Ranked low-stock items across the locations the actor can see.
pub async fn low_stock_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    params: Result<Query<AlertsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(q) => q,
        Err(r) => return errors::query_rejection(r),
    };
    let query = match params.into_query() {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.low_stock_alerts(tenant.access(), query).await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}
