use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::TenantContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(tenant): Extension<TenantContext>) -> impl IntoResponse {
    let access = tenant.access();
    Json(serde_json::json!({
        "tenantId": access.tenant_id,
        "actorId": access.actor,
        "role": access.role,
        "outletIds": access.accessible_outlets,
        "writable": access.writable_now,
    }))
}
