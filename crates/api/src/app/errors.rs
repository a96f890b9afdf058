use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_core::DomainError;
use stockroom_infra::StockError;

/// Map an operation error onto its status code and `{"error", "message"}` body.
pub fn stock_error_to_response(err: StockError) -> axum::response::Response {
    let status = match &err {
        StockError::Validation(_)
        | StockError::InsufficientStock { .. }
        | StockError::DuplicateDestination(_)
        | StockError::InvalidDestination(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StockError::NotFound(_) => StatusCode::NOT_FOUND,
        StockError::ScopeViolation(_) | StockError::ReadOnly => StatusCode::FORBIDDEN,
        StockError::Conflict(_) | StockError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "stock operation failed");
    }
    json_error(status, err.kind(), err.to_string())
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    stock_error_to_response(err.into())
}

/// Undecodable bodies are input errors like any other.
pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
