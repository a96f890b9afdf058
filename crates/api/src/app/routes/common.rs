//! Idempotent replay of mutating requests.

use std::future::Future;

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use stockroom_core::TenantId;
use stockroom_infra::{IdempotencyCache, StockError};

use crate::app::errors;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Client-supplied `Idempotency-Key`, if present and non-blank.
pub fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Run `op` and answer with `status` + its JSON.
///
/// With a key, a stored response for `(tenant, route, key)` is replayed
/// instead of running `op`, and a successful result is stored. Errors are
/// never stored. Key-value failures fall back to executing normally.
pub async fn idempotent<T, F, Fut>(
    cache: &IdempotencyCache,
    tenant_id: TenantId,
    route: &'static str,
    key: Option<String>,
    status: StatusCode,
    op: F,
) -> axum::response::Response
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, StockError>>,
{
    if let Some(key) = key.as_deref() {
        match cache.recall(tenant_id, route, key) {
            Ok(Some(stored)) => {
                info!(tenant_id = %tenant_id, route, "replaying idempotent response");
                return (status, Json(stored)).into_response();
            }
            Ok(None) => {}
            Err(e) => warn!(
                tenant_id = %tenant_id,
                route,
                error = %e,
                "idempotency lookup failed; executing request"
            ),
        }
    }

    let value = match op().await {
        Ok(v) => v,
        Err(e) => return errors::stock_error_to_response(e),
    };
    let body = match serde_json::to_value(&value) {
        Ok(b) => b,
        Err(e) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "system_error",
                e.to_string(),
            );
        }
    };

    if let Some(key) = key.as_deref() {
        if let Err(e) = cache.remember(tenant_id, route, key, &body) {
            warn!(tenant_id = %tenant_id, route, error = %e, "failed to store idempotent response");
        }
    }

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::HeaderValue;
    use serde_json::json;
    use stockroom_infra::InMemoryKeyValue;

    fn cache() -> IdempotencyCache {
        IdempotencyCache::new(Arc::new(InMemoryKeyValue::new()), Duration::from_secs(60))
    }

    #[test]
    fn blank_keys_are_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers), None);
        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("  "));
        assert_eq!(idempotency_key(&headers), None);
        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(" abc "));
        assert_eq!(idempotency_key(&headers).as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn repeated_key_runs_once() {
        let cache = cache();
        let tenant = TenantId::new();
        let runs = AtomicUsize::new(0);

        for _ in 0..2 {
            let key = Some("k1".into());
            let res = idempotent(&cache, tenant, "movements", key, StatusCode::CREATED, || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StockError>(json!({ "balanceAfter": 7 }))
            })
            .await;
            assert_eq!(res.status(), StatusCode::CREATED);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_stored() {
        let cache = cache();
        let tenant = TenantId::new();

        let key = Some("k2".into());
        let res = idempotent(&cache, tenant, "movements", key, StatusCode::CREATED, || async {
            Err::<serde_json::Value, _>(StockError::InsufficientStock {
                requested: 3,
                available: 1,
            })
        })
        .await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(cache.recall(tenant, "movements", "k2").unwrap(), None);
    }
}
