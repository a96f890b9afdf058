//! The single error type surfaced by every stock operation.
//!
//! Domain failures (`DomainError`) and storage failures (`StoreError`) are
//! folded into `StockError` so callers (HTTP handlers, jobs) branch on one
//! taxonomy. `kind()` is the machine-checkable code; `Display` is the
//! human-readable message.

use thiserror::Error;

use stockroom_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Malformed input (non-positive quantity, negative count, bad limit...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Product or outlet not resolvable in the tenant scope.
    #[error("not found: {0}")]
    NotFound(String),

    /// Outlet outside the actor's accessible set.
    #[error("outlet outside accessible scope: {0}")]
    ScopeViolation(String),

    /// The mutation would drive a balance negative.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("duplicate transfer destination: {0}")]
    DuplicateDestination(String),

    #[error("invalid transfer destination: {0}")]
    InvalidDestination(String),

    /// Tenant billing state forbids writes.
    #[error("tenant is read-only until billing is current")]
    ReadOnly,

    /// Lock timeout, serialization failure or deadlock.
    ///
    /// Retryable. `StockService` converts it to `System` once the retry
    /// policy is exhausted, so it never escapes the service.
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    /// Storage or other infrastructure failure.
    #[error("system error: {0}")]
    System(String),
}

impl StockError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            StockError::Validation(_) => "validation_error",
            StockError::NotFound(_) => "not_found",
            StockError::ScopeViolation(_) => "scope_violation",
            StockError::InsufficientStock { .. } => "insufficient_stock",
            StockError::DuplicateDestination(_) => "duplicate_destination",
            StockError::InvalidDestination(_) => "invalid_destination",
            StockError::ReadOnly => "read_only",
            StockError::Conflict(_) | StockError::System(_) => "system_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StockError::Conflict(_))
    }
}

impl From<DomainError> for StockError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                StockError::Validation(msg)
            }
            DomainError::NotFound(what) => StockError::NotFound(what),
            DomainError::ScopeViolation(msg) => StockError::ScopeViolation(msg),
            DomainError::InsufficientStock {
                requested,
                available,
            } => StockError::InsufficientStock {
                requested,
                available,
            },
            DomainError::DuplicateDestination(msg) => StockError::DuplicateDestination(msg),
            DomainError::InvalidDestination(msg) => StockError::InvalidDestination(msg),
            DomainError::ReadOnly => StockError::ReadOnly,
        }
    }
}

impl From<StoreError> for StockError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => StockError::Conflict(msg),
            StoreError::Backend(msg) => StockError::System(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_kind() {
        let err: StockError = DomainError::insufficient(10, 3).into();
        assert_eq!(err.kind(), "insufficient_stock");
        assert_eq!(err.to_string(), "insufficient stock: requested 10, available 3");

        let err: StockError = DomainError::invalid_id("ProductId: bad").into();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict: StockError = StoreError::Conflict("lock wait timed out".into()).into();
        assert!(conflict.is_retryable());
        assert_eq!(conflict.kind(), "system_error");

        let backend: StockError = StoreError::Backend("pool closed".into()).into();
        assert!(!backend.is_retryable());
        assert!(matches!(backend, StockError::System(_)));
    }
}
