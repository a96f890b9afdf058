//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// scope, stock invariants). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (malformed or out-of-range input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A product or outlet is not resolvable in the tenant scope.
    #[error("not found: {0}")]
    NotFound(String),

    /// The outlet is outside the actor's accessible set.
    #[error("outlet outside accessible scope: {0}")]
    ScopeViolation(String),

    /// The mutation would drive a balance negative.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// The same destination outlet was listed more than once.
    #[error("duplicate transfer destination: {0}")]
    DuplicateDestination(String),

    /// A destination is structurally invalid (unknown outlet, equals the source).
    #[error("invalid transfer destination: {0}")]
    InvalidDestination(String),

    /// The tenant's billing state forbids writes.
    #[error("tenant is read-only until billing is current")]
    ReadOnly,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn scope(msg: impl Into<String>) -> Self {
        Self::ScopeViolation(msg.into())
    }

    pub fn insufficient(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn duplicate_destination(msg: impl Into<String>) -> Self {
        Self::DuplicateDestination(msg.into())
    }

    pub fn invalid_destination(msg: impl Into<String>) -> Self {
        Self::InvalidDestination(msg.into())
    }
}
