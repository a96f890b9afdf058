use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{MovementId, ProductId, TenantId, UserId};

use crate::location::Location;

/// Type of a logged balance change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
    Opname,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Opname => "opname",
        }
    }
}

impl core::str::FromStr for MovementType {
    type Err = stockroom_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementType::In),
            "out" => Ok(MovementType::Out),
            "opname" => Ok(MovementType::Opname),
            other => Err(stockroom_core::DomainError::validation(format!(
                "unknown movement type '{other}'"
            ))),
        }
    }
}

/// Immutable, append-only movement log entry.
///
/// `balance_after` is the ledger value for `(product, location)` at the instant
/// the record was written, so `balance_after - delta` is the prior balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRecord {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub location: Location,
    pub location_label: String,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Magnitude of the change.
    pub qty: i64,
    /// Signed change.
    pub delta: i64,
    pub balance_after: i64,
    /// Set only for opname records.
    pub counted_stock: Option<i64>,
    pub note: String,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl MovementRecord {
    pub fn prior_balance(&self) -> i64 {
        self.balance_after - self.delta
    }
}

/// Fallback note text per operation, used when the caller's note is blank.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DefaultNote {
    StockIn,
    StockOut,
    Opname,
    Transfer,
    TransferOut,
    TransferIn,
    InitialStock,
}

impl DefaultNote {
    pub fn text(&self) -> &'static str {
        match self {
            DefaultNote::StockIn => "stock in",
            DefaultNote::StockOut => "stock out",
            DefaultNote::Opname => "opname adjustment",
            DefaultNote::Transfer => "stock transfer",
            DefaultNote::TransferOut => "transfer out",
            DefaultNote::TransferIn => "transfer in",
            DefaultNote::InitialStock => "initial stock",
        }
    }
}

/// Use the trimmed caller note, or the default when it is blank.
pub fn resolve_note(note: Option<&str>, fallback: DefaultNote) -> String {
    match note.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => fallback.text().to_string(),
    }
}
