//! Typed operation inputs.
//!
//! Each input is validated (`validate()`) before any transaction begins, so
//! malformed requests never reach the ledger.

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, OutletId, ProductId};

use crate::alerts::{DEFAULT_ALERT_LIMIT, MAX_ALERT_LIMIT};
use crate::location::{Location, LocationFilter};
use crate::movement::{DefaultNote, MovementType};
use crate::transfer::validate_destinations;

/// Direction of a plain stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn movement_type(&self) -> MovementType {
        match self {
            StockDirection::In => MovementType::In,
            StockDirection::Out => MovementType::Out,
        }
    }

    /// Signed delta for a positive quantity.
    pub fn signed(&self, qty: i64) -> i64 {
        match self {
            StockDirection::In => qty,
            StockDirection::Out => -qty,
        }
    }

    pub fn default_note(&self) -> DefaultNote {
        match self {
            StockDirection::In => DefaultNote::StockIn,
            StockDirection::Out => DefaultNote::StockOut,
        }
    }
}

/// Command: record an inbound or outbound movement at one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMovement {
    pub product_id: ProductId,
    pub qty: i64,
    pub direction: StockDirection,
    pub location: Location,
    pub note: Option<String>,
}

impl CreateMovement {
    pub fn validate(&self) -> DomainResult<()> {
        if self.qty <= 0 {
            return Err(DomainError::validation("qty must be > 0"));
        }
        Ok(())
    }
}

/// Command: reconcile a location's balance against a physical count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOpname {
    pub product_id: ProductId,
    pub actual_stock: i64,
    pub location: Location,
    pub note: Option<String>,
}

impl CreateOpname {
    pub fn validate(&self) -> DomainResult<()> {
        if self.actual_stock < 0 {
            return Err(DomainError::validation("actualStock must be >= 0"));
        }
        Ok(())
    }
}

/// Command: move stock from one source to one or more outlets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransfer {
    pub product_id: ProductId,
    pub source: Location,
    /// `(outlet, qty)` in caller order.
    pub destinations: Vec<(OutletId, i64)>,
    pub note: Option<String>,
}

impl CreateTransfer {
    /// Structural validation; returns the total quantity moved.
    pub fn validate(&self) -> DomainResult<i64> {
        validate_destinations(self.source, &self.destinations)
    }

    pub fn destination_ids(&self) -> Vec<OutletId> {
        self.destinations.iter().map(|(id, _)| *id).collect()
    }
}

/// Query: low-stock ranking parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LowStockQuery {
    pub filter: LocationFilter,
    pub limit: usize,
}

impl LowStockQuery {
    /// Build from optional wire values (`all` and 5 when absent).
    pub fn new(filter: Option<LocationFilter>, limit: Option<i64>) -> DomainResult<Self> {
        let limit = match limit {
            None => DEFAULT_ALERT_LIMIT,
            Some(l) if (1..=MAX_ALERT_LIMIT as i64).contains(&l) => l as usize,
            Some(l) => {
                return Err(DomainError::validation(format!(
                    "limit must be between 1 and {MAX_ALERT_LIMIT} (got {l})"
                )));
            }
        };
        Ok(Self {
            filter: filter.unwrap_or_default(),
            limit,
        })
    }
}
