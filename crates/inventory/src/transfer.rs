use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, OutletId, ProductId, TenantId, TransferId, UserId};

use crate::location::Location;

/// One destination row of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDestination {
    pub outlet_id: OutletId,
    pub outlet_label: String,
    pub qty: i64,
}

/// Transfer header plus its destinations.
///
/// Invariants: `total_qty == sum(destinations.qty)`, destination outlets are
/// pairwise distinct, and an outlet source never appears among destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: TransferId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub source: Location,
    pub source_label: String,
    pub total_qty: i64,
    pub note: String,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
    pub destinations: Vec<TransferDestination>,
}

impl Transfer {
    /// Check the header/destination invariants of an assembled transfer.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let sum: i64 = self.destinations.iter().map(|d| d.qty).sum();
        if sum != self.total_qty {
            return Err(DomainError::validation(format!(
                "transfer total {} does not match destination sum {sum}",
                self.total_qty
            )));
        }
        let pairs: Vec<(OutletId, i64)> =
            self.destinations.iter().map(|d| (d.outlet_id, d.qty)).collect();
        validate_destinations(self.source, &pairs).map(|_| ())
    }
}

/// Structural validation of a transfer request.
///
/// Returns the total quantity moved. Checks: at least one destination, every
/// quantity positive, no duplicate outlet, source outlet not among destinations.
pub fn validate_destinations(
    source: Location,
    destinations: &[(OutletId, i64)],
) -> DomainResult<i64> {
    if destinations.is_empty() {
        return Err(DomainError::validation("at least one destination is required"));
    }

    let mut seen = BTreeSet::new();
    let mut total: i64 = 0;
    for (outlet_id, qty) in destinations {
        if *qty <= 0 {
            return Err(DomainError::validation(format!(
                "destination qty must be > 0 (outlet {outlet_id})"
            )));
        }
        if !seen.insert(*outlet_id) {
            return Err(DomainError::duplicate_destination(outlet_id.to_string()));
        }
        if source == Location::Outlet(*outlet_id) {
            return Err(DomainError::invalid_destination(format!(
                "destination {outlet_id} is the transfer source"
            )));
        }
        total = total
            .checked_add(*qty)
            .ok_or_else(|| DomainError::validation("transfer total overflows"))?;
    }

    Ok(total)
}

/// Every location a transfer touches, in global lock order.
pub fn lock_order(source: Location, destinations: &[OutletId]) -> Vec<Location> {
    let mut all: Vec<Location> = destinations.iter().copied().map(Location::Outlet).collect();
    all.push(source);
    all.sort();
    all.dedup();
    all
}
