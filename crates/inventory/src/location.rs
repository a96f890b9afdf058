use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, OutletId};

/// Label used for the tenant's implicit central stock pool.
pub const CENTRAL_LABEL: &str = "Central";

/// Outlet code reserved for the implicit central equivalent.
pub const RESERVED_OUTLET_CODE: &str = "PST";

/// Kind of a stock location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Central,
    Outlet,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Central => "central",
            LocationKind::Outlet => "outlet",
        }
    }
}

impl FromStr for LocationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "central" => Ok(LocationKind::Central),
            "outlet" => Ok(LocationKind::Outlet),
            other => Err(DomainError::validation(format!(
                "location kind must be one of: central, outlet (got '{other}')"
            ))),
        }
    }
}

/// A balance-holding location.
///
/// The derived ordering is the global lock order: `Central` sorts before every
/// outlet, and outlets sort by ascending identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "outletId", rename_all = "lowercase")]
pub enum Location {
    Central,
    Outlet(OutletId),
}

impl Location {
    /// Build a location from its wire parts (`kind` + optional `outletId`).
    pub fn from_parts(
        kind: LocationKind,
        outlet_id: Option<OutletId>,
    ) -> Result<Self, DomainError> {
        match (kind, outlet_id) {
            (LocationKind::Central, _) => Ok(Location::Central),
            (LocationKind::Outlet, Some(id)) => Ok(Location::Outlet(id)),
            (LocationKind::Outlet, None) => {
                Err(DomainError::validation("outletId is required when location kind is outlet"))
            }
        }
    }

    pub fn kind(&self) -> LocationKind {
        match self {
            Location::Central => LocationKind::Central,
            Location::Outlet(_) => LocationKind::Outlet,
        }
    }

    pub fn outlet_id(&self) -> Option<OutletId> {
        match self {
            Location::Central => None,
            Location::Outlet(id) => Some(*id),
        }
    }

    /// Stable key: `central` or `outlet:<id>`.
    pub fn key(&self) -> String {
        match self {
            Location::Central => "central".to_string(),
            Location::Outlet(id) => format!("outlet:{id}"),
        }
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Which locations the low-stock aggregator scans.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum LocationFilter {
    /// Central plus every accessible outlet.
    #[default]
    All,
    Central,
    Outlet(OutletId),
}

const FILTER_SYNTAX: &str = "location must be all, central or outlet:<uuid>";

impl FromStr for LocationFilter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(LocationFilter::All),
            "central" => Ok(LocationFilter::Central),
            other => match other.strip_prefix("outlet:") {
                Some(id) => {
                    let id = id
                        .parse::<OutletId>()
                        .map_err(|_| DomainError::validation(FILTER_SYNTAX))?;
                    Ok(LocationFilter::Outlet(id))
                }
                None => Err(DomainError::validation(FILTER_SYNTAX)),
            },
        }
    }
}

impl core::fmt::Display for LocationFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LocationFilter::All => f.write_str("all"),
            LocationFilter::Central => f.write_str("central"),
            LocationFilter::Outlet(id) => write!(f, "outlet:{id}"),
        }
    }
}

impl Serialize for LocationFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
