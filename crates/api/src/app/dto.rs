use serde::Deserialize;

use stockroom_core::{CategoryId, DomainResult, OutletId, ProductId, UnitId};
use stockroom_inventory::{
    CreateMovement, CreateOpname, CreateTransfer, Location, LocationFilter, LocationKind,
    LowStockQuery, NewOutlet, NewProduct, StockDirection,
};

// -------------------------
// Request DTOs
// -------------------------

/// `{kind: central|outlet, outletId?}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    pub kind: LocationKind,
    pub outlet_id: Option<OutletId>,
}

impl LocationRequest {
    pub fn into_location(self) -> DomainResult<Location> {
        Location::from_parts(self.kind, self.outlet_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: String,
    pub category_id: CategoryId,
    pub unit_id: UnitId,
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default)]
    pub minimum_low_stock: i64,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(body: CreateProductRequest) -> Self {
        NewProduct {
            name: body.name,
            sku: body.sku,
            category_id: body.category_id,
            unit_id: body.unit_id,
            initial_stock: body.initial_stock,
            minimum_low_stock: body.minimum_low_stock,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutletRequest {
    pub name: String,
    pub code: String,
    pub address: String,
}

impl From<CreateOutletRequest> for NewOutlet {
    fn from(body: CreateOutletRequest) -> Self {
        NewOutlet {
            name: body.name,
            code: body.code,
            address: body.address,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovementRequest {
    pub product_id: ProductId,
    pub qty: i64,
    #[serde(rename = "type")]
    pub direction: StockDirection,
    pub location: LocationRequest,
    pub note: Option<String>,
}

impl CreateMovementRequest {
    pub fn into_command(self) -> DomainResult<CreateMovement> {
        Ok(CreateMovement {
            product_id: self.product_id,
            qty: self.qty,
            direction: self.direction,
            location: self.location.into_location()?,
            note: self.note,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpnameRequest {
    pub product_id: ProductId,
    pub actual_stock: i64,
    pub location: LocationRequest,
    pub note: Option<String>,
}

impl CreateOpnameRequest {
    pub fn into_command(self) -> DomainResult<CreateOpname> {
        Ok(CreateOpname {
            product_id: self.product_id,
            actual_stock: self.actual_stock,
            location: self.location.into_location()?,
            note: self.note,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDestinationRequest {
    pub outlet_id: OutletId,
    pub qty: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub product_id: ProductId,
    pub source: LocationRequest,
    pub destinations: Vec<TransferDestinationRequest>,
    pub note: Option<String>,
}

impl CreateTransferRequest {
    pub fn into_command(self) -> DomainResult<CreateTransfer> {
        Ok(CreateTransfer {
            product_id: self.product_id,
            source: self.source.into_location()?,
            destinations: self.destinations.into_iter().map(|d| (d.outlet_id, d.qty)).collect(),
            note: self.note,
        })
    }
}

// -------------------------
// Query DTOs
// -------------------------

/// `?location=all|central|outlet:<uuid>&limit=1..50`
#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub location: Option<String>,
    pub limit: Option<i64>,
}

impl AlertsQuery {
    pub fn into_query(self) -> DomainResult<LowStockQuery> {
        let filter = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<LocationFilter>)
            .transpose()?;
        LowStockQuery::new(filter, self.limit)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQuery {
    pub product_id: ProductId,
    pub location_kind: LocationKind,
    pub outlet_id: Option<OutletId>,
}

impl BalanceQuery {
    pub fn location(&self) -> DomainResult<Location> {
        Location::from_parts(self.location_kind, self.outlet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockroom_core::DomainError;

    #[test]
    fn movement_body_maps_onto_command() {
        let outlet = OutletId::new();
        let body: CreateMovementRequest = serde_json::from_value(json!({
            "productId": ProductId::new(),
            "qty": 3,
            "type": "out",
            "location": { "kind": "outlet", "outletId": outlet },
            "note": "damaged",
        }))
        .unwrap();
        let cmd = body.into_command().unwrap();
        assert_eq!(cmd.direction, StockDirection::Out);
        assert_eq!(cmd.location, Location::Outlet(outlet));
    }

    #[test]
    fn outlet_location_without_id_is_a_validation_error() {
        let body: CreateOpnameRequest = serde_json::from_value(json!({
            "productId": ProductId::new(),
            "actualStock": 0,
            "location": { "kind": "outlet" },
        }))
        .unwrap();
        assert!(matches!(body.into_command(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn alerts_query_defaults_and_bounds() {
        let query = AlertsQuery::default().into_query().unwrap();
        assert_eq!(query.filter, LocationFilter::All);
        assert_eq!(query.limit, 5);

        let bad = AlertsQuery {
            location: Some("warehouse".into()),
            limit: None,
        };
        assert!(bad.into_query().is_err());

        let too_many = AlertsQuery {
            location: Some("central".into()),
            limit: Some(51),
        };
        assert!(too_many.into_query().is_err());
    }
}
