//! Tenant and outlet resolution shared by the mutating components.
//!
//! These reads run inside the operation's transaction, so every retry
//! attempt re-validates against current state.

use stockroom_auth::TenantAccess;
use stockroom_core::{DomainError, OutletId, ProductId};
use stockroom_inventory::{Location, Outlet, Product, CENTRAL_LABEL};

use crate::error::StockError;
use crate::store::{StockStore, StockTx};

pub(crate) async fn require_product<T: StockTx>(
    tx: &mut T,
    access: &TenantAccess,
    product_id: ProductId,
) -> Result<Product, StockError> {
    tx.product(access.tenant_id, product_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("product {product_id}")).into())
}

pub(crate) async fn require_outlet<T: StockTx>(
    tx: &mut T,
    access: &TenantAccess,
    outlet_id: OutletId,
) -> Result<Outlet, StockError> {
    let outlet = tx
        .outlets(access.tenant_id, &[outlet_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::not_found(format!("outlet {outlet_id}")))?;
    access.ensure_outlet(outlet_id)?;
    Ok(outlet)
}

/// Validate a location for the actor and return its movement label.
pub(crate) async fn location_label<T: StockTx>(
    tx: &mut T,
    access: &TenantAccess,
    location: Location,
) -> Result<String, StockError> {
    match location {
        Location::Central => Ok(CENTRAL_LABEL.to_string()),
        Location::Outlet(outlet_id) => Ok(require_outlet(tx, access, outlet_id).await?.name),
    }
}

/// Tenant outlets the actor may see, sorted by name.
pub(crate) async fn visible_outlets<S: StockStore>(
    store: &S,
    access: &TenantAccess,
) -> Result<Vec<Outlet>, StockError> {
    let mut outlets: Vec<Outlet> = store
        .list_outlets(access.tenant_id)
        .await?
        .into_iter()
        .filter(|o| access.permits_outlet(o.id))
        .collect();
    outlets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
    Ok(outlets)
}
