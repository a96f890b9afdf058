//! Read-only audit view of a tenant's inventory.

use std::collections::BTreeSet;

use serde::Serialize;

use stockroom_auth::TenantAccess;
use stockroom_core::OutletId;
use stockroom_inventory::{BranchStock, Location, MovementRecord, Outlet, Product, Transfer};

use crate::error::StockError;
use crate::scope::visible_outlets;
use crate::store::StockStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub products: Vec<Product>,
    pub outlets: Vec<Outlet>,
    pub outlet_stocks: Vec<BranchStock>,
    /// Newest first.
    pub movements: Vec<MovementRecord>,
    /// Newest first.
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotReader;

impl SnapshotReader {
    pub async fn snapshot<S: StockStore>(
        &self,
        store: &S,
        access: &TenantAccess,
    ) -> Result<InventorySnapshot, StockError> {
        let tenant_id = access.tenant_id;

        let mut products = store.list_products(tenant_id).await?;
        products.sort_by(|a, b| a.name.cmp(&b.name));

        let outlets = visible_outlets(store, access).await?;
        let visible: BTreeSet<OutletId> = outlets.iter().map(|o| o.id).collect();
        let ids: Vec<OutletId> = visible.iter().copied().collect();

        let mut outlet_stocks = store.list_branch_stocks(tenant_id, &ids).await?;
        outlet_stocks.sort_by_key(|b| (b.outlet_id, b.product_id));

        let sees = |location: &Location| match location {
            Location::Central => true,
            Location::Outlet(id) => visible.contains(id),
        };

        let mut movements: Vec<MovementRecord> = store
            .list_movements(tenant_id)
            .await?
            .into_iter()
            .filter(|m| sees(&m.location))
            .collect();
        movements.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then_with(|| b.id.cmp(&a.id)));

        let mut transfers: Vec<Transfer> = store
            .list_transfers(tenant_id)
            .await?
            .into_iter()
            .filter_map(|mut t| {
                t.destinations.retain(|d| visible.contains(&d.outlet_id));
                (sees(&t.source) || !t.destinations.is_empty()).then_some(t)
            })
            .collect();
        transfers.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then_with(|| b.id.cmp(&a.id)));

        Ok(InventorySnapshot {
            products,
            outlets,
            outlet_stocks,
            movements,
            transfers,
        })
    }
}
