//! Low-stock dashboard aggregation.
//!
//! Reads committed state only; takes no locks. An outlet contributes a
//! candidate for a product when a branch-stock row exists for the pair or
//! the pair appears in the movement log or transfer history.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_auth::TenantAccess;
use stockroom_core::{DomainError, OutletId, ProductId};
use stockroom_inventory::{
    rank_candidates, LocationFilter, LowStockCandidate, LowStockQuery, Outlet, Product,
};

use crate::error::StockError;
use crate::scope::visible_outlets;
use crate::store::StockStore;

/// Branch balances keyed by (outlet, product), and the products each outlet has touched.
type OutletActivity = (HashMap<(OutletId, ProductId), i64>, HashMap<OutletId, BTreeSet<ProductId>>);

/// Dashboard payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockAlerts {
    pub location_filter: LocationFilter,
    pub low_stock_count: usize,
    pub low_stock_priorities: Vec<LowStockCandidate>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LowStockAlertAggregator;

impl LowStockAlertAggregator {
    pub async fn alerts<S: StockStore>(
        &self,
        store: &S,
        access: &TenantAccess,
        query: LowStockQuery,
        now: DateTime<Utc>,
    ) -> Result<LowStockAlerts, StockError> {
        let visible = visible_outlets(store, access).await?;
        let scanned: Vec<&Outlet> = match query.filter {
            LocationFilter::All => visible.iter().collect(),
            LocationFilter::Central => Vec::new(),
            LocationFilter::Outlet(outlet_id) => match visible.iter().find(|o| o.id == outlet_id) {
                Some(outlet) => vec![outlet],
                None => {
                    // Same order as mutations: unknown in the tenant first, then scope.
                    let owned = store
                        .list_outlets(access.tenant_id)
                        .await?
                        .iter()
                        .any(|o| o.id == outlet_id);
                    let err = if owned {
                        DomainError::scope(format!("outlet {outlet_id}"))
                    } else {
                        DomainError::not_found(format!("outlet {outlet_id}"))
                    };
                    return Err(err.into());
                }
            },
        };

        let mut products = store.list_products(access.tenant_id).await?;
        products.sort_by(|a, b| a.name.cmp(&b.name));

        let mut candidates = Vec::new();
        if matches!(query.filter, LocationFilter::All | LocationFilter::Central) {
            candidates.extend(products.iter().filter_map(LowStockCandidate::central));
        }

        if !scanned.is_empty() {
            let ids: Vec<OutletId> = scanned.iter().map(|o| o.id).collect();
            let (balances, active) = self.outlet_activity(store, access, &ids).await?;
            let by_id: HashMap<_, &Product> = products.iter().map(|p| (p.id, p)).collect();

            for outlet in &scanned {
                let Some(product_ids) = active.get(&outlet.id) else {
                    continue;
                };
                for product_id in product_ids {
                    let Some(product) = by_id.get(product_id) else {
                        continue;
                    };
                    let current = balances.get(&(outlet.id, *product_id)).copied().unwrap_or(0);
                    if let Some(c) = LowStockCandidate::at_outlet(product, outlet, current) {
                        candidates.push(c);
                    }
                }
            }
        }

        let ranking = rank_candidates(candidates, query.limit);
        Ok(LowStockAlerts {
            location_filter: query.filter,
            low_stock_count: ranking.count,
            low_stock_priorities: ranking.items,
            as_of: now,
        })
    }

    /// Branch balances plus the active products per outlet.
    async fn outlet_activity<S: StockStore>(
        &self,
        store: &S,
        access: &TenantAccess,
        outlet_ids: &[OutletId],
    ) -> Result<OutletActivity, StockError> {
        let stocks = store.list_branch_stocks(access.tenant_id, outlet_ids).await?;
        let touched = store.touched_outlet_products(access.tenant_id, outlet_ids).await?;

        let mut active: HashMap<OutletId, BTreeSet<ProductId>> = HashMap::new();
        for (outlet_id, product_id) in touched {
            active.entry(outlet_id).or_default().insert(product_id);
        }
        let mut balances = HashMap::with_capacity(stocks.len());
        for row in stocks {
            active.entry(row.outlet_id).or_default().insert(row.product_id);
            balances.insert((row.outlet_id, row.product_id), row.qty);
        }
        Ok((balances, active))
    }
}
