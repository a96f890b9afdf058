//! Low-stock candidates and their priority ordering.

use std::cmp::Ordering;

use serde::Serialize;

use stockroom_core::{OutletId, ProductId};

use crate::catalog::{Outlet, Product};
use crate::location::{Location, LocationKind, CENTRAL_LABEL};

pub const DEFAULT_ALERT_LIMIT: usize = 5;
pub const MAX_ALERT_LIMIT: usize = 50;

/// One (product, location) pair at or below its minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockCandidate {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub current_stock: i64,
    pub minimum_low_stock: i64,
    /// `max(0, minimum_low_stock - current_stock)`
    pub gap: i64,
    pub location_kind: LocationKind,
    pub location_key: String,
    pub location_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_id: Option<OutletId>,
}

impl LowStockCandidate {
    fn build(
        product: &Product,
        current_stock: i64,
        location: Location,
        label: String,
    ) -> Option<Self> {
        if current_stock > product.minimum_low_stock {
            return None;
        }
        Some(Self {
            product_id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            current_stock,
            minimum_low_stock: product.minimum_low_stock,
            gap: (product.minimum_low_stock - current_stock).max(0),
            location_kind: location.kind(),
            location_key: location.key(),
            location_label: label,
            outlet_id: location.outlet_id(),
        })
    }

    /// Candidate for the product's central balance, if low.
    pub fn central(product: &Product) -> Option<Self> {
        Self::build(product, product.central_stock, Location::Central, CENTRAL_LABEL.to_string())
    }

    /// Candidate for the product's balance at `outlet`, if low.
    pub fn at_outlet(product: &Product, outlet: &Outlet, current_stock: i64) -> Option<Self> {
        Self::build(product, current_stock, Location::Outlet(outlet.id), outlet.alert_label())
    }
}

/// Priority order: gap desc, current stock asc, location label asc, name asc.
pub fn priority(a: &LowStockCandidate, b: &LowStockCandidate) -> Ordering {
    b.gap
        .cmp(&a.gap)
        .then_with(|| a.current_stock.cmp(&b.current_stock))
        .then_with(|| a.location_label.cmp(&b.location_label))
        .then_with(|| a.name.cmp(&b.name))
}

/// Ranked, truncated candidates plus the untruncated count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockRanking {
    pub count: usize,
    pub items: Vec<LowStockCandidate>,
}

/// Sort by priority and keep at most `limit` (clamped to 1..=50) items.
pub fn rank_candidates(mut candidates: Vec<LowStockCandidate>, limit: usize) -> LowStockRanking {
    let limit = limit.clamp(1, MAX_ALERT_LIMIT);
    candidates.sort_by(priority);
    let count = candidates.len();
    candidates.truncate(limit);
    LowStockRanking {
        count,
        items: candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stockroom_core::{CategoryId, TenantId, UnitId};

    fn product(name: &str, central: i64, minimum: i64) -> Product {
        Product {
            id: ProductId::new(),
            tenant_id: TenantId::new(),
            name: name.to_string(),
            sku: name.to_uppercase(),
            category_id: CategoryId::new(),
            unit_id: UnitId::new(),
            central_stock: central,
            minimum_low_stock: minimum,
        }
    }

    fn outlet(name: &str, code: &str) -> Outlet {
        Outlet {
            id: OutletId::new(),
            tenant_id: TenantId::new(),
            name: name.to_string(),
            code: code.to_string(),
            address: "-".to_string(),
        }
    }

    #[test]
    fn stock_equal_to_minimum_is_low_with_zero_gap() {
        let c = LowStockCandidate::central(&product("A", 5, 5)).unwrap();
        assert_eq!(c.gap, 0);
        assert!(LowStockCandidate::central(&product("B", 6, 5)).is_none());
    }

    #[test]
    fn larger_gap_ranks_first_across_locations() {
        let a = product("A", 2, 5);
        let b = product("B", 100, 4);
        let kbj = outlet("Kebayoran", "KBJ");
        let candidates = vec![
            LowStockCandidate::central(&a).unwrap(),
            LowStockCandidate::at_outlet(&b, &kbj, 0).unwrap(),
        ];
        let ranked = rank_candidates(candidates, 5);
        assert_eq!(ranked.count, 2);
        assert_eq!(ranked.items[0].name, "B");
        assert_eq!(ranked.items[0].gap, 4);
        assert_eq!(ranked.items[0].location_key, format!("outlet:{}", kbj.id));
        assert_eq!(ranked.items[0].location_label, "Kebayoran (KBJ)");
        assert_eq!(ranked.items[1].location_label, CENTRAL_LABEL);
    }

    #[test]
    fn ties_break_on_stock_then_label_then_name() {
        let p1 = product("Zeta", 1, 3);
        let p2 = product("Alpha", 1, 3);
        let p3 = product("Mid", 0, 2);
        let out = outlet("Bandung", "BDG");
        let candidates = vec![
            LowStockCandidate::central(&p1).unwrap(),
            LowStockCandidate::at_outlet(&p1, &out, 1).unwrap(),
            LowStockCandidate::central(&p2).unwrap(),
            LowStockCandidate::central(&p3).unwrap(),
        ];
        let ranked = rank_candidates(candidates, 50);
        let order: Vec<(&str, &str)> = ranked
            .items
            .iter()
            .map(|c| (c.location_label.as_str(), c.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Central", "Mid"),
                ("Bandung (BDG)", "Zeta"),
                ("Central", "Alpha"),
                ("Central", "Zeta"),
            ]
        );
    }

    #[test]
    fn truncation_keeps_full_count() {
        let candidates: Vec<_> = (0..8)
            .map(|i| LowStockCandidate::central(&product(&format!("P{i}"), 0, i)).unwrap())
            .collect();
        let ranked = rank_candidates(candidates, 3);
        assert_eq!(ranked.count, 8);
        assert_eq!(ranked.items.len(), 3);
        assert_eq!(ranked.items[0].gap, 7);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: output is ordered by priority, bounded by limit, and the count is untruncated.
        #[test]
        fn ranking_is_ordered_and_bounded(
            rows in prop::collection::vec((0i64..20, 0i64..20), 0..40),
            limit in 1usize..60,
        ) {
            let candidates: Vec<_> = rows
                .iter()
                .enumerate()
                .filter_map(|(i, (stock, min))| {
                    LowStockCandidate::central(&product(&format!("P{i:02}"), *stock, *min))
                })
                .collect();
            let expected = candidates.len();
            let ranked = rank_candidates(candidates, limit);

            prop_assert_eq!(ranked.count, expected);
            prop_assert!(ranked.items.len() <= limit.min(MAX_ALERT_LIMIT));
            prop_assert_eq!(ranked.items.len(), expected.min(limit.min(MAX_ALERT_LIMIT)));
            for w in ranked.items.windows(2) {
                prop_assert!(priority(&w[0], &w[1]) != Ordering::Greater);
            }
            for c in &ranked.items {
                prop_assert!(c.current_stock <= c.minimum_low_stock);
                prop_assert_eq!(c.gap, c.minimum_low_stock - c.current_stock);
            }
        }
    }
}
