//! Integration tests for the transactional stock pipeline.
//!
//! Tests: StockService → StockLedger/MovementRecorder → InMemoryStockStore
//!
//! Verifies:
//! - Balances never go negative and failed operations leave no trace
//! - Every movement's `balance_after` chains from the previous one
//! - Transfers are atomic and deadlock-free under reversed concurrent ordering
//! - Low-stock ranking and scope rules

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use stockroom_auth::{Role, TenantAccess};
    use stockroom_core::{CategoryId, OutletId, ProductId, TenantId, UnitId, UserId};
    use stockroom_inventory::{
        CreateMovement, CreateOpname, CreateTransfer, Location, LocationFilter, LowStockQuery,
        MovementType, NewOutlet, NewProduct, Outlet, Product, StockDirection,
    };

    use crate::error::StockError;
    use crate::retry::RetryPolicy;
    use crate::service::StockService;
    use crate::store::{InMemoryStockStore, StockStore};

    type Service = StockService<InMemoryStockStore>;

    fn service() -> Service {
        StockService::new(InMemoryStockStore::new(Duration::from_millis(500)))
            .with_retry(RetryPolicy::new(5, Duration::from_millis(5)))
    }

    fn owner(tenant_id: TenantId) -> TenantAccess {
        TenantAccess::new(tenant_id, UserId::new(), Role::OWNER, [], true)
    }

    async fn product(
        svc: &Service,
        access: &TenantAccess,
        name: &str,
        initial: i64,
        minimum: i64,
    ) -> Product {
        svc.register_product(
            access,
            NewProduct {
                name: name.to_string(),
                sku: format!("sku-{name}"),
                category_id: CategoryId::new(),
                unit_id: UnitId::new(),
                initial_stock: initial,
                minimum_low_stock: minimum,
            },
        )
        .await
        .unwrap()
    }

    async fn outlet(svc: &Service, access: &TenantAccess, name: &str, code: &str) -> Outlet {
        svc.register_outlet(
            access,
            NewOutlet {
                name: name.to_string(),
                code: code.to_string(),
                address: "Jl. Melati 1".to_string(),
            },
        )
        .await
        .unwrap()
    }

    fn movement(
        product_id: ProductId,
        qty: i64,
        direction: StockDirection,
        location: Location,
    ) -> CreateMovement {
        CreateMovement {
            product_id,
            qty,
            direction,
            location,
            note: None,
        }
    }

    fn transfer(
        product_id: ProductId,
        source: Location,
        destinations: Vec<(OutletId, i64)>,
    ) -> CreateTransfer {
        CreateTransfer {
            product_id,
            source,
            destinations,
            note: None,
        }
    }

    async fn balance(
        svc: &Service,
        access: &TenantAccess,
        product_id: ProductId,
        location: Location,
    ) -> i64 {
        svc.balance(access, product_id, location).await.unwrap()
    }

    /// Every (product, location) history starts from 0, each record chains from
    /// the previous one, and the last record equals the committed balance.
    async fn assert_ledger_consistent(svc: &Service, access: &TenantAccess) {
        let records = svc.store().list_movements(access.tenant_id).await.unwrap();
        let mut last: HashMap<(ProductId, Location), i64> = HashMap::new();
        for r in &records {
            let prior = last.get(&(r.product_id, r.location)).copied().unwrap_or(0);
            assert_eq!(r.prior_balance(), prior, "record {} does not chain", r.id);
            assert_eq!(r.qty, r.delta.abs());
            assert!(r.balance_after >= 0);
            last.insert((r.product_id, r.location), r.balance_after);
        }
        for ((product_id, location), expected) in last {
            assert_eq!(balance(svc, access, product_id, location).await, expected);
        }
        for t in svc.store().list_transfers(access.tenant_id).await.unwrap() {
            t.check_invariants().unwrap();
        }
    }

    #[tokio::test]
    async fn scenario_a_out_movement_cannot_overdraw() {
        let svc = service();
        let access = owner(TenantId::new());
        let p = product(&svc, &access, "Kopi", 10, 0).await;

        let err = svc
            .create_movement(&access, movement(p.id, 999, StockDirection::Out, Location::Central))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                requested: 999,
                available: 10
            }
        );
        assert_eq!(balance(&svc, &access, p.id, Location::Central).await, 10);
        assert_eq!(svc.store().list_movements(access.tenant_id).await.unwrap().len(), 1);

        let ok = svc
            .create_movement(&access, movement(p.id, 3, StockDirection::Out, Location::Central))
            .await
            .unwrap();
        assert_eq!(ok.balance_after, 7);
        assert_eq!(balance(&svc, &access, p.id, Location::Central).await, 7);
        assert_ledger_consistent(&svc, &access).await;
    }

    #[tokio::test]
    async fn scenario_b_outlet_gap_outranks_central_gap() {
        let svc = service();
        let access = owner(TenantId::new());
        let a = product(&svc, &access, "A", 2, 5).await;
        let b = product(&svc, &access, "B", 100, 4).await;
        let kbj = outlet(&svc, &access, "Kebayoran", "KBJ").await;

        // Counting 0 at KBJ materialises B's outlet balance.
        svc.create_opname(
            &access,
            CreateOpname {
                product_id: b.id,
                actual_stock: 0,
                location: Location::Outlet(kbj.id),
                note: None,
            },
        )
        .await
        .unwrap();

        let query = LowStockQuery::new(Some(LocationFilter::All), Some(5)).unwrap();
        let alerts = svc.low_stock_alerts(&access, query).await.unwrap();

        assert_eq!(alerts.low_stock_count, 2);
        let first = &alerts.low_stock_priorities[0];
        assert_eq!(first.product_id, b.id);
        assert_eq!(first.gap, 4);
        assert_eq!(first.location_key, format!("outlet:{}", kbj.id));
        assert_eq!(first.location_label, "Kebayoran (KBJ)");
        let second = &alerts.low_stock_priorities[1];
        assert_eq!(second.product_id, a.id);
        assert_eq!(second.gap, 3);
        assert_eq!(second.location_key, "central");
    }

    #[tokio::test]
    async fn scenario_c_transfer_then_outlet_out() {
        let svc = service();
        let access = owner(TenantId::new());
        let c = product(&svc, &access, "C", 10, 0).await;
        let x = outlet(&svc, &access, "Outlet X", "OX").await;

        let moved = svc
            .create_transfer(&access, transfer(c.id, Location::Central, vec![(x.id, 2)]))
            .await
            .unwrap();
        assert_eq!(moved.total_qty, 2);
        assert_eq!(moved.source_balance_after, 8);

        let cmd = movement(c.id, 2, StockDirection::Out, Location::Outlet(x.id));
        let out = svc.create_movement(&access, cmd).await.unwrap();
        assert_eq!(out.balance_after, 0);

        assert_eq!(balance(&svc, &access, c.id, Location::Outlet(x.id)).await, 0);
        assert_eq!(balance(&svc, &access, c.id, Location::Central).await, 8);

        let records: Vec<_> = svc
            .store()
            .list_movements(access.tenant_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.note != "initial stock")
            .collect();
        assert_eq!(records.len(), 3);
        let trail: Vec<_> = records
            .iter()
            .map(|r| (r.location, r.movement_type, r.note.as_str()))
            .collect();
        assert_eq!(
            trail,
            vec![
                (Location::Central, MovementType::Out, "transfer out"),
                (Location::Outlet(x.id), MovementType::In, "transfer in"),
                (Location::Outlet(x.id), MovementType::Out, "stock out"),
            ]
        );
        assert_ledger_consistent(&svc, &access).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scenario_d_reversed_concurrent_transfers_do_not_deadlock() {
        let svc = Arc::new(service());
        let access = owner(TenantId::new());
        let p = product(&svc, &access, "D", 1_000, 0).await;
        let x = outlet(&svc, &access, "Outlet X", "OX").await;
        let y = outlet(&svc, &access, "Outlet Y", "OY").await;

        // Seed both outlets so outlet-to-outlet transfers can run in both directions.
        let seed = transfer(p.id, Location::Central, vec![(x.id, 100), (y.id, 100)]);
        svc.create_transfer(&access, seed).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let svc = svc.clone();
            let access = access.clone();
            let cmd = match i % 4 {
                0 => transfer(p.id, Location::Central, vec![(x.id, 1), (y.id, 1)]),
                1 => transfer(p.id, Location::Central, vec![(y.id, 1), (x.id, 1)]),
                2 => transfer(p.id, Location::Outlet(x.id), vec![(y.id, 1)]),
                _ => transfer(p.id, Location::Outlet(y.id), vec![(x.id, 1)]),
            };
            handles.push(tokio::spawn(async move { svc.create_transfer(&access, cmd).await }));
        }

        let joined = tokio::time::timeout(Duration::from_secs(20), async {
            let mut results = Vec::new();
            for h in handles {
                results.push(h.await.unwrap());
            }
            results
        })
        .await
        .expect("transfers deadlocked");
        assert!(joined.iter().all(Result::is_ok), "{joined:?}");

        // 20 central transfers of 2 units each leave the source.
        assert_eq!(balance(&svc, &access, p.id, Location::Central).await, 1_000 - 200 - 40);
        let at_x = balance(&svc, &access, p.id, Location::Outlet(x.id)).await;
        let at_y = balance(&svc, &access, p.id, Location::Outlet(y.id)).await;
        assert_eq!(at_x + at_y, 240);
        assert_eq!(at_x, 120);
        assert_eq!(at_y, 120);
        assert_ledger_consistent(&svc, &access).await;
    }

    #[tokio::test]
    async fn failed_transfer_leaves_no_trace() {
        let svc = service();
        let access = owner(TenantId::new());
        let p = product(&svc, &access, "P", 5, 0).await;
        let x = outlet(&svc, &access, "Outlet X", "OX").await;
        let y = outlet(&svc, &access, "Outlet Y", "OY").await;

        let err = svc
            .create_transfer(&access, transfer(p.id, Location::Central, vec![(x.id, 3), (y.id, 3)]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                requested: 6,
                available: 5
            }
        );

        let foreign = outlet(&svc, &owner(TenantId::new()), "Elsewhere", "EL").await;
        let cmd = transfer(p.id, Location::Central, vec![(x.id, 1), (foreign.id, 1)]);
        let err = svc.create_transfer(&access, cmd).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidDestination(_)));

        assert_eq!(balance(&svc, &access, p.id, Location::Central).await, 5);
        assert!(svc.store().list_transfers(access.tenant_id).await.unwrap().is_empty());
        assert_eq!(svc.store().list_movements(access.tenant_id).await.unwrap().len(), 1);
        assert!(svc
            .store()
            .list_branch_stocks(access.tenant_id, &[x.id, y.id])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn structural_transfer_errors_are_reported() {
        let svc = service();
        let access = owner(TenantId::new());
        let p = product(&svc, &access, "P", 5, 0).await;
        let x = outlet(&svc, &access, "Outlet X", "OX").await;

        let dup = svc
            .create_transfer(&access, transfer(p.id, Location::Central, vec![(x.id, 1), (x.id, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(dup, StockError::DuplicateDestination(_)));

        let to_self = svc
            .create_transfer(&access, transfer(p.id, Location::Outlet(x.id), vec![(x.id, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(to_self, StockError::InvalidDestination(_)));

        let empty = svc
            .create_transfer(&access, transfer(p.id, Location::Central, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(empty, StockError::Validation(_)));
    }

    #[tokio::test]
    async fn opname_sets_absolute_balance_and_logs_zero_deltas() {
        let svc = service();
        let access = owner(TenantId::new());
        let p = product(&svc, &access, "P", 10, 0).await;
        let count = |actual_stock| CreateOpname {
            product_id: p.id,
            actual_stock,
            location: Location::Central,
            note: Some("  ".to_string()),
        };

        let down = svc.create_opname(&access, count(6)).await.unwrap();
        assert_eq!((down.delta, down.balance_after, down.changed), (-4, 6, true));

        let same = svc.create_opname(&access, count(6)).await.unwrap();
        assert_eq!((same.delta, same.balance_after, same.changed), (0, 6, false));

        let records = svc.store().list_movements(access.tenant_id).await.unwrap();
        let opnames: Vec<_> = records
            .iter()
            .filter(|r| r.movement_type == MovementType::Opname)
            .collect();
        assert_eq!(opnames.len(), 2);
        assert_eq!(opnames[0].qty, 4);
        assert_eq!(opnames[0].counted_stock, Some(6));
        assert_eq!(opnames[1].delta, 0);
        assert_eq!(opnames[1].note, "opname adjustment");
        assert_ledger_consistent(&svc, &access).await;
    }

    #[tokio::test]
    async fn read_only_tenant_cannot_mutate() {
        let svc = service();
        let writable = owner(TenantId::new());
        let p = product(&svc, &writable, "P", 3, 0).await;
        let read_only = TenantAccess {
            writable_now: false,
            ..writable.clone()
        };

        let err = svc
            .create_movement(&read_only, movement(p.id, 1, StockDirection::In, Location::Central))
            .await
            .unwrap_err();
        assert_eq!(err, StockError::ReadOnly);
        assert_eq!(err.kind(), "read_only");

        // Reads stay available.
        svc.inventory_snapshot(&read_only).await.unwrap();
        assert_eq!(balance(&svc, &writable, p.id, Location::Central).await, 3);
    }

    #[tokio::test]
    async fn staff_are_confined_to_assigned_outlets() {
        let svc = service();
        let tenant_id = TenantId::new();
        let admin = owner(tenant_id);
        let p = product(&svc, &admin, "P", 50, 10).await;
        let x = outlet(&svc, &admin, "Outlet X", "OX").await;
        let y = outlet(&svc, &admin, "Outlet Y", "OY").await;
        svc.create_transfer(&admin, transfer(p.id, Location::Central, vec![(x.id, 5), (y.id, 5)]))
            .await
            .unwrap();

        let staff = TenantAccess::new(tenant_id, UserId::new(), Role::STAFF, [x.id], true);

        let err = svc
            .create_movement(&staff, movement(p.id, 1, StockDirection::Out, Location::Outlet(y.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::ScopeViolation(_)));

        let err = svc
            .create_transfer(&staff, transfer(p.id, Location::Central, vec![(y.id, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::ScopeViolation(_)));

        let query = LowStockQuery::new(Some(LocationFilter::Outlet(y.id)), None).unwrap();
        let err = svc.low_stock_alerts(&staff, query).await.unwrap_err();
        assert!(matches!(err, StockError::ScopeViolation(_)));

        let foreign = OutletId::new();
        let query = LowStockQuery::new(Some(LocationFilter::Outlet(foreign)), None).unwrap();
        let err = svc.low_stock_alerts(&staff, query).await.unwrap_err();
        assert!(matches!(err, StockError::NotFound(_)));

        let alerts = svc
            .low_stock_alerts(&staff, LowStockQuery::new(None, Some(50)).unwrap())
            .await
            .unwrap();
        assert!(alerts
            .low_stock_priorities
            .iter()
            .all(|c| c.outlet_id != Some(y.id)));
        assert!(alerts.low_stock_priorities.iter().any(|c| c.outlet_id == Some(x.id)));

        let snapshot = svc.inventory_snapshot(&staff).await.unwrap();
        assert_eq!(snapshot.outlets.len(), 1);
        assert!(snapshot.movements.iter().all(|m| m.location != Location::Outlet(y.id)));
        assert_eq!(snapshot.transfers.len(), 1);
        assert_eq!(snapshot.transfers[0].destinations.len(), 1);
        assert_eq!(snapshot.transfers[0].destinations[0].outlet_id, x.id);

        svc.create_movement(&staff, movement(p.id, 1, StockDirection::Out, Location::Outlet(x.id)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tenants_never_see_each_other() {
        let svc = service();
        let t1 = owner(TenantId::new());
        let t2 = owner(TenantId::new());
        let p = product(&svc, &t1, "P", 5, 0).await;

        let err = svc
            .create_movement(&t2, movement(p.id, 1, StockDirection::In, Location::Central))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::NotFound(_)));

        let x = outlet(&svc, &t1, "Outlet X", "OX").await;
        let cmd = movement(p.id, 1, StockDirection::In, Location::Outlet(OutletId::new()));
        let err = svc.create_movement(&t1, cmd).await.unwrap_err();
        assert!(matches!(err, StockError::NotFound(_)));

        let snapshot = svc.inventory_snapshot(&t2).await.unwrap();
        assert!(snapshot.products.is_empty());
        assert!(snapshot.outlets.iter().all(|o| o.id != x.id));
    }

    #[tokio::test]
    async fn registration_enforces_unique_codes_and_skus() {
        let svc = service();
        let access = owner(TenantId::new());
        product(&svc, &access, "P", 0, 0).await;
        outlet(&svc, &access, "Outlet X", "ox").await;

        let err = svc
            .register_product(
                &access,
                NewProduct {
                    name: "Other".to_string(),
                    sku: "SKU-p".to_string(),
                    category_id: CategoryId::new(),
                    unit_id: UnitId::new(),
                    initial_stock: 0,
                    minimum_low_stock: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));

        let err = svc
            .register_outlet(
                &access,
                NewOutlet {
                    name: "Again".to_string(),
                    code: "OX".to_string(),
                    address: "-".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));

        let err = svc
            .register_outlet(
                &access,
                NewOutlet {
                    name: "Pusat".to_string(),
                    code: "pst".to_string(),
                    address: "-".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));

        // Zero opening stock logs nothing.
        assert!(svc.store().list_movements(access.tenant_id).await.unwrap().is_empty());
    }
}
