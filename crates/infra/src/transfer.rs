//! Atomic one-to-many stock transfers.
//!
//! A transfer debits its source once and credits every destination, writes
//! one header, one `out` record at the source and one `in` record per
//! destination, all in the caller's transaction. Any failure leaves no trace.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use stockroom_auth::TenantAccess;
use stockroom_core::{DomainError, OutletId, TransferId};
use stockroom_inventory::{
    lock_order, resolve_note, CreateTransfer, DefaultNote, Location, MovementType, Outlet, Transfer,
    TransferDestination, CENTRAL_LABEL,
};

use crate::error::StockError;
use crate::ledger::StockLedger;
use crate::recorder::{MovementRecorder, NewMovement};
use crate::scope::{require_outlet, require_product};
use crate::store::StockTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub transfer_id: TransferId,
    pub total_qty: i64,
    pub source_balance_after: i64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransferCoordinator {
    ledger: StockLedger,
    recorder: MovementRecorder,
}

impl TransferCoordinator {
    pub fn new(ledger: StockLedger, recorder: MovementRecorder) -> Self {
        Self { ledger, recorder }
    }

    pub async fn transfer<T: StockTx>(
        &self,
        tx: &mut T,
        access: &TenantAccess,
        cmd: &CreateTransfer,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome, StockError> {
        let tenant_id = access.tenant_id;
        let total_qty = cmd.validate()?;
        let product = require_product(tx, access, cmd.product_id).await?;

        let source_label = match cmd.source {
            Location::Central => CENTRAL_LABEL.to_string(),
            Location::Outlet(outlet_id) => require_outlet(tx, access, outlet_id).await?.name,
        };

        let destination_ids = cmd.destination_ids();
        let outlets: HashMap<OutletId, Outlet> = tx
            .outlets(tenant_id, &destination_ids)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();
        for outlet_id in &destination_ids {
            if !outlets.contains_key(outlet_id) {
                let msg = format!("outlet {outlet_id} not found");
                return Err(DomainError::invalid_destination(msg).into());
            }
            access.ensure_outlet(*outlet_id)?;
        }

        let order = lock_order(cmd.source, &destination_ids);
        let locked = self.ledger.lock_in_order(tx, tenant_id, product.id, &order).await?;
        let available = locked.get(&cmd.source).copied().unwrap_or(0);
        if total_qty > available {
            return Err(DomainError::insufficient(total_qty, available).into());
        }
        debug!(
            product_id = %product.id,
            source = %cmd.source,
            total_qty,
            available,
            "transfer locks acquired"
        );

        let source_balance_after = self
            .ledger
            .apply_delta(tx, tenant_id, product.id, cmd.source, -total_qty)
            .await?;

        let mut credited = Vec::with_capacity(cmd.destinations.len());
        for (outlet_id, qty) in &cmd.destinations {
            let balance_after = self
                .ledger
                .apply_delta(tx, tenant_id, product.id, Location::Outlet(*outlet_id), *qty)
                .await?;
            let name = outlets
                .get(outlet_id)
                .map(|o| o.name.clone())
                .unwrap_or_default();
            credited.push((
                TransferDestination {
                    outlet_id: *outlet_id,
                    outlet_label: name,
                    qty: *qty,
                },
                balance_after,
            ));
        }

        let transfer = Transfer {
            id: TransferId::new(),
            tenant_id,
            product_id: product.id,
            source: cmd.source,
            source_label: source_label.clone(),
            total_qty,
            note: resolve_note(cmd.note.as_deref(), DefaultNote::Transfer),
            actor_id: access.actor,
            occurred_at: now,
            destinations: credited.iter().map(|(d, _)| d.clone()).collect(),
        };
        transfer.check_invariants()?;
        tx.insert_transfer(&transfer).await?;

        self.recorder
            .append(
                tx,
                NewMovement {
                    tenant_id,
                    product_id: product.id,
                    location: cmd.source,
                    location_label: source_label,
                    movement_type: MovementType::Out,
                    delta: -total_qty,
                    balance_after: source_balance_after,
                    counted_stock: None,
                    note: resolve_note(cmd.note.as_deref(), DefaultNote::TransferOut),
                    actor_id: access.actor,
                    occurred_at: now,
                },
            )
            .await?;

        for (dest, balance_after) in credited {
            self.recorder
                .append(
                    tx,
                    NewMovement {
                        tenant_id,
                        product_id: product.id,
                        location: Location::Outlet(dest.outlet_id),
                        location_label: dest.outlet_label,
                        movement_type: MovementType::In,
                        delta: dest.qty,
                        balance_after,
                        counted_stock: None,
                        note: resolve_note(cmd.note.as_deref(), DefaultNote::TransferIn),
                        actor_id: access.actor,
                        occurred_at: now,
                    },
                )
                .await?;
        }

        Ok(TransferOutcome {
            transfer_id: transfer.id,
            total_qty,
            source_balance_after,
        })
    }
}
