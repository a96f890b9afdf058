//! Physical-count reconciliation.
//!
//! An opname sets the balance to the counted value and logs the signed
//! difference. A count equal to the balance still produces a record with
//! delta 0, so the count itself is auditable.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_auth::TenantAccess;
use stockroom_core::MovementId;
use stockroom_inventory::{resolve_note, CreateOpname, DefaultNote, MovementType};

use crate::error::StockError;
use crate::ledger::StockLedger;
use crate::recorder::{MovementRecorder, NewMovement};
use crate::scope::{location_label, require_product};
use crate::store::StockTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpnameOutcome {
    pub movement_id: MovementId,
    pub delta: i64,
    pub balance_after: i64,
    pub changed: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpnameReconciler {
    ledger: StockLedger,
    recorder: MovementRecorder,
}

impl OpnameReconciler {
    pub fn new(ledger: StockLedger, recorder: MovementRecorder) -> Self {
        Self { ledger, recorder }
    }

    pub async fn reconcile<T: StockTx>(
        &self,
        tx: &mut T,
        access: &TenantAccess,
        cmd: &CreateOpname,
        now: DateTime<Utc>,
    ) -> Result<OpnameOutcome, StockError> {
        cmd.validate()?;
        let product = require_product(tx, access, cmd.product_id).await?;
        let label = location_label(tx, access, cmd.location).await?;

        let (prior, balance_after) = self
            .ledger
            .set_balance(tx, access.tenant_id, product.id, cmd.location, cmd.actual_stock)
            .await?;
        let delta = balance_after - prior;

        let record = self
            .recorder
            .append(
                tx,
                NewMovement {
                    tenant_id: access.tenant_id,
                    product_id: product.id,
                    location: cmd.location,
                    location_label: label,
                    movement_type: MovementType::Opname,
                    delta,
                    balance_after,
                    counted_stock: Some(cmd.actual_stock),
                    note: resolve_note(cmd.note.as_deref(), DefaultNote::Opname),
                    actor_id: access.actor,
                    occurred_at: now,
                },
            )
            .await?;

        Ok(OpnameOutcome {
            movement_id: record.id,
            delta,
            balance_after,
            changed: delta != 0,
        })
    }
}
