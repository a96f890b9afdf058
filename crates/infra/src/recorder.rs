//! Append-only movement log writer.

use chrono::{DateTime, Utc};

use stockroom_core::{MovementId, ProductId, TenantId, UserId};
use stockroom_inventory::{Location, MovementRecord, MovementType};

use crate::error::StockError;
use crate::store::StockTx;

/// A balance change that has already been applied by the ledger.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub location: Location,
    pub location_label: String,
    pub movement_type: MovementType,
    pub delta: i64,
    pub balance_after: i64,
    pub counted_stock: Option<i64>,
    pub note: String,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MovementRecorder;

impl MovementRecorder {
    /// Append one record in the caller's transaction.
    ///
    /// Must be called after the ledger update it describes, so
    /// `balance_after` is the value just written.
    pub async fn append<T: StockTx>(
        &self,
        tx: &mut T,
        movement: NewMovement,
    ) -> Result<MovementRecord, StockError> {
        let record = MovementRecord {
            id: MovementId::new(),
            tenant_id: movement.tenant_id,
            product_id: movement.product_id,
            location: movement.location,
            location_label: movement.location_label,
            movement_type: movement.movement_type,
            qty: movement.delta.abs(),
            delta: movement.delta,
            balance_after: movement.balance_after,
            counted_stock: movement.counted_stock,
            note: movement.note,
            actor_id: movement.actor_id,
            occurred_at: movement.occurred_at,
        };
        tx.append_movement(&record).await?;
        Ok(record)
    }
}
