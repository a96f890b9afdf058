//! Product and outlet registration.

use chrono::{DateTime, Utc};

use stockroom_auth::TenantAccess;
use stockroom_core::{DomainError, OutletId, ProductId};
use stockroom_inventory::{
    resolve_note, DefaultNote, Location, MovementType, NewOutlet, NewProduct, Outlet, Product,
    CENTRAL_LABEL,
};

use crate::error::StockError;
use crate::recorder::{MovementRecorder, NewMovement};
use crate::store::StockTx;

#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogRegistrar {
    recorder: MovementRecorder,
}

impl CatalogRegistrar {
    pub fn new(recorder: MovementRecorder) -> Self {
        Self { recorder }
    }

    pub async fn register_outlet<T: StockTx>(
        &self,
        tx: &mut T,
        access: &TenantAccess,
        input: NewOutlet,
    ) -> Result<Outlet, StockError> {
        let outlet = input.into_outlet(access.tenant_id, OutletId::new())?;
        if tx.outlet_code_exists(access.tenant_id, &outlet.code).await? {
            let msg = format!("outlet code {} already exists", outlet.code);
            return Err(DomainError::validation(msg).into());
        }
        tx.insert_outlet(&outlet).await?;
        Ok(outlet)
    }

    /// Insert a product; a positive opening balance is logged as a central
    /// `in` movement in the same transaction.
    pub async fn register_product<T: StockTx>(
        &self,
        tx: &mut T,
        access: &TenantAccess,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StockError> {
        let product = input.into_product(access.tenant_id, ProductId::new())?;
        if tx.sku_exists(access.tenant_id, &product.sku).await? {
            let msg = format!("sku {} already exists", product.sku);
            return Err(DomainError::validation(msg).into());
        }
        tx.insert_product(&product).await?;

        if product.central_stock > 0 {
            self.recorder
                .append(
                    tx,
                    NewMovement {
                        tenant_id: access.tenant_id,
                        product_id: product.id,
                        location: Location::Central,
                        location_label: CENTRAL_LABEL.to_string(),
                        movement_type: MovementType::In,
                        delta: product.central_stock,
                        balance_after: product.central_stock,
                        counted_stock: None,
                        note: resolve_note(None, DefaultNote::InitialStock),
                        actor_id: access.actor,
                        occurred_at: now,
                    },
                )
                .await?;
        }
        Ok(product)
    }
}
