//! Catalog records the ledger reads: products (which carry the central
//! balance) and outlets, plus the lazily-created per-outlet balance row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, OutletId, ProductId, TenantId, UnitId};

use crate::location::RESERVED_OUTLET_CODE;

/// Tenant-scoped product. `central_stock` is the central balance itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub sku: String,
    pub category_id: CategoryId,
    pub unit_id: UnitId,
    pub central_stock: i64,
    pub minimum_low_stock: i64,
}

/// Tenant-scoped physical location with its own per-product balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outlet {
    pub id: OutletId,
    pub tenant_id: TenantId,
    pub name: String,
    pub code: String,
    pub address: String,
}

impl Outlet {
    /// Label used in low-stock items: `"<name> (<code>)"`.
    pub fn alert_label(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }
}

/// Balance of one product at one outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStock {
    pub tenant_id: TenantId,
    pub outlet_id: OutletId,
    pub product_id: ProductId,
    pub qty: i64,
    pub updated_at: DateTime<Utc>,
}

/// Trim and upper-case a SKU. SKUs compare case-insensitively per tenant.
pub fn normalize_sku(raw: &str) -> DomainResult<String> {
    let sku = raw.trim().to_uppercase();
    if sku.is_empty() {
        return Err(DomainError::validation("sku cannot be empty"));
    }
    Ok(sku)
}

/// Trim and upper-case an outlet code, rejecting the reserved central code.
pub fn normalize_outlet_code(raw: &str) -> DomainResult<String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(DomainError::validation("outlet code cannot be empty"));
    }
    if code == RESERVED_OUTLET_CODE {
        return Err(DomainError::validation(format!(
            "outlet code '{RESERVED_OUTLET_CODE}' is reserved for central stock"
        )));
    }
    Ok(code)
}

/// Input: register a product with an optional opening central balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub category_id: CategoryId,
    pub unit_id: UnitId,
    pub initial_stock: i64,
    pub minimum_low_stock: i64,
}

impl NewProduct {
    /// Validate and normalise into a product row for `tenant_id`.
    pub fn into_product(self, tenant_id: TenantId, id: ProductId) -> DomainResult<Product> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        let sku = normalize_sku(&self.sku)?;
        if self.initial_stock < 0 {
            return Err(DomainError::validation("initialStock must be >= 0"));
        }
        if self.minimum_low_stock < 0 {
            return Err(DomainError::validation("minimumLowStock must be >= 0"));
        }

        Ok(Product {
            id,
            tenant_id,
            name,
            sku,
            category_id: self.category_id,
            unit_id: self.unit_id,
            central_stock: self.initial_stock,
            minimum_low_stock: self.minimum_low_stock,
        })
    }
}

/// Input: register an outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOutlet {
    pub name: String,
    pub code: String,
    pub address: String,
}

impl NewOutlet {
    pub fn into_outlet(self, tenant_id: TenantId, id: OutletId) -> DomainResult<Outlet> {
        let name = self.name.trim().to_string();
        let address = self.address.trim().to_string();
        if name.is_empty() || address.is_empty() {
            return Err(DomainError::validation("outlet name and address are required"));
        }
        let code = normalize_outlet_code(&self.code)?;

        Ok(Outlet {
            id,
            tenant_id,
            name,
            code,
            address,
        })
    }
}
