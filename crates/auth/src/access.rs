//! Tenant access resolution: role, accessible outlets, and billing writability.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{DomainError, DomainResult, OutletId, TenantId, UserId};

use crate::{JwtClaims, Role};

/// Resolved access for one actor within one tenant.
///
/// This is the only identity information the stock core consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantAccess {
    pub tenant_id: TenantId,
    pub actor: UserId,
    pub role: Role,
    /// Outlet assignment. For restricted roles this is the full accessible
    /// set (empty means no outlet access); unrestricted roles see every
    /// tenant outlet regardless.
    pub accessible_outlets: BTreeSet<OutletId>,
    /// False when the tenant's billing state is not current.
    pub writable_now: bool,
}

impl TenantAccess {
    pub fn new(
        tenant_id: TenantId,
        actor: UserId,
        role: Role,
        accessible_outlets: impl IntoIterator<Item = OutletId>,
        writable_now: bool,
    ) -> Self {
        Self {
            tenant_id,
            actor,
            role,
            accessible_outlets: accessible_outlets.into_iter().collect(),
            writable_now,
        }
    }

    pub fn can_access_outlet(&self, outlet_id: OutletId) -> bool {
        self.accessible_outlets.contains(&outlet_id)
    }

    /// Unrestricted roles may operate on any tenant outlet; restricted roles
    /// only on their assignment.
    pub fn permits_outlet(&self, outlet_id: OutletId) -> bool {
        !self.restricts_outlets() || self.can_access_outlet(outlet_id)
    }

    pub fn ensure_outlet(&self, outlet_id: OutletId) -> DomainResult<()> {
        if self.permits_outlet(outlet_id) {
            Ok(())
        } else {
            Err(DomainError::scope(outlet_id.to_string()))
        }
    }

    /// Mutations are rejected before any lock when the tenant is read-only.
    pub fn ensure_writable(&self) -> DomainResult<()> {
        if self.writable_now {
            Ok(())
        } else {
            Err(DomainError::ReadOnly)
        }
    }

    pub fn restricts_outlets(&self) -> bool {
        self.role.restricts_outlets()
    }
}

/// Subscription lifecycle as reported by the billing collaborator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn is_writable(&self) -> bool {
        matches!(self, SubscriptionStatus::Trialing | SubscriptionStatus::Active)
    }
}

/// Answers whether a tenant may write right now.
pub trait BillingGate: Send + Sync {
    fn writable_now(&self, tenant_id: TenantId) -> bool;
}

/// In-memory billing gate for tests/dev.
///
/// Tenants with no recorded status answer `default_writable`.
#[derive(Debug, Default)]
pub struct InMemoryBillingGate {
    statuses: RwLock<HashMap<TenantId, SubscriptionStatus>>,
    default_writable: bool,
}

impl InMemoryBillingGate {
    pub fn new(default_writable: bool) -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
            default_writable,
        }
    }

    pub fn set_status(&self, tenant_id: TenantId, status: SubscriptionStatus) {
        if let Ok(mut map) = self.statuses.write() {
            map.insert(tenant_id, status);
        }
    }
}

impl BillingGate for InMemoryBillingGate {
    fn writable_now(&self, tenant_id: TenantId) -> bool {
        let map = match self.statuses.read() {
            Ok(m) => m,
            Err(_) => return false,
        };
        map.get(&tenant_id)
            .map(SubscriptionStatus::is_writable)
            .unwrap_or(self.default_writable)
    }
}

impl<G> BillingGate for std::sync::Arc<G>
where
    G: BillingGate + ?Sized,
{
    fn writable_now(&self, tenant_id: TenantId) -> bool {
        (**self).writable_now(tenant_id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("tenant access denied")]
    Denied,
}

/// Turns verified claims into a `TenantAccess`.
pub trait TenantAccessResolver: Send + Sync {
    fn resolve(&self, claims: &JwtClaims) -> Result<TenantAccess, AccessError>;
}

/// Resolver that trusts the membership snapshot in the token and asks the
/// billing gate for writability.
pub struct ClaimsAccessResolver<G> {
    billing: G,
}

impl<G> ClaimsAccessResolver<G> {
    pub fn new(billing: G) -> Self {
        Self { billing }
    }
}

impl<G: BillingGate> TenantAccessResolver for ClaimsAccessResolver<G> {
    fn resolve(&self, claims: &JwtClaims) -> Result<TenantAccess, AccessError> {
        if claims.role.as_str().is_empty() {
            return Err(AccessError::Denied);
        }
        let writable = self.billing.writable_now(claims.tenant_id);
        tracing::debug!(
            tenant_id = %claims.tenant_id,
            actor = %claims.sub,
            role = %claims.role,
            writable,
            "resolved tenant access"
        );
        Ok(TenantAccess::new(
            claims.tenant_id,
            claims.sub,
            claims.role.clone(),
            claims.outlet_ids.iter().copied(),
            writable,
        ))
    }
}
