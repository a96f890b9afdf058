use stockroom_auth::TenantAccess;
use stockroom_core::TenantId;

/// Tenant context for a request.
///
/// Inserted by the auth middleware and present on every tenant-scoped route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    access: TenantAccess,
}

impl TenantContext {
    pub fn new(access: TenantAccess) -> Self {
        Self { access }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.access.tenant_id
    }

    pub fn access(&self) -> &TenantAccess {
        &self.access
    }
}
