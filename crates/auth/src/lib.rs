//! `stockroom-auth`: identity and tenant-access boundary.
//!
//! Supplies the stock core with who the actor is, which outlets they may
//! operate on, and whether the tenant may write right now. Decoupled from
//! HTTP and storage.

pub mod access;
pub mod claims;
pub mod roles;

pub use access::{
    AccessError, BillingGate, ClaimsAccessResolver, InMemoryBillingGate, SubscriptionStatus,
    TenantAccess, TenantAccessResolver,
};
pub use claims::{validate_claims, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
pub use roles::Role;
