//! Tenant scoping.
//!
//! Every record carries the tenant it belongs to. Anything fetched on behalf of
//! a tenant is re-checked here before it is returned or mutated; a record of
//! another tenant is reported exactly like a missing one.

use crate::error::{DomainError, DomainResult};
use crate::id::TenantId;

/// Types that belong to exactly one tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<T: TenantScoped> TenantScoped for &T {
    fn tenant_id(&self) -> TenantId {
        (**self).tenant_id()
    }
}

/// Resolve a lookup result for `tenant_id`.
///
/// Returns `NotFound(what)` when the record is absent or owned by another tenant.
pub fn scoped<T: TenantScoped>(tenant_id: TenantId, found: Option<T>, what: &str) -> DomainResult<T> {
    match found {
        Some(record) if record.tenant_id() == tenant_id => Ok(record),
        _ => Err(DomainError::not_found(what)),
    }
}
