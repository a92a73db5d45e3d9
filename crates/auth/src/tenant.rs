//! Tenant isolation guard.
//!
//! The outer access boundary: every read is filtered to the principal's tenant
//! and every write is checked against it before any scope narrowing happens.

use edugate_core::TenantId;

use crate::{AccessContext, AuthzError};

/// Records owned by exactly one tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

/// Keep only the items the principal's tenant owns.
///
/// - Platform principals see every tenant.
/// - Tenant principals see their own tenant only.
/// - Principals without an effective role (inactive, unresolved, invalid) see nothing.
pub fn filter_by_tenant<I, T, F>(ctx: &AccessContext, items: I, tenant_of: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> TenantId,
{
    if ctx.effective_role().is_none() {
        return Vec::new();
    }
    match ctx.tenant_id() {
        None => items.into_iter().collect(),
        Some(tenant_id) => items
            .into_iter()
            .filter(|item| tenant_of(item) == tenant_id)
            .collect(),
    }
}

/// Guard a single-record read or write against cross-tenant access.
pub fn ensure_tenant_access(ctx: &AccessContext, tenant_id: TenantId) -> Result<(), AuthzError> {
    if ctx.effective_role().is_none() {
        return Err(AuthzError::TenantMismatch);
    }
    match ctx.tenant_id() {
        None => Ok(()),
        Some(own) if own == tenant_id => Ok(()),
        Some(_) => Err(AuthzError::TenantMismatch),
    }
}
