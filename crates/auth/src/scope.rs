//! Sub-tenant scope resolution (e.g. year groups).

use edugate_core::TenantId;

use crate::{AccessContext, ScopeKey, TenantScoped, filter_by_tenant};

/// Records that belong to one sub-tenant partition.
pub trait ScopePartitioned {
    fn scope_key(&self) -> &ScopeKey;
}

/// Narrow `items` to the principal's allowed scopes.
///
/// Pure and idempotent. Principals with tenant-wide visibility keep every
/// item; everyone else keeps only items whose scope key is in their
/// `allowed_scopes`, and an empty set yields nothing. Run after
/// [`filter_by_tenant`](crate::filter_by_tenant), never instead of it.
pub fn resolve_scope<I, T, F>(ctx: &AccessContext, items: I, scope_of: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: for<'a> Fn(&'a T) -> &'a ScopeKey,
{
    if ctx.effective_role().is_none() {
        return Vec::new();
    }
    if ctx.has_tenant_wide_visibility() {
        return items.into_iter().collect();
    }

    let allowed = &ctx.principal().allowed_scopes;
    if allowed.is_empty() {
        return Vec::new();
    }
    items
        .into_iter()
        .filter(|item| allowed.contains(scope_of(item)))
        .collect()
}

impl AccessContext {
    /// Tenant isolation first, then scope narrowing.
    pub fn visible<I, T, FT, FS>(&self, items: I, tenant_of: FT, scope_of: FS) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
        FT: Fn(&T) -> TenantId,
        FS: for<'a> Fn(&'a T) -> &'a ScopeKey,
    {
        let in_tenant = filter_by_tenant(self, items, tenant_of);
        resolve_scope(self, in_tenant, scope_of)
    }

    /// [`visible`](Self::visible) for records that know their own tenant and scope.
    pub fn visible_records<'r, R>(&self, records: &'r [R]) -> Vec<&'r R>
    where
        R: TenantScoped + ScopePartitioned,
    {
        self.visible(records, |r| r.tenant_id(), |r| r.scope_key())
    }
}
