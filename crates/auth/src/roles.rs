use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use edugate_core::{RoleId, TenantId};

use crate::{Capability, PermissionSet};

/// Reach of the authority a role confers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    /// Confined to the holder's tenant.
    #[default]
    Tenant,
    /// Platform-wide (e.g. Super Admin). Only system roles carry it.
    Platform,
}

/// Role definition.
///
/// System roles live in one global namespace and have no owning tenant;
/// custom roles are owned by exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub tenant_id: Option<TenantId>,
    pub authority: Authority,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn is_platform(&self) -> bool {
        self.authority == Authority::Platform
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.permissions.grants(capability)
    }

    /// Whether principals of `tenant_id` (or platform principals, for `None`)
    /// may hold this role.
    pub fn is_available_to(&self, tenant_id: Option<TenantId>) -> bool {
        self.is_system || (self.tenant_id.is_some() && self.tenant_id == tenant_id)
    }
}

/// Partial update of a role; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<PermissionSet>,
}

impl RoleUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn permissions(permissions: PermissionSet) -> Self {
        Self {
            permissions: Some(permissions),
            ..Self::default()
        }
    }
}

/// Canonical display form of a role name (trimmed).
pub fn normalize_role_name(name: &str) -> String {
    name.trim().to_string()
}

/// Role names compare case-insensitively after trimming.
pub fn role_names_collide(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(is_system: bool, tenant_id: Option<TenantId>) -> Role {
        let now = Utc::now();
        Role {
            id: RoleId::new(),
            name: "Teacher".to_string(),
            description: None,
            is_system,
            tenant_id,
            authority: Authority::Tenant,
            permissions: PermissionSet::none(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn system_roles_are_available_everywhere() {
        let r = role(true, None);
        assert!(r.is_available_to(Some(TenantId::new())));
        assert!(r.is_available_to(None));
    }

    #[test]
    fn tenant_roles_are_available_only_in_their_tenant() {
        let owner = TenantId::new();
        let r = role(false, Some(owner));
        assert!(r.is_available_to(Some(owner)));
        assert!(!r.is_available_to(Some(TenantId::new())));
        assert!(!r.is_available_to(None));
    }

    #[test]
    fn names_collide_ignoring_case_and_padding() {
        assert!(role_names_collide("Head of Year", "  head of year "));
        assert!(!role_names_collide("Head of Year", "Head of Department"));
        assert_eq!(normalize_role_name("  Teacher "), "Teacher");
    }
}
