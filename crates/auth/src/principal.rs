use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use edugate_core::{RoleId, TenantId, UserId};

/// Sub-tenant partition key (e.g. a year-group code such as `"07"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Account status. Only `Active` accounts carry any authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UserStatus {
    #[default]
    Active,
    /// Locked (e.g. after failed sign-ins); reversible by an administrator.
    Locked,
    /// Suspended by an administrator.
    Suspended,
}

impl UserStatus {
    pub fn is_active(self) -> bool {
        self == UserStatus::Active
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Locked => write!(f, "Locked"),
            UserStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Snapshot of an authenticated actor, as used for authorization decisions.
///
/// A principal without a tenant is platform-global; that is only valid when
/// its role carries platform authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub tenant_id: Option<TenantId>,
    pub role_id: RoleId,
    pub status: UserStatus,
    #[serde(default)]
    pub allowed_scopes: BTreeSet<ScopeKey>,
}

impl Principal {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_tenantless(&self) -> bool {
        self.tenant_id.is_none()
    }

    pub fn may_see_scope(&self, key: &ScopeKey) -> bool {
        self.allowed_scopes.contains(key)
    }
}
