use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use edugate_core::{RoleId, TenantId, UserId};

use crate::{Authority, Capability, PermissionSet, Principal, Role, UnknownCapability, UserStatus};

/// A principal resolved against the role registry.
///
/// Holds snapshots: a role edited after the context was built does not change
/// the outcome of checks made through it. Threaded explicitly through calls;
/// there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    principal: Principal,
    role: Option<Arc<Role>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error(transparent)]
    UnknownCapability(#[from] UnknownCapability),

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(Capability),

    #[error("tenant mismatch")]
    TenantMismatch,
}

impl AccessContext {
    /// Bind a principal to its role snapshot.
    ///
    /// A role that is not the principal's, or that belongs to another tenant,
    /// is discarded and the context carries no authority.
    pub fn new(principal: Principal, role: Option<Arc<Role>>) -> Self {
        let role = role.filter(|r| r.id == principal.role_id && r.is_available_to(principal.tenant_id));
        Self { principal, role }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.principal.tenant_id
    }

    pub fn role(&self) -> Option<&Role> {
        self.role.as_deref()
    }

    /// The role whose permissions currently apply, if any.
    ///
    /// `None` for inactive principals, unresolved roles, and principals whose
    /// tenant binding does not match the role's authority (tenant-less with a
    /// tenant-level role, or tenant-bound with a platform role).
    pub fn effective_role(&self) -> Option<&Role> {
        if !self.principal.is_active() {
            return None;
        }
        let role = self.role.as_deref()?;
        if self.principal.is_tenantless() != role.is_platform() {
            return None;
        }
        Some(role)
    }

    /// Permissions in force right now (empty when there is no effective role).
    pub fn effective_permissions(&self) -> PermissionSet {
        self.effective_role()
            .map(|r| r.permissions)
            .unwrap_or_default()
    }

    /// Platform-global: no tenant and an effective platform role.
    pub fn is_platform(&self) -> bool {
        self.principal.is_tenantless() && self.effective_role().is_some()
    }

    pub fn authority(&self) -> Authority {
        if self.is_platform() {
            Authority::Platform
        } else {
            Authority::Tenant
        }
    }

    /// Whether scope filtering is skipped for this principal.
    pub fn has_tenant_wide_visibility(&self) -> bool {
        self.is_platform()
            || self
                .effective_role()
                .is_some_and(|r| r.permissions.has_tenant_wide_visibility())
    }
}

/// Decide whether the principal holds `capability`.
///
/// - No IO
/// - No panics
/// - Deny is a normal return value
pub fn authorize(ctx: &AccessContext, capability: Capability) -> bool {
    ctx.effective_role()
        .is_some_and(|role| role.grants(capability))
}

/// Like [`authorize`], for capability names coming from outside the crate.
///
/// An unknown name is a caller bug and is reported as an error, never as a
/// silent deny.
pub fn authorize_named(ctx: &AccessContext, capability: &str) -> Result<bool, AuthzError> {
    let capability: Capability = capability.parse()?;
    Ok(authorize(ctx, capability))
}

/// Command-boundary form of [`authorize`].
pub fn require(ctx: &AccessContext, capability: Capability) -> Result<(), AuthzError> {
    if authorize(ctx, capability) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(capability))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub capability: Capability,
    pub granted: bool,
    pub reason: String,
    pub principal: PrincipalState,
    pub denial_reason: Option<DenialReason>,
}

/// State of the principal at the time of the check.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub status: UserStatus,
    pub role_id: RoleId,
    pub role_name: Option<String>,
    pub platform: bool,
    pub effective_capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    InactiveAccount,
    RoleUnresolved,
    InvalidPrincipal,
    MissingCapability,
}

/// Explain why a check on `capability` is (or would be) allowed or denied.
pub fn explain_authorization(ctx: &AccessContext, capability: Capability) -> AuthorizationExplanation {
    let principal = ctx.principal();
    let state = PrincipalState {
        user_id: principal.user_id,
        tenant_id: principal.tenant_id,
        status: principal.status,
        role_id: principal.role_id,
        role_name: ctx.role().map(|r| r.name.clone()),
        platform: ctx.is_platform(),
        effective_capabilities: ctx.effective_permissions().granted(),
    };

    let denial = if !principal.is_active() {
        Some(DenialReason {
            kind: DenialKind::InactiveAccount,
            message: format!("Account is {}; inactive accounts hold no capabilities", principal.status),
            suggestions: vec!["Reactivate the account before retrying".to_string()],
        })
    } else if ctx.role().is_none() {
        Some(DenialReason {
            kind: DenialKind::RoleUnresolved,
            message: format!("Role {} could not be resolved for this principal", principal.role_id),
            suggestions: vec![
                "Check that the role still exists".to_string(),
                "Check that the role belongs to the principal's tenant or is a system role".to_string(),
            ],
        })
    } else if ctx.effective_role().is_none() && principal.is_tenantless() {
        Some(DenialReason {
            kind: DenialKind::InvalidPrincipal,
            message: "Principal has no tenant but its role is not a platform role".to_string(),
            suggestions: vec![
                "Assign the principal to a tenant".to_string(),
                "Assign a platform role to the principal".to_string(),
            ],
        })
    } else if ctx.effective_role().is_none() {
        Some(DenialReason {
            kind: DenialKind::InvalidPrincipal,
            message: "Principal belongs to a tenant but holds a platform role".to_string(),
            suggestions: vec![
                "Assign a tenant-level role to the principal".to_string(),
                "Move the account to the platform (no tenant)".to_string(),
            ],
        })
    } else if !authorize(ctx, capability) {
        Some(DenialReason {
            kind: DenialKind::MissingCapability,
            message: format!("Missing required capability: '{capability}'"),
            suggestions: vec![
                format!("Grant '{capability}' on the principal's role"),
                format!("Assign a role that grants '{capability}'"),
            ],
        })
    } else {
        None
    };

    match denial {
        None => AuthorizationExplanation {
            capability,
            granted: true,
            reason: format!(
                "Role '{}' grants '{capability}'",
                state.role_name.as_deref().unwrap_or_default()
            ),
            principal: state,
            denial_reason: None,
        },
        Some(denial) => AuthorizationExplanation {
            capability,
            granted: false,
            reason: denial.message.clone(),
            principal: state,
            denial_reason: Some(denial),
        },
    }
}
