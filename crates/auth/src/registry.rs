//! Role registry.
//!
//! Owns every [`Role`]. Records are stored as `Arc` snapshots and replaced,
//! never mutated in place, so contexts resolved before an edit keep the
//! permissions they were resolved with.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edugate_core::{DomainError, RoleId, TenantId, UserId};

use crate::roles::{normalize_role_name, role_names_collide};
use crate::{AccessContext, Authority, PermissionSet, Principal, Role, RoleUpdate};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("role not found")]
    NotFound,

    #[error("a role named '{0}' already exists in this scope")]
    DuplicateName(String),

    #[error("system roles can only be changed with platform authority")]
    Immutable,

    #[error("role is still assigned to {references} principal(s)")]
    InUse { references: usize },

    #[error("invalid role: {0}")]
    Invalid(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("directory error: {0}")]
    Directory(#[from] DomainError),
}

/// What to do with principals still holding a role that is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletePolicy {
    /// Fail with [`RegistryError::InUse`] and keep the role.
    Refuse,
    /// Move every holder to the given fallback role, then delete.
    ///
    /// If the directory fails part-way, the holders already moved keep the
    /// fallback role, the deleted role is kept, and the error is returned.
    ReassignTo(RoleId),
}

/// Who references roles. Implemented for every user directory.
pub trait RoleReferences {
    fn holders_of(&self, role_id: RoleId) -> Vec<UserId>;

    /// Move every holder of `from` to `to`; returns how many were moved.
    fn reassign_role(&self, from: RoleId, to: RoleId) -> Result<usize, DomainError>;
}

/// In-memory role registry (system roles + tenant-owned roles).
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: Vec<Arc<Role>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn get(&self, role_id: RoleId) -> Option<Arc<Role>> {
        self.roles.iter().find(|r| r.id == role_id).cloned()
    }

    /// Look up a role by name as seen from `tenant_id` (system roles included).
    pub fn find_by_name(&self, tenant_id: Option<TenantId>, name: &str) -> Option<Arc<Role>> {
        self.roles
            .iter()
            .find(|r| r.is_available_to(tenant_id) && role_names_collide(&r.name, name))
            .cloned()
    }

    /// System roles first, then the roles owned by `tenant_id`, each group in
    /// insertion order. `None` lists system roles only.
    pub fn list_roles(&self, tenant_id: Option<TenantId>) -> Vec<Arc<Role>> {
        let system = self.roles.iter().filter(|r| r.is_system);
        let owned = self
            .roles
            .iter()
            .filter(|r| !r.is_system && tenant_id.is_some() && r.tenant_id == tenant_id);
        system.chain(owned).cloned().collect()
    }

    /// Bind a principal to a snapshot of its role.
    pub fn resolve(&self, principal: Principal) -> AccessContext {
        let role = self.get(principal.role_id);
        AccessContext::new(principal, role)
    }

    /// Add a platform-defined role to the global namespace.
    pub fn seed_system_role(
        &mut self,
        name: &str,
        description: Option<&str>,
        permissions: PermissionSet,
        authority: Authority,
    ) -> Result<Arc<Role>, RegistryError> {
        let name = validate_name(name)?;
        if self.roles.iter().any(|r| role_names_collide(&r.name, &name)) {
            return Err(RegistryError::DuplicateName(name));
        }
        let now = Utc::now();
        let role = Arc::new(Role {
            id: RoleId::new(),
            name,
            description: description.map(str::to_string),
            is_system: true,
            tenant_id: None,
            authority,
            permissions,
            created_at: now,
            updated_at: now,
        });
        self.roles.push(role.clone());
        tracing::info!(role_id = %role.id, name = %role.name, "system role seeded");
        Ok(role)
    }

    /// Create a custom role owned by `tenant_id`.
    ///
    /// Custom roles never carry platform authority.
    pub fn create_role(
        &mut self,
        name: &str,
        permissions: PermissionSet,
        tenant_id: TenantId,
    ) -> Result<Arc<Role>, RegistryError> {
        let name = validate_name(name)?;
        self.ensure_name_free(Some(tenant_id), &name, None)?;

        let now = Utc::now();
        let role = Arc::new(Role {
            id: RoleId::new(),
            name,
            description: None,
            is_system: false,
            tenant_id: Some(tenant_id),
            authority: Authority::Tenant,
            permissions,
            created_at: now,
            updated_at: now,
        });
        self.roles.push(role.clone());
        tracing::info!(role_id = %role.id, tenant_id = %tenant_id, name = %role.name, "role created");
        Ok(role)
    }

    pub fn update_role(
        &mut self,
        role_id: RoleId,
        update: RoleUpdate,
        authority: Authority,
    ) -> Result<Arc<Role>, RegistryError> {
        let index = self.index_of(role_id)?;
        let current = &self.roles[index];
        if current.is_system && authority != Authority::Platform {
            return Err(RegistryError::Immutable);
        }

        let mut next = Role::clone(current);
        if let Some(name) = update.name {
            let name = validate_name(&name)?;
            let scope = if next.is_system { None } else { next.tenant_id };
            self.ensure_name_free(scope, &name, Some(role_id))?;
            next.name = name;
        }
        if let Some(description) = update.description {
            next.description = Some(description);
        }
        if let Some(permissions) = update.permissions {
            next.permissions = permissions;
        }
        next.updated_at = Utc::now();

        let next = Arc::new(next);
        self.roles[index] = next.clone();
        tracing::info!(role_id = %role_id, name = %next.name, "role updated");
        Ok(next)
    }

    /// Delete a role, refusing or reassigning when principals still hold it.
    ///
    /// Returns the number of principals moved to the fallback role.
    pub fn delete_role(
        &mut self,
        role_id: RoleId,
        authority: Authority,
        references: &dyn RoleReferences,
        policy: DeletePolicy,
    ) -> Result<usize, RegistryError> {
        let index = self.index_of(role_id)?;
        let doomed = self.roles[index].clone();
        if doomed.is_system && authority != Authority::Platform {
            return Err(RegistryError::Immutable);
        }

        let holders = references.holders_of(role_id).len();
        let moved = match policy {
            DeletePolicy::Refuse if holders > 0 => {
                tracing::warn!(role_id = %role_id, holders, "role deletion refused: still assigned");
                return Err(RegistryError::InUse { references: holders });
            }
            DeletePolicy::Refuse => 0,
            DeletePolicy::ReassignTo(fallback_id) => {
                let fallback = self.get(fallback_id).ok_or(RegistryError::NotFound)?;
                validate_fallback(&doomed, &fallback)?;
                if holders > 0 {
                    references.reassign_role(role_id, fallback_id)?
                } else {
                    0
                }
            }
        };

        self.roles.retain(|r| r.id != role_id);
        tracing::info!(role_id = %role_id, reassigned = moved, "role deleted");
        Ok(moved)
    }

    fn index_of(&self, role_id: RoleId) -> Result<usize, RegistryError> {
        self.roles
            .iter()
            .position(|r| r.id == role_id)
            .ok_or(RegistryError::NotFound)
    }

    /// System names are reserved everywhere; tenant names only within their tenant.
    fn ensure_name_free(
        &self,
        tenant_id: Option<TenantId>,
        name: &str,
        except: Option<RoleId>,
    ) -> Result<(), RegistryError> {
        let clash = self.roles.iter().any(|r| {
            Some(r.id) != except
                && role_names_collide(&r.name, name)
                && (r.is_system || tenant_id.is_none() || r.tenant_id == tenant_id)
        });
        if clash {
            Err(RegistryError::DuplicateName(name.to_string()))
        } else {
            Ok(())
        }
    }
}

fn validate_name(name: &str) -> Result<String, RegistryError> {
    let name = normalize_role_name(name);
    if name.is_empty() {
        return Err(RegistryError::Invalid("role name cannot be empty".to_string()));
    }
    Ok(name)
}

/// Holders must stay valid after the move: same tenant reach, no lost platform binding.
fn validate_fallback(doomed: &Role, fallback: &Role) -> Result<(), RegistryError> {
    if fallback.id == doomed.id {
        return Err(RegistryError::Invalid(
            "fallback role must differ from the deleted role".to_string(),
        ));
    }
    if doomed.is_platform() != fallback.is_platform() {
        return Err(RegistryError::Invalid(
            "fallback role must have the same authority as the deleted role".to_string(),
        ));
    }
    if !doomed.is_system && !fallback.is_available_to(doomed.tenant_id) {
        return Err(RegistryError::Invalid(
            "fallback role is not available in the deleted role's tenant".to_string(),
        ));
    }
    if doomed.is_system && !fallback.is_system {
        return Err(RegistryError::Invalid(
            "holders of a system role can only fall back to a system role".to_string(),
        ));
    }
    Ok(())
}
