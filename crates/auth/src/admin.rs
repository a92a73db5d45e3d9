//! Administration facades for the user-management screens and the role editor.
//!
//! Every operation takes the caller's [`AccessContext`] explicitly and checks
//! the required capability and tenant reach before touching state.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use edugate_core::{Aggregate, DomainError, RoleId, TenantId, UserId};

use crate::directory::UserDirectory;
use crate::registry::{DeletePolicy, RegistryError, RoleReferences, RoleRegistry};
use crate::user::{
    Actor, ChangeRole, CreateUser, ReactivateUser, RestrictUser, RoleGrant, SetAllowedScopes,
    UserAccount, UserCommand, UserEvent, normalize_email,
};
use crate::{
    AccessContext, Authority, Capability, PermissionSet, Role, RoleUpdate, ScopeKey, UserStatus,
    filter_by_tenant, require,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// Input for [`UserAdministration::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role_id: RoleId,
    /// `None` creates a platform-global account (platform callers only).
    pub tenant_id: Option<TenantId>,
    pub allowed_scopes: BTreeSet<ScopeKey>,
}

pub struct UserAdministration<'a, D> {
    directory: &'a D,
    roles: &'a RoleRegistry,
}

impl<'a, D> UserAdministration<'a, D>
where
    D: UserDirectory,
{
    pub fn new(directory: &'a D, roles: &'a RoleRegistry) -> Self {
        Self { directory, roles }
    }

    pub fn create_user(&self, actor: &AccessContext, new_user: NewUser) -> Result<UserAccount, AdminError> {
        let role = self.grantable_role(new_user.role_id, new_user.tenant_id)?;
        if self.directory.find_by_email(&normalize_email(&new_user.email)).is_some() {
            return Err(DomainError::conflict("email already registered").into());
        }

        let user_id = UserId::new();
        self.run(
            UserAccount::empty(user_id),
            UserCommand::Create(CreateUser {
                user_id,
                tenant_id: new_user.tenant_id,
                email: new_user.email,
                display_name: new_user.display_name,
                role: RoleGrant::from(role.as_ref()),
                allowed_scopes: new_user.allowed_scopes,
                actor: Actor::from_context(actor),
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn change_role(&self, actor: &AccessContext, user_id: UserId, role_id: RoleId) -> Result<UserAccount, AdminError> {
        let account = self.load(actor, user_id)?;
        let role = self.grantable_role(role_id, account.tenant_id)?;
        self.run(
            account,
            UserCommand::ChangeRole(ChangeRole {
                user_id,
                role: RoleGrant::from(role.as_ref()),
                actor: Actor::from_context(actor),
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn set_allowed_scopes(
        &self,
        actor: &AccessContext,
        user_id: UserId,
        scopes: BTreeSet<ScopeKey>,
    ) -> Result<UserAccount, AdminError> {
        let account = self.load(actor, user_id)?;
        self.run(
            account,
            UserCommand::SetAllowedScopes(SetAllowedScopes {
                user_id,
                scopes,
                actor: Actor::from_context(actor),
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn lock_user(&self, actor: &AccessContext, user_id: UserId, reason: &str) -> Result<UserAccount, AdminError> {
        self.restrict(actor, user_id, UserStatus::Locked, reason)
    }

    pub fn suspend_user(&self, actor: &AccessContext, user_id: UserId, reason: &str) -> Result<UserAccount, AdminError> {
        self.restrict(actor, user_id, UserStatus::Suspended, reason)
    }

    pub fn reactivate_user(&self, actor: &AccessContext, user_id: UserId) -> Result<UserAccount, AdminError> {
        let account = self.load(actor, user_id)?;
        self.run(
            account,
            UserCommand::Reactivate(ReactivateUser {
                user_id,
                actor: Actor::from_context(actor),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Accounts in the caller's tenant (every account for platform callers).
    pub fn list_users(&self, actor: &AccessContext) -> Result<Vec<UserAccount>, AdminError> {
        require(actor, Capability::ManageUsers).map_err(|_| DomainError::Unauthorized)?;
        let accounts = self
            .directory
            .list()
            .into_iter()
            .filter(|a| actor.is_platform() || a.tenant_id.is_some());
        // Tenant-less accounts only reach platform callers, which skip the tenant comparison.
        Ok(filter_by_tenant(actor, accounts, |a| a.tenant_id.unwrap_or_default()))
    }

    fn restrict(
        &self,
        actor: &AccessContext,
        user_id: UserId,
        status: UserStatus,
        reason: &str,
    ) -> Result<UserAccount, AdminError> {
        let account = self.load(actor, user_id)?;
        self.run(
            account,
            UserCommand::Restrict(RestrictUser {
                user_id,
                status,
                reason: reason.to_string(),
                actor: Actor::from_context(actor),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Cross-tenant accounts are reported as missing.
    fn load(&self, actor: &AccessContext, user_id: UserId) -> Result<UserAccount, AdminError> {
        let account = self.directory.get(user_id).ok_or(DomainError::NotFound)?;
        let reachable = actor.is_platform()
            || (account.tenant_id.is_some() && account.tenant_id == actor.tenant_id());
        if !reachable {
            return Err(DomainError::NotFound.into());
        }
        Ok(account)
    }

    fn grantable_role(&self, role_id: RoleId, tenant_id: Option<TenantId>) -> Result<Arc<Role>, AdminError> {
        self.roles
            .get(role_id)
            .filter(|role| role.is_available_to(tenant_id))
            .ok_or(AdminError::Registry(RegistryError::NotFound))
    }

    fn run(&self, mut account: UserAccount, command: UserCommand) -> Result<UserAccount, AdminError> {
        let events = account.execute(&command)?;
        if events.is_empty() {
            return Ok(account);
        }
        self.directory.save(account.clone())?;
        for event in &events {
            log_event(event);
        }
        Ok(account)
    }
}

fn log_event(event: &UserEvent) {
    match event {
        UserEvent::Created(e) => tracing::info!(
            user_id = %e.user_id,
            tenant_id = ?e.tenant_id,
            role_id = %e.role_id,
            event = event.event_type(),
            "user event"
        ),
        UserEvent::RoleChanged(e) => {
            tracing::info!(user_id = %e.user_id, from = %e.from, to = %e.to, event = event.event_type(), "user event")
        }
        UserEvent::AllowedScopesChanged(e) => tracing::info!(
            user_id = %e.user_id,
            scopes = e.scopes.len(),
            event = event.event_type(),
            "user event"
        ),
        UserEvent::Restricted(e) => tracing::warn!(
            user_id = %e.user_id,
            status = %e.status,
            reason = %e.reason,
            event = event.event_type(),
            "user event"
        ),
        UserEvent::Reactivated(e) => tracing::info!(user_id = %e.user_id, event = event.event_type(), "user event"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

pub struct RoleAdministration<'a> {
    registry: &'a mut RoleRegistry,
}

impl<'a> RoleAdministration<'a> {
    pub fn new(registry: &'a mut RoleRegistry) -> Self {
        Self { registry }
    }

    /// Create a custom role.
    ///
    /// Tenant callers always create inside their own tenant; platform callers
    /// name the tenant, or pass `None` to add a (tenant-authority) system role.
    pub fn create_role(
        &mut self,
        actor: &AccessContext,
        name: &str,
        permissions: PermissionSet,
        tenant_id: Option<TenantId>,
    ) -> Result<Arc<Role>, AdminError> {
        ensure_role_manager(actor)?;
        ensure_within_own_permissions(actor, &permissions)?;

        if actor.is_platform() {
            return Ok(match tenant_id {
                Some(tenant_id) => self.registry.create_role(name, permissions, tenant_id)?,
                None => self.registry.seed_system_role(
                    name,
                    None,
                    permissions,
                    Authority::Tenant,
                )?,
            });
        }

        let own = actor.tenant_id().ok_or(RegistryError::Unauthorized)?;
        if tenant_id.is_some_and(|t| t != own) {
            return Err(RegistryError::Unauthorized.into());
        }
        Ok(self.registry.create_role(name, permissions, own)?)
    }

    pub fn update_role(
        &mut self,
        actor: &AccessContext,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> Result<Arc<Role>, AdminError> {
        ensure_role_manager(actor)?;
        self.visible_role(actor, role_id)?;
        if let Some(permissions) = &update.permissions {
            ensure_within_own_permissions(actor, permissions)?;
        }
        Ok(self.registry.update_role(role_id, update, actor.authority())?)
    }

    pub fn delete_role(
        &mut self,
        actor: &AccessContext,
        role_id: RoleId,
        references: &dyn RoleReferences,
        policy: DeletePolicy,
    ) -> Result<usize, AdminError> {
        ensure_role_manager(actor)?;
        self.visible_role(actor, role_id)?;
        if let DeletePolicy::ReassignTo(fallback) = policy {
            self.visible_role(actor, fallback)?;
            // Reassignment grants the fallback to every holder.
            let fallback = self.registry.get(fallback).ok_or(RegistryError::NotFound)?;
            ensure_within_own_permissions(actor, &fallback.permissions)?;
        }
        Ok(self
            .registry
            .delete_role(role_id, actor.authority(), references, policy)?)
    }

    /// Roles the caller may assign or edit: system roles, then its tenant's roles.
    pub fn list_roles(&self, actor: &AccessContext) -> Vec<Arc<Role>> {
        if actor.effective_role().is_none() {
            return Vec::new();
        }
        self.registry.list_roles(actor.tenant_id())
    }

    fn visible_role(&self, actor: &AccessContext, role_id: RoleId) -> Result<(), AdminError> {
        let role = self.registry.get(role_id).ok_or(RegistryError::NotFound)?;
        if actor.is_platform() || role.is_available_to(actor.tenant_id()) {
            Ok(())
        } else {
            Err(RegistryError::NotFound.into())
        }
    }
}

fn ensure_role_manager(actor: &AccessContext) -> Result<(), AdminError> {
    require(actor, Capability::ManageRoles).map_err(|_| AdminError::Registry(RegistryError::Unauthorized))
}

fn ensure_within_own_permissions(actor: &AccessContext, permissions: &PermissionSet) -> Result<(), AdminError> {
    if actor.is_platform() || permissions.is_subset_of(&actor.effective_permissions()) {
        Ok(())
    } else {
        Err(RegistryError::Unauthorized.into())
    }
}
