//! User account aggregate (event-sourced).
//!
//! Lifecycle of the principals managed from the user-management screens, with
//! strict tenant isolation and privilege escalation prevention.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use edugate_core::{Aggregate, AggregateRoot, DomainError, RoleId, TenantId, UserId};

use crate::{AccessContext, Capability, PermissionSet, Principal, Role, ScopeKey, UserStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Command inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Who is issuing a command, reduced to what the aggregate needs to decide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub platform: bool,
    pub permissions: PermissionSet,
}

impl Actor {
    pub fn from_context(ctx: &AccessContext) -> Self {
        Self {
            user_id: ctx.user_id(),
            tenant_id: ctx.tenant_id(),
            platform: ctx.is_platform(),
            permissions: ctx.effective_permissions(),
        }
    }

    fn can_reach(&self, tenant_id: Option<TenantId>) -> bool {
        self.platform || (self.tenant_id.is_some() && self.tenant_id == tenant_id)
    }
}

/// A role being granted, reduced to what the aggregate needs to decide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role_id: RoleId,
    pub is_system: bool,
    pub owner_tenant_id: Option<TenantId>,
    pub platform: bool,
    pub permissions: PermissionSet,
}

impl From<&Role> for RoleGrant {
    fn from(role: &Role) -> Self {
        Self {
            role_id: role.id,
            is_system: role.is_system,
            owner_tenant_id: role.tenant_id,
            platform: role.is_platform(),
            permissions: role.permissions,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User Account Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// User account aggregate.
///
/// # Invariants
/// - The tenant is fixed at creation.
/// - Tenant-less accounts hold platform roles; tenant accounts never do.
/// - A custom role can only be held inside its owning tenant.
/// - Locked or suspended accounts cannot receive a new role.
/// - Actors cannot grant permissions they do not hold themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub role_id: RoleId,
    pub status: UserStatus,
    pub allowed_scopes: BTreeSet<ScopeKey>,
    pub version: u64,
    pub created: bool,
}

impl UserAccount {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            tenant_id: None,
            email: String::new(),
            display_name: String::new(),
            role_id: RoleId::from_uuid(uuid::Uuid::nil()),
            status: UserStatus::Active,
            allowed_scopes: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    /// Authorization snapshot of this account.
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            tenant_id: self.tenant_id,
            role_id: self.role_id,
            status: self.status,
            allowed_scopes: self.allowed_scopes.clone(),
        }
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }

    /// Cross-tenant targets are reported as missing.
    fn ensure_reachable(&self, actor: &Actor) -> Result<(), DomainError> {
        if actor.can_reach(self.tenant_id) {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }

    fn ensure_user_manager(actor: &Actor) -> Result<(), DomainError> {
        if actor.permissions.grants(Capability::ManageUsers) {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }

    fn ensure_not_self(&self, actor: &Actor) -> Result<(), DomainError> {
        if actor.user_id == self.id {
            return Err(DomainError::invariant("users cannot change their own standing"));
        }
        Ok(())
    }

    fn ensure_grantable(tenant_id: Option<TenantId>, grant: &RoleGrant, actor: &Actor) -> Result<(), DomainError> {
        match tenant_id {
            None if !grant.platform => {
                return Err(DomainError::invariant(
                    "accounts without a tenant require a platform role",
                ));
            }
            Some(_) if grant.platform => {
                return Err(DomainError::invariant(
                    "platform roles cannot be held by tenant accounts",
                ));
            }
            _ => {}
        }
        if !grant.is_system && grant.owner_tenant_id != tenant_id {
            return Err(DomainError::invariant("role belongs to another tenant"));
        }
        if !actor.platform && !grant.permissions.is_subset_of(&actor.permissions) {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }
}

impl AggregateRoot for UserAccount {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Canonical form of a sign-in identifier.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub role: RoleGrant,
    pub allowed_scopes: BTreeSet<ScopeKey>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRole {
    pub user_id: UserId,
    pub role: RoleGrant,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAllowedScopes {
    pub user_id: UserId,
    pub scopes: BTreeSet<ScopeKey>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictUser {
    pub user_id: UserId,
    /// `Locked` or `Suspended`.
    pub status: UserStatus,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivateUser {
    pub user_id: UserId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Issued by the role registry when a held role is deleted with reassignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignRole {
    pub user_id: UserId,
    pub from: RoleId,
    pub to: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Create(CreateUser),
    ChangeRole(ChangeRole),
    SetAllowedScopes(SetAllowedScopes),
    Restrict(RestrictUser),
    Reactivate(ReactivateUser),
    ReassignRole(ReassignRole),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub role_id: RoleId,
    pub allowed_scopes: BTreeSet<ScopeKey>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanged {
    pub user_id: UserId,
    pub from: RoleId,
    pub to: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedScopesChanged {
    pub user_id: UserId,
    pub scopes: BTreeSet<ScopeKey>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRestricted {
    pub user_id: UserId,
    pub status: UserStatus,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReactivated {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Created(UserCreated),
    RoleChanged(RoleChanged),
    AllowedScopesChanged(AllowedScopesChanged),
    Restricted(UserRestricted),
    Reactivated(UserReactivated),
}

impl UserEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "auth.user.created",
            UserEvent::RoleChanged(_) => "auth.user.role_changed",
            UserEvent::AllowedScopesChanged(_) => "auth.user.scopes_changed",
            UserEvent::Restricted(_) => "auth.user.restricted",
            UserEvent::Reactivated(_) => "auth.user.reactivated",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Created(e) => e.occurred_at,
            UserEvent::RoleChanged(e) => e.occurred_at,
            UserEvent::AllowedScopesChanged(e) => e.occurred_at,
            UserEvent::Restricted(e) => e.occurred_at,
            UserEvent::Reactivated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for UserAccount {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Created(e) => {
                self.id = e.user_id;
                self.tenant_id = e.tenant_id;
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.role_id = e.role_id;
                self.allowed_scopes = e.allowed_scopes.clone();
                self.status = UserStatus::Active;
                self.created = true;
            }
            UserEvent::RoleChanged(e) => self.role_id = e.to,
            UserEvent::AllowedScopesChanged(e) => self.allowed_scopes = e.scopes.clone(),
            UserEvent::Restricted(e) => self.status = e.status,
            UserEvent::Reactivated(_) => self.status = UserStatus::Active,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Create(cmd) => self.handle_create(cmd),
            UserCommand::ChangeRole(cmd) => self.handle_change_role(cmd),
            UserCommand::SetAllowedScopes(cmd) => self.handle_set_scopes(cmd),
            UserCommand::Restrict(cmd) => self.handle_restrict(cmd),
            UserCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
            UserCommand::ReassignRole(cmd) => self.handle_reassign(cmd),
        }
    }
}

impl UserAccount {
    fn handle_create(&self, cmd: &CreateUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }
        Self::ensure_user_manager(&cmd.actor)?;
        if !cmd.actor.can_reach(cmd.tenant_id) {
            return Err(DomainError::Unauthorized);
        }

        let email = normalize_email(&cmd.email);
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(DomainError::validation("invalid email format")),
        }
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }
        Self::ensure_grantable(cmd.tenant_id, &cmd.role, &cmd.actor)?;

        Ok(vec![UserEvent::Created(UserCreated {
            user_id: cmd.user_id,
            tenant_id: cmd.tenant_id,
            email,
            display_name: cmd.display_name.trim().to_string(),
            role_id: cmd.role.role_id,
            allowed_scopes: cmd.allowed_scopes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_role(&self, cmd: &ChangeRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        Self::ensure_user_manager(&cmd.actor)?;
        self.ensure_reachable(&cmd.actor)?;
        if !self.status.is_active() {
            return Err(DomainError::invariant(format!("user is {}", self.status)));
        }
        if self.role_id == cmd.role.role_id {
            return Err(DomainError::invariant("role already assigned"));
        }
        Self::ensure_grantable(self.tenant_id, &cmd.role, &cmd.actor)?;

        Ok(vec![UserEvent::RoleChanged(RoleChanged {
            user_id: self.id,
            from: self.role_id,
            to: cmd.role.role_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_scopes(&self, cmd: &SetAllowedScopes) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        Self::ensure_user_manager(&cmd.actor)?;
        self.ensure_reachable(&cmd.actor)?;
        if self.allowed_scopes == cmd.scopes {
            return Ok(vec![]);
        }

        Ok(vec![UserEvent::AllowedScopesChanged(AllowedScopesChanged {
            user_id: self.id,
            scopes: cmd.scopes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restrict(&self, cmd: &RestrictUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        Self::ensure_user_manager(&cmd.actor)?;
        self.ensure_reachable(&cmd.actor)?;
        self.ensure_not_self(&cmd.actor)?;
        if cmd.status.is_active() {
            return Err(DomainError::validation("restriction must lock or suspend"));
        }
        if self.status == cmd.status {
            return Err(DomainError::invariant(format!("user already {}", self.status)));
        }

        Ok(vec![UserEvent::Restricted(UserRestricted {
            user_id: self.id,
            status: cmd.status,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        Self::ensure_user_manager(&cmd.actor)?;
        self.ensure_reachable(&cmd.actor)?;
        if self.status.is_active() {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Reactivated(UserReactivated {
            user_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reassign(&self, cmd: &ReassignRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_created()?;
        if self.role_id != cmd.from {
            return Ok(vec![]);
        }

        Ok(vec![UserEvent::RoleChanged(RoleChanged {
            user_id: self.id,
            from: cmd.from,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn admin(tenant_id: TenantId) -> Actor {
        Actor {
            user_id: UserId::new(),
            tenant_id: Some(tenant_id),
            platform: false,
            permissions: PermissionSet::all().without(Capability::ConfigureSystem),
        }
    }

    fn grant(owner: Option<TenantId>, permissions: PermissionSet) -> RoleGrant {
        RoleGrant {
            role_id: RoleId::new(),
            is_system: owner.is_none(),
            owner_tenant_id: owner,
            platform: false,
            permissions,
        }
    }

    fn teacher() -> PermissionSet {
        PermissionSet::from_granted([Capability::ViewBehaviourRecords, Capability::ShowRoster])
    }

    fn created(tenant_id: TenantId, actor: &Actor) -> UserAccount {
        let user_id = UserId::new();
        let mut user = UserAccount::empty(user_id);
        user.execute(&UserCommand::Create(CreateUser {
            user_id,
            tenant_id: Some(tenant_id),
            email: " Bob.Smith@School.EDU ".to_string(),
            display_name: "Bob".to_string(),
            role: grant(None, teacher()),
            allowed_scopes: BTreeSet::from([ScopeKey::from("07")]),
            actor: actor.clone(),
            occurred_at: now(),
        }))
        .unwrap();
        user
    }

    #[test]
    fn create_user_normalizes_email() {
        let tenant = TenantId::new();
        let user = created(tenant, &admin(tenant));

        assert!(user.created);
        assert_eq!(user.email, "bob.smith@school.edu");
        assert_eq!(user.tenant_id, Some(tenant));
        assert_eq!(user.version, 1);
        assert_eq!(user.principal().allowed_scopes.len(), 1);
    }

    #[test]
    fn create_user_rejects_invalid_email() {
        let tenant = TenantId::new();
        let user_id = UserId::new();
        let result = UserAccount::empty(user_id).handle(&UserCommand::Create(CreateUser {
            user_id,
            tenant_id: Some(tenant),
            email: "not-an-email@".to_string(),
            display_name: "Alice".to_string(),
            role: grant(None, teacher()),
            allowed_scopes: BTreeSet::new(),
            actor: admin(tenant),
            occurred_at: now(),
        }));
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn create_in_other_tenant_is_unauthorized() {
        let user_id = UserId::new();
        let result = UserAccount::empty(user_id).handle(&UserCommand::Create(CreateUser {
            user_id,
            tenant_id: Some(TenantId::new()),
            email: "eve@school.edu".to_string(),
            display_name: "Eve".to_string(),
            role: grant(None, teacher()),
            allowed_scopes: BTreeSet::new(),
            actor: admin(TenantId::new()),
            occurred_at: now(),
        }));
        assert_eq!(result, Err(DomainError::Unauthorized));
    }

    #[test]
    fn tenantless_account_needs_platform_role() {
        let user_id = UserId::new();
        let platform_actor = Actor {
            user_id: UserId::new(),
            tenant_id: None,
            platform: true,
            permissions: PermissionSet::all(),
        };
        let result = UserAccount::empty(user_id).handle(&UserCommand::Create(CreateUser {
            user_id,
            tenant_id: None,
            email: "root@platform.io".to_string(),
            display_name: "Root".to_string(),
            role: grant(None, teacher()),
            allowed_scopes: BTreeSet::new(),
            actor: platform_actor,
            occurred_at: now(),
        }));
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn privilege_escalation_is_blocked() {
        let tenant = TenantId::new();
        let actor = admin(tenant);
        let user = created(tenant, &actor);

        let result = user.handle(&UserCommand::ChangeRole(ChangeRole {
            user_id: user.id,
            role: grant(None, PermissionSet::all()),
            actor,
            occurred_at: now(),
        }));
        assert_eq!(result, Err(DomainError::Unauthorized));
    }

    #[test]
    fn foreign_custom_role_cannot_be_granted() {
        let tenant = TenantId::new();
        let actor = admin(tenant);
        let user = created(tenant, &actor);

        let result = user.handle(&UserCommand::ChangeRole(ChangeRole {
            user_id: user.id,
            role: grant(Some(TenantId::new()), teacher()),
            actor,
            occurred_at: now(),
        }));
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn cross_tenant_actor_sees_not_found() {
        let tenant = TenantId::new();
        let user = created(tenant, &admin(tenant));

        let result = user.handle(&UserCommand::Reactivate(ReactivateUser {
            user_id: user.id,
            actor: admin(TenantId::new()),
            occurred_at: now(),
        }));
        assert_eq!(result, Err(DomainError::NotFound));
    }

    #[test]
    fn locked_user_cannot_receive_role_until_reactivated() {
        let tenant = TenantId::new();
        let actor = admin(tenant);
        let mut user = created(tenant, &actor);

        user.execute(&UserCommand::Restrict(RestrictUser {
            user_id: user.id,
            status: UserStatus::Locked,
            reason: "too many failed sign-ins".to_string(),
            actor: actor.clone(),
            occurred_at: now(),
        }))
        .unwrap();
        assert_eq!(user.status, UserStatus::Locked);

        let change = UserCommand::ChangeRole(ChangeRole {
            user_id: user.id,
            role: grant(Some(tenant), teacher().with(Capability::ManageSeating)),
            actor: actor.clone(),
            occurred_at: now(),
        });
        assert!(user.handle(&change).is_err());

        user.execute(&UserCommand::Reactivate(ReactivateUser {
            user_id: user.id,
            actor: actor.clone(),
            occurred_at: now(),
        }))
        .unwrap();
        let events = user.execute(&change).unwrap();
        assert!(matches!(events[0], UserEvent::RoleChanged(_)));
    }

    #[test]
    fn actor_cannot_suspend_self() {
        let tenant = TenantId::new();
        let actor = admin(tenant);
        let user = created(tenant, &actor);
        let me = Actor { user_id: user.id, ..actor };

        let result = user.handle(&UserCommand::Restrict(RestrictUser {
            user_id: user.id,
            status: UserStatus::Suspended,
            reason: "oops".to_string(),
            actor: me,
            occurred_at: now(),
        }));
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn actor_without_manage_users_is_unauthorized() {
        let tenant = TenantId::new();
        let user = created(tenant, &admin(tenant));
        let weak = Actor {
            permissions: teacher(),
            ..admin(tenant)
        };

        let result = user.handle(&UserCommand::SetAllowedScopes(SetAllowedScopes {
            user_id: user.id,
            scopes: BTreeSet::new(),
            actor: weak,
            occurred_at: now(),
        }));
        assert_eq!(result, Err(DomainError::Unauthorized));
    }

    #[test]
    fn unchanged_scopes_emit_nothing() {
        let tenant = TenantId::new();
        let actor = admin(tenant);
        let user = created(tenant, &actor);

        let events = user
            .handle(&UserCommand::SetAllowedScopes(SetAllowedScopes {
                user_id: user.id,
                scopes: user.allowed_scopes.clone(),
                actor,
                occurred_at: now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reassignment_only_moves_current_holders() {
        let tenant = TenantId::new();
        let mut user = created(tenant, &admin(tenant));
        let current = user.role_id;
        let fallback = RoleId::new();

        let ignored = user
            .handle(&UserCommand::ReassignRole(ReassignRole {
                user_id: user.id,
                from: RoleId::new(),
                to: fallback,
                occurred_at: now(),
            }))
            .unwrap();
        assert!(ignored.is_empty());

        user.execute(&UserCommand::ReassignRole(ReassignRole {
            user_id: user.id,
            from: current,
            to: fallback,
            occurred_at: now(),
        }))
        .unwrap();
        assert_eq!(user.role_id, fallback);
    }
}
