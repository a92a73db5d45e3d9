//! `edugate-auth`: pure authorization and tenant-scoping boundary.
//!
//! This crate is intentionally decoupled from transport and storage: user
//! accounts and sessions are reached through the [`UserDirectory`] and
//! [`SessionStorage`] seams.
//!
//! Access path: [`SessionManager`] → [`Principal`] → [`RoleRegistry::resolve`]
//! → [`authorize`] / [`filter_by_tenant`] → [`resolve_scope`].

pub mod admin;
pub mod authorize;
pub mod config;
pub mod defaults;
pub mod directory;
pub mod permissions;
pub mod principal;
pub mod registry;
pub mod roles;
pub mod scope;
pub mod session;
pub mod tenant;
pub mod user;

pub use admin::{AdminError, NewUser, RoleAdministration, UserAdministration};
pub use authorize::{
    AccessContext, AuthorizationExplanation, AuthzError, DenialKind, authorize, authorize_named,
    explain_authorization, require,
};
pub use config::SessionPolicy;
pub use directory::UserDirectory;
pub use permissions::{Capability, DashboardWidgets, PermissionSet, UnknownCapability};
pub use principal::{Principal, ScopeKey, UserStatus};
pub use registry::{DeletePolicy, RegistryError, RoleReferences, RoleRegistry};
pub use roles::{Authority, Role, RoleUpdate};
pub use scope::{ScopePartitioned, resolve_scope};
pub use session::{
    SessionError, SessionExpiry, SessionManager, SessionRecord, SessionState, SessionStorage,
    validate_session,
};
pub use tenant::{TenantScoped, ensure_tenant_access, filter_by_tenant};
pub use user::{UserAccount, UserCommand, UserEvent};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, RwLock};

    use chrono::Utc;
    use edugate_core::{DomainError, RoleId, TenantId, UserId};

    use crate::user::normalize_email;
    use crate::*;

    /// Record owned by a tenant and filed under a year group.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Record {
        pub tenant_id: TenantId,
        pub scope: ScopeKey,
    }

    impl Record {
        pub fn new(tenant_id: TenantId, scope: &str) -> Self {
            Self {
                tenant_id,
                scope: ScopeKey::new(scope),
            }
        }
    }

    impl TenantScoped for Record {
        fn tenant_id(&self) -> TenantId {
            self.tenant_id
        }
    }

    impl ScopePartitioned for Record {
        fn scope_key(&self) -> &ScopeKey {
            &self.scope
        }
    }

    /// Context for a principal holding a freshly built role.
    pub fn context(
        tenant_id: Option<TenantId>,
        authority: Authority,
        permissions: PermissionSet,
        status: UserStatus,
        scopes: &[&str],
    ) -> AccessContext {
        let now = Utc::now();
        let owner = if authority == Authority::Platform { None } else { tenant_id };
        let role = Arc::new(Role {
            id: RoleId::new(),
            name: "Test Role".to_string(),
            description: None,
            is_system: owner.is_none(),
            tenant_id: owner,
            authority,
            permissions,
            created_at: now,
            updated_at: now,
        });
        let principal = Principal {
            user_id: UserId::new(),
            email: "someone@school.edu".to_string(),
            display_name: "Someone".to_string(),
            tenant_id,
            role_id: role.id,
            status,
            allowed_scopes: scopes.iter().map(|s| ScopeKey::new(*s)).collect(),
        };
        AccessContext::new(principal, Some(role))
    }

    pub fn account_with(email: &str, tenant_id: Option<TenantId>, role_id: RoleId) -> UserAccount {
        let mut account = UserAccount::empty(UserId::new());
        account.email = normalize_email(email);
        account.display_name = email.to_string();
        account.tenant_id = tenant_id;
        account.role_id = role_id;
        account.created = true;
        account.version = 1;
        account
    }

    pub fn account(email: &str, status: UserStatus) -> UserAccount {
        let mut account = account_with(email, Some(TenantId::new()), RoleId::new());
        account.status = status;
        account
    }

    #[derive(Default)]
    pub struct MemoryDirectory {
        accounts: RwLock<HashMap<UserId, UserAccount>>,
    }

    impl MemoryDirectory {
        pub fn insert(&self, account: UserAccount) {
            self.accounts.write().unwrap().insert(account.id, account);
        }
    }

    impl UserDirectory for MemoryDirectory {
        fn get(&self, user_id: UserId) -> Option<UserAccount> {
            self.accounts.read().unwrap().get(&user_id).cloned()
        }

        fn find_by_email(&self, email: &str) -> Option<UserAccount> {
            let email = normalize_email(email);
            self.accounts
                .read()
                .unwrap()
                .values()
                .find(|a| a.email == email)
                .cloned()
        }

        fn save(&self, account: UserAccount) -> Result<(), DomainError> {
            self.insert(account);
            Ok(())
        }

        fn list(&self) -> Vec<UserAccount> {
            let mut all: Vec<UserAccount> = self.accounts.read().unwrap().values().cloned().collect();
            all.sort_by_key(|a| a.id);
            all
        }
    }

    #[derive(Default)]
    pub struct MemoryStorage {
        slot: Mutex<Option<SessionRecord>>,
        failing: bool,
    }

    impl MemoryStorage {
        pub fn failing() -> Self {
            Self {
                slot: Mutex::new(None),
                failing: true,
            }
        }
    }

    impl SessionStorage for MemoryStorage {
        fn load(&self) -> Result<Option<SessionRecord>, SessionError> {
            Ok(self.slot.lock().unwrap().clone())
        }

        fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
            if self.failing {
                return Err(SessionError::Storage("disk full".to_string()));
            }
            *self.slot.lock().unwrap() = Some(record.clone());
            Ok(())
        }

        fn clear(&self) -> Result<(), SessionError> {
            *self.slot.lock().unwrap() = None;
            Ok(())
        }
    }
}
