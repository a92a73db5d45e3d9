use std::collections::HashMap;
use std::sync::RwLock;

use edugate_auth::UserDirectory;
use edugate_auth::UserAccount;
use edugate_auth::user::normalize_email;
use edugate_core::{DomainError, UserId};

#[derive(Debug, Default)]
struct Accounts {
    by_id: HashMap<UserId, UserAccount>,
    by_email: HashMap<String, UserId>,
}

/// In-memory user directory for tests/dev.
///
/// Emails are unique across all tenants and matched case-insensitively.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    inner: RwLock<Accounts>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory pre-populated with `accounts`.
    pub fn with_accounts<I>(accounts: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = UserAccount>,
    {
        let directory = Self::new();
        for account in accounts {
            directory.save(account)?;
        }
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|a| a.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop an account entirely.
    pub fn remove(&self, user_id: UserId) -> Option<UserAccount> {
        let mut accounts = self.inner.write().ok()?;
        let removed = accounts.by_id.remove(&user_id)?;
        accounts.by_email.remove(&normalize_email(&removed.email));
        tracing::info!(user_id = %user_id, "account removed from directory");
        Some(removed)
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get(&self, user_id: UserId) -> Option<UserAccount> {
        let accounts = self.inner.read().ok()?;
        accounts.by_id.get(&user_id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<UserAccount> {
        let key = normalize_email(email);
        if key.is_empty() {
            return None;
        }
        let accounts = self.inner.read().ok()?;
        let user_id = accounts.by_email.get(&key)?;
        accounts.by_id.get(user_id).cloned()
    }

    fn save(&self, account: UserAccount) -> Result<(), DomainError> {
        let key = normalize_email(&account.email);
        if key.is_empty() {
            return Err(DomainError::validation("email is required"));
        }

        let mut accounts = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("user directory lock poisoned"))?;

        if let Some(owner) = accounts.by_email.get(&key) {
            if *owner != account.id {
                return Err(DomainError::conflict(format!("email already registered: {key}")));
            }
        }

        let previous = accounts.by_id.get(&account.id).map(|a| normalize_email(&a.email));
        if let Some(previous) = previous.filter(|p| *p != key) {
            accounts.by_email.remove(&previous);
        }

        accounts.by_email.insert(key, account.id);
        accounts.by_id.insert(account.id, account);
        Ok(())
    }

    /// Accounts ordered by email.
    fn list(&self) -> Vec<UserAccount> {
        let Ok(accounts) = self.inner.read() else {
            return Vec::new();
        };
        let mut all: Vec<UserAccount> = accounts.by_id.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        all
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use edugate_auth::{RoleReferences, UserStatus};
    use edugate_core::{RoleId, TenantId};

    use super::*;

    fn account(email: &str, role_id: RoleId) -> UserAccount {
        let mut account = UserAccount::empty(UserId::new());
        account.email = normalize_email(email);
        account.display_name = email.to_string();
        account.tenant_id = Some(TenantId::new());
        account.role_id = role_id;
        account.status = UserStatus::Active;
        account.allowed_scopes = BTreeSet::new();
        account.created = true;
        account.version = 1;
        account
    }

    #[test]
    fn lookup_by_email_ignores_case_and_whitespace() {
        let directory = InMemoryUserDirectory::new();
        let alice = account("alice@school.edu", RoleId::new());
        directory.save(alice.clone()).unwrap();

        assert_eq!(directory.find_by_email("  Alice@School.EDU "), Some(alice.clone()));
        assert_eq!(directory.get(alice.id), Some(alice));
        assert_eq!(directory.find_by_email(""), None);
    }

    #[test]
    fn duplicate_email_under_another_id_conflicts() {
        let directory = InMemoryUserDirectory::new();
        directory.save(account("bob@school.edu", RoleId::new())).unwrap();

        let err = directory
            .save(account("BOB@school.edu", RoleId::new()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn changing_email_frees_the_old_one() {
        let directory = InMemoryUserDirectory::new();
        let mut carol = account("carol@school.edu", RoleId::new());
        directory.save(carol.clone()).unwrap();

        carol.email = "carol.new@school.edu".to_string();
        directory.save(carol.clone()).unwrap();

        assert_eq!(directory.find_by_email("carol@school.edu"), None);
        assert_eq!(directory.find_by_email("carol.new@school.edu"), Some(carol));
        directory
            .save(account("carol@school.edu", RoleId::new()))
            .unwrap();
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn list_is_sorted_by_email() {
        let role = RoleId::new();
        let directory = InMemoryUserDirectory::with_accounts([
            account("zed@school.edu", role),
            account("amy@school.edu", role),
            account("max@school.edu", role),
        ])
        .unwrap();

        let emails: Vec<String> = directory.list().into_iter().map(|a| a.email).collect();
        assert_eq!(emails, ["amy@school.edu", "max@school.edu", "zed@school.edu"]);
    }

    #[test]
    fn remove_drops_email_index() {
        let directory = InMemoryUserDirectory::new();
        let dan = account("dan@school.edu", RoleId::new());
        directory.save(dan.clone()).unwrap();

        assert_eq!(directory.remove(dan.id), Some(dan.clone()));
        assert!(directory.is_empty());
        assert_eq!(directory.find_by_email("dan@school.edu"), None);
        assert_eq!(directory.remove(dan.id), None);
    }

    #[test]
    fn reassigns_role_holders() {
        let old_role = RoleId::new();
        let new_role = RoleId::new();
        let directory = InMemoryUserDirectory::with_accounts([
            account("a@school.edu", old_role),
            account("b@school.edu", old_role),
            account("c@school.edu", new_role),
        ])
        .unwrap();

        assert_eq!(directory.holders_of(old_role).len(), 2);
        assert_eq!(directory.reassign_role(old_role, new_role).unwrap(), 2);
        assert!(directory.holders_of(old_role).is_empty());
        assert_eq!(directory.holders_of(new_role).len(), 3);
    }
}
