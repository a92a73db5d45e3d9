//! User directory seam.
//!
//! Storage of [`UserAccount`]s lives outside this crate; the session manager
//! and the administration facades only see this trait.

use std::sync::Arc;

use chrono::Utc;

use edugate_core::{Aggregate, DomainError, RoleId, UserId};

use crate::registry::RoleReferences;
use crate::user::{ReassignRole, UserAccount, UserCommand};

pub trait UserDirectory: Send + Sync {
    fn get(&self, user_id: UserId) -> Option<UserAccount>;

    /// Exact, case-insensitive match on the normalized email.
    fn find_by_email(&self, email: &str) -> Option<UserAccount>;

    /// Insert or replace an account.
    ///
    /// Fails with [`DomainError::Conflict`] when another account already uses
    /// the same email.
    fn save(&self, account: UserAccount) -> Result<(), DomainError>;

    fn list(&self) -> Vec<UserAccount>;
}

impl<D> UserDirectory for Arc<D>
where
    D: UserDirectory + ?Sized,
{
    fn get(&self, user_id: UserId) -> Option<UserAccount> {
        (**self).get(user_id)
    }

    fn find_by_email(&self, email: &str) -> Option<UserAccount> {
        (**self).find_by_email(email)
    }

    fn save(&self, account: UserAccount) -> Result<(), DomainError> {
        (**self).save(account)
    }

    fn list(&self) -> Vec<UserAccount> {
        (**self).list()
    }
}

impl<D> RoleReferences for D
where
    D: UserDirectory + ?Sized,
{
    fn holders_of(&self, role_id: RoleId) -> Vec<UserId> {
        self.list()
            .into_iter()
            .filter(|account| account.role_id == role_id)
            .map(|account| account.id)
            .collect()
    }

    /// Accounts are saved one at a time; on failure the ones already saved
    /// keep the new role and the count is logged.
    fn reassign_role(&self, from: RoleId, to: RoleId) -> Result<usize, DomainError> {
        let mut moved = 0;
        for user_id in self.holders_of(from) {
            let Some(mut account) = self.get(user_id) else {
                continue;
            };
            let saved = account
                .execute(&UserCommand::ReassignRole(ReassignRole {
                    user_id,
                    from,
                    to,
                    occurred_at: Utc::now(),
                }))
                .and_then(|events| {
                    if events.is_empty() {
                        Ok(false)
                    } else {
                        self.save(account).map(|()| true)
                    }
                });
            match saved {
                Ok(true) => moved += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        from = %from,
                        to = %to,
                        user_id = %user_id,
                        moved,
                        error = %e,
                        "role reassignment stopped part-way"
                    );
                    return Err(e);
                }
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use edugate_core::TenantId;

    use super::*;
    use crate::test_support::{MemoryDirectory, account_with};
    use crate::{Authority, DeletePolicy, PermissionSet, RegistryError, RoleRegistry};

    /// Accepts `budget` saves, then refuses every further one.
    struct FlakyDirectory {
        inner: MemoryDirectory,
        budget: AtomicUsize,
    }

    impl UserDirectory for FlakyDirectory {
        fn get(&self, user_id: UserId) -> Option<UserAccount> {
            self.inner.get(user_id)
        }

        fn find_by_email(&self, email: &str) -> Option<UserAccount> {
            self.inner.find_by_email(email)
        }

        fn save(&self, account: UserAccount) -> Result<(), DomainError> {
            let left = self.budget.load(Ordering::SeqCst);
            if left == 0 {
                return Err(DomainError::invariant("directory unavailable"));
            }
            self.budget.store(left - 1, Ordering::SeqCst);
            self.inner.save(account)
        }

        fn list(&self) -> Vec<UserAccount> {
            self.inner.list()
        }
    }

    #[test]
    fn reassigns_every_holder() {
        let (from, to) = (RoleId::new(), RoleId::new());
        let directory = MemoryDirectory::default();
        let tenant = Some(TenantId::new());
        directory.insert(account_with("a@school.edu", tenant, from));
        directory.insert(account_with("b@school.edu", tenant, from));
        directory.insert(account_with("c@school.edu", tenant, to));

        assert_eq!(directory.reassign_role(from, to), Ok(2));
        assert!(directory.holders_of(from).is_empty());
        assert_eq!(directory.holders_of(to).len(), 3);
    }

    #[test]
    fn failed_save_keeps_role_and_reports_error() {
        let tenant = TenantId::new();
        let mut registry = RoleRegistry::new();
        let doomed = registry.create_role("Cover", PermissionSet::none(), tenant).unwrap();
        let fallback = registry.create_role("Supply", PermissionSet::none(), tenant).unwrap();

        let directory = FlakyDirectory {
            inner: MemoryDirectory::default(),
            budget: AtomicUsize::new(1),
        };
        for email in ["a@school.edu", "b@school.edu", "c@school.edu"] {
            directory.inner.insert(account_with(email, Some(tenant), doomed.id));
        }

        let result = registry.delete_role(
            doomed.id,
            Authority::Tenant,
            &directory,
            DeletePolicy::ReassignTo(fallback.id),
        );

        assert!(matches!(result, Err(RegistryError::Directory(DomainError::InvariantViolation(_)))));
        assert!(registry.get(doomed.id).is_some());
        assert_eq!(directory.holders_of(fallback.id).len(), 1);
        assert_eq!(directory.holders_of(doomed.id).len(), 2);
    }
}
