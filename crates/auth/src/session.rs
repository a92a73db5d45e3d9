//! Session / identity store.
//!
//! One [`SessionManager`] per authenticated context (browser tab, process,
//! request pipeline). The session only remembers *who* signed in and *when*;
//! the principal is re-read from the directory on every access, so changes to
//! the account show up without a refresh.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edugate_core::UserId;

use crate::config::SessionPolicy;
use crate::directory::UserDirectory;
use crate::user::normalize_email;
use crate::Principal;

/// Persisted session pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is not active")]
    AccountSuspended,

    #[error("session storage failure: {0}")]
    Storage(String),
}

/// Where the single session slot of a context is persisted.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<SessionRecord>, SessionError>;
    fn save(&self, record: &SessionRecord) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

impl<S> SessionStorage for Arc<S>
where
    S: SessionStorage + ?Sized,
{
    fn load(&self) -> Result<Option<SessionRecord>, SessionError> {
        (**self).load()
    }

    fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        (**self).save(record)
    }

    fn clear(&self) -> Result<(), SessionError> {
        (**self).clear()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    #[error("session has expired")]
    Expired,

    #[error("session issued in the future")]
    NotYetValid,
}

/// Deterministically check a session's age against the policy.
pub fn validate_session(
    record: &SessionRecord,
    policy: &SessionPolicy,
    now: DateTime<Utc>,
) -> Result<(), SessionExpiry> {
    if now < record.issued_at {
        return Err(SessionExpiry::NotYetValid);
    }
    match policy.max_age {
        Some(max_age) if now - record.issued_at >= max_age => Err(SessionExpiry::Expired),
        _ => Ok(()),
    }
}

pub struct SessionManager<D, S> {
    directory: D,
    storage: S,
    policy: SessionPolicy,
    state: SessionState,
    current: Option<SessionRecord>,
    /// Whether persisted storage has already been consulted.
    restored: bool,
}

impl<D, S> SessionManager<D, S>
where
    D: UserDirectory,
    S: SessionStorage,
{
    pub fn new(directory: D, storage: S, policy: SessionPolicy) -> Self {
        Self {
            directory,
            storage,
            policy,
            state: SessionState::Unauthenticated,
            current: None,
            restored: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&SessionRecord> {
        self.current.as_ref()
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn login(&mut self, identifier: &str) -> Result<Principal, SessionError> {
        self.login_at(identifier, Utc::now())
    }

    /// Sign in by email. Replaces any existing session; a failed attempt
    /// leaves the context signed out.
    pub fn login_at(&mut self, identifier: &str, now: DateTime<Utc>) -> Result<Principal, SessionError> {
        self.state = SessionState::Authenticating;
        self.current = None;

        let email = normalize_email(identifier);
        let account = match self.directory.find_by_email(&email) {
            Some(account) if !email.is_empty() => account,
            _ => {
                tracing::info!("login rejected: unknown identifier");
                self.end_session();
                return Err(SessionError::InvalidCredentials);
            }
        };

        if !account.status.is_active() {
            tracing::warn!(user_id = %account.id, status = %account.status, "login rejected: account not active");
            self.end_session();
            return Err(SessionError::AccountSuspended);
        }

        let record = SessionRecord {
            user_id: account.id,
            issued_at: now,
        };
        if let Err(e) = self.storage.save(&record) {
            tracing::warn!(user_id = %account.id, error = %e, "login aborted: session not persisted");
            self.end_session();
            return Err(e);
        }

        self.current = Some(record);
        self.restored = true;
        self.state = SessionState::Authenticated;
        tracing::info!(
            user_id = %account.id,
            tenant_id = ?account.tenant_id,
            "login succeeded"
        );
        Ok(account.principal())
    }

    /// Sign out. Always succeeds; signing out twice is a no-op.
    pub fn logout(&mut self) {
        if let Some(record) = &self.current {
            tracing::info!(user_id = %record.user_id, "logout");
        }
        self.end_session();
    }

    pub fn current_principal(&mut self) -> Result<Option<Principal>, SessionError> {
        self.current_principal_at(Utc::now())
    }

    /// The signed-in principal, freshly read from the directory.
    ///
    /// After a restart the session is reloaded from storage once. Expired
    /// sessions, removed accounts and (with revalidation on) inactive accounts
    /// end the session.
    pub fn current_principal_at(&mut self, now: DateTime<Utc>) -> Result<Option<Principal>, SessionError> {
        if self.current.is_none() && !self.restored {
            let loaded = self.storage.load()?;
            self.restored = true;
            if let Some(record) = loaded {
                tracing::debug!(user_id = %record.user_id, "session restored from storage");
                self.current = Some(record);
                self.state = SessionState::Authenticated;
            }
        }

        let Some(record) = self.current.clone() else {
            return Ok(None);
        };

        if let Err(expiry) = validate_session(&record, &self.policy, now) {
            tracing::info!(user_id = %record.user_id, reason = %expiry, "session ended");
            self.end_session();
            return Ok(None);
        }

        let Some(account) = self.directory.get(record.user_id) else {
            tracing::warn!(user_id = %record.user_id, "session ended: account no longer exists");
            self.end_session();
            return Ok(None);
        };

        if self.policy.revalidate && !account.status.is_active() {
            tracing::warn!(user_id = %account.id, status = %account.status, "session ended: account not active");
            self.end_session();
            return Ok(None);
        }

        Ok(Some(account.principal()))
    }

    fn end_session(&mut self) {
        self.current = None;
        self.restored = true;
        self.state = SessionState::Unauthenticated;
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }
    }
}
