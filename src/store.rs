//! Account storage
//!
//! The auth core does not persist anything itself. [`AccountStore`] is the
//! seam a deployment implements over its own database; [`InMemoryAccountStore`]
//! backs the bundled server and the tests.

use crate::{
    auth::lockout::{LockoutPolicy, LockoutState},
    error::AuthError,
    models::account::{normalize_email, Account},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

/// Account storage collaborator
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError>;

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Account>, AuthError>;

    /// Insert a new account, `Conflict` if the email is taken
    async fn insert(&self, account: Account) -> Result<(), AuthError>;

    /// Replace the password digest atomically
    async fn update_password_hash(
        &self,
        id: &Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Overwrite the lockout state, used to clear it after a successful login
    async fn update_lockout(&self, id: &Uuid, lockout: &LockoutState) -> Result<(), AuthError>;

    /// Apply one failed attempt to the stored state and return the result.
    ///
    /// Must be atomic per account: concurrent failures each count, and an
    /// active lock set by one of them is never cleared by another.
    async fn record_failed_attempt(
        &self,
        id: &Uuid,
        policy: &LockoutPolicy,
    ) -> Result<LockoutState, AuthError>;
}

/// Process-local store
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<Uuid, Account>,
    by_email: DashMap<String, Uuid>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let id = match self.by_email.get(&normalize_email(email)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_by_id(&id).await
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Account>, AuthError> {
        Ok(self.accounts.get(id).map(|account| account.clone()))
    }

    async fn insert(&self, account: Account) -> Result<(), AuthError> {
        match self.by_email.entry(normalize_email(&account.email)) {
            Entry::Occupied(_) => Err(AuthError::conflict("Email is already registered")),
            Entry::Vacant(slot) => {
                slot.insert(account.id);
                self.accounts.insert(account.id, account);
                Ok(())
            }
        }
    }

    async fn update_password_hash(
        &self,
        id: &Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| AuthError::internal_error("account disappeared during update"))?;
        account.password_hash = password_hash.to_string();
        account.password_changed_at = changed_at;
        account.updated_at = changed_at;
        Ok(())
    }

    async fn update_lockout(&self, id: &Uuid, lockout: &LockoutState) -> Result<(), AuthError> {
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| AuthError::internal_error("account disappeared during update"))?;
        account.lockout = lockout.clone();
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        id: &Uuid,
        policy: &LockoutPolicy,
    ) -> Result<LockoutState, AuthError> {
        // Read-modify-write under the shard write lock
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| AuthError::internal_error("account disappeared during update"))?;
        account.lockout = account.lockout.register_failure(policy);
        Ok(account.lockout.clone())
    }
}
