//! Account domain models

use crate::auth::lockout::LockoutState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account record as held by the account store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// PHC digest, never logged or serialized to clients
    pub password_hash: String,

    // Security policy
    pub lockout: LockoutState,
    pub password_changed_at: DateTime<Utc>,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: &str, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            lockout: LockoutState::default(),
            password_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lookup key for an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account response (without password digest)
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            created_at: account.created_at,
        }
    }
}
