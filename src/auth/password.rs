//! Password hashing and verification using Argon2id
//!
//! Digests are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`), so the
//! algorithm, version, work factor and salt travel with the digest and
//! verification needs nothing but the digest itself.

use crate::error::AuthError;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Memory cost in KiB
const MEMORY_COST_KIB: u32 = 65536;
/// Iterations
const TIME_COST: u32 = 3;
/// Lanes
const PARALLELISM: u32 = 4;

/// Password hasher with a fixed work factor
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    ///
    /// Hashing takes a few hundred milliseconds on commodity hardware. Run it
    /// on a blocking pool, never directly on an async executor thread.
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
            .unwrap_or_else(|_| Params::default());

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hash a password.
    ///
    /// The input is trusted to have passed the password policy already.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AuthError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored digest.
    ///
    /// A malformed or corrupt digest counts as a mismatch.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Failed to parse password hash: {:?}", e);
                return false;
            }
        };

        // Work factor comes from the digest, not from `self.argon2`
        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash/verify seam used by the login service
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    fn verify(&self, password: &str, digest: &str) -> bool;
}

impl CredentialHasher for PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        PasswordHasher::hash(self, password)
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        PasswordHasher::verify(self, password, digest)
    }
}
