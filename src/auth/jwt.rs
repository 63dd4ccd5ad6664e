//! JWT token generation and validation
//! Implements access token + refresh token pattern
//!
//! Tokens are stateless HS256 JWTs. Issuer, audience and token kind are part
//! of the signed payload; expiry is checked against the injected [`Clock`]
//! rather than the wall clock so verification is deterministic under test.
//!
//! [`Clock`]: crate::clock::Clock

use crate::{clock::SharedClock, config::AppConfig, error::AuthError};
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Minimum accepted length of a configured signing secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Length of the random secret generated when none is configured
const EPHEMERAL_SECRET_LENGTH: usize = 64;

/// Default `iss` claim
pub const DEFAULT_ISSUER: &str = "auth-core";

/// Default `aud` claim
pub const DEFAULT_AUDIENCE: &str = "auth-core-clients";

/// Token kind, signed into every token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,

    /// Subject email
    pub email: String,

    /// Token kind (access or refresh)
    pub kind: TokenKind,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    /// Parse the subject back into an account ID
    pub fn subject_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }
}

/// Token pair response
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64, // seconds until access token expires
}

/// Issuer, audience and lifetimes for minted tokens
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub issuer: String,
    pub audience: String,
    pub access_token_exp_secs: u64,
    pub refresh_token_exp_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            access_token_exp_secs: 15 * 60,
            refresh_token_exp_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    settings: TokenSettings,
    clock: SharedClock,
    ephemeral_secret: bool,
}

impl JwtService {
    /// Create JWT service with an explicit signing secret.
    ///
    /// Passing `None` keeps the service usable but signs with a random
    /// per-process secret: every token becomes invalid when the process
    /// restarts, and instances behind a load balancer reject each other's
    /// tokens. This is a deployment misconfiguration and is logged as such.
    pub fn new(
        secret: Option<&Secret<String>>,
        settings: TokenSettings,
        clock: SharedClock,
    ) -> Result<Self, AuthError> {
        let (secret, ephemeral_secret) = match secret {
            Some(secret) => {
                let secret = secret.expose_secret().clone();
                // Ensure secret is at least 32 bytes for HS256
                if secret.len() < MIN_SECRET_LENGTH {
                    return Err(AuthError::Config(format!(
                        "JWT secret too short (min {} chars)",
                        MIN_SECRET_LENGTH
                    )));
                }
                (secret, false)
            }
            None => {
                tracing::warn!(
                    "!!! No JWT signing secret configured (AUTH_SECURITY__JWT_SECRET) !!!"
                );
                tracing::warn!(
                    "!!! Using a random per-process secret: issued tokens will NOT survive a restart \
                     and are not shared between instances. Do not run like this in production. !!!"
                );
                (generate_ephemeral_secret(), true)
            }
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // Expiry is checked against the injected clock in `verify_token`
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            settings,
            clock,
            ephemeral_secret,
        })
    }

    /// Create JWT service from config
    pub fn from_config(config: &AppConfig, clock: SharedClock) -> Result<Self, AuthError> {
        let security = &config.security;
        let settings = TokenSettings {
            issuer: security.jwt_issuer.clone(),
            audience: security.jwt_audience.clone(),
            access_token_exp_secs: security.access_token_exp_secs,
            refresh_token_exp_secs: security.refresh_token_exp_secs,
        };

        Self::new(security.jwt_secret.as_ref(), settings, clock)
    }

    /// Whether tokens are signed with a generated, non-persistent secret
    pub fn uses_ephemeral_secret(&self) -> bool {
        self.ephemeral_secret
    }

    /// Generate access token
    pub fn generate_access_token(&self, subject_id: &Uuid, email: &str) -> Result<String, AuthError> {
        self.generate(subject_id, email, TokenKind::Access)
    }

    /// Generate refresh token
    pub fn generate_refresh_token(
        &self,
        subject_id: &Uuid,
        email: &str,
    ) -> Result<String, AuthError> {
        self.generate(subject_id, email, TokenKind::Refresh)
    }

    /// Generate token pair
    pub fn generate_token_pair(&self, subject_id: &Uuid, email: &str) -> Result<TokenPair, AuthError> {
        let access_token = self.generate_access_token(subject_id, email)?;

        let refresh_token = self.generate_refresh_token(subject_id, email)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.settings.access_token_exp_secs,
        })
    }

    fn generate(&self, subject_id: &Uuid, email: &str, kind: TokenKind) -> Result<String, AuthError> {
        let lifetime_secs = match kind {
            TokenKind::Access => self.settings.access_token_exp_secs,
            TokenKind::Refresh => self.settings.refresh_token_exp_secs,
        };
        let now = self.clock.now();
        let expiration = now + Duration::seconds(lifetime_secs as i64);

        let claims = Claims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            kind,
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode {} token: {:?}", kind, e);
            AuthError::Internal(format!("Failed to encode {} token: {}", kind, e))
        })
    }

    /// Verify and decode a token.
    ///
    /// Checks run in order: signature, structure, issuer and audience
    /// (`TokenInvalid`), then expiry (`TokenExpired`), then kind when the
    /// caller names one (`TokenKindMismatch`).
    pub fn verify_token(&self, token: &str, expected: Option<TokenKind>) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AuthError::TokenInvalid
            })?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            tracing::debug!(kind = %claims.kind, exp = claims.exp, "Token expired");
            return Err(AuthError::TokenExpired { kind: claims.kind });
        }

        if let Some(expected) = expected {
            if claims.kind != expected {
                tracing::debug!("Token kind mismatch: expected '{}', got '{}'", expected, claims.kind);
                return Err(AuthError::TokenKindMismatch {
                    expected,
                    actual: claims.kind,
                });
            }
        }

        Ok(claims)
    }

    /// Validate access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_token(token, Some(TokenKind::Access))
    }

    /// Validate refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_token(token, Some(TokenKind::Refresh))
    }
}

fn generate_ephemeral_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(EPHEMERAL_SECRET_LENGTH)
        .map(char::from)
        .collect()
}
