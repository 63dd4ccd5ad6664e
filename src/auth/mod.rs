//! Authentication core: password policy, credential hashing, tokens and lockout

pub mod jwt;
pub mod lockout;
pub mod middleware;
pub mod password;
pub mod policy;

pub use jwt::{Claims, JwtService, TokenKind, TokenPair, TokenSettings};
pub use lockout::{LockoutPolicy, LockoutState};
pub use middleware::{extract_token, jwt_auth_middleware, AuthContext};
pub use password::{CredentialHasher, PasswordHasher};
pub use policy::{validate_email, validate_password, ValidationError};
