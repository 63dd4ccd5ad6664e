//! Password strength and email format checks.
//!
//! Both validators are pure functions. Password rules are evaluated in a fixed
//! order (length, uppercase, lowercase, digit, special) and the first rule
//! violated is the one reported, so error messages are deterministic.

use thiserror::Error;
use validator::ValidateEmail;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Password is too short.
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters long")]
    PasswordTooShort,

    /// Password has no uppercase letter.
    #[error("Password must contain at least one uppercase letter")]
    PasswordMissingUppercase,

    /// Password has no lowercase letter.
    #[error("Password must contain at least one lowercase letter")]
    PasswordMissingLowercase,

    /// Password has no digit.
    #[error("Password must contain at least one number")]
    PasswordMissingDigit,

    /// Password has no character outside `[A-Za-z0-9]`.
    #[error("Password must contain at least one special character")]
    PasswordMissingSpecial,

    /// Email does not follow the address grammar.
    #[error("Invalid email format")]
    EmailInvalidFormat,
}

/// Every password rule the candidate violates, in reporting order.
///
/// ```
/// use auth_core::auth::policy::{password_violations, ValidationError};
///
/// assert_eq!(
///     password_violations("abc"),
///     vec![
///         ValidationError::PasswordTooShort,
///         ValidationError::PasswordMissingUppercase,
///         ValidationError::PasswordMissingDigit,
///         ValidationError::PasswordMissingSpecial,
///     ]
/// );
/// ```
pub fn password_violations(candidate: &str) -> Vec<ValidationError> {
    let rules: [(bool, ValidationError); 5] = [
        (
            candidate.chars().count() >= MIN_PASSWORD_LENGTH,
            ValidationError::PasswordTooShort,
        ),
        (
            candidate.chars().any(|c| c.is_ascii_uppercase()),
            ValidationError::PasswordMissingUppercase,
        ),
        (
            candidate.chars().any(|c| c.is_ascii_lowercase()),
            ValidationError::PasswordMissingLowercase,
        ),
        (
            candidate.chars().any(|c| c.is_ascii_digit()),
            ValidationError::PasswordMissingDigit,
        ),
        (
            candidate.chars().any(|c| !c.is_ascii_alphanumeric()),
            ValidationError::PasswordMissingSpecial,
        ),
    ];

    rules
        .into_iter()
        .filter(|(holds, _)| !holds)
        .map(|(_, violation)| violation)
        .collect()
}

/// Validate a password against the strength policy.
///
/// Requirements:
/// - Length: at least 8 characters
/// - At least one uppercase letter, one lowercase letter and one digit
/// - At least one character outside the alphanumeric set
///
/// # Examples
///
/// ```
/// use auth_core::auth::policy::{validate_password, ValidationError};
///
/// assert!(validate_password("Abcdef1!").is_ok());
/// assert_eq!(
///     validate_password("abcdefgh"),
///     Err(ValidationError::PasswordMissingUppercase)
/// );
/// ```
pub fn validate_password(candidate: &str) -> Result<(), ValidationError> {
    match password_violations(candidate).first() {
        Some(violation) => Err(*violation),
        None => Ok(()),
    }
}

/// Validate an email address.
///
/// Failures carry a single generic reason without field-level detail.
pub fn validate_email(candidate: &str) -> Result<(), ValidationError> {
    if candidate.validate_email() {
        Ok(())
    } else {
        Err(ValidationError::EmailInvalidFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_valid() {
        assert!(validate_password("Abcdef1!").is_ok());
        assert!(validate_password("Str0ng pass").is_ok());
        assert!(validate_password("TestPassword123!").is_ok());
    }

    #[test]
    fn test_validate_password_reports_first_rule() {
        assert_eq!(validate_password(""), Err(ValidationError::PasswordTooShort));
        assert_eq!(
            validate_password("Ab1!"),
            Err(ValidationError::PasswordTooShort)
        );
        assert_eq!(
            validate_password("abcdefgh"),
            Err(ValidationError::PasswordMissingUppercase)
        );
        assert_eq!(
            validate_password("ABCDEFGH"),
            Err(ValidationError::PasswordMissingLowercase)
        );
        assert_eq!(
            validate_password("Abcdefgh"),
            Err(ValidationError::PasswordMissingDigit)
        );
        assert_eq!(
            validate_password("Abcdefg1"),
            Err(ValidationError::PasswordMissingSpecial)
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 7 characters, 9 bytes
        assert_eq!(
            validate_password("Aé1!xyz"),
            Err(ValidationError::PasswordTooShort)
        );
        assert!(validate_password("Aé1!xyzw").is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
        assert_eq!(
            validate_email("invalid-email"),
            Err(ValidationError::EmailInvalidFormat)
        );
        assert_eq!(
            validate_email("user@"),
            Err(ValidationError::EmailInvalidFormat)
        );
        assert_eq!(validate_email(""), Err(ValidationError::EmailInvalidFormat));
    }
}
