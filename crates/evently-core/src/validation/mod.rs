//! Input validation at the request boundary.
//!
//! Everything that reaches the identity store has passed through here:
//! emails are normalized, phone numbers checked, and field sizes bounded.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateEmail;

/// Validation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Email address is malformed.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Phone number is not ten digits.
    #[error("Please enter a valid 10-digit phone number")]
    InvalidPhoneNumber,

    /// Role is outside the closed set.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Input exceeds maximum allowed length.
    #[error("Field '{field}' exceeds maximum length ({max} bytes, got {actual})")]
    TooLong {
        /// Offending field.
        field: String,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },
}

/// Size limits per input type.
pub mod limits {
    /// Maximum email length (RFC 5321 path limit).
    pub const MAX_EMAIL_LENGTH: usize = 254;

    /// Maximum password length. Bounds the hashing input.
    pub const MAX_PASSWORD_LENGTH: usize = 1024;

    /// Maximum length of free-text fields on event records.
    pub const MAX_TEXT_LENGTH: usize = 4096;

    /// Required phone number length.
    pub const PHONE_NUMBER_DIGITS: usize = 10;
}

/// Reject a missing or blank field, returning the trimmed value.
///
/// # Errors
///
/// Returns `ValidationError::MissingField` if the value is absent or blank.
pub fn require_field<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(name.to_string())),
    }
}

/// Check a field against a byte limit.
///
/// # Errors
///
/// Returns `ValidationError::TooLong` if `value` exceeds `max` bytes.
pub fn check_length(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Normalize and validate an email address.
///
/// Applies NFKC normalization, trims and lowercases, so that lookups and
/// the uniqueness check are case-insensitive.
///
/// # Errors
///
/// Returns `ValidationError::InvalidEmail` for malformed addresses.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email: String = raw.trim().nfkc().collect::<String>().to_lowercase();

    if email.is_empty() {
        return Err(ValidationError::MissingField("email".to_string()));
    }
    check_length("email", &email, limits::MAX_EMAIL_LENGTH)?;

    // The domain must carry a TLD; bare hosts are rejected
    let has_tld = email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.contains('.') && !domain.ends_with('.'));

    if !has_tld || !email.as_str().validate_email() {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(email)
}

/// Validate a phone number: exactly ten ASCII digits.
///
/// # Errors
///
/// Returns `ValidationError::InvalidPhoneNumber` otherwise.
pub fn validate_phone_number(raw: &str) -> Result<String, ValidationError> {
    let phone = raw.trim();
    if phone.len() == limits::PHONE_NUMBER_DIGITS && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(phone.to_string())
    } else {
        Err(ValidationError::InvalidPhoneNumber)
    }
}

/// Validate a plaintext password's shape (not its strength).
///
/// Whitespace is significant: the password is never trimmed, but one made
/// only of whitespace counts as missing.
///
/// # Errors
///
/// Returns error if the password is blank or too long.
pub fn validate_password(raw: &str) -> Result<(), ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::MissingField("password".to_string()));
    }
    check_length("password", raw, limits::MAX_PASSWORD_LENGTH)
}

/// Require a password field and validate it, returning it untouched.
///
/// # Errors
///
/// Returns `ValidationError::MissingField` if absent or blank, or
/// `ValidationError::TooLong`.
pub fn require_password(value: Option<&str>) -> Result<&str, ValidationError> {
    let password = value.ok_or_else(|| ValidationError::MissingField("password".to_string()))?;
    validate_password(password)?;
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@B.com ").unwrap(), "a@b.com");
        assert_eq!(
            normalize_email("First.Last@Example.ORG").unwrap(),
            "first.last@example.org"
        );
    }

    #[test]
    fn test_invalid_emails() {
        assert_eq!(normalize_email("not-an-email"), Err(ValidationError::InvalidEmail));
        assert_eq!(normalize_email("a@localhost"), Err(ValidationError::InvalidEmail));
        assert_eq!(normalize_email("@b.com"), Err(ValidationError::InvalidEmail));
        assert!(matches!(
            normalize_email("   "),
            Err(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_email_too_long() {
        let email = format!("{}@b.com", "a".repeat(300));
        assert!(matches!(
            normalize_email(&email),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_phone_number() {
        assert_eq!(validate_phone_number("1234567890").unwrap(), "1234567890");
        assert_eq!(
            validate_phone_number("12345"),
            Err(ValidationError::InvalidPhoneNumber)
        );
        assert_eq!(
            validate_phone_number("12345abcde"),
            Err(ValidationError::InvalidPhoneNumber)
        );
        // Full-width digits are not ASCII
        assert_eq!(
            validate_phone_number("１２３４５６７８９０"),
            Err(ValidationError::InvalidPhoneNumber)
        );
    }

    #[test]
    fn test_password_shape() {
        assert!(validate_password("secret123").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password(&"x".repeat(2000)).is_err());
        assert!(validate_password("   ").is_err());
    }

    #[test]
    fn test_require_password_keeps_whitespace() {
        assert_eq!(require_password(Some("  pw  ")).unwrap(), "  pw  ");
        assert_eq!(
            require_password(None),
            Err(ValidationError::MissingField("password".to_string()))
        );
        assert!(require_password(Some("\t ")).is_err());
    }

    #[test]
    fn test_require_field() {
        assert_eq!(require_field("name", Some(" gala ")).unwrap(), "gala");
        assert_eq!(
            require_field("name", Some("  ")),
            Err(ValidationError::MissingField("name".to_string()))
        );
        assert!(require_field("time", None).is_err());
    }
}
