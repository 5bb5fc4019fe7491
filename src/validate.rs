use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Upload size cap.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Accepted upload extensions (case-insensitive).
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

/// Minimum password length for registration and password changes.
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+]?[0-9\s\-()]{9,15}$").expect("phone regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("enter a valid email address")]
    InvalidEmail,
    #[error("a user with this email already exists")]
    EmailTaken,
    #[error("a user with this username already exists")]
    UsernameTaken,
    #[error("username may not be empty")]
    EmptyUsername,
    #[error("enter a valid phone number")]
    InvalidPhone,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("you must accept the terms of service")]
    TermsNotAccepted,
    #[error("image may not be larger than 10MB")]
    FileTooLarge,
    #[error("unsupported image format, use JPG, PNG, BMP or TIFF")]
    UnsupportedFormat,
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// Phone is optional; an empty string passes.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() || PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Check an upload's declared filename and size before storing anything.
pub fn validate_upload(filename: &str, size: u64) -> Result<(), ValidationError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge);
    }
    let ext = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match ext {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ValidationError::UnsupportedFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_accepts_international_format() {
        assert!(validate_phone("+48 123 456 789").is_ok());
        assert!(validate_phone("123-456-789").is_ok());
        assert!(validate_phone("(12) 345 67 89").is_ok());
    }

    #[test]
    fn phone_rejects_garbage_and_bad_lengths() {
        assert_eq!(validate_phone("abc"), Err(ValidationError::InvalidPhone));
        assert_eq!(validate_phone("12345678"), Err(ValidationError::InvalidPhone));
        assert_eq!(
            validate_phone("1234567890123456"),
            Err(ValidationError::InvalidPhone)
        );
    }

    #[test]
    fn phone_is_optional() {
        assert!(validate_phone("").is_ok());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("user@example.com").is_ok());
        assert_eq!(validate_email("user"), Err(ValidationError::InvalidEmail));
        assert_eq!(
            validate_email("user@nodot"),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(
            validate_email("two words@example.com"),
            Err(ValidationError::InvalidEmail)
        );
    }

    #[test]
    fn upload_size_limit() {
        assert_eq!(
            validate_upload("big.png", 15 * 1024 * 1024),
            Err(ValidationError::FileTooLarge)
        );
        assert!(validate_upload("ok.png", 5 * 1024 * 1024).is_ok());
    }

    #[test]
    fn upload_extension_whitelist() {
        assert!(validate_upload("photo.JPG", 1024).is_ok());
        assert!(validate_upload("photo.tiff", 1024).is_ok());
        assert_eq!(
            validate_upload("anim.gif", 1024),
            Err(ValidationError::UnsupportedFormat)
        );
        assert_eq!(
            validate_upload("noextension", 1024),
            Err(ValidationError::UnsupportedFormat)
        );
    }
}
