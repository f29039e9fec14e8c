use bcrypt::{hash, verify};
use validator::ValidationError;

use crate::error::AppError;

/// Minimum plaintext password length accepted at signup or update.
const MIN_PASSWORD_LEN: usize = 7;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, 12) // bcrypt default cost is 12
        .map_err(|e| AppError::Upstream(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::Upstream(format!("Failed to verify password: {}", e)))
}

/// Password acceptance policy: at least 7 characters and must not contain the
/// substring "password" in any letter case.
///
/// Used as a `validator` custom rule on signup and profile-update payloads, so
/// a rejected password fails validation before anything is persisted.
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LEN {
        let mut err = ValidationError::new("password_too_short");
        err.message = Some("Password must be at least 7 characters".into());
        return Err(err);
    }

    if password.to_lowercase().contains("password") {
        let mut err = ValidationError::new("password_contains_password");
        err.message = Some("Password must not contain \"password\"".into());
        return Err(err);
    }

    Ok(())
}
