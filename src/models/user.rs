use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::validate_password_policy;
use crate::error::AppError;

/// Fields a PATCH /users/update payload is allowed to touch.
/// Any other key fails the whole request with no partial application.
pub const USER_UPDATE_FIELDS: [&str; 4] = ["name", "email", "password", "age"];

/// Represents a user entity as stored in the database.
///
/// The credential hash, active session list, and avatar bytes are never part of
/// any serialized representation; `skip_serializing` keeps them out of every
/// JSON response that carries a `User`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    /// Unique identifier for the user (UUID v4).
    pub id: Uuid,
    /// Display name, trimmed and non-empty.
    pub name: String,
    /// Age in years, never negative. Defaults to 0 when not supplied.
    pub age: i32,
    /// Email address, unique across users, stored lowercased.
    pub email: String,
    /// Salted bcrypt hash of the password.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Active session tokens, oldest first. Grows on signup/login, shrinks on
    /// logout, cleared by logout-all.
    #[serde(skip_serializing)]
    pub sessions: Vec<String>,
    /// Avatar image, normalized to PNG on upload.
    #[serde(skip_serializing)]
    pub avatar: Option<Vec<u8>>,
    /// Timestamp of account creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the account.
    pub updated_at: DateTime<Utc>,
}

/// Input structure for creating a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    /// Display name. Must not be empty after trimming.
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
    /// Age in years. Optional; defaults to 0.
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    #[serde(default)]
    pub age: i32,
    /// Email address. Must be valid email syntax; uniqueness is enforced at signup.
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    /// Plaintext password. At least 7 characters and must not contain the
    /// substring "password" in any case.
    #[validate(custom = "validate_password_policy")]
    pub password: String,
}

impl SignupRequest {
    /// Trims the name and lowercases the email, mirroring what the store
    /// expects. Run before `validate` so the rules see canonical values.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }
}

/// Typed view of an allow-listed profile update. Every field is optional;
/// absent fields leave the stored value untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(custom = "validate_password_policy")]
    pub password: Option<String>,
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    pub age: Option<i32>,
}

impl UserUpdate {
    /// Parses a raw JSON payload into a validated update.
    ///
    /// Rejects any key outside `USER_UPDATE_FIELDS` before looking at values,
    /// so a payload touching a disallowed field fails atomically.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, AppError> {
        let map = payload
            .as_object()
            .ok_or_else(|| AppError::Validation("Update payload must be a JSON object".into()))?;

        if map.is_empty() {
            return Err(AppError::Validation("Update payload must not be empty".into()));
        }

        for key in map.keys() {
            if !USER_UPDATE_FIELDS.contains(&key.as_str()) {
                return Err(AppError::Validation(format!(
                    "Invalid update field: {}",
                    key
                )));
            }
        }

        let mut update: UserUpdate = serde_json::from_value(payload)
            .map_err(|e| AppError::Validation(format!("Invalid update payload: {}", e)))?;

        if let Some(name) = update.name.as_mut() {
            *name = name.trim().to_string();
        }
        if let Some(email) = update.email.as_mut() {
            *email = email.trim().to_lowercase();
        }

        update.validate()?;
        Ok(update)
    }
}
