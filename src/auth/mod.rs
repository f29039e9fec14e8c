pub mod guard;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::User;

// Re-export necessary items
pub use guard::AuthSession;
pub use password::{hash_password, validate_password_policy, verify_password};
pub use token::{Claims, TokenService};

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Account email address.
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    /// Plaintext password to compare against the stored hash.
    pub password: String,
}

impl LoginRequest {
    /// Lowercases the email to match its stored canonical form.
    pub fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
    }
}

/// Response body after a successful signup or login: the user's public
/// representation plus the freshly issued session token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}
