use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// Represents the claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user's unique identifier.
    pub sub: Uuid,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Unique token id. Two sessions for the same user are always distinct
    /// strings, which is what makes exact-match revocation possible.
    pub jti: Uuid,
}

/// Issues and verifies signed session tokens.
///
/// Signature verification is stateless and touches no storage; revocation-list
/// membership is checked separately by the auth guard. Tokens carry no expiry:
/// they stay valid until explicitly revoked, which the server can always do
/// because every issued token is also recorded in the owning user's session
/// list.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Builds a service around the process-wide signing secret.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Tokens are revoked explicitly, never by expiry.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a fresh session token for `user_id` without touching storage.
    pub fn sign(&self, user_id: Uuid) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id,
            iat: Utc::now().timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Upstream(format!("Failed to generate token: {}", e)))
    }

    /// Issues a new session: signs a token and appends it to the user's
    /// session list in the same breath, so every live token is revocable.
    pub async fn issue(&self, pool: &PgPool, user_id: Uuid) -> Result<String, AppError> {
        let token = self.sign(user_id)?;

        let result = sqlx::query(
            "UPDATE users SET sessions = array_append(sessions, $1), updated_at = now()
             WHERE id = $2",
        )
        .bind(&token)
        .bind(user_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }

        Ok(token)
    }

    /// Checks the token's signature and shape, returning the embedded user id.
    ///
    /// Deliberately does not consult the session list; that membership check
    /// belongs to the auth guard, which lets a bad signature short-circuit
    /// before any storage read.
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| AppError::Unauthenticated(format!("Invalid token: {}", e)))
    }

    /// Removes one session token from the user's list. Removing a token that
    /// is not present is a no-op, not an error.
    pub async fn revoke_one(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        token: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET sessions = array_remove(sessions, $1), updated_at = now()
             WHERE id = $2",
        )
        .bind(token)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Clears the user's entire session list, invalidating every issued token.
    pub async fn revoke_all(&self, pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET sessions = '{}', updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
