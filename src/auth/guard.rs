use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;

use crate::auth::token::TokenService;
use crate::error::AppError;
use crate::models::User;

/// The authenticated session behind a protected request.
///
/// Extracting `AuthSession` in a handler is what makes the route protected:
/// the extractor pulls the bearer token out of the `Authorization` header,
/// verifies its signature, resolves it to a stored user, and requires the
/// exact token to still be present in that user's session list. Any failure
/// along the way surfaces as a 401 before the handler body runs.
///
/// Handlers receive the full user row plus the raw token string — logout needs
/// the exact value to remove the one matching session entry.
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

const AUTH_FAILED: &str = "Please authenticate";

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

impl FromRequest for AuthSession {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let token = bearer_token(&req)
                .ok_or_else(|| AppError::Unauthenticated("Missing token".into()))?;

            // Signature check first: stateless and cheap, so a forged or
            // malformed token never costs a database read.
            let token_service = req
                .app_data::<web::Data<TokenService>>()
                .ok_or_else(|| AppError::Upstream("Token service not configured".into()))?;
            let user_id = token_service.verify(&token)?;

            let pool = req
                .app_data::<web::Data<PgPool>>()
                .ok_or_else(|| AppError::Upstream("Database pool not configured".into()))?;

            let user = sqlx::query_as::<_, User>(
                "SELECT id, name, age, email, password_hash, sessions, avatar, created_at, updated_at
                 FROM users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::Unauthenticated(AUTH_FAILED.into()))?;

            // A valid signature is not enough: logout removes the entry from
            // the session list, and a revoked token must stop working even
            // though the token itself still verifies.
            if !user.sessions.iter().any(|session| session == &token) {
                return Err(AppError::Unauthenticated(AUTH_FAILED.into()).into());
            }

            Ok(AuthSession { user, token })
        })
    }
}
