use crate::{
    auth::{hash_password, verify_password, AuthResponse, AuthSession, LoginRequest, TokenService},
    avatar,
    error::AppError,
    models::{SignupRequest, User, UserUpdate},
    notify,
};
use actix_multipart::Multipart;
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use futures::{StreamExt, TryStreamExt};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const USER_COLUMNS: &str =
    "id, name, age, email, password_hash, sessions, avatar, created_at, updated_at";

/// Create a new account.
///
/// Validates the signup payload, enforces email uniqueness, hashes the
/// password, persists the user, and issues the first session token.
///
/// ## Responses:
/// - `201 Created`: `{ "user": ..., "token": "..." }`
/// - `400 Bad Request`: invalid field values or email already registered.
#[post("")]
pub async fn signup(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    payload: web::Json<SignupRequest>,
) -> Result<impl Responder, AppError> {
    let mut input = payload.into_inner();
    input.normalize();
    input.validate()?;

    // Check if email already exists
    let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
        .bind(&input.email)
        .fetch_optional(&**pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation("Email already registered".into()));
    }

    let password_hash = hash_password(&input.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, name, age, email, password_hash)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(input.age)
    .bind(&input.email)
    .bind(&password_hash)
    .fetch_one(&**pool)
    .await?;

    let token = tokens.issue(pool.get_ref(), user.id).await?;
    notify::send_welcome(&user.email, &user.name);

    Ok(HttpResponse::Created().json(AuthResponse { user, token }))
}

/// Authenticate with email + password and start a new session.
///
/// A wrong password and an unknown email are reported identically. Prior
/// sessions stay valid; each login issues an additional token.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    payload: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let mut input = payload.into_inner();
    input.normalize();
    input.validate()?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(&input.email)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::Unauthenticated("Invalid credentials".into()))?;

    if !verify_password(&input.password, &user.password_hash)? {
        return Err(AppError::Unauthenticated("Invalid credentials".into()));
    }

    let token = tokens.issue(pool.get_ref(), user.id).await?;

    Ok(HttpResponse::Ok().json(AuthResponse { user, token }))
}

/// Revoke the session token used on this request. Other sessions of the same
/// user keep working.
#[post("/logout")]
pub async fn logout(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    tokens
        .revoke_one(pool.get_ref(), session.user.id, &session.token)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Logged out" })))
}

/// Revoke every session token issued to the requesting user.
#[post("/logout/all")]
pub async fn logout_all(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    tokens.revoke_all(pool.get_ref(), session.user.id).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Logged out of all sessions" })))
}

/// Fetch the requesting user's own profile.
#[get("/me")]
pub async fn me(session: AuthSession) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(session.user))
}

/// Update allow-listed profile fields (`name`, `email`, `password`, `age`).
///
/// The payload is rejected as a whole if it touches any other field. The
/// password hash is recomputed only when the payload carries a `password`.
#[patch("/update")]
pub async fn update_profile(
    pool: web::Data<PgPool>,
    session: AuthSession,
    payload: web::Json<serde_json::Value>,
) -> Result<impl Responder, AppError> {
    let update = UserUpdate::from_payload(payload.into_inner())?;
    let mut user = session.user;

    if let Some(name) = update.name {
        user.name = name;
    }
    if let Some(age) = update.age {
        user.age = age;
    }
    if let Some(email) = update.email {
        if email != user.email {
            let taken = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
                .bind(&email)
                .fetch_optional(&**pool)
                .await?;
            if taken.is_some() {
                return Err(AppError::Validation("Email already registered".into()));
            }
        }
        user.email = email;
    }
    if let Some(password) = update.password {
        user.password_hash = hash_password(&password)?;
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = $1, age = $2, email = $3, password_hash = $4, updated_at = now()
         WHERE id = $5
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&user.name)
    .bind(user.age)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(user))
}

/// Delete the requesting user's account.
///
/// Explicit two-step cascade: the user's tasks are removed first, then the
/// account itself. A failure partway surfaces as a 500 rather than leaving
/// orphaned tasks behind silently.
#[delete("/delete")]
pub async fn delete_account(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let user = session.user;

    sqlx::query("DELETE FROM tasks WHERE owner_id = $1")
        .bind(user.id)
        .execute(&**pool)
        .await?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&**pool)
        .await?;

    notify::send_cancellation(&user.email, &user.name);

    Ok(HttpResponse::Ok().json(user))
}

/// Upload an avatar image.
///
/// Accepts one multipart file field of at most 1 MB with a .jpg/.jpeg/.png
/// filename. The image is decoded, resized to 250x250, and stored as PNG.
#[post("/me/avatar")]
pub async fn upload_avatar(
    pool: web::Data<PgPool>,
    session: AuthSession,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let mut uploaded: Option<Vec<u8>> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?
    {
        let filename = field
            .content_disposition()
            .get_filename()
            .map(str::to_string);

        let filename = match filename {
            Some(name) => name,
            // Not a file field; skip it.
            None => continue,
        };

        if !avatar::is_supported_filename(&filename) {
            return Err(AppError::Validation(
                "Only JPG, JPEG, and PNG file formats are allowed".into(),
            ));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?;
            if bytes.len() + chunk.len() > avatar::MAX_AVATAR_BYTES {
                return Err(AppError::Validation("Avatar must be at most 1MB".into()));
            }
            bytes.extend_from_slice(&chunk);
        }

        uploaded = Some(bytes);
        break;
    }

    let bytes =
        uploaded.ok_or_else(|| AppError::Validation("No avatar file provided".into()))?;
    let normalized = avatar::normalize_avatar(&bytes)?;

    sqlx::query("UPDATE users SET avatar = $1, updated_at = now() WHERE id = $2")
        .bind(&normalized)
        .bind(session.user.id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Avatar set" })))
}

/// Clear the requesting user's avatar. Independent of the credential
/// lifecycle; sessions are untouched.
#[delete("/me/avatar")]
pub async fn delete_avatar(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    sqlx::query("UPDATE users SET avatar = NULL, updated_at = now() WHERE id = $1")
        .bind(session.user.id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Avatar deleted" })))
}

/// Fetch a user's avatar by user id. Public; serves the stored PNG, 404 when
/// the user or the avatar is absent.
#[get("/{id}/avatar")]
pub async fn get_avatar(
    pool: web::Data<PgPool>,
    user_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let avatar = sqlx::query_scalar::<_, Option<Vec<u8>>>("SELECT avatar FROM users WHERE id = $1")
        .bind(user_id.into_inner())
        .fetch_optional(&**pool)
        .await?;

    match avatar.flatten() {
        Some(bytes) => Ok(HttpResponse::Ok().content_type("image/png").body(bytes)),
        None => Err(AppError::NotFound("No user or avatar found".into())),
    }
}
