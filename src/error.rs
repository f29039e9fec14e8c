//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! It centralizes error management, providing a consistent way to handle and represent
//! the error conditions that can occur, from database issues to validation failures.
//!
//! `AppError` implements `actix_web::error::ResponseError` to seamlessly convert
//! application errors into HTTP responses with JSON bodies. It also provides `From`
//! trait implementations for common error types like `sqlx::Error`,
//! `validator::ValidationErrors`, and `bcrypt::BcryptError`, allowing for easy
//! conversion using the `?` operator.

use actix_web::{error::ResponseError, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
///
/// Each variant corresponds to one rung of the error taxonomy and carries a
/// message detailing the issue. Errors are converted into JSON HTTP responses
/// at the boundary.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or invalid input fields (HTTP 400).
    /// Covers bad email syntax, rejected passwords, and disallowed update fields.
    Validation(String),
    /// Missing, invalid, or revoked authentication token (HTTP 401).
    Unauthenticated(String),
    /// Resource absent, or owned by somebody else — deliberately
    /// indistinguishable (HTTP 404).
    NotFound(String),
    /// Data-store or infrastructure failure (HTTP 500).
    Upstream(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation Error: {}", msg),
            AppError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream Failure: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// This implementation allows Actix Web to automatically translate `AppError`
/// results from handlers into the correct HTTP status codes and JSON error bodies.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            AppError::Unauthenticated(msg) => HttpResponse::Unauthorized().json(json!({
                "error": msg
            })),
            AppError::NotFound(msg) => HttpResponse::NotFound().json(json!({
                "error": msg
            })),
            AppError::Upstream(msg) => HttpResponse::InternalServerError().json(json!({
                "error": msg
            })),
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `sqlx::Error::RowNotFound` maps to `AppError::NotFound`. A unique-
/// constraint violation (SQLSTATE 23505) maps to `AppError::Validation`:
/// the handlers pre-check email uniqueness, but two concurrent signups can
/// both pass that check, and the loser's INSERT must still read as a 400.
/// Every other database error becomes `AppError::Upstream`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                AppError::Validation("Email already registered".into())
            }
            _ => AppError::Upstream(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::Validation`.
///
/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::Validation(error.to_string())
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::Upstream`.
///
/// This handles failures during password hashing or verification.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Upstream(error.to_string())
    }
}
