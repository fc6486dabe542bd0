use crate::email_generator::TemplateError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Postgres SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for a reference to a row that does not exist.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// Postgres SQLSTATE for a failed CHECK constraint.
const CHECK_VIOLATION: &str = "23514";

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// A unique field (e.g. lead email) is already taken.
    Conflict(String),
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Authenticated, but the role lacks the permission.
    Forbidden(String),
    /// Email template could not be rendered.
    Template(TemplateError),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Template(e) => write!(f, "Template error: {}", e),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    ///
    /// Server-side failures are logged; their details never reach the client.
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, msg)
            }
            AppError::Template(e) => return template_error_response(e),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

fn template_error_response(err: TemplateError) -> Response {
    let body = match &err {
        TemplateError::UnknownTemplate { available, .. } => json!({
            "error": err.to_string(),
            "available_types": available,
        }),
        TemplateError::MissingVariable {
            template,
            variable,
            required,
        } => json!({
            "error": err.to_string(),
            "email_type": template,
            "missing_variable": variable,
            "required_variables": required,
        }),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .and_then(|code| constraint_violation(&code));

        match violation {
            Some(client_error) => client_error,
            None => AppError::DatabaseError(err),
        }
    }
}

/// Maps constraint SQLSTATEs caused by client input to a client error.
fn constraint_violation(code: &str) -> Option<AppError> {
    match code {
        UNIQUE_VIOLATION => Some(AppError::Conflict(
            "A record with the same unique value already exists".to_string(),
        )),
        FOREIGN_KEY_VIOLATION => Some(AppError::BadRequest(
            "Referenced record does not exist".to_string(),
        )),
        CHECK_VIOLATION => Some(AppError::BadRequest(
            "Value is outside the allowed range".to_string(),
        )),
        _ => None,
    }
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        AppError::Template(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: f(),
        })
    }
}
