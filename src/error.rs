use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::storage::StorageError;

/// Shown instead of the raw cause when the store or object storage cannot be
/// reached.
pub const CONNECTIVITY_HINT: &str =
    "Cannot reach the server's storage. Check your connection and the server configuration, then try again.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Sign in to continue")]
    Unauthorized,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    Unconfirmed,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Unconfirmed => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Rejected(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) | AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Hash(_) | AppError::Internal(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unconfirmed => "unconfirmed",
            AppError::Validation(_) => "validation",
            AppError::Rejected(_) => "rejected",
            AppError::Unavailable(_) | AppError::Pool(_) => "unavailable",
            AppError::Database(_) | AppError::Hash(_) | AppError::Internal(_) | AppError::Json(_) => {
                "internal"
            }
        }
    }

    /// The inline message a user sees. Server-side causes are logged, not shown.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound
            | AppError::Unauthorized
            | AppError::InvalidCredentials
            | AppError::Unconfirmed
            | AppError::Validation(_)
            | AppError::Rejected(_) => self.to_string(),
            AppError::Unavailable(_) | AppError::Pool(_) => CONNECTIVITY_HINT.to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Unique and foreign key violations are the store rejecting the write,
    /// not an outage.
    pub fn from_constraint(err: rusqlite::Error, message: &str) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => AppError::Rejected(message.to_string()),
            _ => AppError::Database(err),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPath(path) => {
                AppError::Validation(format!("Invalid object path: {}", path))
            }
            StorageError::AlreadyExists(path) => {
                AppError::Rejected(format!("The resource already exists: {}", path))
            }
            StorageError::Io(e) => AppError::Unavailable(e.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Validation(err.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn response_status(err: AppError) -> StatusCode {
        let response = err.into_response();
        response.status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(response_status(AppError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            response_status(AppError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn validation_returns_400() {
        assert_eq!(
            response_status(AppError::Validation("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn connectivity_errors_carry_a_hint_not_the_cause() {
        let err = AppError::Unavailable("connection refused at 10.0.0.3".into());
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.public_message(), CONNECTIVITY_HINT);
        assert!(!err.public_message().contains("10.0.0.3"));
    }

    #[test]
    fn rejections_surface_the_store_message() {
        let err = AppError::Rejected("User already registered".into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "User already registered");
    }

    #[test]
    fn storage_io_errors_are_connectivity_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: AppError = StorageError::Io(io).into();
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn constraint_violations_become_rejections() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY);
                            INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        let err = AppError::from_constraint(err, "duplicate");
        assert_eq!(err.kind(), "rejected");
    }
}
