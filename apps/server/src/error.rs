//! Error types for the EO registry

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// PostgreSQL SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate EO Number: {eo_number}")]
    Duplicate { eo_number: String },

    #[error("Certificate not found: {id}")]
    CertificateNotFound { id: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests, retry in {retry_after_seconds}s")]
    TooManyRequests { retry_after_seconds: u64 },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Map a datastore error raised while writing `eo_number`, turning unique
    /// constraint violations into [`Error::Duplicate`].
    pub fn from_write(err: sqlx::Error, eo_number: &str) -> Self {
        if is_unique_violation(&err) {
            return Error::Duplicate {
                eo_number: eo_number.to_string(),
            };
        }
        Error::Database(err)
    }

    /// Whether the error is attributable to a single input row of a bulk
    /// operation (as opposed to a broken connection or transaction).
    pub fn is_row_scoped(&self) -> bool {
        match self {
            Error::Validation(_) | Error::Duplicate { .. } => true,
            Error::Database(sqlx::Error::Database(_)) => true,
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Duplicate { .. } => StatusCode::CONFLICT,
            Error::CertificateNotFound { .. } | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Duplicate { .. } => "duplicate",
            Error::CertificateNotFound { .. } | Error::NotFound(_) => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::TooManyRequests { .. } => "rate_limited",
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => "upstream_failure",
        }
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Internal error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();

        if let Error::TooManyRequests {
            retry_after_seconds,
        } = &self
        {
            if let Ok(value) = retry_after_seconds.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }

        response
    }
}
