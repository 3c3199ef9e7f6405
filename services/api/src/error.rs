//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant is rendered to HTTP callers.

use crate::auth::TokenError;
use crate::config::ConfigError;
use crate::report::ReportError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mindi_core::ports::PortError;
use serde_json::json;
use tracing::error;

/// The message returned for every authentication failure. It never says which
/// check failed.
pub const UNAUTHENTICATED_DETAIL: &str = "Could not validate credentials";

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing, invalid, expired or mistyped token, or an unknown subject.
    #[error("Could not validate credentials")]
    Unauthorized,

    /// Wrong phone number or password at login.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Malformed caller input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            ApiError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) | ApiError::Port(PortError::Conflict(_)) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            ApiError::Unauthorized | ApiError::Port(PortError::Unauthorized) => {
                UNAUTHENTICATED_DETAIL.to_string()
            }
            ApiError::Port(PortError::NotFound(msg)) | ApiError::Port(PortError::Conflict(msg)) => {
                msg.clone()
            }
            _ if status.is_server_error() => {
                error!("Request failed: {}", self);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({ "detail": detail }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidPeriod { .. } => ApiError::Validation(err.to_string()),
            ReportError::Port(e) => ApiError::Port(e),
        }
    }
}

/// Every token failure collapses into the same 401.
impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => ApiError::Internal(msg),
            _ => ApiError::Unauthorized,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Validation("bad date".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Port(PortError::Conflict("dup".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Port(PortError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::Forbidden("no".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Port(PortError::Unexpected("ai down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_response_carries_bearer_challenge() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn token_and_period_errors_map_to_client_errors() {
        assert_eq!(ApiError::from(TokenError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(TokenError::WrongType).status(), StatusCode::UNAUTHORIZED);

        let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let err = ApiError::from(ReportError::InvalidPeriod { start, end });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
