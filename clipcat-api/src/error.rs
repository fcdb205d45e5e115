//! HTTP error type
//!
//! Every error response has the body `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::jwks::JwksError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or rejected bearer token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Key set could not be fetched (503)
    #[error("Authentication unavailable: {0}")]
    AuthUnavailable(String),

    /// Catalog error, status chosen by variant
    #[error(transparent)]
    Catalog(#[from] clipcat_common::Error),
}

impl From<JwksError> for ApiError {
    fn from(err: JwksError) -> Self {
        match err {
            JwksError::Fetch(msg) => ApiError::AuthUnavailable(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use clipcat_common::Error as CatalogError;

        let (status, code) = match &self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::AuthUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "AUTH_UNAVAILABLE"),
            ApiError::Catalog(err) => match err {
                CatalogError::ClipNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CatalogError::TagNotPresent { .. } => (StatusCode::CONFLICT, "TAG_NOT_PRESENT"),
                CatalogError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                CatalogError::RegistryNotFound(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "REGISTRY_NOT_FOUND")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        };

        if status.is_server_error() {
            tracing::error!(code, "Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use clipcat_common::Error as CatalogError;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(CatalogError::ClipNotFound("x".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                CatalogError::TagNotPresent {
                    reference: "dh0".into(),
                    tag: "new".into()
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CatalogError::InvalidInput("bad".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CatalogError::RegistryNotFound("generic".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::Unauthorized("no token".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(JwksError::Fetch("timeout".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
