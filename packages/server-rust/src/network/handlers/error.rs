//! Uniform error rendering at the HTTP boundary.
//!
//! Every failure renders as `{error, message, status_code, path}`, plus
//! `details` when the failure carries any.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_core::{CrudError, Details, DomainError};
use serde::Serialize;
use serde_json::Value;

/// Fixed message for failures whose cause must not leak to callers.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Message for rejected request bodies, paths and query strings.
pub const REJECTION_MESSAGE: &str = "Validation failed";

#[derive(Debug)]
enum Failure {
    Crud(CrudError),
    /// The request could not be decoded (malformed JSON, bad query string).
    Rejected(String),
}

/// Failure returned by handlers, tagged with the request path.
#[derive(Debug)]
pub struct ApiError {
    failure: Failure,
    path: String,
}

/// Serialized error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub status_code: u16,
    pub path: String,
    #[serde(skip_serializing_if = "Details::is_empty")]
    pub details: Details,
}

impl ApiError {
    /// Wraps a domain or store failure.
    pub fn new(error: impl Into<CrudError>, path: impl Into<String>) -> Self {
        Self {
            failure: Failure::Crud(error.into()),
            path: path.into(),
        }
    }

    /// A request the framework could not decode.
    pub fn rejected(reason: impl Display, path: impl Into<String>) -> Self {
        Self {
            failure: Failure::Rejected(reason.to_string()),
            path: path.into(),
        }
    }

    /// The wrapped failure, unless this is a request rejection.
    #[must_use]
    pub fn crud_error(&self) -> Option<&CrudError> {
        match &self.failure {
            Failure::Crud(err) => Some(err),
            Failure::Rejected(_) => None,
        }
    }

    /// HTTP status for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.failure {
            Failure::Crud(CrudError::Domain(err)) => status_of(err),
            Failure::Crud(CrudError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Failure::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Renders the body and logs the failure.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let status = self.status();
        match &self.failure {
            Failure::Crud(CrudError::Domain(err)) => {
                tracing::warn!(
                    path = %self.path,
                    status = status.as_u16(),
                    error = err.name(),
                    message = err.message(),
                    "request failed"
                );
                ErrorBody {
                    error: err.name(),
                    message: err.message().to_string(),
                    status_code: status.as_u16(),
                    path: self.path.clone(),
                    details: err.details().clone(),
                }
            }
            Failure::Crud(CrudError::Store(err)) => {
                tracing::error!(path = %self.path, error = ?err, "unhandled store failure");
                ErrorBody {
                    error: "InternalServerError",
                    message: INTERNAL_ERROR_MESSAGE.to_string(),
                    status_code: status.as_u16(),
                    path: self.path.clone(),
                    details: Details::new(),
                }
            }
            Failure::Rejected(reason) => {
                tracing::warn!(path = %self.path, %reason, "request rejected");
                let mut details = Details::new();
                details.insert("reason".to_string(), Value::String(reason.clone()));
                ErrorBody {
                    error: "ValidationError",
                    message: REJECTION_MESSAGE.to_string(),
                    status_code: status.as_u16(),
                    path: self.path.clone(),
                    details,
                }
            }
        }
    }
}

fn status_of(err: &DomainError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_renders_uniform_body() {
        let err = ApiError::new(
            DomainError::not_found(Some("Workflow"), Some("abc-123")),
            "/api/v2/workflows/abc-123",
        );
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFoundError");
        assert_eq!(body["message"], "Workflow abc-123 not found");
        assert_eq!(body["status_code"], 404);
        assert_eq!(body["path"], "/api/v2/workflows/abc-123");
        assert_eq!(body["details"]["id"], "abc-123");
    }

    #[tokio::test]
    async fn store_failure_does_not_leak_cause() {
        let err = ApiError::new(
            CrudError::Store(anyhow::anyhow!("password authentication failed")),
            "/widgets",
        );
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "InternalServerError");
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
        assert!(body.get("details").is_none());
        assert!(!body.to_string().contains("password"));
    }

    #[tokio::test]
    async fn rejection_is_unprocessable() {
        let err = ApiError::rejected("missing field `name`", "/widgets");
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "ValidationError");
        assert_eq!(body["message"], REJECTION_MESSAGE);
        assert_eq!(body["status_code"], 422);
    }

    #[tokio::test]
    async fn unauthorized_without_details_omits_them() {
        let err = ApiError::new(DomainError::unauthorized(None), "/widgets");
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");
        assert!(body.get("details").is_none());
    }
}
