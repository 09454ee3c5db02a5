//! API error taxonomy.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rtr_jobs_clients::ClientError;
use rtr_jobs_core::CoreError;
use rtr_jobs_core::job::ValidationIssue;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// One entry of an `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&ValidationIssue> for ErrorDetail {
    fn from(issue: &ValidationIssue) -> Self {
        Self::new(issue.code as u16, issue.message.clone())
    }
}

/// Errors surfaced to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input.
    #[error("{0}")]
    BadRequest(String),

    /// Submitted job failed validation; each issue keeps its own code.
    #[error("invalid job: {}", join_details(.0))]
    Invalid(Vec<ErrorDetail>),

    /// Unknown job or execution.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate job name or rename attempt.
    #[error("{0}")]
    Conflict(String),

    /// Storage, search, provisioning or serialization failure.
    #[error("{0}")]
    Internal(String),
}

fn join_details(details: &[ErrorDetail]) -> String {
    details
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Entries for the response `errors` array.
    pub fn details(&self) -> Vec<ErrorDetail> {
        match self {
            ApiError::Invalid(details) => details.clone(),
            other => vec![ErrorDetail::new(other.status().as_u16(), other.to_string())],
        }
    }

    /// Wrap a lower-level failure as an internal error with context.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Internal(format!("{}: {}", context, err))
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::JobId(_) | CoreError::Decode(_) => ApiError::Internal(e.to_string()),
            _ => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(e: ClientError) -> Self {
        if is_not_found(&e) {
            ApiError::NotFound(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Internal(format!("serialization failed: {}", e))
    }
}

/// Whether a store failure means "no such object", including a not-found
/// raised by the search step of a search-and-fetch.
pub fn is_not_found(e: &ClientError) -> bool {
    match e {
        ClientError::NotFound => true,
        ClientError::Search(inner) => is_not_found(inner),
        _ => false,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "errors": self.details() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtr_jobs_core::job::ValidationCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_single_detail_uses_http_code() {
        let details = ApiError::Conflict("job name cannot be changed".into()).details();
        assert_eq!(details, vec![ErrorDetail::new(409, "job name cannot be changed")]);
    }

    #[test]
    fn test_validation_details_keep_issue_codes() {
        let issue = ValidationIssue::new(ValidationCode::JobNameIsRequired, "job name cannot be empty");
        let err = ApiError::Invalid(vec![ErrorDetail::from(&issue)]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.details()[0].code, 1001);
        assert!(err.to_string().contains("job name cannot be empty"));
    }

    #[test]
    fn test_from_core_error() {
        assert!(matches!(
            ApiError::from(CoreError::ConflictingCursor),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(CoreError::Decode("bad".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_from_client_error() {
        assert!(matches!(ApiError::from(ClientError::NotFound), ApiError::NotFound(_)));
        assert!(matches!(
            ApiError::from(ClientError::Search(Box::new(ClientError::NotFound))),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(ClientError::Http("refused".into())),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = ApiError::BadRequest("bad job name provided".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["code"], 400);
        assert_eq!(json["errors"][0]["message"], "bad job name provided");
    }
}
