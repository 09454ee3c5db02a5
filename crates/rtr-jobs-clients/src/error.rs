//! Collaborator client error types.

use thiserror::Error;

/// Errors raised by the object store, search, device and workflow clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Requested object does not exist.
    #[error("not found")]
    NotFound,

    /// Request could not be sent or the connection failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Remote answered with a non-success status.
    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Remote answered 2xx but the payload carried errors.
    #[error("errors returned from request: {0}")]
    Remote(String),

    /// Response or stored payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Saved search never reached the `complete` state.
    #[error("job {job_id} not complete: {status}")]
    SearchIncomplete { job_id: String, status: String },

    /// Search step of a search-and-fetch failed.
    #[error("error returned from search operation: {0}")]
    Search(Box<ClientError>),

    /// One or more keys failed during a bulk fetch.
    #[error("errors returned from bulk fetch operation:{}", format_key_errors(.errors))]
    BulkFetch { errors: Vec<(String, String)> },

    /// Keys returned by a search that the bulk fetch did not produce.
    #[error("key returned from search but not from bulk fetch: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    /// Filter or sort could not be evaluated locally.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }
}

fn format_key_errors(errors: &[(String, String)]) -> String {
    errors
        .iter()
        .map(|(key, err)| format!("\n[{}] {}", key, err))
        .collect()
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}

impl From<rtr_jobs_core::CoreError> for ClientError {
    fn from(e: rtr_jobs_core::CoreError) -> Self {
        match e {
            rtr_jobs_core::CoreError::Decode(msg) => ClientError::Decode(msg),
            other => ClientError::InvalidQuery(other.to_string()),
        }
    }
}
