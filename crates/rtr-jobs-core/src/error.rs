//! Core error types.

use thiserror::Error;

/// Errors raised by the pure domain layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Predicate list or sort could not be rendered.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Cron expression or timezone rejected.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Timestamp not in a recognised ISO-8601 layout.
    #[error("Invalid timestamp {value:?}: {message}")]
    InvalidTimestamp { value: String, message: String },

    /// Workflow definition name does not embed a job name.
    #[error("Malformed definition name: {0}")]
    MalformedDefinitionName(String),

    /// Telemetry body is empty or missing required fields.
    #[error("Malformed telemetry: {0}")]
    MalformedTelemetry(String),

    /// Both a previous and a next marker were supplied.
    #[error("previous and next both offset cannot be provided.")]
    ConflictingCursor,

    /// Page size is not an integer.
    #[error("limit is not an integer: {0}")]
    InvalidLimit(String),

    /// Job name could not be hashed into an id.
    #[error("job ID could not be determined: {0}")]
    JobId(String),

    /// Stored record could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl CoreError {
    pub(crate) fn timestamp(value: &str, message: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_cursor_message() {
        let err = CoreError::ConflictingCursor;
        assert_eq!(
            err.to_string(),
            "previous and next both offset cannot be provided."
        );
    }

    #[test]
    fn test_invalid_timestamp_display() {
        let err = CoreError::timestamp("yesterday", "not ISO-8601");
        let display = err.to_string();
        assert!(display.contains("yesterday"));
        assert!(display.contains("not ISO-8601"));
    }

    #[test]
    fn test_error_debug() {
        let err = CoreError::InvalidQuery("empty filter list".to_string());
        assert!(format!("{:?}", err).contains("InvalidQuery"));
    }
}
