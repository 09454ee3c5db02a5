//! Panic boundary for request handling.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::error;

use crate::error::ApiError;

/// Run a request future, turning a panic into an internal error.
pub async fn guarded<F, T>(fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "request handler panicked");
            Err(ApiError::Internal(format!("fatal error: {}", message)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_results_through() {
        let ok: Result<u32, ApiError> = guarded(async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u32, ApiError> =
            guarded(async { Err(ApiError::NotFound("gone".into())) }).await;
        assert!(matches!(err, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_panic_becomes_internal() {
        let result: Result<(), ApiError> = guarded(async {
            panic!("index out of range");
        })
        .await;
        match result {
            Err(ApiError::Internal(msg)) => assert_eq!(msg, "fatal error: index out of range"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_formatted_panic_message() {
        let id = "e1";
        let result: Result<(), ApiError> = guarded(async move {
            panic!("bad execution {}", id);
        })
        .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "fatal error: bad execution e1"
        );
    }
}
