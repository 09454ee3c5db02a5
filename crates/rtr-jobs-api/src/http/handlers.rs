//! Request handlers.
//!
//! Every handler runs its service call inside the panic boundary and maps
//! failures through [`ApiError`]'s response conversion.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::panic::guarded;
use crate::service::{ListQuery, Reconciliation};
use crate::state::AppState;

/// Query of `PUT /upsert-job`.
#[derive(Debug, Default, Deserialize)]
pub struct UpsertJobQuery {
    #[serde(default)]
    pub draft: Option<String>,
}

impl UpsertJobQuery {
    pub fn is_draft(&self) -> bool {
        self.draft
            .as_deref()
            .is_some_and(|d| d.trim().eq_ignore_ascii_case("true"))
    }
}

/// Query of `GET /job`.
#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    #[serde(default)]
    pub id: Option<String>,
}

fn respond<T: Serialize>(route: &str, result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            if e.status().is_server_error() {
                error!(route, "request failed: {}", e);
            } else {
                warn!(route, status = e.status().as_u16(), "request rejected: {}", e);
            }
            e.into_response()
        }
    }
}

/// Execution history.
///
/// GET /run-history
pub async fn run_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    state.increment_requests();
    respond("/run-history", guarded(state.history.list(&query)).await)
}

/// Telemetry reconciliation.
///
/// PUT /upsert
pub async fn upsert_execution(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    state.increment_requests();
    let result = guarded(state.reconcile.reconcile(&body)).await.map(|outcome| match outcome {
        Reconciliation::Ignored => json!({ "resources": [{ "name": "", "status": "ok" }] }),
        Reconciliation::Updated(execution) => json!({ "resources": [execution] }),
    });
    respond("/upsert", result)
}

/// Create or update a job.
///
/// PUT /upsert-job
pub async fn upsert_job(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpsertJobQuery>,
    body: Bytes,
) -> Response {
    state.increment_requests();
    let result = guarded(state.jobs.upsert(&body, query.is_draft()))
        .await
        .map(|id| json!({ "resource": id }));
    respond("/upsert-job", result)
}

/// Get a job by id.
///
/// GET /job?id=<id>
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobQuery>,
) -> Response {
    state.increment_requests();
    let result = guarded(async {
        let id = query
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("missing id parameter".to_string()))?;
        state.jobs.get(id).await
    })
    .await
    .map(|job| json!({ "resource": job }));
    respond("/job", result)
}

/// List jobs.
///
/// GET /jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    state.increment_requests();
    respond("/jobs", guarded(state.jobs.list(&query)).await)
}

/// List audit entries.
///
/// GET /audits
pub async fn list_audits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    state.increment_requests();
    respond("/audits", guarded(state.audits.list(&query)).await)
}

/// Liveness.
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime().as_secs(),
        "requests": state.request_count(),
    }))
}
