//! HTTP route definitions.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Create the router.
///
/// ## Route Structure
///
/// ```text
/// GET    /run-history  - Recent executions (filter=job_id:<id>&job_name:<n>, limit, next, prev)
/// PUT    /upsert       - Reconcile a workflow telemetry event
/// PUT    /upsert-job   - Create or update a job (?draft=true)
/// GET    /job          - Get one job (?id=<id>)
/// GET    /jobs         - List jobs (limit, next, prev)
/// GET    /audits       - List audit entries (filter=job_id:<id>, limit, next, prev)
/// GET    /health       - Liveness
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run-history", get(handlers::run_history))
        .route("/upsert", put(handlers::upsert_execution))
        .route("/upsert-job", put(handlers::upsert_job))
        .route("/job", get(handlers::get_job))
        .route("/jobs", get(handlers::list_jobs))
        .route("/audits", get(handlers::list_audits))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
