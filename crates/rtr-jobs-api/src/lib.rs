//! # rtr-jobs API
//!
//! Request services and the HTTP surface of the recurring RTR job system.
//!
//! ## Services
//!
//! - [`ReconcileService`]: turns workflow telemetry into execution records
//! - [`HistoryService`]: paged execution history with filters
//! - [`JobService`]: job upsert, lookup and listing
//! - [`AuditService`]: audit trail listing
//!
//! The [`ApiServer`] mounts them on axum routes (see [`create_router`]).

pub mod error;
pub mod http;
pub mod panic;
pub mod server;
pub mod service;
pub mod settings;
pub mod state;

pub use error::{ApiError, ErrorDetail};
pub use http::routes::create_router;
pub use server::{ApiConfig, ApiServer};
pub use service::{
    AuditService, ExecutionFilter, HistoryService, JobService, ListQuery, ReconcileService,
    Reconciliation,
};
pub use settings::{ServiceSettings, poll_settings};
pub use state::{AppState, Collaborators};
