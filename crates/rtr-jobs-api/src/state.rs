//! Application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rtr_jobs_clients::{
    DeviceService, MemoryDeviceService, MemoryObjectStore, MemorySearchService,
    MemoryWorkflowProvisioner, ObjectStore, PollSettings, SavedSearchRunner, WorkflowProvisioner,
};
use rtr_jobs_core::{Clock, SystemClock};

use crate::service::{AuditService, HistoryService, JobService, ReconcileService};
use crate::settings::ServiceSettings;

/// External collaborators the services run against.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ObjectStore>,
    pub search: Arc<SavedSearchRunner>,
    pub devices: Arc<dyn DeviceService>,
    pub workflows: Arc<dyn WorkflowProvisioner>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// In-memory collaborators on the wall clock.
    pub fn in_memory(poll: PollSettings) -> Self {
        Self {
            store: Arc::new(MemoryObjectStore::new()),
            search: Arc::new(SavedSearchRunner::new(
                Arc::new(MemorySearchService::new()),
                poll,
            )),
            devices: Arc::new(MemoryDeviceService::new()),
            workflows: Arc::new(MemoryWorkflowProvisioner::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub reconcile: ReconcileService,
    pub history: HistoryService,
    pub jobs: JobService,
    pub audits: AuditService,
    start_time: Instant,
    request_count: AtomicU64,
}

impl AppState {
    pub fn new(collab: Collaborators, settings: Arc<ServiceSettings>) -> Self {
        Self {
            reconcile: ReconcileService::new(
                collab.store.clone(),
                collab.search.clone(),
                collab.clock.clone(),
                settings.clone(),
            ),
            history: HistoryService::new(
                collab.store.clone(),
                collab.clock.clone(),
                settings.clone(),
            ),
            jobs: JobService::new(
                collab.store.clone(),
                collab.devices,
                collab.workflows,
                collab.clock,
                settings.clone(),
            ),
            audits: AuditService::new(collab.store, settings),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    /// Get uptime.
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get request count.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Count one handled request.
    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_counter() {
        let state = AppState::new(
            Collaborators::in_memory(PollSettings::default()),
            Arc::new(ServiceSettings::default()),
        );
        assert_eq!(state.request_count(), 0);
        state.increment_requests();
        state.increment_requests();
        assert_eq!(state.request_count(), 2);
        assert!(state.uptime().as_secs() < 60);
    }
}
