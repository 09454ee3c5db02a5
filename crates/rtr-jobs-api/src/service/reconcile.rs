//! Execution reconciliation: fold one workflow telemetry event into the
//! execution record and the owning job's run statistics.
//!
//! Run statistics move once per status change of an execution, and a
//! completed or failed record keeps its status, end date and duration.
//! The execution and the job are written separately with no transaction
//! between them; a failure after the first write leaves the job one event
//! behind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rtr_jobs_clients::{ClientError, ObjectStore, SavedSearchRunner, SearchRequest, search_and_fetch};
use rtr_jobs_core::csv::to_csv;
use rtr_jobs_core::decode::decode_object;
use rtr_jobs_core::execution::compute_duration;
use rtr_jobs_core::fql::build_query;
use rtr_jobs_core::hosts::extract_hosts;
use rtr_jobs_core::job::{OUTPUT_CSV, OUTPUT_LOGSCALE};
use rtr_jobs_core::recurrence::advance_run_stats;
use rtr_jobs_core::timefmt::format_iso;
use rtr_jobs_core::{
    Clock, Filter, FqlOp, Job, JobExecution, LogEvent, TelemetryEvent, generate_job_id,
};
use tracing::{debug, info};

use super::put_json;
use crate::error::{ApiError, is_not_found};
use crate::settings::ServiceSettings;

/// Result of reconciling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The event carried no recognised status; nothing was written.
    Ignored,
    /// The execution record as persisted.
    Updated(JobExecution),
}

/// Execution record located for an event.
struct Located {
    key: String,
    execution: JobExecution,
    created: bool,
}

pub struct ReconcileService {
    store: Arc<dyn ObjectStore>,
    search: Arc<SavedSearchRunner>,
    clock: Arc<dyn Clock>,
    settings: Arc<ServiceSettings>,
}

impl ReconcileService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        search: Arc<SavedSearchRunner>,
        clock: Arc<dyn Clock>,
        settings: Arc<ServiceSettings>,
    ) -> Self {
        Self {
            store,
            search,
            clock,
            settings,
        }
    }

    /// Apply a raw telemetry request body.
    pub async fn reconcile(&self, body: &[u8]) -> Result<Reconciliation, ApiError> {
        let event = TelemetryEvent::from_body(body).map_err(|e| {
            ApiError::BadRequest(format!(
                "failed to extract job information from request: {}",
                e
            ))
        })?;

        let Some(status) = event.run_status() else {
            info!(execution_id = %event.execution_id, "received workflow event with blank status - ignoring");
            return Ok(Reconciliation::Ignored);
        };

        let job_name = event
            .job_name()
            .map_err(|e| ApiError::BadRequest(format!("bad job name provided: {}", e)))?;
        let job_id = generate_job_id(&job_name)?;
        info!(
            execution_id = %event.execution_id,
            job_id = %job_id,
            status = %status,
            "reconciling execution"
        );

        let mut job = self.load_job(&job_id, &job_name).await?;
        let started = event.timestamp().map_err(|e| {
            ApiError::BadRequest(format!("failed to parse execution timestamp: {}", e))
        })?;
        let Located {
            key,
            mut execution,
            created,
        } = self.locate(&event, &job_id, &job_name, started).await?;

        let previous = execution.status;
        let settled = !created && previous.is_some_and(|s| s.is_terminal());
        let now = self.clock.now();
        if settled {
            debug!(
                execution_id = %event.execution_id,
                stored = ?previous,
                "execution already settled, keeping status"
            );
        } else {
            let end = if execution.end_date.is_empty() {
                let end = format_iso(now);
                if status.is_terminal() {
                    execution.end_date = end.clone();
                }
                end
            } else {
                execution.end_date.clone()
            };
            if let Some(duration) = compute_duration(&execution.run_date, &end, Some(status))
                .map_err(|e| ApiError::internal("failed to compute job duration execution", e))?
            {
                execution.duration = duration;
            }
            execution.status = Some(status);
        }

        let outcome = self
            .search
            .events_for_execution(&event.execution_id)
            .await
            .map_err(|e| ApiError::internal("failed to execute logscale search", e))?;
        execution.set_targeted_hosts(extract_hosts(&outcome.events));
        if created && job.wants_output(OUTPUT_LOGSCALE) {
            execution.logscale_output = outcome.job_url.clone();
        }

        let status_changed = !settled && (created || previous != Some(status));
        if status_changed {
            let stats = advance_run_stats(job.run_stats(), Some(status), now)
                .map_err(|e| ApiError::internal("failed to update job record", e))?;
            job.merge_run_stats(stats);
        }

        if created && job.wants_output(OUTPUT_CSV) {
            if let Some(link) = self.save_csv(&event.execution_id, &outcome.events).await? {
                execution.csv_output = link;
            }
        }

        put_json(self.store.as_ref(), &self.settings.collections.executions, &key, &execution)
            .await
            .map_err(|e| ApiError::internal("failed to save execution record", e))?;
        if status_changed {
            put_json(self.store.as_ref(), &self.settings.collections.jobs, &job_id, &job)
                .await
                .map_err(|e| ApiError::internal("failed to save job record", e))?;
        }

        info!(
            execution_id = %event.execution_id,
            object_key = %key,
            hosts = execution.num_hosts,
            created,
            "execution reconciled"
        );
        Ok(Reconciliation::Updated(execution))
    }

    async fn load_job(&self, job_id: &str, job_name: &str) -> Result<Job, ApiError> {
        let data = match self
            .store
            .get(&self.settings.collections.jobs, job_id)
            .await
        {
            Ok(data) => data,
            Err(e) if is_not_found(&e) => {
                return Err(ApiError::NotFound(format!(
                    "job {:?} ({}) not found",
                    job_name, job_id
                )));
            }
            Err(e) => return Err(ApiError::internal("could not fetch job record", e)),
        };
        decode_object(&data).map_err(|e| ApiError::internal("could not decode job record", e))
    }

    /// Find the record of an execution, or start a new one keyed by the
    /// event time so keys sort chronologically.
    async fn locate(
        &self,
        event: &TelemetryEvent,
        job_id: &str,
        job_name: &str,
        started: DateTime<Utc>,
    ) -> Result<Located, ApiError> {
        let filter = build_query(&[Filter::new(
            "execution_id",
            FqlOp::Eq,
            event.execution_id.as_str(),
        )])?;
        let request = SearchRequest::new(self.settings.collections.executions.as_str(), filter);

        let found = match search_and_fetch(self.store.as_ref(), &request, 1).await {
            Ok(page) => page.records.into_iter().next(),
            // Only an empty search means "no record"; a key the search
            // returned but the fetch could not load is an error.
            Err(ClientError::Search(e)) if is_not_found(&e) => None,
            Err(e) => return Err(ApiError::internal("failed to fetch job execution record", e)),
        };

        if let Some(record) = found {
            let execution = JobExecution::decode(&record.data).map_err(|e| {
                ApiError::internal("failed to deserialize job execution record", e)
            })?;
            return Ok(Located {
                key: record.key,
                execution,
                created: false,
            });
        }

        let nanos = started.timestamp_nanos_opt().ok_or_else(|| {
            ApiError::BadRequest(format!(
                "execution timestamp out of range: {}",
                event.execution_timestamp
            ))
        })?;
        let key = format!("{}_{}", nanos, event.execution_id);
        debug!(object_key = %key, execution_id = %event.execution_id, "job execution not found, creating");
        Ok(Located {
            key,
            execution: JobExecution::new(
                &event.execution_id,
                job_id,
                job_name,
                &event.execution_timestamp,
            ),
            created: true,
        })
    }

    /// Store the CSV rendering of the events and return its console link.
    async fn save_csv(
        &self,
        execution_id: &str,
        events: &[LogEvent],
    ) -> Result<Option<String>, ApiError> {
        let csv = to_csv(events);
        if csv.is_empty() {
            return Ok(None);
        }
        let collection = &self.settings.collections.execution_csv;
        let name = format!("{}.csv", execution_id);
        self.store
            .put(collection, &name, csv.into_bytes())
            .await
            .map_err(|e| ApiError::internal("failed to write CSV record", e))?;
        Ok(Some(self.settings.object_url(collection, &name)))
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
