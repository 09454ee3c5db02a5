//! Job management: upsert, single read and paged listing.

use std::sync::Arc;

use rtr_jobs_clients::{DeviceService, ObjectStore, SearchRequest, WorkflowProvisioner};
use rtr_jobs_core::decode::decode_object;
use rtr_jobs_core::fql::{build_query, build_sort};
use rtr_jobs_core::recurrence::{adjust_recurrence, compute_recurrences};
use rtr_jobs_core::schedule::{run_now_schedule, workflow_schedule};
use rtr_jobs_core::{Audit, Clock, Filter, FqlOp, Job, SortDirection, generate_job_id};
use tracing::{debug, info};

use super::provision::provision_job;
use super::{ListPage, ListQuery, fetch_listing, put_json};
use crate::error::{ApiError, ErrorDetail, is_not_found};
use crate::settings::ServiceSettings;

/// Device filter field holding a host's group ids.
const DEVICE_GROUPS_FIELD: &str = "groups";

pub struct JobService {
    store: Arc<dyn ObjectStore>,
    devices: Arc<dyn DeviceService>,
    workflows: Arc<dyn WorkflowProvisioner>,
    clock: Arc<dyn Clock>,
    settings: Arc<ServiceSettings>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        devices: Arc<dyn DeviceService>,
        workflows: Arc<dyn WorkflowProvisioner>,
        clock: Arc<dyn Clock>,
        settings: Arc<ServiceSettings>,
    ) -> Self {
        Self {
            store,
            devices,
            workflows,
            clock,
            settings,
        }
    }

    /// Create or update a job from a request body and return its id.
    ///
    /// Drafts are stored as submitted; other jobs get their schedules,
    /// recurrence budget and workflows before they are written. Every write
    /// is followed by an audit entry.
    pub async fn upsert(&self, body: &[u8], draft: bool) -> Result<String, ApiError> {
        let mut job: Job = serde_json::from_slice(body).map_err(|e| {
            ApiError::BadRequest(format!("Failed to unmarshal Request body err: {}.", e))
        })?;
        let now = self.clock.now();

        if !job.id.is_empty() && !job.id_matches_name() {
            return Err(ApiError::Conflict("job name cannot be changed".to_string()));
        }
        let issues = job.validate(now);
        if !issues.is_empty() {
            return Err(ApiError::Invalid(issues.iter().map(ErrorDetail::from).collect()));
        }

        let id = if job.id.is_empty() {
            let id = generate_job_id(&job.name).map_err(|e| {
                ApiError::internal(&format!("failed to generate id for job: {}", job.name), e)
            })?;
            if self.exists(&id).await? {
                return Err(ApiError::Conflict(format!(
                    "job with name:{} already exist",
                    job.name
                )));
            }
            id
        } else {
            job.id.clone()
        };

        if !draft {
            self.decorate(&mut job).await?;
        }

        job.version += 1;
        if job.version == 1 {
            job.created_at = Some(now);
        }
        job.id = id.clone();
        job.updated_at = Some(now);
        job.draft = draft;
        job.host_count = self.host_count(&job).await?;

        put_json(self.store.as_ref(), &self.settings.collections.jobs, &id, &job)
            .await
            .map_err(|e| ApiError::internal(&format!("failed to create job: {} id: {}", job.name, id), e))?;

        let audit = Audit::for_job(&job, now);
        put_json(self.store.as_ref(), &self.settings.collections.audit_logs, &audit.id, &audit)
            .await
            .map_err(|e| ApiError::internal("failed to write audit log", e))?;

        info!(job_id = %id, version = job.version, draft, action = %audit.action, "job saved");
        Ok(id)
    }

    /// Fill in everything a runnable job needs: workflow schedules, the
    /// recurrence budget, the first run and the provisioned workflows.
    async fn decorate(&self, job: &mut Job) -> Result<(), ApiError> {
        let now = self.clock.now();
        let timezone = job
            .schedule
            .as_ref()
            .map(|s| s.timezone.clone())
            .unwrap_or_default();

        job.run_now_schedule = if job.run_now {
            Some(run_now_schedule(&timezone, now)?)
        } else {
            None
        };
        job.wschedule = match job.schedule.as_mut() {
            Some(schedule) => Some(workflow_schedule(schedule)?),
            None => None,
        };

        let recurrences =
            compute_recurrences(job.schedule.as_ref(), job.run_now_schedule.as_ref(), now)?;
        job.total_recurrences = recurrences.total;
        job.next_run = recurrences.next_run;
        debug!(
            job = %job.name,
            total = recurrences.total,
            next_run = ?recurrences.next_run,
            "computed recurrences"
        );

        let workflows =
            provision_job(self.workflows.as_ref(), job, &self.settings.workflows).await?;
        job.workflows = Some(workflows);
        Ok(())
    }

    /// Explicit host count, or the membership of the target host groups.
    async fn host_count(&self, job: &Job) -> Result<u64, ApiError> {
        let Some(target) = job.target.as_ref() else {
            return Ok(0);
        };
        if target.host_groups.is_empty() {
            return Ok(target.hosts.len() as u64);
        }
        let filter = target
            .host_groups
            .iter()
            .map(|g| Filter::new(DEVICE_GROUPS_FIELD, FqlOp::Eq, g.as_str()).to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.devices
            .count_devices(&filter)
            .await
            .map_err(|e| ApiError::internal("failed to count devices for host groups", e))
    }

    async fn exists(&self, id: &str) -> Result<bool, ApiError> {
        match self.store.get(&self.settings.collections.jobs, id).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(ApiError::internal("failed to look up job", e)),
        }
    }

    /// Load one job for display.
    pub async fn get(&self, id: &str) -> Result<Job, ApiError> {
        let data = match self.store.get(&self.settings.collections.jobs, id).await {
            Ok(data) => data,
            Err(e) if is_not_found(&e) => {
                return Err(ApiError::NotFound(format!("job not found: {}", id)));
            }
            Err(e) => return Err(ApiError::internal("failed to get job", e)),
        };
        let job: Job = decode_object(&data)?;
        Ok(present(job))
    }

    /// Jobs, most recently updated first.
    pub async fn list(&self, query: &ListQuery) -> Result<ListPage<Job>, ApiError> {
        let page = query.page_request()?;
        let request = SearchRequest::new(
            self.settings.collections.jobs.as_str(),
            build_query(&[Filter::new("created_at", FqlOp::Gte, "0")])?,
        )
        .sort(build_sort("updated_at", SortDirection::Desc)?)
        .limit(page.limit)
        .offset(page.cursor.offset);

        let mut listing = fetch_listing::<Job>(
            self.store.as_ref(),
            &request,
            self.settings.bulk_fetch_concurrency,
            &page,
        )
        .await?;
        listing.resources = listing.resources.into_iter().map(present).collect();
        Ok(listing)
    }
}

/// Read-time view of a stored job.
fn present(mut job: Job) -> Job {
    if job.output_format.is_none() {
        job.output_format = Some(job.output_formats());
    }
    adjust_recurrence(job)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
