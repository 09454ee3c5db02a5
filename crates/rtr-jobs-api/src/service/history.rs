//! Execution history: paged, newest-first listing of recent executions.

use std::sync::Arc;

use rtr_jobs_clients::{FetchedPage, ObjectStore, SearchRequest, search_and_fetch};
use rtr_jobs_core::fql::{build_query, build_sort};
use rtr_jobs_core::timefmt::format_iso;
use rtr_jobs_core::{Clock, Filter, FqlOp, JobExecution, SortDirection};
use tracing::{debug, warn};

use super::{ListPage, ListQuery};
use crate::error::{ApiError, is_not_found};
use crate::settings::ServiceSettings;

/// Optional narrowing of the history listing.
///
/// Parsed from `filter=job_id:<id>&job_name:<name>`. Tokens without a key,
/// without a value, or with an unknown key are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionFilter {
    pub job_id: Option<String>,
    pub job_name: Option<String>,
}

impl ExecutionFilter {
    pub fn parse(raw: &str) -> Self {
        let mut filter = Self::default();
        for token in raw.split('&').map(str::trim) {
            let Some(idx) = token.find(':') else {
                continue;
            };
            if idx < 1 || idx + 1 >= token.len() {
                continue;
            }
            let key = token[..idx].trim();
            let value = token[idx + 1..].trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "job_id" => filter.job_id = Some(value.to_string()),
                "job_name" => filter.job_name = Some(value.to_string()),
                other => debug!(key = %other, "ignoring unknown history filter key"),
            }
        }
        filter
    }
}

pub struct HistoryService {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    settings: Arc<ServiceSettings>,
}

impl HistoryService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        settings: Arc<ServiceSettings>,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// List executions that ran inside the history window.
    ///
    /// In-progress runs get a live duration. An empty result is a valid
    /// page with zeroed metadata.
    pub async fn list(&self, query: &ListQuery) -> Result<ListPage<JobExecution>, ApiError> {
        let page = query
            .page_request()
            .map_err(|e| ApiError::BadRequest(format!("bad arguments in param.query: {}", e)))?;
        let filter = ExecutionFilter::parse(query.filter.as_deref().unwrap_or_default());

        let now = self.clock.now();
        let earliest = now - self.settings.history_window;
        let mut filters = vec![
            Filter::new("run_date", FqlOp::Gte, format_iso(earliest)),
            Filter::new("run_date", FqlOp::Lte, format_iso(now)),
        ];
        if let Some(job_id) = &filter.job_id {
            filters.push(Filter::new("id", FqlOp::Eq, job_id.as_str()));
        }
        if let Some(job_name) = &filter.job_name {
            filters.push(Filter::new("name", FqlOp::Match, job_name.as_str()));
        }

        let request = SearchRequest::new(
            self.settings.collections.executions.as_str(),
            build_query(&filters)?,
        )
        .sort(build_sort("run_date", SortDirection::Desc)?)
        .limit(page.limit)
        .offset(page.cursor.offset);

        let fetched = match search_and_fetch(
            self.store.as_ref(),
            &request,
            self.settings.bulk_fetch_concurrency,
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(e) if is_not_found(&e) => FetchedPage::default(),
            Err(e) => return Err(ApiError::internal("failed to fetch all objects", e)),
        };

        let mut executions = Vec::with_capacity(fetched.records.len());
        for record in fetched.records {
            let mut exec = JobExecution::decode(&record.data).map_err(|e| {
                ApiError::internal("error decoding job execution record", e)
            })?;
            exec.normalize();
            if let Err(e) = exec.backfill_duration(now) {
                warn!(object_key = %record.key, "failed to compute duration for job execution: {}", e);
            }
            executions.push(exec);
        }

        debug!(count = executions.len(), total = fetched.total, "execution history page");
        Ok(ListPage {
            meta: page.paging(executions.len(), fetched.offset, fetched.total),
            resources: executions,
            errors: Vec::new(),
        })
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
