//! Saved-search (event log) collaborator.
//!
//! A saved search runs asynchronously: [`SearchService::execute`] starts it
//! and hands back a job id, and [`SearchService::fetch_results`] returns one
//! page of events once the job is complete. [`SavedSearchRunner`] drives the
//! whole exchange for one workflow execution.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use rtr_jobs_core::LogEvent;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;
use crate::remote::RemoteApi;

/// Saved search that returns every event of one workflow execution tree.
pub const DEFAULT_SAVED_SEARCH: &str = "Query By WorkflowRootExecutionID";

/// Status reported by a finished search job.
pub const STATUS_COMPLETE: &str = "complete";

const EXECUTE_PATH: [&str; 5] = ["loggingapi", "entities", "saved-searches", "execute", "v1"];
const ASYNC_MODE: &str = "async_offload";

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub events: Vec<LogEvent>,
    pub status: String,
    pub url: String,
}

/// Asynchronous saved-search service.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Start a saved search. An empty job id means the search produced nothing.
    async fn execute(
        &self,
        search_name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ClientError>;

    /// Fetch one page of a started search. Fails with
    /// [`ClientError::SearchIncomplete`] while the job is still running.
    async fn fetch_results(
        &self,
        job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ResultPage, ClientError>;
}

/// Polling behaviour for [`SavedSearchRunner`].
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub search_name: String,
    pub initial_pause: Duration,
    pub max_poll_attempts: usize,
    pub poll_interval: Duration,
    pub page_limit: usize,
    /// Console host that replaces `api.*` hosts in result URLs.
    pub console_host: String,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            search_name: DEFAULT_SAVED_SEARCH.to_string(),
            initial_pause: Duration::from_secs(5),
            max_poll_attempts: 10,
            poll_interval: Duration::from_secs(5),
            page_limit: 1000,
            console_host: "falcon.crowdstrike.com".to_string(),
        }
    }
}

/// Everything a saved search returned for one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub job_id: String,
    pub job_status: String,
    /// Console link to the search results, if any.
    pub job_url: String,
    /// Distinct events in first-seen order.
    pub events: Vec<LogEvent>,
}

/// Runs the execution saved search to completion.
pub struct SavedSearchRunner {
    service: Arc<dyn SearchService>,
    settings: PollSettings,
}

impl SavedSearchRunner {
    pub fn new(service: Arc<dyn SearchService>, settings: PollSettings) -> Self {
        Self { service, settings }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Collect every event logged under a workflow root execution id.
    pub async fn events_for_execution(
        &self,
        execution_id: &str,
    ) -> Result<SearchOutcome, ClientError> {
        let params = BTreeMap::from([("execution_id".to_string(), execution_id.to_string())]);

        debug!(execution_id = %execution_id, "starting search");
        let job_id = self
            .service
            .execute(&self.settings.search_name, &params)
            .await?;
        if job_id.is_empty() {
            return Ok(SearchOutcome::default());
        }

        if !self.settings.initial_pause.is_zero() {
            debug!(job_id = %job_id, "pausing to allow search to run");
            tokio::time::sleep(self.settings.initial_pause).await;
        }

        self.collect(job_id).await
    }

    /// Page through results until a page adds no new events. The remote
    /// ignores `limit` once `offset` passes the match count, so a short page
    /// does not mean the end.
    async fn collect(&self, job_id: String) -> Result<SearchOutcome, ClientError> {
        let mut outcome = SearchOutcome {
            job_id,
            ..SearchOutcome::default()
        };
        let mut seen: HashMap<String, usize> = HashMap::new();

        loop {
            let offset = outcome.events.len();
            let page = self.fetch_page(&outcome.job_id, offset).await?;
            if !page.status.is_empty() {
                outcome.job_status = page.status;
            }
            if !page.url.is_empty() {
                outcome.job_url = page.url;
            }

            for event in page.events {
                let id = event_id(&event);
                match seen.get(&id) {
                    Some(&idx) => outcome.events[idx] = event,
                    None => {
                        seen.insert(id, outcome.events.len());
                        outcome.events.push(event);
                    }
                }
            }

            if outcome.events.len() == offset {
                break;
            }
        }

        outcome.job_url = console_url(&outcome.job_url, &self.settings.console_host)?;
        info!(
            job_id = %outcome.job_id,
            events = outcome.events.len(),
            "search results collected"
        );
        Ok(outcome)
    }

    async fn fetch_page(&self, job_id: &str, offset: usize) -> Result<ResultPage, ClientError> {
        let attempts = self.settings.max_poll_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(job_id = %job_id, offset, limit = self.settings.page_limit, "fetching search results");
            match self
                .service
                .fetch_results(job_id, offset, self.settings.page_limit)
                .await
            {
                Ok(page) => return Ok(page),
                Err(e) if attempt < attempts => {
                    warn!(job_id = %job_id, attempt, "search results not ready: {}", e);
                    attempt += 1;
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn event_id(event: &LogEvent) -> String {
    match event.get("@id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => Value::Object(event.clone()).to_string(),
    }
}

/// Point an `https://api.*` result URL at the console, under `/api2`.
pub fn console_url(raw: &str, console_host: &str) -> Result<String, ClientError> {
    if raw.is_empty() || !raw.starts_with("https://api.") {
        return Ok(raw.to_string());
    }
    let mut url = Url::parse(raw)
        .map_err(|e| ClientError::Decode(format!("cannot parse job URL with error: {}", e)))?;
    url.set_host(Some(console_host))
        .map_err(|e| ClientError::Decode(format!("cannot parse job URL with error: {}", e)))?;
    let path = format!("/api2{}", url.path());
    url.set_path(&path);
    Ok(url.to_string())
}

/// Job id prefix of in-memory searches; the rest is the execution id.
const MEMORY_JOB_PREFIX: &str = "memory:";

/// In-memory search service. Events are registered per execution id and
/// every search completes immediately. A search keeps no state of its own:
/// its job id names the execution whose events it pages through.
pub struct MemorySearchService {
    by_execution: RwLock<HashMap<String, Vec<LogEvent>>>,
}

impl MemorySearchService {
    pub fn new() -> Self {
        Self {
            by_execution: RwLock::new(HashMap::new()),
        }
    }

    /// Append events for an execution id.
    pub async fn record(&self, execution_id: &str, events: Vec<LogEvent>) {
        let mut by_execution = self.by_execution.write().await;
        by_execution
            .entry(execution_id.to_string())
            .or_default()
            .extend(events);
    }
}

impl Default for MemorySearchService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchService for MemorySearchService {
    async fn execute(
        &self,
        _search_name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ClientError> {
        let execution_id = params.get("execution_id").map(String::as_str).unwrap_or("");
        Ok(format!("{}{}", MEMORY_JOB_PREFIX, execution_id))
    }

    async fn fetch_results(
        &self,
        job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ResultPage, ClientError> {
        let execution_id = job_id
            .strip_prefix(MEMORY_JOB_PREFIX)
            .ok_or(ClientError::NotFound)?;
        let by_execution = self.by_execution.read().await;
        let events = by_execution
            .get(execution_id)
            .map(|events| events.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(ResultPage {
            events,
            status: STATUS_COMPLETE.to_string(),
            url: String::new(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct JobStatus {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    job_url: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteResource {
    #[serde(default)]
    job_status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
struct ResultResource {
    #[serde(default)]
    job_status: Option<JobStatus>,
    #[serde(default)]
    events: Vec<LogEvent>,
}

/// Saved-search client for the cloud logging API.
pub struct HttpSearchClient {
    api: RemoteApi,
}

impl HttpSearchClient {
    pub fn new(api: RemoteApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SearchService for HttpSearchClient {
    async fn execute(
        &self,
        search_name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ClientError> {
        let request = self
            .api
            .request(Method::POST, &EXECUTE_PATH)?
            .query(&[("mode", ASYNC_MODE), ("include_test_data", "false")])
            .json(&json!({ "name": search_name, "parameters": params }));
        let envelope = self.api.send_envelope::<ExecuteResource>(request).await?;

        let Some(resource) = envelope.resources.into_iter().next() else {
            return Ok(String::new());
        };
        let status = resource
            .job_status
            .ok_or_else(|| ClientError::Decode("missing job status in response".to_string()))?;
        status
            .job_id
            .ok_or_else(|| ClientError::Decode("missing job ID in response".to_string()))
    }

    async fn fetch_results(
        &self,
        job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ResultPage, ClientError> {
        let request = self.api.request(Method::GET, &EXECUTE_PATH)?.query(&[
            ("job_id", job_id.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        let envelope = self.api.send_envelope::<ResultResource>(request).await?;

        let Some(resource) = envelope.resources.into_iter().next() else {
            return Ok(ResultPage::default());
        };
        let status = resource
            .job_status
            .ok_or_else(|| ClientError::Decode("no job status returned".to_string()))?;
        if status.status != STATUS_COMPLETE {
            return Err(ClientError::SearchIncomplete {
                job_id: job_id.to_string(),
                status: status.status,
            });
        }
        Ok(ResultPage {
            events: resource.events,
            status: status.status,
            url: status.job_url,
        })
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
