//! Collaborator backend selection and tuning.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const BACKEND_MEMORY: &str = "memory";
pub const BACKEND_FILE: &str = "file";
pub const BACKEND_REMOTE: &str = "remote";

/// Object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `memory`, `file` or `remote`.
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Root directory for the `file` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Concurrent object fetches per bulk fetch.
    #[serde(default = "default_bulk_fetch_concurrency")]
    pub bulk_fetch_concurrency: usize,

    /// Page size for searches that do not name one.
    #[serde(default = "default_search_limit")]
    pub search_default_limit: usize,

    /// Per-request timeout for remote calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            bulk_fetch_concurrency: default_bulk_fetch_concurrency(),
            search_default_limit: default_search_limit(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_memory_backend() -> String {
    BACKEND_MEMORY.to_string()
}

fn default_bulk_fetch_concurrency() -> usize {
    20
}

fn default_search_limit() -> usize {
    100
}

fn default_request_timeout() -> u64 {
    10
}

/// Saved-search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// `memory` or `remote`.
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    #[serde(default = "default_saved_search")]
    pub saved_search: String,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait before the first result fetch.
    #[serde(default = "default_initial_pause_ms")]
    pub initial_pause_ms: u64,

    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            saved_search: default_saved_search(),
            max_poll_attempts: default_max_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            initial_pause_ms: default_initial_pause_ms(),
            page_limit: default_page_limit(),
        }
    }
}

impl SearchConfig {
    /// Worst-case time spent polling one result page.
    pub fn poll_budget_ms(&self) -> u64 {
        self.poll_interval_ms
            .saturating_mul(self.max_poll_attempts.saturating_sub(1) as u64)
    }
}

fn default_saved_search() -> String {
    "Query By WorkflowRootExecutionID".to_string()
}

fn default_max_poll_attempts() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_initial_pause_ms() -> u64 {
    5000
}

fn default_page_limit() -> usize {
    1000
}

/// Workflow provisioning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowsConfig {
    /// `memory` or `remote`.
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    #[serde(default = "default_notifier_template")]
    pub notifier_template: String,

    #[serde(default = "default_file_query_template")]
    pub file_query_template: String,

    #[serde(default = "default_registry_query_template")]
    pub registry_query_template: String,

    #[serde(default = "default_install_template")]
    pub install_template: String,

    #[serde(default = "default_remove_template")]
    pub remove_template: String,

    /// Condition node that scopes action workflows to hosts and groups.
    #[serde(default = "default_condition_node_id")]
    pub condition_node_id: String,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            notifier_template: default_notifier_template(),
            file_query_template: default_file_query_template(),
            registry_query_template: default_registry_query_template(),
            install_template: default_install_template(),
            remove_template: default_remove_template(),
            condition_node_id: default_condition_node_id(),
        }
    }
}

fn default_notifier_template() -> String {
    "Notify status".to_string()
}

fn default_file_query_template() -> String {
    "Check if files or registry key exist".to_string()
}

fn default_registry_query_template() -> String {
    "Check_If_Registry_key_Value_Exist".to_string()
}

fn default_install_template() -> String {
    "Install software".to_string()
}

fn default_remove_template() -> String {
    "Remove file".to_string()
}

fn default_condition_node_id() -> String {
    "platform_is_equal_to_windows_host_groups_includes_to_parameterized_hostname_includes_to_parameterize_02ba0c09".to_string()
}
