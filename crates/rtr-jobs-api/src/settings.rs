//! Process-wide service settings derived from the configuration file.

use std::time::Duration;

use rtr_jobs_clients::PollSettings;
use rtr_jobs_config::{CollectionsConfig, Config, WorkflowsConfig};

/// Console host used when the configured region has none.
pub const DEFAULT_CONSOLE_HOST: &str = "falcon.crowdstrike.com";

/// How far back the execution history looks.
pub const HISTORY_WINDOW_DAYS: i64 = 7;

/// Settings shared by every service. Built once and passed by `Arc`.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub collections: CollectionsConfig,
    pub console_host: String,
    pub bulk_fetch_concurrency: usize,
    pub workflows: WorkflowsConfig,
    pub history_window: chrono::Duration,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collections: config.collections.clone(),
            console_host: console_host(config),
            bulk_fetch_concurrency: config.storage.bulk_fetch_concurrency,
            workflows: config.workflows.clone(),
            history_window: chrono::Duration::days(HISTORY_WINDOW_DAYS),
        }
    }

    /// Console link to a stored object.
    pub fn object_url(&self, collection: &str, name: &str) -> String {
        format!(
            "https://{}/api2/customobjects/v1/collections/{}/objects/{}",
            self.console_host, collection, name
        )
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn console_host(config: &Config) -> String {
    config
        .cloud
        .console_host()
        .unwrap_or_else(|| DEFAULT_CONSOLE_HOST.to_string())
}

/// Saved-search polling behaviour from the `[search]` section.
pub fn poll_settings(config: &Config) -> PollSettings {
    let search = &config.search;
    PollSettings {
        search_name: search.saved_search.clone(),
        initial_pause: Duration::from_millis(search.initial_pause_ms),
        max_poll_attempts: search.max_poll_attempts,
        poll_interval: Duration::from_millis(search.poll_interval_ms),
        page_limit: search.page_limit,
        console_host: console_host(config),
    }
}
