//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{BACKEND_FILE, BACKEND_MEMORY, BACKEND_REMOTE, Config, KNOWN_REGIONS};

/// Polling budgets above this many milliseconds per page draw a warning.
const LONG_POLL_BUDGET_MS: u64 = 120_000;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_cloud(config, &mut result);
        Self::validate_collections(config, &mut result);
        Self::validate_storage(config, &mut result);
        Self::validate_search(config, &mut result);
        Self::validate_workflows(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_cloud(config: &Config, result: &mut ValidationResult) {
        let cloud = &config.cloud;
        if !cloud.is_known_region()
            && (cloud.api_base_url.is_none() || cloud.console_host.is_none())
        {
            result.add_error(ValidationError::new(
                "cloud.region",
                format!(
                    "Unknown region '{}' requires api_base_url and console_host, known regions: {:?}",
                    cloud.region, KNOWN_REGIONS
                ),
            ));
        }

        if let Some(url) = &cloud.api_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "cloud.api_base_url",
                    "api_base_url must start with http:// or https://",
                ));
            }
        }

        let remote = [
            &config.storage.backend,
            &config.search.backend,
            &config.workflows.backend,
        ]
        .into_iter()
        .any(|b| b == BACKEND_REMOTE);
        if remote && cloud.token.is_none() {
            result.add_warning(ValidationWarning::new(
                "cloud.token",
                "Token is not set, remote backends will call the API unauthenticated",
            ));
        }
    }

    fn validate_collections(config: &Config, result: &mut ValidationResult) {
        let collections = &config.collections;
        for (name, value) in [
            ("jobs", &collections.jobs),
            ("executions", &collections.executions),
            ("execution_csv", &collections.execution_csv),
            ("audit_logs", &collections.audit_logs),
        ] {
            if value.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("collections.{}", name),
                    "Collection name cannot be empty",
                ));
            }
        }
    }

    fn validate_storage(config: &Config, result: &mut ValidationResult) {
        let storage = &config.storage;
        let valid_backends = [BACKEND_MEMORY, BACKEND_FILE, BACKEND_REMOTE];
        if !valid_backends.contains(&storage.backend.as_str()) {
            result.add_error(ValidationError::new(
                "storage.backend",
                format!(
                    "Unknown storage backend '{}', valid values: {:?}",
                    storage.backend, valid_backends
                ),
            ));
        }

        if storage.backend == BACKEND_FILE && storage.path.is_none() {
            result.add_error(ValidationError::new(
                "storage.path",
                "File backend requires a storage path",
            ));
        }

        if storage.bulk_fetch_concurrency == 0 {
            result.add_error(ValidationError::new(
                "storage.bulk_fetch_concurrency",
                "bulk_fetch_concurrency must be greater than 0",
            ));
        }

        if storage.search_default_limit == 0 {
            result.add_error(ValidationError::new(
                "storage.search_default_limit",
                "search_default_limit must be greater than 0",
            ));
        }

        if storage.request_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "storage.request_timeout_secs",
                "request_timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_search(config: &Config, result: &mut ValidationResult) {
        let search = &config.search;
        let valid_backends = [BACKEND_MEMORY, BACKEND_REMOTE];
        if !valid_backends.contains(&search.backend.as_str()) {
            result.add_error(ValidationError::new(
                "search.backend",
                format!(
                    "Unknown search backend '{}', valid values: {:?}",
                    search.backend, valid_backends
                ),
            ));
        }

        if search.max_poll_attempts == 0 {
            result.add_error(ValidationError::new(
                "search.max_poll_attempts",
                "max_poll_attempts must be greater than 0",
            ));
        }

        if search.page_limit == 0 {
            result.add_error(ValidationError::new(
                "search.page_limit",
                "page_limit must be greater than 0",
            ));
        }

        if search.saved_search.trim().is_empty() {
            result.add_error(ValidationError::new(
                "search.saved_search",
                "saved_search cannot be empty",
            ));
        }

        if search.poll_budget_ms() > LONG_POLL_BUDGET_MS {
            result.add_warning(ValidationWarning::new(
                "search.poll_interval_ms",
                format!(
                    "Polling may wait {}s per result page, telemetry requests can time out",
                    search.poll_budget_ms() / 1000
                ),
            ));
        }
    }

    fn validate_workflows(config: &Config, result: &mut ValidationResult) {
        let workflows = &config.workflows;
        let valid_backends = [BACKEND_MEMORY, BACKEND_REMOTE];
        if !valid_backends.contains(&workflows.backend.as_str()) {
            result.add_error(ValidationError::new(
                "workflows.backend",
                format!(
                    "Unknown workflows backend '{}', valid values: {:?}",
                    workflows.backend, valid_backends
                ),
            ));
        }

        if workflows.notifier_template.trim().is_empty() {
            result.add_error(ValidationError::new(
                "workflows.notifier_template",
                "notifier_template cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
