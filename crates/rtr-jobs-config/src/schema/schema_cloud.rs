//! Cloud endpoint and collection naming.

use serde::{Deserialize, Serialize};

/// Regions with a known API and console host.
pub const KNOWN_REGIONS: [&str; 3] = ["us-1", "us-2", "eu-1"];

/// Cloud endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Overrides the API base URL derived from `region`.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Overrides the console host derived from `region`.
    #[serde(default)]
    pub console_host: Option<String>,

    /// Bearer token for the cloud API.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            api_base_url: None,
            console_host: None,
            token: None,
        }
    }
}

fn default_region() -> String {
    "us-1".to_string()
}

impl CloudConfig {
    pub fn is_known_region(&self) -> bool {
        KNOWN_REGIONS.contains(&self.region.as_str())
    }

    /// `us-1` has no region infix; other regions use `.<region>`.
    fn region_infix(&self) -> String {
        if self.region == "us-1" {
            String::new()
        } else {
            format!(".{}", self.region)
        }
    }

    /// API base URL, or `None` for an unknown region without an override.
    pub fn api_base_url(&self) -> Option<String> {
        if let Some(url) = &self.api_base_url {
            return Some(url.clone());
        }
        self.is_known_region()
            .then(|| format!("https://api{}.crowdstrike.com", self.region_infix()))
    }

    /// Console host, or `None` for an unknown region without an override.
    pub fn console_host(&self) -> Option<String> {
        if let Some(host) = &self.console_host {
            return Some(host.clone());
        }
        self.is_known_region()
            .then(|| format!("falcon{}.crowdstrike.com", self.region_infix()))
    }
}

/// Names of the object store collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "default_jobs")]
    pub jobs: String,

    #[serde(default = "default_executions")]
    pub executions: String,

    #[serde(default = "default_execution_csv")]
    pub execution_csv: String,

    #[serde(default = "default_audit_logs")]
    pub audit_logs: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            executions: default_executions(),
            execution_csv: default_execution_csv(),
            audit_logs: default_audit_logs(),
        }
    }
}

fn default_jobs() -> String {
    "Jobs_Info_Scalable_RTR".to_string()
}

fn default_executions() -> String {
    "Job_Executions_Scalable_RTR".to_string()
}

fn default_execution_csv() -> String {
    "Job_Executions_CSV_Scalable_RTR".to_string()
}

fn default_audit_logs() -> String {
    "Jobs_Audit_Logger_Scalable_RTR".to_string()
}
