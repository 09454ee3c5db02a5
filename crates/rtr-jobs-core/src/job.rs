//! Job, schedule and audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::job_id::generate_job_id;
use crate::schedule;
use crate::timefmt;

/// Output formats materialised when a job record does not list any.
pub const DEFAULT_OUTPUT_FORMATS: [&str; 2] = ["logscale", "csv"];

/// Output format name for the log viewer link.
pub const OUTPUT_LOGSCALE: &str = "logscale";

/// Output format name for the CSV artifact.
pub const OUTPUT_CSV: &str = "csv";

/// A recurring remote-execution job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub notifications: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub host_count: u64,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Schedule as handed to the workflow engine.
    #[serde(default)]
    pub wschedule: Option<Schedule>,
    #[serde(default)]
    pub run_now_schedule: Option<Schedule>,
    #[serde(default)]
    pub target: Option<TargetHost>,
    #[serde(default)]
    pub workflows: Option<WorkflowsInfo>,
    #[serde(default)]
    pub run_now: bool,
    #[serde(default)]
    pub total_recurrences: u64,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub output_format: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Fields this service does not model, preserved across rewrites.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    /// Output formats requested for this job, falling back to the defaults.
    pub fn output_formats(&self) -> Vec<String> {
        match &self.output_format {
            Some(formats) => formats.clone(),
            None => DEFAULT_OUTPUT_FORMATS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn wants_output(&self, kind: &str) -> bool {
        match &self.output_format {
            Some(formats) => formats.iter().any(|f| f == kind),
            None => DEFAULT_OUTPUT_FORMATS.contains(&kind),
        }
    }

    /// Snapshot of the fields reconciliation reads.
    pub fn run_stats(&self) -> RunStats {
        RunStats {
            last_run: self.last_run,
            next_run: self.next_run,
            run_count: self.run_count,
            run_now: self.run_now,
            schedule: self.schedule.clone(),
            total_recurrences: self.total_recurrences,
        }
    }

    /// Write back the fields reconciliation is allowed to change.
    pub fn merge_run_stats(&mut self, stats: RunStats) {
        self.last_run = stats.last_run;
        self.next_run = stats.next_run;
        self.run_count = stats.run_count;
        self.total_recurrences = stats.total_recurrences;
        self.schedule = stats.schedule;
    }

    /// Check a submitted job. Every problem found is reported.
    pub fn validate(&self, now: DateTime<Utc>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.name.is_empty() {
            issues.push(ValidationIssue::new(
                ValidationCode::JobNameIsRequired,
                "job name cannot be empty",
            ));
        }

        if self.notifications.is_empty() {
            issues.push(ValidationIssue::new(
                ValidationCode::NotificationEmailsRequired,
                "notification emails cannot be empty",
            ));
        }

        if let Some(sched) = &self.schedule {
            issues.extend(sched.validate(now));
        }

        match &self.target {
            Some(t) if !t.hosts.is_empty() || !t.host_groups.is_empty() => {}
            _ => issues.push(ValidationIssue::new(
                ValidationCode::InvalidJobTarget,
                "must have target host or groups",
            )),
        }

        match &self.action {
            Some(action) => issues.extend(action.validate()),
            None => issues.push(ValidationIssue::new(
                ValidationCode::InvalidActionType,
                "action cannot be empty",
            )),
        }

        issues
    }

    /// Whether a submitted id still derives from the submitted name.
    pub fn id_matches_name(&self) -> bool {
        generate_job_id(&self.name).is_ok_and(|id| id == self.id)
    }
}

/// Subset of job state advanced by execution telemetry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub run_now: bool,
    pub schedule: Option<Schedule>,
    pub total_recurrences: u64,
}

/// Cron-style schedule with optional bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub time_cycle: String,
    #[serde(default, rename = "start_date", skip_serializing_if = "String::is_empty")]
    pub start: String,
    #[serde(default, rename = "end_date", skip_serializing_if = "String::is_empty")]
    pub end: String,
    /// IANA zone name; blank means UTC.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timezone: String,
    #[serde(default)]
    pub skip_concurrent: bool,
}

impl Schedule {
    fn validate(&self, now: DateTime<Utc>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let invalid = |msg: String| ValidationIssue::new(ValidationCode::JobScheduleIsIncorrect, msg);

        if !self.time_cycle.is_empty() {
            if let Err(e) = schedule::CronSchedule::parse(&self.time_cycle, &self.timezone) {
                issues.push(invalid(format!("invalid schedule cron expression: {}", e)));
            }
        } else if let Err(e) = schedule::parse_timezone(&self.timezone) {
            issues.push(invalid(format!("invalid schedule timezone: {}", e)));
        }

        if !self.start.is_empty() {
            if let Err(e) = timefmt::parse_iso(&self.start) {
                issues.push(invalid(format!("invalid schedule start: {}", e)));
            }
        }

        if !self.end.is_empty() {
            match timefmt::parse_iso(&self.end) {
                Ok(end) if end < now => issues.push(invalid(
                    "invalid schedule end date should be beyond today.".to_string(),
                )),
                Ok(_) => {}
                Err(e) => issues.push(invalid(format!("invalid schedule end: {}", e))),
            }
        }

        issues
    }
}

/// What a job does on each host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "installSoftware")]
    InstallSoftware {
        #[serde(default)]
        install_file_path: String,
        #[serde(default)]
        command_switch: String,
        #[serde(default)]
        file_name: String,
    },
    #[serde(rename = "removeFile")]
    RemoveFile {
        #[serde(default)]
        remove_file_name: String,
        #[serde(default)]
        remove_file_path: String,
    },
    #[serde(rename = "buildQuery")]
    BuildQuery {
        #[serde(default)]
        query_type: String,
        #[serde(default)]
        query_file_paths: Vec<String>,
        #[serde(default)]
        registry_keys: Vec<RegistryKeySearch>,
    },
}

/// `query_type` of a file-existence check.
pub const QUERY_FILE: &str = "file";
/// `query_type` of a registry key/value check.
pub const QUERY_REGISTRY_KEY: &str = "registryKey";

impl Action {
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::InstallSoftware { .. } => "installSoftware",
            Action::RemoveFile { .. } => "removeFile",
            Action::BuildQuery { .. } => "buildQuery",
        }
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let config = |msg: String| ValidationIssue::new(ValidationCode::InvalidActionConfig, msg);
        let mut issues = Vec::new();
        match self {
            Action::InstallSoftware { file_name, .. } => {
                if file_name.is_empty() {
                    issues.push(config(format!("invalid file ids: {}", file_name)));
                }
            }
            Action::RemoveFile {
                remove_file_name,
                remove_file_path,
            } => {
                if remove_file_name.is_empty() {
                    issues.push(config(format!("invalid file name: {}", remove_file_name)));
                }
                if remove_file_path.is_empty() {
                    issues.push(config(format!("invalid file path: {}", remove_file_path)));
                }
            }
            Action::BuildQuery {
                query_type,
                query_file_paths,
                registry_keys,
            } => match query_type.as_str() {
                QUERY_FILE if query_file_paths.is_empty() => {
                    issues.push(config(format!("invalid file : {:?}", query_file_paths)));
                }
                QUERY_REGISTRY_KEY if registry_keys.is_empty() => {
                    issues.push(config(format!("invalid registry: {:?}", registry_keys)));
                }
                QUERY_FILE | QUERY_REGISTRY_KEY => {}
                other => issues.push(ValidationIssue::new(
                    ValidationCode::InvalidActionType,
                    format!("invalid build query action type: {}", other),
                )),
            },
        }
        issues
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryKeySearch {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Hosts or host groups a job runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHost {
    #[serde(default)]
    pub host_groups: Vec<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub offline_queueing: bool,
}

/// Workflows provisioned for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowsInfo {
    #[serde(default)]
    pub notifier_workflow: String,
    #[serde(default, rename = "scheduled_workflow")]
    pub schedule_workflows: Vec<String>,
}

/// Audit action recorded for a job write.
pub const AUDIT_CREATED: &str = "Created";
pub const AUDIT_UPDATED: &str = "Updated";

/// One audit log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modified_by: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub job_id: String,
}

impl Audit {
    /// Entry for a job that was just written. The key embeds the write time
    /// so keys sort chronologically.
    pub fn for_job(job: &Job, now: DateTime<Utc>) -> Self {
        let nanos = now.timestamp_nanos_opt().unwrap_or_default();
        let action = if job.version == 1 {
            AUDIT_CREATED
        } else {
            AUDIT_UPDATED
        };
        Self {
            job_name: job.name.clone(),
            modified_at: job.updated_at,
            version: job.version,
            modified_by: job.user_name.clone(),
            action: action.to_string(),
            id: format!("{}{}", nanos, job.id),
            job_id: job.id.clone(),
        }
    }
}

/// Numeric codes attached to job validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    JobNameIsRequired = 1001,
    NotificationEmailsRequired = 1005,
    JobNameChanged = 1006,
    JobIdGenerationFailure = 1007,
    JobScheduleIsIncorrect = 1008,
    InvalidJobTarget = 1010,
    InvalidActionType = 1011,
    InvalidActionConfig = 1012,
}

/// One job validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
