//! Execution records and the telemetry events that drive them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decode::decode_object;
use crate::error::CoreError;
use crate::status::{self, RunStatus};
use crate::timefmt;

/// One concrete run of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    /// Link to the CSV rendering of the run's log rows.
    #[serde(default, rename = "output_1")]
    pub csv_output: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default, rename = "endDate")]
    pub end_date: String,
    #[serde(default)]
    pub execution_id: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default, rename = "name")]
    pub job_name: String,
    /// Link to the run's log search.
    #[serde(default, rename = "output_2")]
    pub logscale_output: String,
    #[serde(default, rename = "numHosts")]
    pub num_hosts: usize,
    #[serde(default, rename = "receivedFiles")]
    pub received_files: usize,
    #[serde(default)]
    pub run_date: String,
    #[serde(default, with = "status::lenient")]
    pub status: Option<RunStatus>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub targeted_hosts: Vec<TargetedHost>,
}

/// Outcome of a run on one host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedHost {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub status: String,
}

fn null_as_empty<'de, D>(d: D) -> Result<Vec<TargetedHost>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<TargetedHost>>::deserialize(d)?.unwrap_or_default())
}

impl JobExecution {
    /// Fresh record for the first event seen for an execution.
    pub fn new(execution_id: &str, job_id: &str, job_name: &str, run_date: &str) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            id: job_id.to_string(),
            job_id: job_id.to_string(),
            job_name: job_name.to_string(),
            run_date: run_date.to_string(),
            ..Self::default()
        }
    }

    /// Decode a stored record (raw or base64 JSON).
    pub fn decode(data: &[u8]) -> Result<Self, CoreError> {
        decode_object(data)
    }

    /// Fill the derived listing fields: mirrored ids and the host name list.
    pub fn normalize(&mut self) {
        if self.job_id.is_empty() {
            self.job_id = self.id.clone();
        } else if self.id.is_empty() {
            self.id = self.job_id.clone();
        }
        self.hosts = self
            .targeted_hosts
            .iter()
            .map(|h| h.host_name.clone())
            .collect();
    }

    /// Recompute the live duration of an in-progress run against `now`.
    pub fn backfill_duration(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != Some(RunStatus::InProgress) {
            return Ok(());
        }
        let end = if self.end_date.is_empty() {
            timefmt::format_iso(now)
        } else {
            self.end_date.clone()
        };
        if let Some(d) = compute_duration(&self.run_date, &end, self.status)? {
            self.duration = d;
        }
        Ok(())
    }

    pub fn set_targeted_hosts(&mut self, hosts: Vec<TargetedHost>) {
        self.num_hosts = hosts.len();
        self.targeted_hosts = hosts;
    }
}

/// Elapsed run time as `HH:MM:SS`.
///
/// `None` when the run has no start or its status is unknown.
pub fn compute_duration(
    start: &str,
    end: &str,
    status: Option<RunStatus>,
) -> Result<Option<String>, CoreError> {
    if start.is_empty() || status.is_none() {
        return Ok(None);
    }
    let start = timefmt::parse_iso(start)?;
    let end = timefmt::parse_iso(end)?;
    Ok(Some(timefmt::format_elapsed(end - start)))
}

/// Workflow lifecycle notification for one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub execution_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub execution_timestamp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub definition_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

/// Suffixes the workflow definitions of a job carry.
const DEFINITION_SUFFIXES: [&str; 2] = [" RunNow", " Schedule"];

impl TelemetryEvent {
    /// Parse and check a request body.
    pub fn from_body(body: &[u8]) -> Result<Self, CoreError> {
        if body.is_empty() {
            return Err(CoreError::MalformedTelemetry("empty request body".to_string()));
        }
        let event: Self = serde_json::from_slice(body)
            .map_err(|e| CoreError::MalformedTelemetry(e.to_string()))?;

        if event.execution_id.is_empty() {
            return Err(CoreError::MalformedTelemetry("missing execution ID".to_string()));
        }
        if event.definition_name.is_empty() {
            return Err(CoreError::MalformedTelemetry(
                "missing definition name".to_string(),
            ));
        }
        if !event.definition_name.contains('-') {
            return Err(CoreError::MalformedTelemetry(
                "definition name does not contain job name".to_string(),
            ));
        }
        Ok(event)
    }

    pub fn run_status(&self) -> Option<RunStatus> {
        RunStatus::normalize(&self.status)
    }

    /// Job name embedded in the definition name: the text after the first
    /// `"- "`, minus a trailing `" RunNow"` or `" Schedule"`.
    pub fn job_name(&self) -> Result<String, CoreError> {
        let dn = self.definition_name.as_str();
        let idx = match dn.find("- ") {
            Some(i) if i > 0 && i + 3 < dn.len() => i,
            _ => {
                return Err(CoreError::MalformedDefinitionName(
                    "no job name present: missing dash".to_string(),
                ));
            }
        };
        let name = &dn[idx + 2..];

        match DEFINITION_SUFFIXES.iter().find_map(|s| name.strip_suffix(s)) {
            Some("") => Err(CoreError::MalformedDefinitionName(
                "no job name present".to_string(),
            )),
            Some(stripped) => Ok(stripped.to_string()),
            None => Ok(name.to_string()),
        }
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, CoreError> {
        timefmt::parse_iso(&self.execution_timestamp)
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
