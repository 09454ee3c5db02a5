//! Per-host outcomes from raw log events.
//!
//! Events are flat JSON objects whose keys are dotted activity paths. Two
//! shapes are recognised: install runs (stdout/stderr of a put-and-run) and
//! file removal runs (a file-exists flag from the check or remove step).

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::error;

use crate::execution::TargetedHost;
use crate::status::RunStatus;

const KEY_HOSTNAME: &str = "device.getdetails.hostname";
const KEY_INSTALL_STDERR: &str = "rtr.putandrun.stderr";
const KEY_INSTALL_STDOUT: &str = "rtr.putandrun.stdout";
const KEY_CHECK_FILE_EXISTS: &str = "rtr.app_check_file_exist_rtr_2.file_exists";
const KEY_REMOVE_FILE_EXISTS: &str = "rtr.app_remove_file_rtr_2.file_exists";
const KEY_REMOVE_RESPONSE: &str = "rtr.app_remove_file_rtr_2.response";

/// Raw log event.
pub type LogEvent = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HostRecord {
    host_name: String,
    success: bool,
}

/// Resolve the host outcomes of a batch of events.
///
/// Later events for a host replace earlier ones. The result is sorted by
/// host name.
pub fn extract_hosts(events: &[LogEvent]) -> Vec<TargetedHost> {
    let mut by_host: BTreeMap<String, bool> = BTreeMap::new();
    for event in events {
        if let Some(rec) = install_record(event).or_else(|| remove_record(event)) {
            by_host.insert(rec.host_name, rec.success);
        }
    }

    by_host
        .into_iter()
        .map(|(host_name, success)| TargetedHost {
            device_id: String::new(),
            host_name,
            status: if success {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            }
            .to_string(),
        })
        .collect()
}

/// Non-blank trimmed string value of every key ending in `suffix`.
fn field<'a>(event: &'a LogEvent, suffix: &str) -> Option<&'a str> {
    event
        .iter()
        .filter(|(k, _)| k.to_lowercase().ends_with(suffix))
        .filter_map(|(_, v)| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .last()
}

fn install_record(event: &LogEvent) -> Option<HostRecord> {
    let host_name = field(event, KEY_HOSTNAME)?.to_string();
    if field(event, KEY_INSTALL_STDERR).is_some() {
        return Some(HostRecord {
            host_name,
            success: false,
        });
    }
    field(event, KEY_INSTALL_STDOUT).map(|_| HostRecord {
        host_name,
        success: true,
    })
}

fn remove_record(event: &LogEvent) -> Option<HostRecord> {
    let host_name = field(event, KEY_HOSTNAME)?.to_string();
    let checked = field(event, KEY_CHECK_FILE_EXISTS).map(str::to_string);
    let mut removed = field(event, KEY_REMOVE_FILE_EXISTS).map(str::to_string);

    if let Some(response) = field(event, KEY_REMOVE_RESPONSE) {
        match remove_response_flag(response) {
            Ok(Some(flag)) => removed = Some(flag.to_string()),
            Ok(None) => {}
            Err(e) => {
                error!(host = %host_name, error = %e, "unreadable remove response");
                return None;
            }
        }
    }

    match removed.or(checked).as_deref() {
        Some("true") => Some(HostRecord {
            host_name,
            success: true,
        }),
        Some("false") => Some(HostRecord {
            host_name,
            success: false,
        }),
        _ => None,
    }
}

/// `file_exists` of a JSON-encoded remove response.
fn remove_response_flag(response: &str) -> Result<Option<bool>, String> {
    let parsed: Map<String, Value> =
        serde_json::from_str(response).map_err(|e| e.to_string())?;
    match parsed.get("file_exists") {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) if s == "true" => Ok(Some(true)),
        Some(Value::String(s)) if s == "false" => Ok(Some(false)),
        Some(other) => Err(format!("unknown truth value: {}", other)),
    }
}

#[cfg(test)]
#[path = "hosts_tests.rs"]
mod tests;
