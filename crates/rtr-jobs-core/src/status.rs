//! Execution status normalisation.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tri-state status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in-progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Map a loosely formatted status onto a known value.
    ///
    /// Case, surrounding whitespace and punctuation are ignored, so
    /// `"SUCCEEDED"`, `"In Progress"` and `"in-progress"` all resolve.
    pub fn normalize(raw: &str) -> Option<Self> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match compact.as_str() {
            "completed" | "succeeded" => Some(RunStatus::Completed),
            "inprogress" | "progress" => Some(RunStatus::InProgress),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serde adapter for an optional status stored as a plain string.
///
/// Unknown values read back as `None`; `None` is written as `""`.
pub mod lenient {
    use super::*;

    pub fn serialize<S: Serializer>(status: &Option<RunStatus>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(status.map(|st| st.as_str()).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RunStatus>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(RunStatus::normalize))
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}
