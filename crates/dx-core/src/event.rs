//! The canonical record reported for one completed run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunOutcome;

/// Status reported to DX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
    Cancelled,
}

impl RunStatus {
    /// Map a platform outcome to a reported status.
    ///
    /// Unstable runs report as failures; aborted and not-built runs report as
    /// cancelled. A missing or unrecognised verdict is never a success.
    pub fn from_outcome(outcome: Option<RunOutcome>) -> Self {
        match outcome {
            Some(RunOutcome::Success) => RunStatus::Success,
            Some(RunOutcome::Failure) | Some(RunOutcome::Unstable) => RunStatus::Failure,
            Some(RunOutcome::Aborted) | Some(RunOutcome::NotBuilt) => RunStatus::Cancelled,
            Some(RunOutcome::Unknown) | None => RunStatus::Failure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start and finish of a run, in whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub started_at: i64,
    pub finished_at: i64,
}

impl RunWindow {
    /// Truncate millisecond timestamps to seconds.
    ///
    /// Negative durations are clamped to zero so the finish never precedes the
    /// start.
    pub fn from_millis(start_millis: i64, duration_millis: i64) -> Self {
        let duration_millis = duration_millis.max(0);
        Self {
            started_at: start_millis.div_euclid(1000),
            finished_at: start_millis.saturating_add(duration_millis).div_euclid(1000),
        }
    }
}

/// Normalized, reportable description of one completed run.
///
/// Serializes to the flat JSON object DX expects. `base_branch` and
/// `pr_number` are omitted unless the run built a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRunEvent {
    pub pipeline_name: String,
    pub pipeline_source: String,
    pub reference_id: String,
    pub source_id: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub status: RunStatus,
    pub repository: String,
    pub source_url: String,
    pub head_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    pub commit_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<String>,
    pub email: String,
}

impl CanonicalRunEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.started_at, 0)
    }

    pub fn finished_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.finished_at, 0)
    }
}

/// `Some(value)` unless `value` is empty.
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
