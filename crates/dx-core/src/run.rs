//! Read-only view of a completed CI run.
//!
//! The pipeline never sees the host CI platform's object model. It reads a run
//! through [`CompletedRun`] and resolves user ids through [`UserDirectory`];
//! adapters for a concrete platform implement both.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Final outcome reported by the CI platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
    Unstable,
    Aborted,
    NotBuilt,
    /// Any outcome this crate does not recognise.
    #[serde(other)]
    Unknown,
}

/// The SCM head a revision was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScmHead {
    /// A plain branch or tag.
    Branch { name: String },

    /// A pull/merge request, carrying its target branch and identifier.
    ChangeRequest {
        name: String,
        target: String,
        id: String,
    },
}

impl ScmHead {
    /// Short name of the head itself.
    pub fn name(&self) -> &str {
        match self {
            ScmHead::Branch { name } | ScmHead::ChangeRequest { name, .. } => name,
        }
    }
}

/// A resolved SCM revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmRevision {
    pub head: ScmHead,

    /// String form of the revision, normally the commit hash.
    pub revision: String,
}

/// One change-log entry. Only authorship is of interest here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// User id of the author, if the SCM could attribute one.
    #[serde(default)]
    pub author: Option<String>,
}

/// Identifies a run to the delivery gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunReference {
    pub job_full_name: String,
    pub number: u64,
}

impl RunReference {
    pub fn new(job_full_name: impl Into<String>, number: u64) -> Self {
        Self {
            job_full_name: job_full_name.into(),
            number,
        }
    }
}

impl fmt::Display for RunReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.job_full_name, self.number)
    }
}

/// Environment variables visible to a run.
pub type EnvVars = BTreeMap<String, String>;

/// Extraction points the pipeline reads from a completed run.
///
/// Every optional source is independently populated; absence is normal and is
/// never an error.
pub trait CompletedRun: Send + Sync {
    /// Final outcome, or `None` if the platform recorded no verdict.
    fn outcome(&self) -> Option<RunOutcome>;

    /// Start time in milliseconds since the Unix epoch.
    fn start_time_millis(&self) -> i64;

    /// Duration in milliseconds.
    fn duration_millis(&self) -> i64;

    /// Full name of the parent job, e.g. `folder/job`.
    fn job_full_name(&self) -> String;

    /// Run sequence number within the job.
    fn number(&self) -> u64;

    fn scm_revision(&self) -> Option<ScmRevision>;

    /// Email recorded by the SCM's contributor metadata.
    fn contributor_email(&self) -> Option<String>;

    /// Change-log entries in the order the run reports them.
    fn change_log(&self) -> Vec<ChangeLogEntry>;

    /// User id from a "started by user" cause.
    fn started_by_user(&self) -> Option<String>;

    /// Environment of the run. May fail on platforms that compute it lazily.
    fn environment(&self) -> Result<EnvVars>;

    /// Run-scoped console for diagnostics. Default discards.
    fn console(&self, _line: &str) {}

    fn reference(&self) -> RunReference {
        RunReference::new(self.job_full_name(), self.number())
    }
}

/// Resolves user ids to email addresses.
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when the user is unknown or has no address.
    fn email_for(&self, user_id: &str) -> Result<Option<String>>;
}

/// A directory that knows nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUserDirectory;

impl UserDirectory for NoUserDirectory {
    fn email_for(&self, _user_id: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
