//! Plain-data run record.
//!
//! [`RunSnapshot`] carries everything [`CompletedRun`] exposes as ordinary
//! fields, so a run exported from the CI platform as JSON can be replayed
//! through the pipeline. It also answers user-directory lookups from its
//! `users` table.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DxError, Result};
use crate::run::{
    ChangeLogEntry, CompletedRun, EnvVars, RunOutcome, ScmRevision, UserDirectory,
};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSnapshot {
    pub job_full_name: String,
    pub number: u64,
    pub outcome: Option<RunOutcome>,
    pub start_time_millis: i64,
    pub duration_millis: i64,
    pub scm_revision: Option<ScmRevision>,
    pub contributor_email: Option<String>,
    pub change_log: Vec<ChangeLogEntry>,
    /// User id from a "started by user" cause.
    pub started_by: Option<String>,
    pub env: EnvVars,
    /// When set, reading the environment fails with this message.
    pub environment_error: Option<String>,
    /// Email addresses keyed by user id.
    pub users: BTreeMap<String, String>,
    #[serde(skip)]
    console: Mutex<Vec<String>>,
}

impl RunSnapshot {
    /// An empty run of `job_full_name` #`number`.
    pub fn new(job_full_name: impl Into<String>, number: u64) -> Self {
        Self {
            job_full_name: job_full_name.into(),
            number,
            ..Default::default()
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Lines written to the run console so far.
    pub fn console_lines(&self) -> Vec<String> {
        self.console
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CompletedRun for RunSnapshot {
    fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    fn start_time_millis(&self) -> i64 {
        self.start_time_millis
    }

    fn duration_millis(&self) -> i64 {
        self.duration_millis
    }

    fn job_full_name(&self) -> String {
        self.job_full_name.clone()
    }

    fn number(&self) -> u64 {
        self.number
    }

    fn scm_revision(&self) -> Option<ScmRevision> {
        self.scm_revision.clone()
    }

    fn contributor_email(&self) -> Option<String> {
        self.contributor_email.clone()
    }

    fn change_log(&self) -> Vec<ChangeLogEntry> {
        self.change_log.clone()
    }

    fn started_by_user(&self) -> Option<String> {
        self.started_by.clone()
    }

    fn environment(&self) -> Result<EnvVars> {
        match &self.environment_error {
            Some(message) => Err(DxError::Environment(message.clone())),
            None => Ok(self.env.clone()),
        }
    }

    fn console(&self, line: &str) {
        debug!(run = %self.reference(), "{line}");
        self.console
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

impl UserDirectory for RunSnapshot {
    fn email_for(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.users.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::ScmHead;

    #[test]
    fn test_from_json_minimal() {
        let snapshot = RunSnapshot::from_json(r#"{"job_full_name":"example/job","number":42}"#)
            .expect("parse");
        assert_eq!(snapshot.reference().to_string(), "example/job #42");
        assert!(snapshot.outcome.is_none());
        assert!(snapshot.environment().expect("env").is_empty());
    }

    #[test]
    fn test_from_json_full() {
        let json = r#"{
            "job_full_name": "org/repo/main",
            "number": 7,
            "outcome": "aborted",
            "start_time_millis": 1700000000000,
            "duration_millis": 90000,
            "scm_revision": {
                "head": {"kind": "branch", "name": "refs/heads/main"},
                "revision": "cafebabe"
            },
            "change_log": [{"author": "alice"}, {}],
            "started_by": "bob",
            "env": {"GIT_URL": "https://git.example.com/org/repo.git"},
            "users": {"alice": "alice@example.com"}
        }"#;
        let snapshot = RunSnapshot::from_json(json).expect("parse");
        assert_eq!(snapshot.outcome, Some(RunOutcome::Aborted));
        assert_eq!(
            snapshot.scm_revision.as_ref().map(|r| r.head.clone()),
            Some(ScmHead::Branch {
                name: "refs/heads/main".to_string()
            })
        );
        assert_eq!(snapshot.change_log.len(), 2);
        assert_eq!(
            snapshot.email_for("alice").expect("lookup").as_deref(),
            Some("alice@example.com")
        );
        assert_eq!(snapshot.email_for("bob").expect("lookup"), None);
    }

    #[test]
    fn test_environment_error() {
        let mut snapshot = RunSnapshot::new("job", 1);
        snapshot.environment_error = Some("agent offline".to_string());
        assert!(matches!(snapshot.environment(), Err(DxError::Environment(_))));
    }

    #[test]
    fn test_console_records_lines() {
        let snapshot = RunSnapshot::new("job", 1);
        snapshot.console("DX: first");
        snapshot.console("DX: second");
        assert_eq!(snapshot.console_lines(), vec!["DX: first", "DX: second"]);
    }
}
