//! Raw field extraction from a completed run.
//!
//! Nothing here normalizes; branch stripping and repository naming happen in
//! the pipeline. Every field degrades to an empty string when its sources are
//! absent or fail.

use tracing::debug;

use crate::fallback::{first_non_empty, Step};
use crate::run::{CompletedRun, ScmHead, UserDirectory};

/// Environment variables holding the remote URL, primary first.
pub const REPOSITORY_URL_VARS: [&str; 3] = ["GIT_URL", "GIT_URL_1", "GIT_URL_2"];

/// Candidate values pulled from a run, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    pub repository_url: String,
    pub branch: String,
    pub target_branch: String,
    pub pr_number: String,
    pub commit_sha: String,
    pub email: String,
}

/// Extract every raw field from `run`.
pub fn extract_fields(run: &dyn CompletedRun, directory: &dyn UserDirectory) -> RawFields {
    let (branch, target_branch, pr_number, commit_sha) = scm_fields(run);
    RawFields {
        repository_url: repository_url(run),
        branch,
        target_branch,
        pr_number,
        commit_sha,
        email: author_email(run, directory),
    }
}

/// First non-blank of [`REPOSITORY_URL_VARS`].
pub fn repository_url(run: &dyn CompletedRun) -> String {
    let env = match run.environment() {
        Ok(env) => env,
        Err(e) => {
            run.console(&format!("DX: Unable to determine repository URL: {e}"));
            return String::new();
        }
    };

    first_non_empty(
        "repository_url",
        REPOSITORY_URL_VARS
            .into_iter()
            .map(|var| Step::value(var, env.get(var).cloned())),
    )
    .unwrap_or_default()
}

/// Branch, target branch, PR id and commit from the SCM revision.
fn scm_fields(run: &dyn CompletedRun) -> (String, String, String, String) {
    let Some(revision) = run.scm_revision() else {
        return Default::default();
    };

    let (branch, target, id) = match revision.head {
        ScmHead::ChangeRequest { name, target, id } => (name, target, id),
        ScmHead::Branch { name } => (name, String::new(), String::new()),
    };
    (branch, target, id, revision.revision)
}

/// Best-effort author email.
///
/// Contributor metadata first, then the first change-log author with a
/// resolvable address, then the user who started the run.
pub fn author_email(run: &dyn CompletedRun, directory: &dyn UserDirectory) -> String {
    let from_change_log = || {
        let found = run
            .change_log()
            .into_iter()
            .filter_map(|entry| entry.author)
            .find_map(|author| match directory.email_for(&author) {
                Ok(Some(email)) if !email.is_empty() => Some(email),
                Ok(_) => None,
                Err(e) => {
                    debug!(author = %author, error = %e, "change-log author email lookup failed");
                    None
                }
            });
        Ok(found)
    };

    let from_started_by = || {
        let Some(user_id) = run.started_by_user() else {
            return Ok(None);
        };
        let email = directory.email_for(&user_id)?;
        if email.as_deref().is_some_and(|e| !e.is_empty()) {
            run.console("DX: fallback email found from build user.");
        }
        Ok(email)
    };

    first_non_empty(
        "author_email",
        [
            Step::value("contributor_metadata", run.contributor_email()),
            Step::new("change_log", from_change_log),
            Step::new("started_by_user", from_started_by),
        ],
    )
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DxError;
    use crate::fakes::{FailingDirectory, StaticDirectory};
    use crate::run::{ChangeLogEntry, ScmRevision};
    use crate::snapshot::RunSnapshot;

    fn run() -> RunSnapshot {
        RunSnapshot::new("example/job", 1)
    }

    fn entry(author: &str) -> ChangeLogEntry {
        ChangeLogEntry {
            author: Some(author.to_string()),
        }
    }

    #[test]
    fn test_repository_url_precedence() {
        let mut r = run();
        r.env.insert("GIT_URL_1".to_string(), "https://h/org/alt.git".to_string());
        r.env.insert("GIT_URL_2".to_string(), "https://h/org/third.git".to_string());
        assert_eq!(repository_url(&r), "https://h/org/alt.git");

        r.env.insert("GIT_URL".to_string(), "https://h/org/main.git".to_string());
        assert_eq!(repository_url(&r), "https://h/org/main.git");
    }

    #[test]
    fn test_repository_url_blank_primary_falls_through() {
        let mut r = run();
        r.env.insert("GIT_URL".to_string(), "  ".to_string());
        r.env.insert("GIT_URL_2".to_string(), "git@h:org/repo.git".to_string());
        assert_eq!(repository_url(&r), "git@h:org/repo.git");
    }

    #[test]
    fn test_repository_url_environment_failure_is_empty() {
        let mut r = run();
        r.env.insert("GIT_URL".to_string(), "https://h/org/main.git".to_string());
        r.environment_error = Some("agent offline".to_string());
        assert_eq!(repository_url(&r), "");
        assert!(r
            .console_lines()
            .iter()
            .any(|l| l.contains("Unable to determine repository URL")));
    }

    #[test]
    fn test_change_request_head_fields() {
        let mut r = run();
        r.scm_revision = Some(ScmRevision {
            head: ScmHead::ChangeRequest {
                name: "PR-12".to_string(),
                target: "refs/heads/main".to_string(),
                id: "12".to_string(),
            },
            revision: "abc123".to_string(),
        });
        let fields = extract_fields(&r, &StaticDirectory::default());
        assert_eq!(fields.branch, "PR-12");
        assert_eq!(fields.target_branch, "refs/heads/main");
        assert_eq!(fields.pr_number, "12");
        assert_eq!(fields.commit_sha, "abc123");
    }

    #[test]
    fn test_branch_head_has_no_target_or_pr() {
        let mut r = run();
        r.scm_revision = Some(ScmRevision {
            head: ScmHead::Branch {
                name: "origin/develop".to_string(),
            },
            revision: "def456".to_string(),
        });
        let fields = extract_fields(&r, &StaticDirectory::default());
        assert_eq!(fields.branch, "origin/develop");
        assert_eq!(fields.target_branch, "");
        assert_eq!(fields.pr_number, "");
        assert_eq!(fields.commit_sha, "def456");
    }

    #[test]
    fn test_no_scm_revision_leaves_fields_empty() {
        let fields = extract_fields(&run(), &StaticDirectory::default());
        assert_eq!(fields, RawFields::default());
    }

    #[test]
    fn test_contributor_email_wins() {
        let mut r = run();
        r.contributor_email = Some("contrib@example.com".to_string());
        r.change_log = vec![entry("bob")];
        let dir = StaticDirectory::default().with_user("bob", "bob@example.com");
        assert_eq!(author_email(&r, &dir), "contrib@example.com");
    }

    #[test]
    fn test_first_resolvable_change_log_author() {
        let mut r = run();
        r.contributor_email = Some(String::new());
        r.change_log = vec![
            ChangeLogEntry { author: None },
            entry("ghost"),
            entry("carol"),
            entry("dave"),
        ];
        let dir = StaticDirectory::default()
            .with_user("carol", "carol@example.com")
            .with_user("dave", "dave@example.com");
        assert_eq!(author_email(&r, &dir), "carol@example.com");
    }

    #[test]
    fn test_started_by_user_fallback() {
        let mut r = run();
        r.change_log = vec![entry("ghost")];
        r.started_by = Some("erin".to_string());
        let dir = StaticDirectory::default().with_user("erin", "erin@example.com");
        assert_eq!(author_email(&r, &dir), "erin@example.com");
        assert!(r
            .console_lines()
            .iter()
            .any(|l| l.contains("fallback email found from build user")));
    }

    #[test]
    fn test_directory_errors_degrade_to_empty() {
        let mut r = run();
        r.change_log = vec![entry("bob")];
        r.started_by = Some("erin".to_string());
        let dir = FailingDirectory::new(|id| DxError::Directory {
            user_id: id.to_string(),
            reason: "directory offline".to_string(),
        });
        assert_eq!(author_email(&r, &dir), "");
    }
}
