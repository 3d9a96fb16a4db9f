//! String normalizers shared by the pipeline and the host mapping loader.

/// Ref prefixes removed from branch names, tried in order. At most one is stripped.
const BRANCH_REF_PREFIXES: [&str; 3] = ["refs/heads/", "refs/remotes/origin/", "origin/"];

/// Strip a single leading ref prefix from a branch name.
///
/// `refs/heads/main`, `refs/remotes/origin/main` and `origin/main` all become
/// `main`. Names without a recognised prefix pass through unchanged, and the
/// empty string stays empty.
pub fn strip_branch_ref(branch: &str) -> String {
    for prefix in BRANCH_REF_PREFIXES {
        if let Some(rest) = branch.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    branch.to_string()
}

/// Derive the short repository name from a remote URL.
///
/// Handles both URL (`https://host/org/repo.git`) and scp-like
/// (`git@host:org/repo.git`) remotes.
pub fn repository_short_name(url: &str) -> String {
    let trimmed = url.strip_suffix(".git").unwrap_or(url);
    trimmed
        .split(['/', ':'])
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Split one line of the mapping table into trimmed fields.
///
/// Commas inside double quotes do not split. Quote characters toggle quoting
/// and are dropped from the output.
pub fn split_csv_line(line: &str) -> Vec<String> {
    if line.trim().is_empty() {
        return Vec::new();
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Whether `repository` appears in a comma- or newline-separated denylist.
///
/// Comparison is case-insensitive after trimming. An empty repository name or
/// an empty denylist never denies.
pub fn is_repository_denied(repository: &str, denylist: &str) -> bool {
    let repository = repository.trim();
    if repository.is_empty() || denylist.trim().is_empty() {
        return false;
    }

    let repository = repository.to_lowercase();
    denylist
        .split([',', '\n'])
        .map(|entry| entry.trim().to_lowercase())
        .any(|entry| !entry.is_empty() && entry == repository)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_branch_ref_prefixes() {
        assert_eq!(strip_branch_ref("refs/heads/main"), "main");
        assert_eq!(strip_branch_ref("refs/remotes/origin/main"), "main");
        assert_eq!(strip_branch_ref("origin/main"), "main");
        assert_eq!(strip_branch_ref("main"), "main");
        assert_eq!(strip_branch_ref(""), "");
    }

    #[test]
    fn test_strip_branch_ref_removes_only_one_prefix() {
        assert_eq!(strip_branch_ref("refs/heads/origin/main"), "origin/main");
        assert_eq!(strip_branch_ref("feature/refs/heads/x"), "feature/refs/heads/x");
    }

    #[test]
    fn test_strip_branch_ref_is_idempotent() {
        for input in [
            "refs/heads/main",
            "refs/remotes/origin/release/1.2",
            "origin/feature/x",
            "main",
            "",
        ] {
            let once = strip_branch_ref(input);
            assert_eq!(strip_branch_ref(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_repository_short_name() {
        assert_eq!(repository_short_name("https://example.com/org/repo.git"), "repo");
        assert_eq!(repository_short_name("git@host:org/repo.git"), "repo");
        assert_eq!(repository_short_name("https://example.com/org/repo"), "repo");
        assert_eq!(repository_short_name("https://example.com/org/repo/"), "repo");
        assert_eq!(repository_short_name(""), "");
    }

    #[test]
    fn test_split_csv_line_quoted_and_bare() {
        assert_eq!(split_csv_line(r#"host-a,"source-a""#), vec!["host-a", "source-a"]);
        assert_eq!(split_csv_line(" host-b , source-b "), vec!["host-b", "source-b"]);
        assert_eq!(
            split_csv_line(r#""host-c","label, with comma""#),
            vec!["host-c", "label, with comma"]
        );
    }

    #[test]
    fn test_split_csv_line_edge_cases() {
        assert!(split_csv_line("").is_empty());
        assert!(split_csv_line("   ").is_empty());
        assert_eq!(split_csv_line("only"), vec!["only"]);
        assert_eq!(split_csv_line("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn test_denylist_matching() {
        let denylist = "Example-Repo, other";
        assert!(is_repository_denied("example-repo", denylist));
        assert!(is_repository_denied("EXAMPLE-REPO", denylist));
        assert!(is_repository_denied("other", denylist));
        assert!(!is_repository_denied("other-repo", denylist));
    }

    #[test]
    fn test_denylist_newline_separated() {
        assert!(is_repository_denied("EXAMPLE-repo", "example-repo\nsecond"));
        assert!(is_repository_denied("second", "example-repo\n  second  \n"));
    }

    #[test]
    fn test_denylist_empty_never_denies() {
        assert!(!is_repository_denied("", "example-repo"));
        assert!(!is_repository_denied("   ", "example-repo"));
        assert!(!is_repository_denied("example-repo", ""));
        assert!(!is_repository_denied("example-repo", " ,\n, "));
    }
}
