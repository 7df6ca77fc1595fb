//! GitHub implementation of the core platform adapter
//!
//! Owns comment placement: inline comments land on the RIGHT side of the
//! diff at the comment's post-change line, anchored to the pull request's
//! head commit. The run summary is posted as one issue comment.

use async_trait::async_trait;
use chrono::Utc;
use octocrab::models::repos::DiffEntryStatus;
use serde_json::json;
use tracing::{debug, info, warn};

use corvid_core::changeset::{ChangeKind, ChangeSet, FileChange};
use corvid_core::comment::{CommentOrigin, VerifiedComment};
use corvid_core::platform::{PlatformAdapter, TreeEntry};
use corvid_core::stats::RunStatistics;

use crate::client::GitHubClient;
use crate::Error;

/// Platform adapter for GitHub pull requests
#[derive(Debug)]
pub struct GitHubAdapter {
    client: GitHubClient,
}

impl GitHubAdapter {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    async fn head_sha(&self, pr_number: u64) -> Result<String, Error> {
        let pr = self
            .client
            .client()
            .pulls(self.client.owner(), self.client.repo())
            .get(pr_number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. }
                    if source.message.contains("Not Found") =>
                {
                    Error::PrNotFound(pr_number)
                }
                _ => Error::Api(e),
            })?;
        Ok(pr.head.sha)
    }
}

#[async_trait]
impl PlatformAdapter for GitHubAdapter {
    async fn get_changes(&self, change_id: u64) -> corvid_core::Result<ChangeSet> {
        self.client.test_connection().await?;

        let pr = self
            .client
            .client()
            .pulls(self.client.owner(), self.client.repo())
            .get(change_id)
            .await
            .map_err(Error::Api)?;
        let base_sha = pr.base.sha;
        let head_sha = pr.head.sha;

        let page = self
            .client
            .client()
            .pulls(self.client.owner(), self.client.repo())
            .list_files(change_id)
            .await
            .map_err(Error::Api)?;
        let entries = self
            .client
            .client()
            .all_pages(page)
            .await
            .map_err(Error::Api)?;

        let files = entries
            .into_iter()
            .map(|entry| {
                let kind = match entry.status {
                    DiffEntryStatus::Added => ChangeKind::Added,
                    DiffEntryStatus::Removed => ChangeKind::Deleted,
                    DiffEntryStatus::Renamed => ChangeKind::Renamed,
                    _ => ChangeKind::Modified,
                };
                let binary = entry.patch.is_none();
                FileChange::new(
                    entry.filename,
                    kind,
                    entry.patch.unwrap_or_default(),
                    base_sha.clone(),
                    head_sha.clone(),
                )
                .with_binary(binary)
            })
            .collect();

        let changeset = ChangeSet::new(change_id, files);
        info!(
            pr = change_id,
            files = changeset.len(),
            "Fetched pull request changes"
        );
        Ok(changeset)
    }

    async fn get_file_content(
        &self,
        path: &str,
        git_ref: &str,
    ) -> corvid_core::Result<Option<String>> {
        let result = self
            .client
            .client()
            .repos(self.client.owner(), self.client.repo())
            .get_content()
            .path(path)
            .r#ref(git_ref)
            .send()
            .await;

        match result {
            Ok(contents) => Ok(contents
                .items
                .into_iter()
                .next()
                .and_then(|item| item.decoded_content())),
            Err(e) => {
                debug!(path, git_ref, error = %e, "File content not available");
                Ok(None)
            }
        }
    }

    async fn get_directory_tree(
        &self,
        dir: &str,
        git_ref: &str,
    ) -> corvid_core::Result<Vec<TreeEntry>> {
        let result = self
            .client
            .client()
            .repos(self.client.owner(), self.client.repo())
            .get_content()
            .path(dir)
            .r#ref(git_ref)
            .send()
            .await;

        match result {
            Ok(contents) => Ok(contents
                .items
                .into_iter()
                .map(|item| TreeEntry {
                    is_file: item.r#type == "file",
                    path: item.path,
                    name: item.name,
                })
                .collect()),
            Err(e) => {
                debug!(dir, git_ref, error = %e, "Directory tree not available");
                Ok(Vec::new())
            }
        }
    }

    async fn post_comments(
        &self,
        change_id: u64,
        comments: &[VerifiedComment],
    ) -> corvid_core::Result<()> {
        let head_sha = self.head_sha(change_id).await?;
        let route = format!(
            "/repos/{}/{}/pulls/{}/comments",
            self.client.owner(),
            self.client.repo(),
            change_id
        );

        let mut posted = 0usize;
        for comment in comments {
            let body = json!({
                "body": render_comment(comment),
                "commit_id": head_sha,
                "path": comment.path,
                "line": comment.line,
                "side": "RIGHT",
            });

            // A single rejected comment (e.g. a line GitHub will not anchor)
            // must not sink the remaining ones.
            match self
                .client
                .client()
                .post::<_, serde_json::Value>(&route, Some(&body))
                .await
            {
                Ok(_) => posted += 1,
                Err(e) => {
                    warn!(
                        path = %comment.path,
                        line = comment.line,
                        error = %e,
                        "Failed to post inline comment"
                    );
                }
            }
        }

        info!(pr = change_id, posted, total = comments.len(), "Posted inline comments");
        Ok(())
    }

    async fn post_summary(
        &self,
        change_id: u64,
        stats: &RunStatistics,
    ) -> corvid_core::Result<()> {
        let body = render_summary(stats);
        self.client
            .client()
            .issues(self.client.owner(), self.client.repo())
            .create_comment(change_id, body)
            .await
            .map_err(Error::Api)?;

        info!(pr = change_id, "Posted review summary");
        Ok(())
    }
}

/// Render one inline comment as markdown
fn render_comment(comment: &VerifiedComment) -> String {
    let mut body = format!(
        "**[{}]** {}",
        comment.severity.as_str(),
        comment.message
    );

    if let Some(suggestion) = &comment.suggestion {
        body.push_str(&format!("\n\n**Suggested fix:**\n```\n{}\n```", suggestion));
    }

    match comment.origin {
        CommentOrigin::LintConfirmed => {
            let rule = comment.rule.as_deref().unwrap_or("unknown rule");
            body.push_str(&format!("\n\n_Confirmed by static analysis ({})_", rule));
        }
        CommentOrigin::AiOnly => {}
    }

    body
}

/// Render the run summary as one markdown comment
fn render_summary(stats: &RunStatistics) -> String {
    let mut body = String::from("## Corvid Review Summary\n\n");

    body.push_str("| Metric | Count |\n|---|---|\n");
    body.push_str(&format!("| Files reviewed | {} |\n", stats.files_reviewed));
    body.push_str(&format!("| Files excluded | {} |\n", stats.files_excluded));
    body.push_str(&format!("| Files skipped | {} |\n", stats.files_skipped));
    body.push_str(&format!("| Files failed | {} |\n", stats.files_failed));
    body.push_str(&format!(
        "| Comments published | {} |\n",
        stats.comments_published
    ));
    body.push_str(&format!(
        "| Cache hits / misses | {} / {} |\n",
        stats.cache_hits, stats.cache_misses
    ));

    if stats.comments_published > 0 {
        body.push_str("\n**By severity:** ");
        body.push_str(&format!(
            "critical {}, major {}, minor {}, suggestion {}\n",
            stats.critical, stats.major, stats.minor, stats.suggestion
        ));
    }

    if !stats.failures.is_empty() {
        body.push_str("\n### Failed files\n\n");
        for failure in &stats.failures {
            body.push_str(&format!("- `{}` — {}\n", failure.path, failure.reason));
        }
    }

    if !stats.exclusions.is_empty() {
        body.push_str("\n### Excluded files\n\n");
        for exclusion in &stats.exclusions {
            body.push_str(&format!("- `{}` — {}\n", exclusion.path, exclusion.reason));
        }
    }

    body.push_str(&format!(
        "\n---\n_Generated by corvid at {}_\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::comment::Severity;

    fn comment(origin: CommentOrigin) -> VerifiedComment {
        VerifiedComment {
            path: "src/auth.py".into(),
            line: 42,
            severity: Severity::Critical,
            message: "SQL injection via string interpolation".into(),
            suggestion: Some("use parameterized queries".into()),
            rule: Some("sql-injection".into()),
            origin,
        }
    }

    #[test]
    fn test_render_lint_confirmed_comment() {
        let body = render_comment(&comment(CommentOrigin::LintConfirmed));
        assert!(body.starts_with("**[critical]**"));
        assert!(body.contains("Suggested fix"));
        assert!(body.contains("Confirmed by static analysis (sql-injection)"));
    }

    #[test]
    fn test_render_ai_only_comment_has_no_badge() {
        let body = render_comment(&comment(CommentOrigin::AiOnly));
        assert!(!body.contains("Confirmed by static analysis"));
    }

    #[test]
    fn test_render_summary_lists_failures_and_exclusions() {
        let mut stats = RunStatistics::new(4);
        stats.record_failed("src/broken.py", "provider timed out");
        stats.record_excluded("vendor/lib.js", "in excluded directory: vendor");

        let body = render_summary(&stats);
        assert!(body.contains("### Failed files"));
        assert!(body.contains("`src/broken.py` — provider timed out"));
        assert!(body.contains("### Excluded files"));
        assert!(body.contains("`vendor/lib.js`"));
    }

    #[test]
    fn test_render_summary_table() {
        let stats = RunStatistics::new(1);
        let body = render_summary(&stats);
        assert!(body.contains("| Files reviewed | 0 |"));
        assert!(!body.contains("### Failed files"));
    }
}
