//! Platform adapter boundary
//!
//! The review core never talks to GitHub or GitLab directly; everything
//! goes through this trait. The adapter owns authentication and comment
//! placement rules (platforms only accept comments on diff lines — the
//! merger already restricts output to the changed-line set).

use async_trait::async_trait;

use crate::changeset::ChangeSet;
use crate::comment::VerifiedComment;
use crate::stats::RunStatistics;
use crate::Result;

/// One entry of a repository directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Repository-relative path
    pub path: String,
    /// File or directory name
    pub name: String,
    /// Whether the entry is a file (blob)
    pub is_file: bool,
}

/// Narrow interface to the code-hosting platform
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Fetch the full change set of a pull/merge request
    ///
    /// Authentication failures surface as [`crate::Error::Auth`] and abort
    /// the run before any file is processed.
    async fn get_changes(&self, change_id: u64) -> Result<ChangeSet>;

    /// Fetch a file's content at a specific ref; `None` when absent
    async fn get_file_content(&self, path: &str, git_ref: &str) -> Result<Option<String>>;

    /// List a directory at a specific ref; empty when absent
    async fn get_directory_tree(&self, dir: &str, git_ref: &str) -> Result<Vec<TreeEntry>>;

    /// Publish inline comments, in the order given (append-only)
    async fn post_comments(&self, change_id: u64, comments: &[VerifiedComment]) -> Result<()>;

    /// Publish the run summary
    async fn post_summary(&self, change_id: u64, stats: &RunStatistics) -> Result<()>;
}
