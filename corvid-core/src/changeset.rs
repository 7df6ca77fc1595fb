//! Change-set model: the files of one pull request and their diffs
//!
//! A `ChangeSet` is fetched once per run through the platform adapter and
//! never mutated afterwards. Changed-line sets use post-change numbering,
//! the numbering a platform diff view accepts inline comments on.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Kind of change a file underwent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    #[default]
    Modified,
    Deleted,
    Renamed,
}

/// One changed file within a pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path (post-change)
    pub path: String,
    /// Kind of change
    pub kind: ChangeKind,
    /// Unified diff for this file (empty for binary files)
    pub diff: String,
    /// Post-change line numbers introduced by this diff
    pub changed_lines: BTreeSet<u32>,
    /// Detected language, if any
    pub language: Option<Language>,
    /// Whether the platform reported the file as binary (no patch)
    pub binary: bool,
    /// Base commit SHA of the pull request
    pub base_sha: String,
    /// Head commit SHA of the pull request
    pub head_sha: String,
}

impl FileChange {
    /// Build a file change, deriving the changed-line set and language
    pub fn new(
        path: impl Into<String>,
        kind: ChangeKind,
        diff: impl Into<String>,
        base_sha: impl Into<String>,
        head_sha: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let diff = diff.into();
        let changed_lines = changed_lines(&diff);
        let language = Language::from_path(&path);
        Self {
            path,
            kind,
            diff,
            changed_lines,
            language,
            binary: false,
            base_sha: base_sha.into(),
            head_sha: head_sha.into(),
        }
    }

    /// Mark the file as binary (platform supplied no patch)
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Whether a post-change line is part of this diff
    pub fn contains_line(&self, line: u32) -> bool {
        self.changed_lines.contains(&line)
    }
}

/// The full set of changes in one pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Pull/merge request number
    pub id: u64,
    /// Files in platform order
    pub files: Vec<FileChange>,
}

impl ChangeSet {
    pub fn new(id: u64, files: Vec<FileChange>) -> Self {
        Self { id, files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Extract the post-change line numbers a unified diff introduces
///
/// Walks hunk headers (`@@ -a,b +c,d @@`) and counts `+` lines against the
/// post-change numbering. `+++` file headers and `-` lines are ignored.
pub fn changed_lines(diff: &str) -> BTreeSet<u32> {
    let mut lines = BTreeSet::new();
    let mut new_line: u32 = 0;
    let mut in_hunk = false;

    for raw in diff.lines() {
        if raw.starts_with("@@") {
            if let Some(start) = parse_hunk_new_start(raw) {
                new_line = start;
                in_hunk = true;
            } else {
                in_hunk = false;
            }
            continue;
        }
        if !in_hunk {
            continue;
        }
        if raw.starts_with("+++") || raw.starts_with("---") {
            continue;
        }
        match raw.as_bytes().first() {
            Some(b'+') => {
                lines.insert(new_line);
                new_line += 1;
            }
            Some(b'-') => {}
            Some(b'\\') => {} // "\ No newline at end of file"
            _ => {
                new_line += 1;
            }
        }
    }

    lines
}

/// Parse the `+c[,d]` start line out of a hunk header
fn parse_hunk_new_start(header: &str) -> Option<u32> {
    let plus = header.split_whitespace().find(|tok| tok.starts_with('+'))?;
    let start = plus[1..].split(',').next()?;
    start.parse().ok()
}
