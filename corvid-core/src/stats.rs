//! Run statistics: the orchestrator's single source of truth for what
//! happened during a review
//!
//! Built incrementally by the accumulator that owns it, immutable once the
//! run completes. Failed and excluded files are recorded by name so the
//! summary can list them, distinct from files that reviewed clean.

use serde::{Deserialize, Serialize};

use crate::comment::{Severity, VerifiedComment};

/// A file the run could not review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// A file the exclusion policy rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileExclusion {
    pub path: String,
    pub reason: String,
}

/// Aggregated counts and records for one review run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Files in the change set
    pub files_total: usize,
    /// Files that completed the review pipeline
    pub files_reviewed: usize,
    /// Files skipped (size, wall-clock budget, run limits)
    pub files_skipped: usize,
    /// Files rejected by the exclusion policy
    pub files_excluded: usize,
    /// Files whose pipeline failed
    pub files_failed: usize,
    /// Cache hits and misses
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Comments published, total and per severity
    pub comments_published: usize,
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
    pub suggestion: usize,
    /// Duplicates collapsed by the merger
    pub duplicates_suppressed: usize,
    /// Comments dropped below the severity threshold
    pub below_threshold: usize,
    /// Failed files, by name and reason
    pub failures: Vec<FileFailure>,
    /// Excluded files, by name and reason
    pub exclusions: Vec<FileExclusion>,
}

impl RunStatistics {
    pub fn new(files_total: usize) -> Self {
        Self {
            files_total,
            ..Self::default()
        }
    }

    /// Record a completed file and its published comments
    pub fn record_reviewed(&mut self, comments: &[VerifiedComment]) {
        self.files_reviewed += 1;
        self.comments_published += comments.len();
        for comment in comments {
            match comment.severity {
                Severity::Critical => self.critical += 1,
                Severity::Major => self.major += 1,
                Severity::Minor => self.minor += 1,
                Severity::Suggestion => self.suggestion += 1,
            }
        }
    }

    pub fn record_excluded(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.files_excluded += 1;
        self.exclusions.push(FileExclusion {
            path: path.into(),
            reason: reason.into(),
        });
    }

    pub fn record_skipped(&mut self) {
        self.files_skipped += 1;
    }

    pub fn record_failed(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.files_failed += 1;
        self.failures.push(FileFailure {
            path: path.into(),
            reason: reason.into(),
        });
    }

    /// Whether any file failed (the run ends in partial failure)
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    /// Count for one severity level
    pub fn severity_count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Major => self.major,
            Severity::Minor => self.minor,
            Severity::Suggestion => self.suggestion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::CommentOrigin;

    fn comment(severity: Severity) -> VerifiedComment {
        VerifiedComment {
            path: "src/lib.rs".into(),
            line: 1,
            severity,
            message: "note".into(),
            suggestion: None,
            rule: None,
            origin: CommentOrigin::AiOnly,
        }
    }

    #[test]
    fn test_record_reviewed_counts_severities() {
        let mut stats = RunStatistics::new(3);
        stats.record_reviewed(&[
            comment(Severity::Critical),
            comment(Severity::Critical),
            comment(Severity::Minor),
        ]);
        assert_eq!(stats.files_reviewed, 1);
        assert_eq!(stats.comments_published, 3);
        assert_eq!(stats.severity_count(Severity::Critical), 2);
        assert_eq!(stats.severity_count(Severity::Minor), 1);
        assert_eq!(stats.severity_count(Severity::Major), 0);
    }

    #[test]
    fn test_failures_are_named() {
        let mut stats = RunStatistics::new(2);
        stats.record_failed("src/broken.py", "provider timed out");
        assert!(stats.has_failures());
        assert_eq!(stats.failures[0].path, "src/broken.py");
        assert_eq!(stats.failures[0].reason, "provider timed out");
    }

    #[test]
    fn test_exclusions_distinct_from_failures() {
        let mut stats = RunStatistics::new(2);
        stats.record_excluded("vendor/lib.js", "in excluded directory: vendor");
        assert!(!stats.has_failures());
        assert_eq!(stats.files_excluded, 1);
        assert_eq!(stats.exclusions.len(), 1);
    }
}
