//! Exclusion filter: decides whether a changed file participates in review
//!
//! A pure decision over the file's path, size and content sniff plus the
//! configured policy. Rejections carry a human-readable reason and are
//! recorded in the run statistics, never silently dropped.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::changeset::FileChange;
use crate::config::ExclusionPolicy;
use crate::{Error, Result};

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// File participates in review
    Admit,
    /// File is excluded, with the reason recorded in statistics
    Reject { reason: String },
}

impl Admission {
    fn reject(reason: impl Into<String>) -> Self {
        Admission::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

/// Compiled exclusion filter
///
/// The policy is read once at construction; `check` performs no IO.
#[derive(Debug)]
pub struct ExclusionFilter {
    directories: Vec<String>,
    file_prefixes: Vec<String>,
    patterns: GlobSet,
    pattern_sources: Vec<String>,
    max_diff_bytes: usize,
}

impl ExclusionFilter {
    /// Compile a filter from the configured policy
    pub fn new(policy: &ExclusionPolicy) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &policy.file_patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::Config(format!("invalid exclusion pattern {:?}: {}", pattern, e)))?;
            builder.add(glob);
        }
        let patterns = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to compile exclusion patterns: {}", e)))?;

        Ok(Self {
            directories: policy.directories.clone(),
            file_prefixes: policy.file_prefixes.clone(),
            patterns,
            pattern_sources: policy.file_patterns.clone(),
            max_diff_bytes: policy.max_diff_bytes,
        })
    }

    /// Decide whether a changed file is reviewed
    pub fn check(&self, change: &FileChange) -> Admission {
        let path = Path::new(&change.path);

        for component in path.iter() {
            let Some(segment) = component.to_str() else {
                continue;
            };
            if self.directories.iter().any(|dir| dir == segment) {
                return Admission::reject(format!("in excluded directory: {}", segment));
            }
        }

        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            for prefix in &self.file_prefixes {
                if filename.starts_with(prefix.as_str()) {
                    return Admission::reject(format!("matches excluded prefix: {}", prefix));
                }
            }
        }

        // Globs match against the filename and the full path, so both
        // "*.lock" and "docs/generated/*" style patterns work.
        if let Some(filename) = path.file_name() {
            let matched = self
                .patterns
                .matches(filename)
                .into_iter()
                .chain(self.patterns.matches(path))
                .next();
            if let Some(idx) = matched {
                return Admission::reject(format!(
                    "matches excluded pattern: {}",
                    self.pattern_sources[idx]
                ));
            }
        }

        if change.binary || looks_binary(&change.diff) {
            return Admission::reject("binary file");
        }

        if change.diff.len() > self.max_diff_bytes {
            return Admission::reject(format!(
                "diff too large: {} bytes (limit {})",
                change.diff.len(),
                self.max_diff_bytes
            ));
        }

        Admission::Admit
    }
}

/// Content sniff: a NUL byte in the patch means the platform diffed a
/// binary file anyway
fn looks_binary(diff: &str) -> bool {
    diff.as_bytes().contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ChangeKind;

    fn change(path: &str, diff: &str) -> FileChange {
        FileChange::new(path, ChangeKind::Modified, diff, "base", "head")
    }

    fn filter() -> ExclusionFilter {
        ExclusionFilter::new(&ExclusionPolicy::default()).unwrap()
    }

    #[test]
    fn test_admits_source_file() {
        let admission = filter().check(&change("src/auth.py", "@@ -1 +1,2 @@\n+x"));
        assert!(admission.is_admitted());
    }

    #[test]
    fn test_rejects_excluded_directory() {
        let admission = filter().check(&change("node_modules/lib/index.js", "+x"));
        assert_eq!(
            admission,
            Admission::Reject {
                reason: "in excluded directory: node_modules".into()
            }
        );
    }

    #[test]
    fn test_directory_match_is_whole_segment() {
        // "build" excluded must not reject "rebuild/" or "build.rs"
        assert!(filter().check(&change("rebuild/main.py", "+x")).is_admitted());
        assert!(filter().check(&change("src/build.rs", "+x")).is_admitted());
    }

    #[test]
    fn test_rejects_prefix() {
        let admission = filter().check(&change("tests/test_auth.py", "+x"));
        assert!(matches!(admission, Admission::Reject { reason } if reason.contains("test_")));
    }

    #[test]
    fn test_rejects_pattern() {
        let admission = filter().check(&change("Cargo.lock", "+x"));
        assert!(matches!(admission, Admission::Reject { reason } if reason.contains("*.lock")));
    }

    #[test]
    fn test_rejects_binary_flag() {
        let binary = change("assets/logo.png", "").with_binary(true);
        assert_eq!(
            filter().check(&binary),
            Admission::Reject {
                reason: "binary file".into()
            }
        );
    }

    #[test]
    fn test_rejects_nul_sniff() {
        let admission = filter().check(&change("data.bin.txt", "+\u{0}\u{0}"));
        assert_eq!(
            admission,
            Admission::Reject {
                reason: "binary file".into()
            }
        );
    }

    #[test]
    fn test_rejects_oversized_diff() {
        let big = "+x\n".repeat(5_000);
        let admission = filter().check(&change("src/big.py", &big));
        assert!(matches!(admission, Admission::Reject { reason } if reason.contains("too large")));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let policy = ExclusionPolicy {
            file_patterns: vec!["[".into()],
            ..ExclusionPolicy::default()
        };
        assert!(ExclusionFilter::new(&policy).is_err());
    }
}
