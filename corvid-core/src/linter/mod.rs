//! Linter runner: deterministic findings scoped to changed lines
//!
//! Each supported language maps to one analyzer command. The runner probes
//! for the analyzer, executes it with a timeout, normalizes its output and
//! drops every finding outside the file's changed-line set, so pre-existing
//! issues are never reported as new ones. An absent analyzer, a crash or a
//! timeout all degrade to zero findings; linting is evidence gathering, not
//! a gate.

mod parse;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::changeset::FileChange;
use crate::comment::Severity;
use crate::language::Language;
use crate::{Error, Result};

pub use parse::parse_output;

/// Severity scale of deterministic analyzers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
    Info,
}

impl LintSeverity {
    /// Map onto the published comment scale
    pub fn as_comment_severity(&self) -> Severity {
        match self {
            LintSeverity::Error => Severity::Major,
            LintSeverity::Warning => Severity::Minor,
            LintSeverity::Info => Severity::Suggestion,
        }
    }
}

/// One normalized analyzer finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintFinding {
    /// Post-change line number; always within the changed-line set once
    /// the runner has filtered
    pub line: u32,
    /// Analyzer severity
    pub severity: LintSeverity,
    /// Analyzer message
    pub message: String,
    /// Rule identifier (symbol, rule id, lint name)
    pub rule: String,
}

/// Analyzer registration for one language
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerCommand {
    /// Program looked up on PATH
    pub program: &'static str,
    /// Fixed arguments before the file path
    pub args: &'static [&'static str],
    /// Whether the file path is appended (clippy lints the whole crate)
    pub takes_file: bool,
}

/// Analyzer registered for a language, if any
pub fn analyzer_for(language: Language) -> Option<AnalyzerCommand> {
    match language {
        Language::Python => Some(AnalyzerCommand {
            program: "pylint",
            args: &["--output-format=json"],
            takes_file: true,
        }),
        Language::JavaScript | Language::TypeScript => Some(AnalyzerCommand {
            program: "eslint",
            args: &["--format=json"],
            takes_file: true,
        }),
        Language::Go => Some(AnalyzerCommand {
            program: "golangci-lint",
            args: &["run", "--out-format=json"],
            takes_file: true,
        }),
        Language::Rust => Some(AnalyzerCommand {
            program: "cargo",
            args: &["clippy", "--message-format=json"],
            takes_file: false,
        }),
        _ => None,
    }
}

/// Probe timeout; analyzers answering `--version` slower than this are
/// treated as absent
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes registered analyzers against changed files
#[derive(Debug)]
pub struct LinterRunner {
    repo_root: PathBuf,
    timeout: Duration,
    /// Probe results per language: `None` = absent, `Some(id)` = "pylint 3.0.2"
    versions: Mutex<HashMap<Language, Option<String>>>,
}

impl LinterRunner {
    pub fn new(repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout,
            versions: Mutex::new(HashMap::new()),
        }
    }

    /// Tool identifier used in cache fingerprints
    ///
    /// Returns the probed `<program> <version>` string, or `None` when the
    /// language has no registered or installed analyzer. Probes once per
    /// language per run.
    pub async fn tool_identifier(&self, language: Language) -> Option<String> {
        let command = analyzer_for(language)?;

        let mut versions = self.versions.lock().await;
        if let Some(cached) = versions.get(&language) {
            return cached.clone();
        }

        let probed = probe_version(command.program).await;
        versions.insert(language, probed.clone());
        probed
    }

    /// Run the registered analyzer for this file, scoped to changed lines
    ///
    /// Never fails: every error path logs and returns an empty finding set.
    pub async fn run(&self, change: &FileChange) -> Vec<LintFinding> {
        let Some(language) = change.language else {
            return Vec::new();
        };
        let Some(command) = analyzer_for(language) else {
            return Vec::new();
        };

        if self.tool_identifier(language).await.is_none() {
            tracing::debug!(
                path = %change.path,
                analyzer = command.program,
                "Analyzer not installed, skipping lint evidence"
            );
            return Vec::new();
        }

        match self.execute(command, change, language).await {
            Ok(findings) => {
                let total = findings.len();
                let scoped: Vec<LintFinding> = findings
                    .into_iter()
                    .filter(|f| change.contains_line(f.line))
                    .collect();
                tracing::debug!(
                    path = %change.path,
                    total,
                    scoped = scoped.len(),
                    "Linter findings filtered to changed lines"
                );
                scoped
            }
            Err(e) => {
                tracing::warn!(path = %change.path, error = %e, "Analyzer failed, continuing without lint evidence");
                Vec::new()
            }
        }
    }

    async fn execute(
        &self,
        command: AnalyzerCommand,
        change: &FileChange,
        language: Language,
    ) -> Result<Vec<LintFinding>> {
        let mut cmd = Command::new(command.program);
        cmd.args(command.args)
            .current_dir(&self.repo_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if command.takes_file {
            cmd.arg(&change.path);
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::Analyzer(format!(
                    "{} timed out after {:?}",
                    command.program, self.timeout
                ))
            })?
            .map_err(|e| Error::Analyzer(format!("{} failed to start: {}", command.program, e)))?;

        // Analyzers exit non-zero when they find issues; only the output
        // matters here.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stdout.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            stdout.into_owned()
        };

        Ok(parse_output(language, &text, &change.path))
    }
}

/// Probe an analyzer's version string, treating any failure as absent
async fn probe_version(program: &str) -> Option<String> {
    let result = tokio::time::timeout(
        PROBE_TIMEOUT,
        Command::new(program)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let first_line = stdout.lines().next().unwrap_or(program).trim().to_string();
            Some(if first_line.is_empty() {
                program.to_string()
            } else {
                first_line
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ChangeKind;

    #[test]
    fn test_analyzer_registry() {
        assert_eq!(analyzer_for(Language::Python).unwrap().program, "pylint");
        assert_eq!(analyzer_for(Language::TypeScript).unwrap().program, "eslint");
        assert!(!analyzer_for(Language::Rust).unwrap().takes_file);
        assert!(analyzer_for(Language::Swift).is_none());
    }

    #[test]
    fn test_lint_severity_mapping() {
        assert_eq!(
            LintSeverity::Error.as_comment_severity(),
            Severity::Major
        );
        assert_eq!(
            LintSeverity::Warning.as_comment_severity(),
            Severity::Minor
        );
        assert_eq!(
            LintSeverity::Info.as_comment_severity(),
            Severity::Suggestion
        );
    }

    #[tokio::test]
    async fn test_unknown_language_is_empty_not_error() {
        let runner = LinterRunner::new(".", Duration::from_secs(5));
        let change = FileChange::new("README.md", ChangeKind::Modified, "+docs", "b", "h");
        assert!(runner.run(&change).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_analyzer_is_empty_not_error() {
        let runner = LinterRunner::new(".", Duration::from_secs(5));
        // Swift has no registered analyzer at all; Kotlin likewise.
        let change = FileChange::new("App.swift", ChangeKind::Modified, "+let x = 1", "b", "h");
        assert!(runner.run(&change).await.is_empty());
    }
}
