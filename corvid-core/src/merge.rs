//! Verification merger: the two-pass core
//!
//! Pass 1 trusts every linter finding (deterministic, already line-scoped)
//! as a lint-confirmed comment. Pass 2 walks the AI findings: one that
//! corroborates a linter finding (close line, matching rule or topic) is
//! merged into it, keeping the richer AI explanation and the higher
//! severity instead of duplicating; one without corroboration stays as an
//! ai-only comment. Deduplication, ranking and capping make the output a
//! deterministic, testable transformation.

use std::collections::{BTreeSet, HashMap};

use crate::comment::{message_signature, CommentOrigin, Severity, VerifiedComment};
use crate::config::ReviewSettings;
use crate::linter::LintFinding;
use crate::provider::AiFinding;

/// Constants governing corroboration and output shape
#[derive(Debug, Clone)]
pub struct MergeSettings {
    /// An AI finding within this many lines of a lint finding can
    /// corroborate it
    pub line_window: u32,
    /// Minimum token overlap between messages for a topic match
    pub similarity_threshold: f64,
    /// Per-file cap on emitted comments
    pub max_comments: usize,
}

impl From<&ReviewSettings> for MergeSettings {
    fn from(settings: &ReviewSettings) -> Self {
        Self {
            line_window: settings.corroboration_window,
            similarity_threshold: settings.similarity_threshold,
            max_comments: settings.max_comments_per_file,
        }
    }
}

/// Result of merging one file's findings
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Final comments: severity descending, then line ascending
    pub comments: Vec<VerifiedComment>,
    /// Comments collapsed by deduplication
    pub duplicates_suppressed: usize,
    /// Comments dropped by the per-file cap
    pub truncated: usize,
}

/// Merge linter and AI findings for one file into verified comments
pub fn merge_findings(
    path: &str,
    changed_lines: &BTreeSet<u32>,
    lint: &[LintFinding],
    ai: &[AiFinding],
    settings: &MergeSettings,
) -> MergeOutcome {
    // Pass 1: linter findings are trusted by construction. The runner has
    // already line-scoped them; filtering again keeps the invariant local.
    let scoped_lint: Vec<&LintFinding> = lint
        .iter()
        .filter(|finding| changed_lines.contains(&finding.line))
        .collect();
    let mut candidates: Vec<VerifiedComment> = scoped_lint
        .iter()
        .map(|finding| VerifiedComment {
            path: path.to_string(),
            line: finding.line,
            severity: finding.severity.as_comment_severity(),
            message: finding.message.clone(),
            suggestion: None,
            rule: Some(finding.rule.clone()),
            origin: CommentOrigin::LintConfirmed,
        })
        .collect();

    // Pass 2: AI findings either corroborate a linter finding or stand
    // alone. Findings outside the diff cannot be anchored and are dropped.
    let mut off_diff = 0usize;
    for finding in ai {
        if !changed_lines.contains(&finding.line) {
            off_diff += 1;
            continue;
        }

        let corroborated = scoped_lint
            .iter()
            .enumerate()
            .find(|(_, l)| corroborates(finding, l, settings));

        match corroborated {
            Some((idx, _)) => {
                let candidate = &mut candidates[idx];
                candidate.message = finding.message.clone();
                candidate.suggestion = finding.suggestion.clone();
                candidate.severity = candidate.severity.max(finding.severity);
            }
            None => candidates.push(VerifiedComment {
                path: path.to_string(),
                line: finding.line,
                severity: finding.severity,
                message: finding.message.clone(),
                suggestion: finding.suggestion.clone(),
                rule: None,
                origin: CommentOrigin::AiOnly,
            }),
        }
    }
    if off_diff > 0 {
        tracing::debug!(path, off_diff, "Dropped AI findings outside the diff");
    }

    // Pass 3: collapse duplicates, preferring lint-confirmed origin and
    // higher severity.
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<VerifiedComment> = Vec::with_capacity(candidates.len());
    let mut duplicates_suppressed = 0usize;

    for comment in candidates {
        let key = comment.dedup_key();
        match by_key.get(&key) {
            Some(&idx) => {
                duplicates_suppressed += 1;
                if prefer(&comment, &deduped[idx]) {
                    deduped[idx] = comment;
                }
            }
            None => {
                by_key.insert(key, deduped.len());
                deduped.push(comment);
            }
        }
    }

    // Pass 4: rank by severity then line, keep the top of the list.
    deduped.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.line.cmp(&b.line)));
    let truncated = deduped.len().saturating_sub(settings.max_comments);
    deduped.truncate(settings.max_comments);

    MergeOutcome {
        comments: deduped,
        duplicates_suppressed,
        truncated,
    }
}

/// Whether an AI finding corroborates a linter finding
///
/// Line proximity within the window, plus either an explicit rule match or
/// enough topic overlap between the two messages.
fn corroborates(ai: &AiFinding, lint: &LintFinding, settings: &MergeSettings) -> bool {
    let distance = ai.line.abs_diff(lint.line);
    if distance > settings.line_window {
        return false;
    }

    if let Some(hint) = &ai.rule_hint {
        if hint.eq_ignore_ascii_case(&lint.rule) {
            return true;
        }
    }

    token_overlap(&ai.message, &lint.message) >= settings.similarity_threshold
}

/// Jaccard overlap between the normalized token sets of two messages
fn token_overlap(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

fn tokens(message: &str) -> BTreeSet<String> {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(String::from)
        .collect()
}

/// Dedup preference: lint-confirmed beats ai-only, then higher severity
fn prefer(candidate: &VerifiedComment, incumbent: &VerifiedComment) -> bool {
    match (candidate.origin, incumbent.origin) {
        (CommentOrigin::LintConfirmed, CommentOrigin::AiOnly) => true,
        (CommentOrigin::AiOnly, CommentOrigin::LintConfirmed) => false,
        _ => candidate.severity > incumbent.severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linter::LintSeverity;

    fn settings() -> MergeSettings {
        MergeSettings {
            line_window: 2,
            similarity_threshold: 0.3,
            max_comments: 10,
        }
    }

    fn lint(line: u32, severity: LintSeverity, rule: &str, message: &str) -> LintFinding {
        LintFinding {
            line,
            severity,
            message: message.into(),
            rule: rule.into(),
        }
    }

    fn ai(line: u32, severity: Severity, message: &str) -> AiFinding {
        AiFinding {
            line,
            severity,
            message: message.into(),
            suggestion: None,
            rule_hint: None,
        }
    }

    fn changed(lines: &[u32]) -> BTreeSet<u32> {
        lines.iter().copied().collect()
    }

    #[test]
    fn test_sql_injection_scenario() {
        // Linter and AI both flag line 42; merge yields exactly one
        // lint-confirmed critical comment.
        let lint_findings = vec![lint(
            42,
            LintSeverity::Error,
            "sql-injection",
            "possible SQL injection",
        )];
        let ai_findings = vec![ai(
            42,
            Severity::Critical,
            "SQL injection via f-string interpolation of user email",
        )];

        let outcome = merge_findings(
            "auth.py",
            &changed(&[41, 42, 43]),
            &lint_findings,
            &ai_findings,
            &settings(),
        );

        assert_eq!(outcome.comments.len(), 1);
        let comment = &outcome.comments[0];
        assert_eq!(comment.line, 42);
        assert_eq!(comment.origin, CommentOrigin::LintConfirmed);
        assert_eq!(comment.severity, Severity::Critical);
        assert_eq!(comment.rule.as_deref(), Some("sql-injection"));
        // The richer AI explanation wins.
        assert!(comment.message.contains("f-string"));
    }

    #[test]
    fn test_rule_hint_corroborates_despite_different_wording() {
        let lint_findings = vec![lint(10, LintSeverity::Warning, "no-eval", "eval() used")];
        let mut finding = ai(11, Severity::Major, "dynamic code execution is dangerous here");
        finding.rule_hint = Some("no-eval".into());

        let outcome = merge_findings(
            "app.js",
            &changed(&[10, 11]),
            &lint_findings,
            &[finding],
            &settings(),
        );
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].origin, CommentOrigin::LintConfirmed);
    }

    #[test]
    fn test_uncorroborated_ai_finding_stays_ai_only() {
        let outcome = merge_findings(
            "lib.py",
            &changed(&[5]),
            &[],
            &[ai(5, Severity::Major, "race condition on shared counter")],
            &settings(),
        );
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].origin, CommentOrigin::AiOnly);
    }

    #[test]
    fn test_distant_findings_do_not_merge() {
        let lint_findings = vec![lint(10, LintSeverity::Error, "bug", "null pointer risk")];
        let ai_findings = vec![ai(20, Severity::Major, "null pointer risk")];

        let outcome = merge_findings(
            "lib.py",
            &changed(&[10, 20]),
            &lint_findings,
            &ai_findings,
            &settings(),
        );
        assert_eq!(outcome.comments.len(), 2);
    }

    #[test]
    fn test_window_boundary_inclusive() {
        let lint_findings = vec![lint(10, LintSeverity::Error, "bug", "buffer overflow risk")];
        let ai_findings = vec![ai(12, Severity::Major, "buffer overflow risk in copy")];

        let outcome = merge_findings(
            "lib.c",
            &changed(&[10, 11, 12]),
            &lint_findings,
            &ai_findings,
            &settings(),
        );
        assert_eq!(outcome.comments.len(), 1);
    }

    #[test]
    fn test_lint_findings_outside_changed_lines_dropped() {
        let lint_findings = vec![
            lint(5, LintSeverity::Error, "bug", "inside the diff"),
            lint(99, LintSeverity::Error, "bug", "pre-existing issue"),
        ];
        let outcome = merge_findings("lib.py", &changed(&[5]), &lint_findings, &[], &settings());
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].line, 5);
    }

    #[test]
    fn test_ai_findings_outside_changed_lines_dropped() {
        let outcome = merge_findings(
            "lib.py",
            &changed(&[5]),
            &[],
            &[ai(77, Severity::Critical, "cannot be anchored")],
            &settings(),
        );
        assert!(outcome.comments.is_empty());
    }

    #[test]
    fn test_dedup_invariant() {
        let ai_findings = vec![
            ai(5, Severity::Minor, "Unused variable result"),
            ai(5, Severity::Major, "unused variable result!"),
        ];
        let outcome = merge_findings("lib.py", &changed(&[5]), &[], &ai_findings, &settings());

        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.duplicates_suppressed, 1);
        // Higher severity kept.
        assert_eq!(outcome.comments[0].severity, Severity::Major);

        let keys: BTreeSet<String> = outcome.comments.iter().map(|c| c.dedup_key()).collect();
        assert_eq!(keys.len(), outcome.comments.len());
    }

    #[test]
    fn test_ranking_severity_then_line() {
        let ai_findings = vec![
            ai(30, Severity::Minor, "style nit"),
            ai(20, Severity::Critical, "credential leak"),
            ai(10, Severity::Minor, "naming could improve"),
            ai(25, Severity::Critical, "injection vector"),
        ];
        let outcome = merge_findings(
            "lib.py",
            &changed(&[10, 20, 25, 30]),
            &[],
            &ai_findings,
            &settings(),
        );

        let order: Vec<(Severity, u32)> = outcome
            .comments
            .iter()
            .map(|c| (c.severity, c.line))
            .collect();
        assert_eq!(
            order,
            vec![
                (Severity::Critical, 20),
                (Severity::Critical, 25),
                (Severity::Minor, 10),
                (Severity::Minor, 30),
            ]
        );
    }

    #[test]
    fn test_cap_keeps_top_by_severity() {
        let mut small = settings();
        small.max_comments = 2;

        let ai_findings = vec![
            ai(1, Severity::Suggestion, "tiny style note"),
            ai(2, Severity::Critical, "severe defect here"),
            ai(3, Severity::Minor, "minor cleanup possible"),
            ai(4, Severity::Major, "major problem found"),
        ];
        let outcome = merge_findings(
            "lib.py",
            &changed(&[1, 2, 3, 4]),
            &[],
            &ai_findings,
            &small,
        );

        assert_eq!(outcome.comments.len(), 2);
        assert_eq!(outcome.truncated, 2);
        assert_eq!(outcome.comments[0].severity, Severity::Critical);
        assert_eq!(outcome.comments[1].severity, Severity::Major);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let lint_findings = vec![
            lint(42, LintSeverity::Error, "sql-injection", "possible SQL injection"),
            lint(50, LintSeverity::Warning, "unused-import", "unused import os"),
        ];
        let ai_findings = vec![
            ai(42, Severity::Critical, "SQL injection via string formatting"),
            ai(55, Severity::Minor, "consider extracting helper"),
        ];
        let lines = changed(&[42, 50, 55]);

        let first = merge_findings("auth.py", &lines, &lint_findings, &ai_findings, &settings());
        let second = merge_findings("auth.py", &lines, &lint_findings, &ai_findings, &settings());
        assert_eq!(first.comments, second.comments);
        assert_eq!(first.duplicates_suppressed, second.duplicates_suppressed);
    }

    #[test]
    fn test_empty_inputs_empty_output() {
        let outcome = merge_findings("lib.py", &changed(&[1]), &[], &[], &settings());
        assert!(outcome.comments.is_empty());
        assert_eq!(outcome.duplicates_suppressed, 0);
    }
}
