//! Analyzer output normalization
//!
//! Each parser turns one tool's JSON into `LintFinding`s. Items that fail
//! to parse are dropped individually; a wholly unparseable payload yields
//! an empty set rather than an error.

use serde_json::Value;

use super::{LintFinding, LintSeverity};
use crate::language::Language;

/// Parse raw analyzer output for the given language
pub fn parse_output(language: Language, output: &str, path: &str) -> Vec<LintFinding> {
    match language {
        Language::Python => parse_pylint(output),
        Language::JavaScript | Language::TypeScript => parse_eslint(output),
        Language::Go => parse_golangci(output),
        Language::Rust => parse_clippy(output, path),
        _ => Vec::new(),
    }
}

/// pylint: one JSON array of message objects
fn parse_pylint(output: &str) -> Vec<LintFinding> {
    let Ok(Value::Array(items)) = serde_json::from_str(output) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            Some(LintFinding {
                line: item.get("line")?.as_u64()? as u32,
                severity: map_severity(item.get("type")?.as_str()?),
                message: item.get("message")?.as_str()?.to_string(),
                rule: item
                    .get("symbol")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// eslint: array of per-file results, each with a messages array
fn parse_eslint(output: &str) -> Vec<LintFinding> {
    let Ok(Value::Array(files)) = serde_json::from_str(output) else {
        return Vec::new();
    };

    files
        .iter()
        .filter_map(|file| file.get("messages")?.as_array())
        .flatten()
        .filter_map(|msg| {
            let severity = match msg.get("severity")?.as_u64()? {
                2 => LintSeverity::Error,
                1 => LintSeverity::Warning,
                _ => LintSeverity::Info,
            };
            Some(LintFinding {
                line: msg.get("line")?.as_u64()? as u32,
                severity,
                message: msg.get("message")?.as_str()?.to_string(),
                rule: msg
                    .get("ruleId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// golangci-lint: one JSON object with an Issues array
fn parse_golangci(output: &str) -> Vec<LintFinding> {
    let Ok(root) = serde_json::from_str::<Value>(output) else {
        return Vec::new();
    };
    let Some(issues) = root.get("Issues").and_then(Value::as_array) else {
        return Vec::new();
    };

    issues
        .iter()
        .filter_map(|issue| {
            Some(LintFinding {
                line: issue.get("Pos")?.get("Line")?.as_u64()? as u32,
                severity: map_severity(
                    issue
                        .get("Severity")
                        .and_then(Value::as_str)
                        .unwrap_or("warning"),
                ),
                message: issue.get("Text")?.as_str()?.to_string(),
                rule: issue
                    .get("FromLinter")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// cargo clippy: line-delimited JSON; compiler-message records carry spans
/// for the whole workspace, so findings are filtered to the reviewed file
fn parse_clippy(output: &str, path: &str) -> Vec<LintFinding> {
    output
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|record| {
            record.get("reason").and_then(Value::as_str) == Some("compiler-message")
        })
        .filter_map(|record| {
            let message = record.get("message")?.clone();
            let span = message
                .get("spans")?
                .as_array()?
                .iter()
                .find(|s| s.get("file_name").and_then(Value::as_str) == Some(path))?
                .clone();
            Some(LintFinding {
                line: span.get("line_start")?.as_u64()? as u32,
                severity: map_severity(
                    message.get("level").and_then(Value::as_str).unwrap_or("warning"),
                ),
                message: message.get("message")?.as_str()?.to_string(),
                rule: message
                    .get("code")
                    .and_then(|c| c.get("code"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Map tool-specific severity labels onto the shared scale
fn map_severity(label: &str) -> LintSeverity {
    match label.to_ascii_lowercase().as_str() {
        "error" | "fatal" | "e" => LintSeverity::Error,
        "warning" | "warn" | "w" => LintSeverity::Warning,
        _ => LintSeverity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pylint() {
        let output = r#"[
            {"line": 42, "type": "error", "message": "SQL injection risk", "symbol": "sql-injection"},
            {"line": 50, "type": "convention", "message": "missing docstring", "symbol": "missing-docstring"}
        ]"#;
        let findings = parse_pylint(output);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].line, 42);
        assert_eq!(findings[0].severity, LintSeverity::Error);
        assert_eq!(findings[0].rule, "sql-injection");
        assert_eq!(findings[1].severity, LintSeverity::Info);
    }

    #[test]
    fn test_parse_pylint_skips_malformed_items() {
        let output = r#"[
            {"line": 5, "type": "warning", "message": "ok", "symbol": "x"},
            {"type": "warning", "message": "no line"}
        ]"#;
        let findings = parse_pylint(output);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 5);
    }

    #[test]
    fn test_parse_eslint() {
        let output = r#"[{
            "filePath": "app.js",
            "messages": [
                {"line": 3, "severity": 2, "message": "no-eval", "ruleId": "no-eval"},
                {"line": 9, "severity": 1, "message": "unused var", "ruleId": "no-unused-vars"}
            ]
        }]"#;
        let findings = parse_eslint(output);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, LintSeverity::Error);
        assert_eq!(findings[1].severity, LintSeverity::Warning);
    }

    #[test]
    fn test_parse_golangci() {
        let output = r#"{"Issues": [
            {"Pos": {"Line": 14}, "Severity": "error", "Text": "nil deref", "FromLinter": "staticcheck"}
        ]}"#;
        let findings = parse_golangci(output);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 14);
        assert_eq!(findings[0].rule, "staticcheck");
    }

    #[test]
    fn test_parse_clippy_filters_other_files() {
        let output = concat!(
            r#"{"reason":"compiler-message","message":{"level":"warning","message":"unused variable","code":{"code":"unused_variables"},"spans":[{"file_name":"src/lib.rs","line_start":7}]}}"#,
            "\n",
            r#"{"reason":"compiler-message","message":{"level":"warning","message":"elsewhere","code":{"code":"dead_code"},"spans":[{"file_name":"src/other.rs","line_start":3}]}}"#,
            "\n",
            r#"{"reason":"build-finished","success":true}"#,
        );
        let findings = parse_clippy(output, "src/lib.rs");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 7);
        assert_eq!(findings[0].rule, "unused_variables");
    }

    #[test]
    fn test_garbage_output_is_empty() {
        assert!(parse_pylint("not json").is_empty());
        assert!(parse_eslint("{}").is_empty());
        assert!(parse_golangci("").is_empty());
        assert!(parse_clippy("plain text\nmore text", "src/lib.rs").is_empty());
    }
}
