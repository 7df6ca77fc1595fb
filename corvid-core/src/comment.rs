//! Published comment model: severity, origin and deduplication keys

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a review comment
///
/// Ordering is ascending, so `Critical` compares greatest. Ranking and
/// "prefer the higher severity" rules lean on this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Suggestion,
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// All severities, highest first
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Major,
        Severity::Minor,
        Severity::Suggestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "major" => Ok(Severity::Major),
            "minor" => Ok(Severity::Minor),
            "suggestion" => Ok(Severity::Suggestion),
            other => Err(format!("unrecognized severity: {}", other)),
        }
    }
}

/// How a comment earned its place in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentOrigin {
    /// Corroborated by a deterministic static analyzer
    LintConfirmed,
    /// Reported by the model alone
    AiOnly,
}

/// The unit that is actually published to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedComment {
    /// File path the comment anchors to
    pub path: String,
    /// Post-change line number
    pub line: u32,
    /// Ranked severity
    pub severity: Severity,
    /// Comment body
    pub message: String,
    /// Optional suggested fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Linter rule id when lint-confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Origin tag
    pub origin: CommentOrigin,
}

impl VerifiedComment {
    /// Stable deduplication key: path + line + normalized message signature
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.path,
            self.line,
            message_signature(&self.message)
        )
    }
}

/// Number of leading significant words kept in a message signature
const SIGNATURE_WORDS: usize = 6;

/// Normalize a message into a stable signature
///
/// Lowercases, strips punctuation, drops short filler words and keeps the
/// first few significant words, so rewordings of the same complaint land on
/// the same key.
pub fn message_signature(message: &str) -> String {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .take(SIGNATURE_WORDS)
        .collect::<Vec<_>>()
        .join("-")
}
