//! Configuration for a review run
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (CORVID_*)
//! 3. Config file (`.corvid.toml` in the working directory, falling back to
//!    `~/.config/corvid/config.toml`)
//! 4. Default values
//!
//! Every recognized option is an explicit struct field with a default.
//! Unknown keys in the config file are reported with a warning and ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::comment::Severity;
use crate::{Error, Result};

/// Model endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider name (informational; the endpoint speaks chat-completions)
    pub provider: String,
    /// Model identifier sent to the endpoint
    pub name: String,
    /// Maximum tokens in the completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-call timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            name: "anthropic/claude-sonnet-4.5".to_string(),
            max_tokens: 4000,
            temperature: 0.3,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Exclusion policy deciding which changed files participate in review
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExclusionPolicy {
    /// Path segments that exclude a file (`node_modules`, `vendor`, ...)
    pub directories: Vec<String>,
    /// Filename prefixes that exclude a file (`test_`, `.min.`, ...)
    pub file_prefixes: Vec<String>,
    /// Filename glob patterns that exclude a file (`*.lock`, ...)
    pub file_patterns: Vec<String>,
    /// Diffs larger than this many bytes are skipped
    pub max_diff_bytes: usize,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            directories: [
                "node_modules",
                "vendor",
                "dist",
                "build",
                ".git",
                "__pycache__",
                ".pytest_cache",
                "coverage",
                "venv",
                ".venv",
                "migrations",
                "target",
            ]
            .map(String::from)
            .to_vec(),
            file_prefixes: ["test_", "_test", ".min.", "bundle.", "vendor."]
                .map(String::from)
                .to_vec(),
            file_patterns: [
                "*.lock",
                "*.log",
                "*.pyc",
                "*.so",
                "*.dll",
                "*.exe",
                "*.min.js",
                "*.min.css",
                "*.map",
                "package-lock.json",
                "yarn.lock",
                "poetry.lock",
                "Gemfile.lock",
            ]
            .map(String::from)
            .to_vec(),
            max_diff_bytes: 10_000,
        }
    }
}

/// Knobs of the merge and publication step
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Comments below this severity are not published
    pub severity_threshold: Severity,
    /// Per-file cap on published comments, highest severity kept
    pub max_comments_per_file: usize,
    /// Line window within which an AI finding corroborates a lint finding
    pub corroboration_window: u32,
    /// Token-overlap threshold for message/topic similarity (0.0 - 1.0)
    pub similarity_threshold: f64,
    /// Maximum related files packed into a review payload
    pub max_related_files: usize,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Suggestion,
            max_comments_per_file: 10,
            corroboration_window: 2,
            similarity_threshold: 0.3,
            max_related_files: 5,
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether the cache is consulted at all
    pub enabled: bool,
    /// Entry time-to-live
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Directory holding the cache entries
    pub location: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(7 * 24 * 3600),
            location: PathBuf::from(".review_cache"),
        }
    }
}

/// Global bounds the orchestrator enforces per run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunLimits {
    /// Maximum files reviewed in one run
    pub max_files: usize,
    /// Maximum model API calls in one run
    pub max_api_calls: u32,
    /// Wall-clock budget for the run
    #[serde(with = "humantime_serde")]
    pub wall_clock: Duration,
    /// Concurrent per-file pipelines
    pub workers: usize,
    /// Timeout for one analyzer invocation
    #[serde(with = "humantime_serde")]
    pub linter_timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_files: 50,
            max_api_calls: 60,
            wall_clock: Duration::from_secs(15 * 60),
            workers: 4,
            linter_timeout: Duration::from_secs(30),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Master switch; a disabled reviewer exits without fetching anything
    pub enabled: bool,
    /// Model endpoint settings
    pub model: ModelConfig,
    /// Exclusion policy
    pub exclusions: ExclusionPolicy,
    /// Merge and publication settings
    pub review: ReviewSettings,
    /// Cache settings
    pub cache: CacheSettings,
    /// Global run bounds
    pub limits: RunLimits,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: ModelConfig::default(),
            exclusions: ExclusionPolicy::default(),
            review: ReviewSettings::default(),
            cache: CacheSettings::default(),
            limits: RunLimits::default(),
        }
    }
}

impl ReviewConfig {
    /// Load configuration from the default locations
    ///
    /// Returns defaults if no config file exists.
    pub fn load() -> Result<Self> {
        for path in Self::candidate_paths() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::parse(&contents, &path.display().to_string())
    }

    /// Parse a TOML document, warning on unrecognized keys
    pub fn parse(contents: &str, source: &str) -> Result<Self> {
        let value: toml::Value = contents
            .parse()
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", source, e)))?;
        warn_unknown_keys(&value, source);

        let config: ReviewConfig = value
            .try_into()
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", source, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Candidate config file paths, highest priority first
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".corvid.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("corvid").join("config.toml"));
        }
        paths
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - CORVID_MODEL: model identifier
    /// - CORVID_CACHE_DIR: cache directory
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("CORVID_MODEL") {
            self.model.name = model;
        }
        if let Ok(dir) = std::env::var("CORVID_CACHE_DIR") {
            self.cache.location = PathBuf::from(dir);
        }
        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        model: Option<String>,
        cache_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(model) = model {
            self.model.name = model;
        }
        if let Some(dir) = cache_dir {
            self.cache.location = dir;
        }
        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        config_path: Option<&Path>,
        model: Option<String>,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        let config = base.with_env_overrides().with_cli_overrides(model, cache_dir);
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot drive a run
    pub fn validate(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(Error::Config("model.name must not be empty".into()));
        }
        if self.limits.workers == 0 {
            return Err(Error::Config("limits.workers must be at least 1".into()));
        }
        if self.review.max_comments_per_file == 0 {
            return Err(Error::Config(
                "review.max_comments_per_file must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.review.similarity_threshold) {
            return Err(Error::Config(
                "review.similarity_threshold must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }

    /// Identifiers that participate in cache fingerprints
    ///
    /// Any change here must invalidate previously cached reviews, so the
    /// list errs on the inclusive side.
    pub fn fingerprint_inputs(&self) -> Vec<String> {
        vec![
            format!("model={}", self.model.name),
            format!("threshold={}", self.review.severity_threshold),
            format!("max_comments={}", self.review.max_comments_per_file),
            format!("window={}", self.review.corroboration_window),
            format!("similarity={}", self.review.similarity_threshold),
        ]
    }
}

/// Known keys per config section, used for unknown-key warnings
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("model", &["provider", "name", "max_tokens", "temperature", "timeout"]),
    (
        "exclusions",
        &["directories", "file_prefixes", "file_patterns", "max_diff_bytes"],
    ),
    (
        "review",
        &[
            "severity_threshold",
            "max_comments_per_file",
            "corroboration_window",
            "similarity_threshold",
            "max_related_files",
        ],
    ),
    ("cache", &["enabled", "ttl", "location"]),
    (
        "limits",
        &["max_files", "max_api_calls", "wall_clock", "workers", "linter_timeout"],
    ),
];

/// Warn (never fail) on keys the configuration does not recognize
fn warn_unknown_keys(value: &toml::Value, source: &str) {
    let Some(table) = value.as_table() else {
        return;
    };

    for (key, nested) in table {
        if key == "enabled" {
            continue;
        }
        let Some((_, known)) = KNOWN_SECTIONS.iter().find(|(name, _)| name == key) else {
            tracing::warn!(key = %key, source = %source, "Ignoring unknown config key");
            continue;
        };
        if let Some(section) = nested.as_table() {
            for nested_key in section.keys() {
                if !known.contains(&nested_key.as_str()) {
                    tracing::warn!(
                        key = %format!("{}.{}", key, nested_key),
                        source = %source,
                        "Ignoring unknown config key"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReviewConfig::default();
        assert_eq!(config.model.name, "anthropic/claude-sonnet-4.5");
        assert_eq!(config.review.max_comments_per_file, 10);
        assert_eq!(config.cache.ttl, Duration::from_secs(7 * 24 * 3600));
        assert!(config
            .exclusions
            .directories
            .contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ReviewConfig::parse(
            r#"
[model]
name = "openai/gpt-4o"

[review]
max_comments_per_file = 3
"#,
            "test",
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.model.name, "openai/gpt-4o");
        assert_eq!(config.review.max_comments_per_file, 3);
        // Untouched sections keep defaults
        assert_eq!(config.limits.workers, 4);
    }

    #[test]
    fn test_parse_durations() {
        let config = ReviewConfig::parse(
            r#"
[cache]
ttl = "2days"

[limits]
wall_clock = "5m"
"#,
            "test",
        )
        .unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(2 * 24 * 3600));
        assert_eq!(config.limits.wall_clock, Duration::from_secs(300));
    }

    #[test]
    fn test_unknown_keys_are_not_errors() {
        let config = ReviewConfig::parse(
            r#"
mystery = "value"

[review]
max_comments_per_file = 5
unknown_knob = true
"#,
            "test",
        )
        .unwrap();
        assert_eq!(config.review.max_comments_per_file, 5);
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let result = ReviewConfig::parse(
            r#"
[limits]
workers = 0
"#,
            "test",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_rejects_bad_similarity() {
        let result = ReviewConfig::parse(
            r#"
[review]
similarity_threshold = 1.5
"#,
            "test",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let config = ReviewConfig::default()
            .with_cli_overrides(Some("x/y".to_string()), Some(PathBuf::from("/tmp/cache")));
        assert_eq!(config.model.name, "x/y");
        assert_eq!(config.cache.location, PathBuf::from("/tmp/cache"));
    }

    #[test]
    fn test_fingerprint_inputs_track_model() {
        let a = ReviewConfig::default();
        let mut b = ReviewConfig::default();
        b.model.name = "other/model".into();
        assert_ne!(a.fingerprint_inputs(), b.fingerprint_inputs());
    }
}
