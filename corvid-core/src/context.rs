//! Context assembly: everything the model sees about one changed file
//!
//! The assembled payload is the sole input to the AI review client; the
//! client has no other access to the repository. Truncation is
//! deterministic and always keeps the content closest to the diff.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::changeset::{ChangeKind, FileChange};
use crate::config::ReviewSettings;
use crate::language::{detect_framework, Language};
use crate::linter::LintFinding;
use crate::platform::PlatformAdapter;
use crate::Result;

/// Character budgets per payload section
const FILE_EXCERPT_BUDGET: usize = 2_000;
const README_BUDGET: usize = 3_000;
const MANIFEST_BUDGET: usize = 1_000;
const CONTAINER_BUDGET: usize = 2_000;
const RELATED_BUDGET: usize = 1_500;

/// Lint findings packed into one payload, highest value first
const MAX_LINT_FINDINGS: usize = 10;

/// Why a related file was pulled into the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedReason {
    ImportedByChangedFile,
    SameDirectory,
    TestFile,
}

impl RelatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedReason::ImportedByChangedFile => "imported by changed file",
            RelatedReason::SameDirectory => "same directory",
            RelatedReason::TestFile => "test file",
        }
    }
}

/// A neighboring file packed into the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedFile {
    pub path: String,
    pub excerpt: String,
    pub reason: RelatedReason,
}

/// A project-level artifact excerpt (README, manifest, container config)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactExcerpt {
    pub path: String,
    pub excerpt: String,
}

/// Project-level context shared by every file in a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectContext {
    pub readme: Option<ArtifactExcerpt>,
    pub manifest: Option<ArtifactExcerpt>,
    pub container: Option<ArtifactExcerpt>,
}

/// The single structured payload handed to the AI review client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub path: String,
    pub kind: ChangeKind,
    pub language: Option<Language>,
    pub framework: Option<String>,
    pub diff: String,
    /// File text before the change, truncated around the diff
    pub before_excerpt: Option<String>,
    /// File text after the change, truncated around the diff
    pub after_excerpt: Option<String>,
    /// Post-change file length in lines, for validating model output
    pub line_count: u32,
    pub lint_findings: Vec<LintFinding>,
    pub related: Vec<RelatedFile>,
    pub project: ProjectContext,
}

impl ReviewPayload {
    /// Attach lint evidence gathered after assembly
    pub fn with_lint_findings(mut self, mut findings: Vec<LintFinding>) -> Self {
        findings.truncate(MAX_LINT_FINDINGS);
        self.lint_findings = findings;
        self
    }

    /// Render the payload as the review prompt
    pub fn to_prompt(&self) -> String {
        let mut prompt = String::with_capacity(8 * 1024);

        prompt.push_str("# CODE REVIEW CONTEXT\n\n");
        prompt.push_str(&format!("## File: {}\n", self.path));
        prompt.push_str(&format!(
            "## Language: {}\n",
            self.language.map(|l| l.as_str()).unwrap_or("unknown")
        ));
        if let Some(framework) = &self.framework {
            prompt.push_str(&format!("## Framework: {}\n", framework));
        }
        prompt.push('\n');

        if let Some(readme) = &self.project.readme {
            prompt.push_str(&format!(
                "## Project Overview (from {})\n```\n{}\n```\n\n",
                readme.path, readme.excerpt
            ));
        }
        if let Some(manifest) = &self.project.manifest {
            prompt.push_str(&format!(
                "## Dependency Manifest ({})\n```\n{}\n```\n\n",
                manifest.path, manifest.excerpt
            ));
        }
        if let Some(container) = &self.project.container {
            prompt.push_str(&format!(
                "## Container Configuration ({})\n```\n{}\n```\n\n",
                container.path, container.excerpt
            ));
        }

        if !self.lint_findings.is_empty() {
            prompt.push_str("## Static Analyzer Findings (changed lines only)\n");
            for finding in &self.lint_findings {
                prompt.push_str(&format!(
                    "- line {} [{}] {}: {}\n",
                    finding.line,
                    match finding.severity {
                        crate::linter::LintSeverity::Error => "error",
                        crate::linter::LintSeverity::Warning => "warning",
                        crate::linter::LintSeverity::Info => "info",
                    },
                    finding.rule,
                    finding.message
                ));
            }
            prompt.push('\n');
        }

        if let Some(before) = &self.before_excerpt {
            prompt.push_str(&format!(
                "## File BEFORE Changes (excerpt)\n```\n{}\n```\n\n",
                before
            ));
        }
        if let Some(after) = &self.after_excerpt {
            prompt.push_str(&format!(
                "## File AFTER Changes (excerpt)\n```\n{}\n```\n\n",
                after
            ));
        }

        if !self.related.is_empty() {
            prompt.push_str(&format!("## Related Files ({})\n\n", self.related.len()));
            for related in &self.related {
                prompt.push_str(&format!(
                    "### {} ({})\n```\n{}\n```\n\n",
                    related.path,
                    related.reason.as_str(),
                    related.excerpt
                ));
            }
        }

        prompt.push_str(&format!("## DIFF\n```diff\n{}\n```\n\n", self.diff));

        prompt.push_str("---\n## Review Instructions\n\n");
        prompt.push_str(
            "Review the changes considering:\n\
             1. Correctness and integration with the related files shown\n\
             2. Breaking changes to existing functionality or APIs\n\
             3. Security implications\n\
             4. Performance concerns\n\
             5. Test coverage for the changed behavior\n\
             6. Code quality and project conventions\n",
        );
        if let Some(language) = self.language {
            prompt.push_str(&format!("7. {} best practices\n", language.as_str()));
        }
        prompt.push_str(
            "\nOnly report issues on lines changed in the diff. Provide your \
             review as a JSON array:\n\
             [{\"line\": <post-change line number>, \"severity\": \
             \"critical|major|minor|suggestion\", \"message\": \"<finding>\", \
             \"suggestion\": \"<optional fix>\", \"rule\": \"<optional analyzer \
             rule this matches>\"}]\n\
             Return an empty array [] if the changes look good.\n",
        );

        prompt
    }
}

/// Builds review payloads through the platform adapter
pub struct ContextAssembler {
    platform: Arc<dyn PlatformAdapter>,
    settings: ReviewSettings,
}

impl ContextAssembler {
    pub fn new(platform: Arc<dyn PlatformAdapter>, settings: ReviewSettings) -> Self {
        Self { platform, settings }
    }

    /// Assemble the payload for one file change
    ///
    /// Auxiliary fetches (related files, project artifacts) are best-effort:
    /// a failure there degrades the payload, it never fails the file.
    pub async fn assemble(&self, change: &FileChange) -> Result<ReviewPayload> {
        let before = self.fetch(&change.path, &change.base_sha).await;
        let after = self.fetch(&change.path, &change.head_sha).await;

        let line_count = after
            .as_ref()
            .map(|text| text.lines().count() as u32)
            .or_else(|| change.changed_lines.iter().next_back().copied())
            .unwrap_or(0);

        let framework = match (change.language, after.as_deref()) {
            (Some(language), Some(content)) => {
                detect_framework(language, content).map(String::from)
            }
            _ => None,
        };

        let related = self.related_files(change, after.as_deref()).await;
        let project = self.project_context(&change.head_sha).await;

        Ok(ReviewPayload {
            path: change.path.clone(),
            kind: change.kind,
            language: change.language,
            framework,
            diff: change.diff.clone(),
            before_excerpt: before
                .map(|t| diff_proximate_excerpt(&t, &change.changed_lines, FILE_EXCERPT_BUDGET)),
            after_excerpt: after
                .map(|t| diff_proximate_excerpt(&t, &change.changed_lines, FILE_EXCERPT_BUDGET)),
            line_count,
            lint_findings: Vec::new(),
            related,
            project,
        })
    }

    /// Fetch file content, logging and swallowing adapter errors
    async fn fetch(&self, path: &str, git_ref: &str) -> Option<String> {
        match self.platform.get_file_content(path, git_ref).await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path, error = %e, "Skipping unfetchable file");
                None
            }
        }
    }

    /// Select a bounded set of related files: import targets first, then
    /// same-directory neighbors, then paired test files
    async fn related_files(
        &self,
        change: &FileChange,
        after_content: Option<&str>,
    ) -> Vec<RelatedFile> {
        let cap = self.settings.max_related_files;
        let mut related: Vec<RelatedFile> = Vec::new();
        let mut seen = BTreeSet::new();
        seen.insert(change.path.clone());

        if let (Some(language), Some(content)) = (change.language, after_content) {
            for import_path in import_candidates(language, content, &change.path) {
                if related.len() >= cap {
                    break;
                }
                if !seen.insert(import_path.clone()) {
                    continue;
                }
                if let Some(content) = self.fetch(&import_path, &change.head_sha).await {
                    related.push(RelatedFile {
                        path: import_path,
                        excerpt: head_excerpt(&content, RELATED_BUDGET),
                        reason: RelatedReason::ImportedByChangedFile,
                    });
                }
            }
        }

        let dir = parent_dir(&change.path);
        if related.len() < cap {
            if let Ok(entries) = self.platform.get_directory_tree(&dir, &change.head_sha).await {
                for entry in entries.into_iter().take(10) {
                    if related.len() >= cap {
                        break;
                    }
                    if !entry.is_file
                        || Language::from_path(&entry.path).is_none()
                        || !seen.insert(entry.path.clone())
                    {
                        continue;
                    }
                    if let Some(content) = self.fetch(&entry.path, &change.head_sha).await {
                        related.push(RelatedFile {
                            path: entry.path,
                            excerpt: head_excerpt(&content, RELATED_BUDGET),
                            reason: RelatedReason::SameDirectory,
                        });
                    }
                }
            }
        }

        for test_path in test_candidates(&change.path).into_iter().take(2) {
            if related.len() >= cap {
                break;
            }
            if !seen.insert(test_path.clone()) {
                continue;
            }
            if let Some(content) = self.fetch(&test_path, &change.head_sha).await {
                related.push(RelatedFile {
                    path: test_path,
                    excerpt: head_excerpt(&content, RELATED_BUDGET),
                    reason: RelatedReason::TestFile,
                });
            }
        }

        related
    }

    /// Project-level artifacts: README, dependency manifest, container config
    async fn project_context(&self, git_ref: &str) -> ProjectContext {
        let mut project = ProjectContext::default();

        for name in ["README.md", "README.rst", "README"] {
            if let Some(content) = self.fetch(name, git_ref).await {
                project.readme = Some(ArtifactExcerpt {
                    path: name.to_string(),
                    excerpt: head_excerpt(&content, README_BUDGET),
                });
                break;
            }
        }

        for name in [
            "package.json",
            "requirements.txt",
            "pyproject.toml",
            "go.mod",
            "Cargo.toml",
            "pom.xml",
        ] {
            if let Some(content) = self.fetch(name, git_ref).await {
                project.manifest = Some(ArtifactExcerpt {
                    path: name.to_string(),
                    excerpt: head_excerpt(&content, MANIFEST_BUDGET),
                });
                break;
            }
        }

        for name in ["Dockerfile", "docker-compose.yml", "docker-compose.yaml"] {
            if let Some(content) = self.fetch(name, git_ref).await {
                project.container = Some(ArtifactExcerpt {
                    path: name.to_string(),
                    excerpt: head_excerpt(&content, CONTAINER_BUDGET),
                });
                break;
            }
        }

        project
    }
}

/// First `max_chars` of a text, cut at a line boundary
fn head_excerpt(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut out = String::with_capacity(max_chars);
    for line in text.lines() {
        if out.len() + line.len() + 1 > max_chars {
            break;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("...[truncated]");
    out
}

/// Excerpt of a file kept deterministically around the changed lines
///
/// Starts from the changed-line span and expands outward one line at a
/// time, alternating up and down, until the budget is spent. A file that
/// fits the budget is returned whole.
fn diff_proximate_excerpt(text: &str, changed: &BTreeSet<u32>, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let (Some(first), Some(last)) = (changed.iter().next(), changed.iter().next_back()) else {
        return head_excerpt(text, max_chars);
    };

    let last_idx = lines.len() - 1;
    let first_changed = (*first as usize).saturating_sub(1).min(last_idx);
    let last_changed = (*last as usize).saturating_sub(1).min(last_idx);

    let mut lo = first_changed;
    let mut hi = first_changed;
    let mut budget = max_chars;
    let mut take = |idx: usize, budget: &mut usize| -> bool {
        let cost = lines[idx].len() + 1;
        if cost > *budget {
            return false;
        }
        *budget -= cost;
        true
    };

    if !take(first_changed, &mut budget) {
        return lines[first_changed].chars().take(max_chars).collect();
    }

    // Cover the changed span first, then pad outward alternately.
    while hi < last_changed && take(hi + 1, &mut budget) {
        hi += 1;
    }
    loop {
        let mut grew = false;
        if lo > 0 && take(lo - 1, &mut budget) {
            lo -= 1;
            grew = true;
        }
        if hi < last_idx && take(hi + 1, &mut budget) {
            hi += 1;
            grew = true;
        }
        if !grew {
            break;
        }
    }

    let mut out = String::with_capacity(max_chars + 32);
    if lo > 0 {
        out.push_str("...[truncated]\n");
    }
    out.push_str(&lines[lo..=hi].join("\n"));
    if hi < last_idx {
        out.push_str("\n...[truncated]");
    }
    out
}

/// Paths a file's relative imports point at
fn import_candidates(language: Language, content: &str, path: &str) -> Vec<String> {
    let dir = parent_dir(path);
    let mut candidates = Vec::new();

    match language {
        Language::Python => {
            for line in content.lines() {
                let line = line.trim();
                // Relative imports only: "from .module import x"
                let Some(rest) = line.strip_prefix("from .") else {
                    continue;
                };
                let Some(module) = rest.split_whitespace().next() else {
                    continue;
                };
                let module_path = module.trim_start_matches('.').replace('.', "/");
                if !module_path.is_empty() {
                    candidates.push(join_path(&dir, &format!("{}.py", module_path)));
                }
            }
        }
        Language::JavaScript | Language::TypeScript => {
            for line in content.lines() {
                let Some(spec) = extract_js_import(line) else {
                    continue;
                };
                if !spec.starts_with("./") && !spec.starts_with("../") {
                    continue;
                }
                let base = join_path(&dir, spec.trim_start_matches("./"));
                if Path::new(&base).extension().is_some() {
                    candidates.push(base);
                } else {
                    for ext in [".ts", ".tsx", ".js", ".jsx"] {
                        candidates.push(format!("{}{}", base, ext));
                    }
                }
            }
        }
        _ => {}
    }

    candidates
}

/// Pull the module specifier out of a JS/TS import line
fn extract_js_import(line: &str) -> Option<&str> {
    let line = line.trim();
    if !line.starts_with("import ") && !line.starts_with("export ") {
        return None;
    }
    let from_idx = line.find(" from ")?;
    let rest = &line[from_idx + " from ".len()..];
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = &rest[1..];
    let end = inner.find(quote)?;
    Some(&inner[..end])
}

/// Conventional test-file locations for a source file
fn test_candidates(path: &str) -> Vec<String> {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if stem.is_empty() {
        return Vec::new();
    }
    let dir = parent_dir(path);

    let names = [
        format!("test_{}.py", stem),
        format!("{}_test.py", stem),
        format!("{}.test.ts", stem),
        format!("{}.test.js", stem),
        format!("{}.spec.ts", stem),
        format!("{}_test.go", stem),
    ];

    let mut candidates = Vec::new();
    for name in &names {
        candidates.push(join_path(&dir, name));
    }
    for test_dir in ["tests", "test", "__tests__"] {
        for name in &names {
            candidates.push(format!("{}/{}", test_dir, name));
        }
    }
    candidates
}

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .and_then(|p| p.to_str())
        .unwrap_or("")
        .to_string()
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
