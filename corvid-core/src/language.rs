//! Language and framework detection for changed files
//!
//! Detection is extension-based and advisory: a file with no recognized
//! extension simply reviews without linter evidence or language-specific
//! instructions.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Programming language of a changed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Java,
    Kotlin,
    Ruby,
    Php,
    C,
    Cpp,
    CSharp,
    Swift,
    Dart,
}

impl Language {
    /// Detect the language from a file path's extension
    pub fn from_path(path: &str) -> Option<Language> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" => Some(Language::Python),
            "js" | "jsx" | "mjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "java" => Some(Language::Java),
            "kt" | "kts" => Some(Language::Kotlin),
            "rb" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            "c" | "h" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "hpp" => Some(Language::Cpp),
            "cs" => Some(Language::CSharp),
            "swift" => Some(Language::Swift),
            "dart" => Some(Language::Dart),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Swift => "swift",
            Language::Dart => "dart",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect a framework from file content keywords
///
/// Best-effort; only used to flavor the review instructions.
pub fn detect_framework(language: Language, content: &str) -> Option<&'static str> {
    let checks: &[(&str, &[&str])] = match language {
        Language::Python => &[
            ("Django", &["from django", "import django"]),
            ("Flask", &["from flask", "Flask("]),
            ("FastAPI", &["from fastapi", "FastAPI("]),
        ],
        Language::JavaScript | Language::TypeScript => &[
            ("React", &["from 'react'", "from \"react\"", "useState", "useEffect"]),
            ("Vue", &["from 'vue'", "createApp"]),
            ("Angular", &["@angular"]),
            ("Next.js", &["from 'next", "from \"next"]),
        ],
        Language::Dart => &[("Flutter", &["package:flutter"])],
        _ => &[],
    };

    checks
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| content.contains(k)))
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/auth.py"), Some(Language::Python));
        assert_eq!(
            Language::from_path("web/App.tsx"),
            Some(Language::TypeScript)
        );
        assert_eq!(Language::from_path("main.go"), Some(Language::Go));
        assert_eq!(Language::from_path("README.md"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert_eq!(Language::from_path("Legacy.PY"), Some(Language::Python));
    }

    #[test]
    fn test_detect_framework() {
        let content = "from flask import Flask\napp = Flask(__name__)\n";
        assert_eq!(detect_framework(Language::Python, content), Some("Flask"));
        assert_eq!(detect_framework(Language::Go, "package main"), None);
    }
}
