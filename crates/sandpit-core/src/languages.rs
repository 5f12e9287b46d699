//! Language profile table mapping a language identifier to its file
//! extension, run command, and container image
//!
//! The table is built once, injected into backends at construction, and
//! read-only afterward. Unknown languages fail fast with
//! `UnsupportedLanguage` before any isolation backend does work, so no
//! process or container is ever created for them.

use std::collections::HashMap;

use crate::errors::SandboxError;

/// How to run one language. `run_command` is a template: `{file}` expands
/// to the absolute source path and `{dir}` to its directory, both on the
/// host for process backends and inside `/workspace` for the container
/// backend.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: String,
    pub file_extension: String,
    pub run_command: Vec<String>,
    pub image: Option<String>,
}

impl LanguageProfile {
    pub fn new(
        language: impl Into<String>,
        file_extension: impl Into<String>,
        run_command: Vec<&str>,
        image: Option<&str>,
    ) -> Self {
        Self {
            language: language.into(),
            file_extension: file_extension.into(),
            run_command: run_command.into_iter().map(String::from).collect(),
            image: image.map(String::from),
        }
    }

    /// Fixed name the source file is materialized under, e.g. `code.py`.
    pub fn source_filename(&self) -> String {
        format!("code.{}", self.file_extension)
    }

    /// Expand the run command template against a concrete source path.
    pub fn command_for(&self, file: &str, dir: &str) -> Vec<String> {
        self.run_command
            .iter()
            .map(|part| part.replace("{file}", file).replace("{dir}", dir))
            .collect()
    }
}

/// Immutable language table. Constructed once, shared read-only by every
/// backend; a substitute table can be injected for tests or deployments.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: HashMap<String, LanguageProfile>,
}

impl LanguageRegistry {
    pub fn new(profiles: Vec<LanguageProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|p| (p.language.clone(), p))
            .collect();
        Self { profiles }
    }

    /// Default table: interpreted, VM-based, and compile-and-run languages.
    pub fn builtin() -> Self {
        Self::new(vec![
            LanguageProfile::new("python", "py", vec!["python3", "{file}"], Some("python:3.11-slim")),
            LanguageProfile::new("javascript", "js", vec!["node", "{file}"], Some("node:20-slim")),
            LanguageProfile::new(
                "java",
                "java",
                vec!["sh", "-c", "cd {dir} && javac code.java && java code"],
                Some("eclipse-temurin:17-jdk"),
            ),
            LanguageProfile::new(
                "go",
                "go",
                vec!["sh", "-c", "cd {dir} && go run code.go"],
                Some("golang:1.22-alpine"),
            ),
        ])
    }

    pub fn resolve(&self, language: &str) -> Result<&LanguageProfile, SandboxError> {
        self.profiles
            .get(language)
            .ok_or_else(|| SandboxError::UnsupportedLanguage(language.to_string()))
    }

    pub fn languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
