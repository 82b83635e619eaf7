//! Subtree definitions loaded from the repository configuration file.
//!
//! The file has the shape
//! `{"repositories": [{"category", "name", "url", "branch"}, ...]}` and is
//! validated in full before any remote call is made.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};

/// One monorepo subtree and the standalone repository it mirrors to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubtreeEntry {
    /// Top-level directory in the monorepo, e.g. `projects`.
    pub category: String,
    /// Directory under the category, e.g. `rocBLAS`.
    pub name: String,
    /// Target repository as `org/repo`.
    pub url: String,
    /// Base branch of the target repository.
    pub branch: String,
}

impl SubtreeEntry {
    /// The `category/name` path prefix this subtree occupies.
    pub fn prefix(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct RepoConfig {
    repositories: Vec<SubtreeEntry>,
}

/// Read and validate the repository configuration file.
pub fn load_repo_config(path: &Path) -> Result<Vec<SubtreeEntry>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read repository config at {}: {e}",
            path.display()
        ))
    })?;
    parse_repo_config(&raw).map_err(|e| match e {
        AppError::Config(msg) => AppError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_repo_config(raw: &str) -> Result<Vec<SubtreeEntry>> {
    let config: RepoConfig = serde_json::from_str(raw)
        .map_err(|e| AppError::Config(format!("Invalid repository config: {e}")))?;

    let mut names = HashSet::new();
    let mut prefixes = HashSet::new();
    for (index, entry) in config.repositories.iter().enumerate() {
        validate_entry(entry).map_err(|msg| {
            AppError::Config(format!("repositories[{index}] ({}): {msg}", entry.name))
        })?;
        // Branch names are derived from the subtree name alone.
        if !names.insert(entry.name.as_str()) {
            return Err(AppError::Config(format!(
                "Duplicate subtree name: {}",
                entry.name
            )));
        }
        if !prefixes.insert(entry.prefix()) {
            return Err(AppError::Config(format!(
                "Duplicate subtree prefix: {}",
                entry.prefix()
            )));
        }
    }

    Ok(config.repositories)
}

fn validate_entry(entry: &SubtreeEntry) -> std::result::Result<(), String> {
    for (field, value) in [
        ("category", &entry.category),
        ("name", &entry.name),
        ("url", &entry.url),
        ("branch", &entry.branch),
    ] {
        if value.trim().is_empty() {
            return Err(format!("`{field}` must not be empty"));
        }
    }
    if entry.category.contains('/') || entry.name.contains('/') {
        return Err("`category` and `name` must be single path segments".to_string());
    }
    let mut parts = entry.url.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(org), Some(repo), None) if !org.is_empty() && !repo.is_empty() => Ok(()),
        _ => Err(format!("`url` must be `org/repo`, got `{}`", entry.url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"{
        "repositories": [
            {"name": "rocBLAS", "url": "ROCm/rocBLAS", "branch": "develop", "category": "projects"},
            {"name": "rocSPARSE", "url": "ROCm/rocSPARSE", "branch": "develop", "category": "shared"}
        ]
    }"#;

    #[test]
    fn test_parse_valid_config() {
        let entries = parse_repo_config(VALID).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].prefix(), "projects/rocBLAS");
        assert_eq!(entries[1].url, "ROCm/rocSPARSE");
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let raw = r#"{"repositories": [{"name": "rocBLAS", "url": "ROCm/rocBLAS", "branch": "develop"}]}"#;
        let err = parse_repo_config(raw).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("category"));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            parse_repo_config("{not json").unwrap_err(),
            AppError::Config(_)
        ));
    }

    #[test]
    fn test_rejects_bad_url() {
        let raw = r#"{"repositories": [{"name": "a", "url": "https://github.com/ROCm/a", "branch": "b", "category": "projects"}]}"#;
        let err = parse_repo_config(raw).unwrap_err();
        assert!(err.to_string().contains("org/repo"));
    }

    #[test]
    fn test_rejects_nested_name() {
        let raw = r#"{"repositories": [{"name": "a/b", "url": "ROCm/a", "branch": "b", "category": "projects"}]}"#;
        assert!(parse_repo_config(raw).is_err());
    }

    #[test]
    fn test_rejects_empty_branch() {
        let raw = r#"{"repositories": [{"name": "a", "url": "ROCm/a", "branch": " ", "category": "projects"}]}"#;
        assert!(parse_repo_config(raw).unwrap_err().to_string().contains("branch"));
    }

    #[test]
    fn test_rejects_duplicate_names_across_categories() {
        let raw = r#"{"repositories": [
            {"name": "hip", "url": "ROCm/hip", "branch": "develop", "category": "projects"},
            {"name": "hip", "url": "ROCm/hip-shared", "branch": "develop", "category": "shared"}
        ]}"#;
        let err = parse_repo_config(raw).unwrap_err();
        assert!(err.to_string().contains("Duplicate subtree name"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_repo_config(Path::new("/nonexistent/repos-config.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        let entries = load_repo_config(file.path()).unwrap();
        assert_eq!(entries[0].name, "rocBLAS");
    }
}
