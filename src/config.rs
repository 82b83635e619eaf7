use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Which implementation of the remote facade to talk to GitHub through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The `gh` command line tool with an already authenticated session.
    Cli,
    /// The REST API with a token or GitHub App credentials.
    Api,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub labels: LabelConfig,
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub app_id: Option<u64>,
    pub private_key_path: Option<PathBuf>,
    /// PEM contents, for CI secrets that arrive as environment variables.
    pub private_key: Option<String>,
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_url: default_api_url(),
            app_id: None,
            private_key_path: None,
            private_key: None,
            token: None,
        }
    }
}

// Manual Debug impl to avoid leaking credentials
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("backend", &self.backend)
            .field("api_url", &self.api_url)
            .field("app_id", &self.app_id)
            .field("private_key_path", &self.private_key_path)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelConfig {
    /// Category directory -> label prefix, e.g. `projects` -> `project`.
    #[serde(default = "default_category_prefixes")]
    pub category_prefixes: BTreeMap<String, String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            category_prefixes: default_category_prefixes(),
        }
    }
}

fn default_backend() -> Backend {
    Backend::Cli
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_category_prefixes() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("projects".to_string(), "project".to_string()),
        ("shared".to_string(), "shared".to_string()),
    ])
}

impl AppConfig {
    pub fn load(settings_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = settings_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("fanout").required(false));
        }

        // Environment variable overrides with FANOUT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("FANOUT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut app: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        app.github.fill_from_ci_env(|key| std::env::var(key).ok())?;
        Ok(app)
    }
}

impl GitHubConfig {
    /// Fall back to the variable names CI workflows conventionally export.
    fn fill_from_ci_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if self.app_id.is_none() {
            if let Some(raw) = lookup("APP_ID").filter(|v| !v.is_empty()) {
                let id = raw
                    .trim()
                    .parse()
                    .map_err(|e| AppError::Config(format!("APP_ID is not a number: {e}")))?;
                self.app_id = Some(id);
            }
        }
        if self.private_key.is_none() && self.private_key_path.is_none() {
            self.private_key = lookup("APP_PRIVATE_KEY").filter(|v| !v.is_empty());
        }
        if self.token.is_none() {
            self.token = lookup("GH_TOKEN")
                .or_else(|| lookup("GITHUB_TOKEN"))
                .filter(|v| !v.is_empty());
        }
        Ok(())
    }
}
