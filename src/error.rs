use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output channel error: {0}")]
    OutputChannel(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("gh command failed: {0}")]
    GhCli(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("{step} failed for: {}", failed.join(", "))]
    Incomplete {
        step: &'static str,
        failed: Vec<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::OutputChannel(_) => 1,
            _ => 2,
        }
    }
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        match e {
            octocrab::Error::GitHub { source, .. } => AppError::GitHubApi(format!(
                "{} ({})",
                source.message,
                source.status_code
            )),
            other => AppError::GitHubApi(other.to_string()),
        }
    }
}

impl From<git2::Error> for AppError {
    fn from(e: git2::Error) -> Self {
        AppError::Git(e.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
