use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::workspace::git;

/// Splits a subtree out of the monorepo checkout and force-pushes it to a
/// component repository branch.
#[async_trait]
pub trait SubtreePublisher: Send + Sync {
    async fn publish(&self, prefix: &str, branch: &str, remote_url: &str, token: &str)
        -> Result<()>;
}

/// Publishes from a local checkout using libgit2.
pub struct GitSubtreePublisher {
    workdir: PathBuf,
}

impl GitSubtreePublisher {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl SubtreePublisher for GitSubtreePublisher {
    async fn publish(
        &self,
        prefix: &str,
        branch: &str,
        remote_url: &str,
        token: &str,
    ) -> Result<()> {
        // Tokens are only ever handed to HTTPS remotes.
        if !remote_url.starts_with("https://") {
            return Err(AppError::Git(format!(
                "Refusing to push to non-HTTPS remote: {remote_url}"
            )));
        }

        let split = git::split_subtree(&self.workdir, prefix, branch).await?;
        tracing::debug!(prefix, branch, commit = %split, "Split subtree");

        git::force_push(&self.workdir, branch, remote_url, token).await?;
        tracing::info!(prefix, branch, remote_url, "Pushed subtree branch");
        Ok(())
    }
}

/// Records publish calls instead of touching git.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: std::sync::Mutex<Vec<(String, String, String)>>,
    failing_prefixes: std::sync::Mutex<std::collections::HashSet<String>>,
}

#[cfg(test)]
impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_prefix(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .unwrap()
            .insert(prefix.to_string());
    }

    /// `(prefix, branch, remote_url)` for every publish attempt.
    pub fn published(&self) -> Vec<(String, String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SubtreePublisher for RecordingPublisher {
    async fn publish(
        &self,
        prefix: &str,
        branch: &str,
        remote_url: &str,
        _token: &str,
    ) -> Result<()> {
        self.published.lock().unwrap().push((
            prefix.to_string(),
            branch.to_string(),
            remote_url.to_string(),
        ));
        if self.failing_prefixes.lock().unwrap().contains(prefix) {
            return Err(AppError::Git(format!("push of {prefix} rejected")));
        }
        Ok(())
    }
}
