pub mod gh_cli;
pub mod github;
pub mod payloads;
pub mod types;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Everything the fanout steps need from GitHub.
///
/// Implemented over the REST API ([`github::GitHubPlatform`]) and over the
/// `gh` CLI ([`gh_cli::GhCliPlatform`]); the two are interchangeable.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Paths changed by a pull request, all pages.
    async fn get_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>>;

    /// Fetch a pull request.
    async fn get_pull_request(&self, repo: &str, pr_number: u64) -> Result<PullRequest>;

    /// Labels defined in a repository, with color and description.
    async fn list_label_definitions(&self, repo: &str) -> Result<Vec<LabelDefinition>>;

    /// Names of the labels defined in a repository.
    async fn get_defined_labels(&self, repo: &str) -> Result<Vec<String>> {
        Ok(self
            .list_label_definitions(repo)
            .await?
            .into_iter()
            .map(|l| l.name)
            .collect())
    }

    /// Labels currently on a pull request.
    async fn get_existing_labels(&self, repo: &str, pr_number: u64) -> Result<Vec<String>>;

    /// Add labels to a pull request. Labels already present are kept.
    async fn apply_labels(&self, repo: &str, pr_number: u64, labels: &[String]) -> Result<()>;

    /// Remove one label from a pull request.
    async fn remove_label(&self, repo: &str, pr_number: u64, label: &str) -> Result<()>;

    /// The open pull request whose head is exactly `branch`, if any.
    async fn find_pr_by_branch(&self, repo: &str, branch: &str) -> Result<Option<PullRequest>>;

    /// Create a pull request.
    async fn create_pull_request(&self, repo: &str, pr: &CreatePullRequest) -> Result<()>;

    /// Replace the title and body of an existing pull request.
    async fn update_pull_request(
        &self,
        repo: &str,
        pr: &PullRequest,
        title: &str,
        body: &str,
    ) -> Result<()>;

    /// Close a pull request and delete its head branch.
    async fn close_pr_and_delete_branch(&self, repo: &str, pr: &PullRequest) -> Result<()>;

    /// Check runs on a commit SHA or ref, all pages.
    async fn list_check_runs(&self, repo: &str, git_ref: &str) -> Result<Vec<CheckRun>>;

    /// Update the check run named `check.name` on `check.head_sha`, or create it.
    async fn upsert_check_run(&self, repo: &str, check: &CheckRunUpsert) -> Result<()>;

    /// Create a label definition.
    async fn create_label(&self, repo: &str, label: &LabelDefinition) -> Result<()>;

    /// Update a label definition's color and description.
    async fn update_label(&self, repo: &str, label: &LabelDefinition) -> Result<()>;

    /// A token git can push to `repo` with.
    async fn push_token(&self, repo: &str) -> Result<String>;
}

/// Split `org/repo` into its two halves.
pub fn parse_repo(repo_full_name: &str) -> Result<(&str, &str)> {
    repo_full_name
        .split_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| {
            crate::error::AppError::GitHubApi(format!("Invalid repo name: {repo_full_name}"))
        })
}
