//! Dry-run decorators: reads go through, writes become log lines.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::platform::types::*;
use crate::platform::Platform;
use crate::workspace::SubtreePublisher;

/// Wraps a backend and suppresses every mutating call.
pub struct DryRunPlatform {
    inner: Arc<dyn Platform>,
}

impl DryRunPlatform {
    pub fn new(inner: Arc<dyn Platform>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Platform for DryRunPlatform {
    async fn get_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        self.inner.get_changed_files(repo, pr_number).await
    }

    async fn get_pull_request(&self, repo: &str, pr_number: u64) -> Result<PullRequest> {
        self.inner.get_pull_request(repo, pr_number).await
    }

    async fn list_label_definitions(&self, repo: &str) -> Result<Vec<LabelDefinition>> {
        self.inner.list_label_definitions(repo).await
    }

    async fn get_defined_labels(&self, repo: &str) -> Result<Vec<String>> {
        self.inner.get_defined_labels(repo).await
    }

    async fn get_existing_labels(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        self.inner.get_existing_labels(repo, pr_number).await
    }

    async fn apply_labels(&self, repo: &str, pr_number: u64, labels: &[String]) -> Result<()> {
        tracing::info!(dry_run = true, repo, pr = pr_number, ?labels, "Would apply labels");
        Ok(())
    }

    async fn remove_label(&self, repo: &str, pr_number: u64, label: &str) -> Result<()> {
        tracing::info!(dry_run = true, repo, pr = pr_number, label, "Would remove label");
        Ok(())
    }

    async fn find_pr_by_branch(&self, repo: &str, branch: &str) -> Result<Option<PullRequest>> {
        self.inner.find_pr_by_branch(repo, branch).await
    }

    async fn create_pull_request(&self, repo: &str, pr: &CreatePullRequest) -> Result<()> {
        tracing::info!(
            dry_run = true,
            repo,
            head = %pr.head_branch,
            base = %pr.base_branch,
            title = %pr.title,
            "Would create pull request"
        );
        Ok(())
    }

    async fn update_pull_request(
        &self,
        repo: &str,
        pr: &PullRequest,
        title: &str,
        _body: &str,
    ) -> Result<()> {
        tracing::info!(dry_run = true, repo, pr = pr.number, title, "Would update pull request");
        Ok(())
    }

    async fn close_pr_and_delete_branch(&self, repo: &str, pr: &PullRequest) -> Result<()> {
        tracing::info!(
            dry_run = true,
            repo,
            pr = pr.number,
            branch = %pr.head_branch,
            "Would close pull request and delete branch"
        );
        Ok(())
    }

    async fn list_check_runs(&self, repo: &str, git_ref: &str) -> Result<Vec<CheckRun>> {
        self.inner.list_check_runs(repo, git_ref).await
    }

    async fn upsert_check_run(&self, repo: &str, check: &CheckRunUpsert) -> Result<()> {
        tracing::info!(
            dry_run = true,
            repo,
            sha = %check.head_sha,
            check = %check.name,
            status = check.status.as_str(),
            conclusion = check.conclusion.as_str(),
            "Would upsert check run"
        );
        Ok(())
    }

    async fn create_label(&self, repo: &str, label: &LabelDefinition) -> Result<()> {
        tracing::info!(dry_run = true, repo, label = %label.name, color = %label.color, "Would create label");
        Ok(())
    }

    async fn update_label(&self, repo: &str, label: &LabelDefinition) -> Result<()> {
        tracing::info!(dry_run = true, repo, label = %label.name, color = %label.color, "Would update label");
        Ok(())
    }

    async fn push_token(&self, repo: &str) -> Result<String> {
        self.inner.push_token(repo).await
    }
}

/// Logs the split and push instead of touching git.
#[derive(Debug, Default)]
pub struct DryRunPublisher;

#[async_trait]
impl SubtreePublisher for DryRunPublisher {
    async fn publish(
        &self,
        prefix: &str,
        branch: &str,
        remote_url: &str,
        _token: &str,
    ) -> Result<()> {
        tracing::info!(dry_run = true, prefix, branch, remote_url, "Would split and force-push subtree");
        Ok(())
    }
}
