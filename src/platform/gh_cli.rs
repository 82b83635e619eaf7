//! Facade over an authenticated `gh` CLI session.
//!
//! List endpoints go through `gh api --paginate --jq` so every page is read;
//! write bodies are sent as JSON on stdin.

use std::process::Stdio;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::platform::github::mapper;
use crate::platform::payloads::*;
use crate::platform::types::*;
use crate::platform::Platform;

const PR_FIELDS: &str = "number,title,body,headRefName,headRefOid,baseRefName";

pub struct GhCliPlatform {
    program: String,
}

impl GhCliPlatform {
    /// Verify `gh` is runnable before any work starts.
    pub async fn new() -> Result<Self> {
        Self::with_program("gh").await
    }

    pub async fn with_program(program: &str) -> Result<Self> {
        let status = Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| AppError::Config(format!("`{program}` is not installed or not in PATH: {e}")))?;
        if !status.success() {
            return Err(AppError::Config(format!("`{program} --version` failed")));
        }
        Ok(Self {
            program: program.to_string(),
        })
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        self.run_with_input(args, None).await
    }

    async fn run_with_input(&self, args: &[&str], input: Option<&serde_json::Value>) -> Result<String> {
        tracing::debug!(command = %format!("{} {}", self.program, args.join(" ")), "Running gh");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::GhCli(format!("Failed to execute {}: {e}", self.program)))?;

        if let Some(body) = input {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| AppError::Internal("gh stdin was not captured".to_string()))?;
            stdin.write_all(body.to_string().as_bytes()).await?;
            // Close stdin so gh sees EOF.
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(args = ?args, stderr = %stderr.trim(), "gh command failed");
            return Err(AppError::GhCli(format!(
                "gh {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn api_write(&self, method: &str, endpoint: &str, body: &serde_json::Value) -> Result<String> {
        self.run_with_input(&["api", "--method", method, endpoint, "--input", "-"], Some(body))
            .await
    }

    async fn check_runs(&self, repo: &str, endpoint: String) -> Result<Vec<CheckRun>> {
        let raw = self
            .run(&["api", "--paginate", &endpoint, "--jq", ".check_runs[]"])
            .await?;
        let runs: Vec<CheckRunPayload> = parse_json_stream(&raw)?;
        tracing::debug!(repo, count = runs.len(), "Fetched check runs");
        Ok(runs.into_iter().map(mapper::map_check_run).collect())
    }
}

/// Parse whitespace-separated JSON documents, as emitted by `--jq '.[]'`.
fn parse_json_stream<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    serde_json::Deserializer::from_str(raw)
        .into_iter::<T>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(AppError::from)
}

fn parse_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Platform for GhCliPlatform {
    async fn get_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        let endpoint = format!("repos/{repo}/pulls/{pr_number}/files");
        let raw = self
            .run(&["api", "--paginate", &endpoint, "--jq", ".[].filename"])
            .await?;
        let files = parse_lines(&raw);
        tracing::debug!(repo, pr = pr_number, count = files.len(), "Fetched changed files");
        Ok(files)
    }

    async fn get_pull_request(&self, repo: &str, pr_number: u64) -> Result<PullRequest> {
        let raw = self
            .run(&["api", &format!("repos/{repo}/pulls/{pr_number}")])
            .await?;
        let pr: PullRequestPayload = serde_json::from_str(&raw)?;
        Ok(mapper::map_pull_request(pr))
    }

    async fn list_label_definitions(&self, repo: &str) -> Result<Vec<LabelDefinition>> {
        let raw = self
            .run(&["api", "--paginate", &format!("repos/{repo}/labels"), "--jq", ".[]"])
            .await?;
        let labels: Vec<LabelPayload> = parse_json_stream(&raw)?;
        Ok(labels.into_iter().map(mapper::map_label).collect())
    }

    async fn get_existing_labels(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        let endpoint = format!("repos/{repo}/issues/{pr_number}/labels");
        let raw = self
            .run(&["api", "--paginate", &endpoint, "--jq", ".[].name"])
            .await?;
        Ok(parse_lines(&raw))
    }

    async fn apply_labels(&self, repo: &str, pr_number: u64, labels: &[String]) -> Result<()> {
        self.api_write(
            "POST",
            &format!("repos/{repo}/issues/{pr_number}/labels"),
            &json!({ "labels": labels }),
        )
        .await?;
        tracing::info!(repo, pr = pr_number, labels = ?labels, "Applied labels");
        Ok(())
    }

    async fn remove_label(&self, repo: &str, pr_number: u64, label: &str) -> Result<()> {
        let endpoint = format!(
            "repos/{repo}/issues/{pr_number}/labels/{}",
            urlencoding::encode(label)
        );
        self.run(&["api", "--method", "DELETE", &endpoint]).await?;
        tracing::info!(repo, pr = pr_number, label, "Removed label");
        Ok(())
    }

    async fn find_pr_by_branch(&self, repo: &str, branch: &str) -> Result<Option<PullRequest>> {
        let raw = self
            .run(&[
                "pr", "list", "--repo", repo, "--head", branch, "--state", "open", "--json",
                PR_FIELDS,
            ])
            .await?;
        let rows: Vec<GhPullRequestRow> = serde_json::from_str(&raw)?;
        Ok(rows
            .into_iter()
            .map(mapper::map_gh_pull_request)
            .find(|pr| pr.head_branch == branch))
    }

    async fn create_pull_request(&self, repo: &str, pr: &CreatePullRequest) -> Result<()> {
        self.run(&[
            "pr",
            "create",
            "--repo",
            repo,
            "--base",
            &pr.base_branch,
            "--head",
            &pr.head_branch,
            "--title",
            &pr.title,
            "--body",
            &pr.body,
        ])
        .await?;
        tracing::info!(repo, head = %pr.head_branch, base = %pr.base_branch, "Created pull request");
        Ok(())
    }

    async fn update_pull_request(
        &self,
        repo: &str,
        pr: &PullRequest,
        title: &str,
        body: &str,
    ) -> Result<()> {
        self.run(&[
            "pr",
            "edit",
            &pr.number.to_string(),
            "--repo",
            repo,
            "--title",
            title,
            "--body",
            body,
        ])
        .await?;
        tracing::info!(repo, pr = pr.number, "Updated pull request");
        Ok(())
    }

    async fn close_pr_and_delete_branch(&self, repo: &str, pr: &PullRequest) -> Result<()> {
        self.run(&[
            "pr",
            "close",
            &pr.number.to_string(),
            "--repo",
            repo,
            "--delete-branch",
        ])
        .await?;
        tracing::info!(repo, pr = pr.number, branch = %pr.head_branch, "Closed pull request and deleted branch");
        Ok(())
    }

    async fn list_check_runs(&self, repo: &str, git_ref: &str) -> Result<Vec<CheckRun>> {
        self.check_runs(repo, format!("repos/{repo}/commits/{git_ref}/check-runs"))
            .await
    }

    async fn upsert_check_run(&self, repo: &str, check: &CheckRunUpsert) -> Result<()> {
        let lookup = format!(
            "repos/{repo}/commits/{}/check-runs?check_name={}",
            check.head_sha,
            urlencoding::encode(&check.name)
        );
        let existing = self
            .check_runs(repo, lookup)
            .await?
            .into_iter()
            .find(|run| run.name == check.name);

        let mut payload = check.payload(chrono::Utc::now());
        match existing {
            Some(run) => {
                if let Some(fields) = payload.as_object_mut() {
                    fields.remove("head_sha");
                }
                self.api_write("PATCH", &format!("repos/{repo}/check-runs/{}", run.id), &payload)
                    .await?;
                tracing::info!(repo, name = %check.name, id = run.id, "Updated check run");
            }
            None => {
                self.api_write("POST", &format!("repos/{repo}/check-runs"), &payload)
                    .await?;
                tracing::info!(repo, name = %check.name, sha = %check.head_sha, "Created check run");
            }
        }
        Ok(())
    }

    async fn create_label(&self, repo: &str, label: &LabelDefinition) -> Result<()> {
        self.api_write("POST", &format!("repos/{repo}/labels"), &serde_json::to_value(label)?)
            .await?;
        tracing::info!(repo, label = %label.name, "Created label");
        Ok(())
    }

    async fn update_label(&self, repo: &str, label: &LabelDefinition) -> Result<()> {
        self.api_write(
            "PATCH",
            &format!("repos/{repo}/labels/{}", urlencoding::encode(&label.name)),
            &json!({ "color": label.color, "description": label.description }),
        )
        .await?;
        tracing::info!(repo, label = %label.name, "Updated label");
        Ok(())
    }

    async fn push_token(&self, _repo: &str) -> Result<String> {
        let token = self.run(&["auth", "token"]).await?;
        Ok(token.trim().to_string())
    }
}
