//! In-memory facade for tests.
//!
//! Keeps pull requests, labels, and check runs in memory and records every
//! call as a read or a write so tests can assert call sequences.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Read(String),
    Write(String),
}

#[derive(Debug, Clone)]
struct StoredPull {
    repo: String,
    pr: PullRequest,
    open: bool,
}

#[derive(Debug, Default)]
struct State {
    changed_files: HashMap<(String, u64), Vec<String>>,
    pulls: Vec<StoredPull>,
    labels: HashMap<(String, u64), BTreeSet<String>>,
    vocabulary: HashMap<String, Vec<LabelDefinition>>,
    check_runs: HashMap<(String, String), Vec<CheckRun>>,
    next_pr: u64,
    next_check: u64,
    /// Repos whose write calls fail.
    failing_repos: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<State>,
    calls: Mutex<Vec<Call>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Read(s) => Some(s),
                Call::Write(_) => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write(s) => Some(s),
                Call::Read(_) => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_changed_files(&self, repo: &str, pr: u64, files: &[&str]) {
        self.state.lock().unwrap().changed_files.insert(
            (repo.to_string(), pr),
            files.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Insert an open pull request and return its number.
    pub fn add_pull(&self, repo: &str, head_branch: &str, head_sha: &str, title: &str, body: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_pr += 1;
        let number = state.next_pr;
        state.pulls.push(StoredPull {
            repo: repo.to_string(),
            pr: PullRequest {
                number,
                title: title.to_string(),
                body: body.to_string(),
                head_branch: head_branch.to_string(),
                head_sha: head_sha.to_string(),
                base_branch: "develop".to_string(),
            },
            open: true,
        });
        number
    }

    pub fn open_pulls(&self, repo: &str) -> Vec<PullRequest> {
        self.state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .filter(|p| p.repo == repo && p.open)
            .map(|p| p.pr.clone())
            .collect()
    }

    pub fn set_labels(&self, repo: &str, pr: u64, labels: &[&str]) {
        self.state.lock().unwrap().labels.insert(
            (repo.to_string(), pr),
            labels.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn labels(&self, repo: &str, pr: u64) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .get(&(repo.to_string(), pr))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_vocabulary(&self, repo: &str, names: &[&str]) {
        let defs = names
            .iter()
            .map(|n| LabelDefinition {
                name: n.to_string(),
                color: "ededed".to_string(),
                description: String::new(),
            })
            .collect();
        self.set_label_definitions(repo, defs);
    }

    pub fn set_label_definitions(&self, repo: &str, defs: Vec<LabelDefinition>) {
        self.state
            .lock()
            .unwrap()
            .vocabulary
            .insert(repo.to_string(), defs);
    }

    pub fn label_definitions(&self, repo: &str) -> Vec<LabelDefinition> {
        self.state
            .lock()
            .unwrap()
            .vocabulary
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_check_run(
        &self,
        repo: &str,
        sha: &str,
        name: &str,
        status: CheckStatus,
        conclusion: Option<CheckConclusion>,
        summary: &str,
    ) {
        let mut state = self.state.lock().unwrap();
        state.next_check += 1;
        let id = state.next_check;
        state
            .check_runs
            .entry((repo.to_string(), sha.to_string()))
            .or_default()
            .push(CheckRun {
                id,
                name: name.to_string(),
                head_sha: sha.to_string(),
                status,
                conclusion,
                summary: summary.to_string(),
                details_url: format!("https://ci.example/{id}"),
            });
    }

    pub fn check_runs(&self, repo: &str, sha: &str) -> Vec<CheckRun> {
        self.state
            .lock()
            .unwrap()
            .check_runs
            .get(&(repo.to_string(), sha.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_writes_to(&self, repo: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_repos
            .insert(repo.to_string());
    }

    fn read(&self, what: String) {
        self.calls.lock().unwrap().push(Call::Read(what));
    }

    fn write(&self, repo: &str, what: String) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Write(what.clone()));
        if self.state.lock().unwrap().failing_repos.contains(repo) {
            return Err(AppError::GitHubApi(format!("422 Unprocessable Entity: {what}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn get_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        self.read(format!("get_changed_files {repo}#{pr_number}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .changed_files
            .get(&(repo.to_string(), pr_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_pull_request(&self, repo: &str, pr_number: u64) -> Result<PullRequest> {
        self.read(format!("get_pull_request {repo}#{pr_number}"));
        self.state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .find(|p| p.repo == repo && p.pr.number == pr_number)
            .map(|p| p.pr.clone())
            .ok_or_else(|| AppError::GitHubApi(format!("404 Not Found: {repo}#{pr_number}")))
    }

    async fn list_label_definitions(&self, repo: &str) -> Result<Vec<LabelDefinition>> {
        self.read(format!("list_label_definitions {repo}"));
        Ok(self.label_definitions(repo))
    }

    async fn get_existing_labels(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        self.read(format!("get_existing_labels {repo}#{pr_number}"));
        Ok(self.labels(repo, pr_number).into_iter().collect())
    }

    async fn apply_labels(&self, repo: &str, pr_number: u64, labels: &[String]) -> Result<()> {
        self.write(repo, format!("apply_labels {repo}#{pr_number} {}", labels.join(",")))?;
        self.state
            .lock()
            .unwrap()
            .labels
            .entry((repo.to_string(), pr_number))
            .or_default()
            .extend(labels.iter().cloned());
        Ok(())
    }

    async fn remove_label(&self, repo: &str, pr_number: u64, label: &str) -> Result<()> {
        self.write(repo, format!("remove_label {repo}#{pr_number} {label}"))?;
        if let Some(set) = self
            .state
            .lock()
            .unwrap()
            .labels
            .get_mut(&(repo.to_string(), pr_number))
        {
            set.remove(label);
        }
        Ok(())
    }

    async fn find_pr_by_branch(&self, repo: &str, branch: &str) -> Result<Option<PullRequest>> {
        self.read(format!("find_pr_by_branch {repo} {branch}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .find(|p| p.repo == repo && p.open && p.pr.head_branch == branch)
            .map(|p| p.pr.clone()))
    }

    async fn create_pull_request(&self, repo: &str, pr: &CreatePullRequest) -> Result<()> {
        self.write(repo, format!("create_pull_request {repo} {}", pr.head_branch))?;
        let number = self.add_pull(repo, &pr.head_branch, "split-sha", &pr.title, &pr.body);
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.pulls.iter_mut().find(|p| p.repo == repo && p.pr.number == number) {
            stored.pr.base_branch = pr.base_branch.clone();
        }
        Ok(())
    }

    async fn update_pull_request(
        &self,
        repo: &str,
        pr: &PullRequest,
        title: &str,
        body: &str,
    ) -> Result<()> {
        self.write(repo, format!("update_pull_request {repo}#{}", pr.number))?;
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.pulls.iter_mut().find(|p| p.repo == repo && p.pr.number == pr.number) {
            stored.pr.title = title.to_string();
            stored.pr.body = body.to_string();
        }
        Ok(())
    }

    async fn close_pr_and_delete_branch(&self, repo: &str, pr: &PullRequest) -> Result<()> {
        self.write(repo, format!("close_pr_and_delete_branch {repo}#{}", pr.number))?;
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.pulls.iter_mut().find(|p| p.repo == repo && p.pr.number == pr.number) {
            stored.open = false;
        }
        Ok(())
    }

    async fn list_check_runs(&self, repo: &str, git_ref: &str) -> Result<Vec<CheckRun>> {
        self.read(format!("list_check_runs {repo}@{git_ref}"));
        Ok(self.check_runs(repo, git_ref))
    }

    async fn upsert_check_run(&self, repo: &str, check: &CheckRunUpsert) -> Result<()> {
        self.write(repo, format!("upsert_check_run {repo}@{} {}", check.head_sha, check.name))?;
        let conclusion = (check.status == CheckStatus::Completed).then_some(check.conclusion);
        let mut state = self.state.lock().unwrap();
        state.next_check += 1;
        let id = state.next_check;
        let runs = state
            .check_runs
            .entry((repo.to_string(), check.head_sha.clone()))
            .or_default();
        match runs.iter_mut().find(|r| r.name == check.name) {
            Some(run) => {
                run.status = check.status;
                run.conclusion = conclusion;
                run.summary = check.summary.clone();
                run.details_url = check.details_url.clone();
            }
            None => runs.push(CheckRun {
                id,
                name: check.name.clone(),
                head_sha: check.head_sha.clone(),
                status: check.status,
                conclusion,
                summary: check.summary.clone(),
                details_url: check.details_url.clone(),
            }),
        }
        Ok(())
    }

    async fn create_label(&self, repo: &str, label: &LabelDefinition) -> Result<()> {
        self.write(repo, format!("create_label {repo} {}", label.name))?;
        self.state
            .lock()
            .unwrap()
            .vocabulary
            .entry(repo.to_string())
            .or_default()
            .push(label.clone());
        Ok(())
    }

    async fn update_label(&self, repo: &str, label: &LabelDefinition) -> Result<()> {
        self.write(repo, format!("update_label {repo} {}", label.name))?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .vocabulary
            .get_mut(repo)
            .and_then(|defs| defs.iter_mut().find(|d| d.name == label.name))
        {
            *existing = label.clone();
        }
        Ok(())
    }

    async fn push_token(&self, repo: &str) -> Result<String> {
        self.read(format!("push_token {repo}"));
        Ok("fake-token".to_string())
    }
}
