use std::collections::HashMap;

use async_trait::async_trait;
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::RwLock;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::payloads::*;
use crate::platform::types::*;
use crate::platform::{parse_repo, Platform};

use super::auth::{generate_app_jwt, Credentials};
use super::mapper;

const PER_PAGE: usize = 100;

/// A short page is the last page of a list endpoint.
fn is_last_page(count: usize) -> bool {
    count < PER_PAGE
}

/// Check run listings report `total_count`; an empty page also ends the walk.
fn check_runs_drained(batch_len: usize, fetched: usize, total_count: u64) -> bool {
    batch_len == 0 || fetched as u64 >= total_count
}

/// REST-backed facade.
pub struct GitHubPlatform {
    api_url: String,
    credentials: Credentials,
    /// repo full name -> installation id
    installations: RwLock<HashMap<String, u64>>,
    /// Cache of installation tokens: installation_id -> (token, expiry)
    token_cache: RwLock<HashMap<u64, (String, chrono::DateTime<chrono::Utc>)>>,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        Ok(Self {
            api_url: config.api_url.clone(),
            credentials: Credentials::from_config(config)?,
            installations: RwLock::new(HashMap::new()),
            token_cache: RwLock::new(HashMap::new()),
        })
    }

    fn build_client(&self, token: String) -> Result<Octocrab> {
        Octocrab::builder()
            .personal_token(token)
            .base_uri(self.api_url.as_str())
            .map_err(|e| AppError::Config(format!("Invalid github.api_url: {e}")))?
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))
    }

    /// An octocrab instance allowed to act on `repo_full_name`.
    async fn client_for(&self, repo_full_name: &str) -> Result<Octocrab> {
        let token = self.token_for(repo_full_name).await?;
        self.build_client(token)
    }

    async fn token_for(&self, repo_full_name: &str) -> Result<String> {
        match &self.credentials {
            Credentials::Token(token) => Ok(token.clone()),
            Credentials::App { app_id, key_pem } => {
                let installation_id = self
                    .installation_id(*app_id, key_pem, repo_full_name)
                    .await?;
                self.installation_token(*app_id, key_pem, installation_id)
                    .await
            }
        }
    }

    async fn installation_id(&self, app_id: u64, key_pem: &[u8], repo_full_name: &str) -> Result<u64> {
        if let Some(id) = self.installations.read().await.get(repo_full_name) {
            return Ok(*id);
        }

        let (owner, repo) = parse_repo(repo_full_name)?;
        let client = self.build_client(generate_app_jwt(app_id, key_pem)?)?;
        let response: serde_json::Value = client
            .get(format!("/repos/{owner}/{repo}/installation"), None::<&()>)
            .await
            .map_err(|e| {
                AppError::GitHubApi(format!(
                    "Failed to get installation for {repo_full_name}: {e}"
                ))
            })?;

        let id = response["id"]
            .as_u64()
            .ok_or_else(|| AppError::GitHubApi("No installation id in response".to_string()))?;

        self.installations
            .write()
            .await
            .insert(repo_full_name.to_string(), id);
        Ok(id)
    }

    async fn installation_token(&self, app_id: u64, key_pem: &[u8], installation_id: u64) -> Result<String> {
        // Check cache
        {
            let cache = self.token_cache.read().await;
            if let Some((token, expiry)) = cache.get(&installation_id) {
                if *expiry > chrono::Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        let client = self.build_client(generate_app_jwt(app_id, key_pem)?)?;

        let url = format!("/app/installations/{installation_id}/access_tokens");
        let response: serde_json::Value = client
            .post(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to create installation token: {e}")))?;

        let token = response["token"]
            .as_str()
            .ok_or_else(|| AppError::GitHubApi("No token in response".to_string()))?
            .to_string();

        let expires_at = response["expires_at"]
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|| chrono::Utc::now() + chrono::Duration::hours(1));

        self.token_cache
            .write()
            .await
            .insert(installation_id, (token.clone(), expires_at));

        Ok(token)
    }

    /// GET every page of a list endpoint.
    async fn get_all_pages<T>(
        client: &Octocrab,
        route: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            let mut params = query.to_vec();
            params.push(("per_page", PER_PAGE.to_string()));
            params.push(("page", page.to_string()));

            let items: Vec<T> = client.get(route, Some(&params)).await?;
            let count = items.len();
            results.extend(items);
            if is_last_page(count) {
                break;
            }
            page += 1;
        }
        Ok(results)
    }

    async fn check_runs_for(
        client: &Octocrab,
        owner: &str,
        repo: &str,
        git_ref: &str,
        check_name: Option<&str>,
    ) -> Result<Vec<CheckRun>> {
        let route = format!("/repos/{owner}/{repo}/commits/{git_ref}/check-runs");
        let mut runs = Vec::new();
        let mut page = 1u32;
        loop {
            let mut params = vec![
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(name) = check_name {
                params.push(("check_name", name.to_string()));
            }

            let batch: CheckRunsPage = client.get(&route, Some(&params)).await?;
            let count = batch.check_runs.len();
            runs.extend(batch.check_runs.into_iter().map(mapper::map_check_run));
            if check_runs_drained(count, runs.len(), batch.total_count) {
                break;
            }
            page += 1;
        }
        Ok(runs)
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn get_changed_files(&self, repo_full_name: &str, pr_number: u64) -> Result<Vec<String>> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let files: Vec<FilePayload> = Self::get_all_pages(
            &client,
            &format!("/repos/{owner}/{repo}/pulls/{pr_number}/files"),
            &[],
        )
        .await?;

        let files: Vec<String> = files.into_iter().map(|f| f.filename).collect();
        tracing::debug!(repo = %repo_full_name, pr = pr_number, count = files.len(), "Fetched changed files");
        Ok(files)
    }

    async fn get_pull_request(&self, repo_full_name: &str, pr_number: u64) -> Result<PullRequest> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let pr: PullRequestPayload = client
            .get(format!("/repos/{owner}/{repo}/pulls/{pr_number}"), None::<&()>)
            .await?;

        Ok(mapper::map_pull_request(pr))
    }

    async fn list_label_definitions(&self, repo_full_name: &str) -> Result<Vec<LabelDefinition>> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let labels: Vec<LabelPayload> =
            Self::get_all_pages(&client, &format!("/repos/{owner}/{repo}/labels"), &[]).await?;

        Ok(labels.into_iter().map(mapper::map_label).collect())
    }

    async fn get_existing_labels(&self, repo_full_name: &str, pr_number: u64) -> Result<Vec<String>> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let labels: Vec<LabelPayload> = Self::get_all_pages(
            &client,
            &format!("/repos/{owner}/{repo}/issues/{pr_number}/labels"),
            &[],
        )
        .await?;

        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn apply_labels(&self, repo_full_name: &str, pr_number: u64, labels: &[String]) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        client
            .issues(owner, repo)
            .add_labels(pr_number, labels)
            .await?;

        tracing::info!(repo = %repo_full_name, pr = pr_number, labels = ?labels, "Applied labels");
        Ok(())
    }

    async fn remove_label(&self, repo_full_name: &str, pr_number: u64, label: &str) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let url = format!(
            "/repos/{owner}/{repo}/issues/{pr_number}/labels/{}",
            urlencoding::encode(label)
        );
        let _: serde_json::Value = client
            .delete(&url, None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to remove label {label}: {e}")))?;

        tracing::info!(repo = %repo_full_name, pr = pr_number, label, "Removed label");
        Ok(())
    }

    async fn find_pr_by_branch(&self, repo_full_name: &str, branch: &str) -> Result<Option<PullRequest>> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let pulls: Vec<PullRequestPayload> = Self::get_all_pages(
            &client,
            &format!("/repos/{owner}/{repo}/pulls"),
            &[
                ("head", format!("{owner}:{branch}")),
                ("state", "open".to_string()),
            ],
        )
        .await?;

        Ok(pulls
            .into_iter()
            .map(mapper::map_pull_request)
            .find(|pr| pr.head_branch == branch))
    }

    async fn create_pull_request(&self, repo_full_name: &str, pr: &CreatePullRequest) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let created = client
            .pulls(owner, repo)
            .create(&pr.title, &pr.head_branch, &pr.base_branch)
            .body(&pr.body)
            .send()
            .await?;

        tracing::info!(
            repo = %repo_full_name,
            pr = created.number,
            head = %pr.head_branch,
            base = %pr.base_branch,
            "Created pull request"
        );
        Ok(())
    }

    async fn update_pull_request(
        &self,
        repo_full_name: &str,
        pr: &PullRequest,
        title: &str,
        body: &str,
    ) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let _: serde_json::Value = client
            .patch(
                format!("/repos/{owner}/{repo}/pulls/{}", pr.number),
                Some(&json!({ "title": title, "body": body })),
            )
            .await?;

        tracing::info!(repo = %repo_full_name, pr = pr.number, "Updated pull request");
        Ok(())
    }

    async fn close_pr_and_delete_branch(&self, repo_full_name: &str, pr: &PullRequest) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let _: serde_json::Value = client
            .patch(
                format!("/repos/{owner}/{repo}/pulls/{}", pr.number),
                Some(&json!({ "state": "closed" })),
            )
            .await?;

        client
            .repos(owner, repo)
            .delete_ref(&Reference::Branch(pr.head_branch.clone()))
            .await?;

        tracing::info!(
            repo = %repo_full_name,
            pr = pr.number,
            branch = %pr.head_branch,
            "Closed pull request and deleted branch"
        );
        Ok(())
    }

    async fn list_check_runs(&self, repo_full_name: &str, git_ref: &str) -> Result<Vec<CheckRun>> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;
        Self::check_runs_for(&client, owner, repo, git_ref, None).await
    }

    async fn upsert_check_run(&self, repo_full_name: &str, check: &CheckRunUpsert) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let existing = Self::check_runs_for(&client, owner, repo, &check.head_sha, Some(&check.name))
            .await?
            .into_iter()
            .find(|run| run.name == check.name);

        let mut payload = check.payload(chrono::Utc::now());
        tracing::debug!(payload = %payload, "Check run payload");

        match existing {
            Some(run) => {
                if let Some(fields) = payload.as_object_mut() {
                    fields.remove("head_sha");
                }
                let _: serde_json::Value = client
                    .patch(format!("/repos/{owner}/{repo}/check-runs/{}", run.id), Some(&payload))
                    .await?;
                tracing::info!(repo = %repo_full_name, name = %check.name, id = run.id, "Updated check run");
            }
            None => {
                let _: serde_json::Value = client
                    .post(format!("/repos/{owner}/{repo}/check-runs"), Some(&payload))
                    .await?;
                tracing::info!(repo = %repo_full_name, name = %check.name, sha = %check.head_sha, "Created check run");
            }
        }
        Ok(())
    }

    async fn create_label(&self, repo_full_name: &str, label: &LabelDefinition) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let _: serde_json::Value = client
            .post(format!("/repos/{owner}/{repo}/labels"), Some(label))
            .await?;

        tracing::info!(repo = %repo_full_name, label = %label.name, "Created label");
        Ok(())
    }

    async fn update_label(&self, repo_full_name: &str, label: &LabelDefinition) -> Result<()> {
        let client = self.client_for(repo_full_name).await?;
        let (owner, repo) = parse_repo(repo_full_name)?;

        let _: serde_json::Value = client
            .patch(
                format!("/repos/{owner}/{repo}/labels/{}", urlencoding::encode(&label.name)),
                Some(&json!({ "color": label.color, "description": label.description })),
            )
            .await?;

        tracing::info!(repo = %repo_full_name, label = %label.name, "Updated label");
        Ok(())
    }

    async fn push_token(&self, repo_full_name: &str) -> Result<String> {
        self.token_for(repo_full_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_page_keeps_paging() {
        assert!(!is_last_page(PER_PAGE));
        assert!(is_last_page(PER_PAGE - 1));
        assert!(is_last_page(0));
    }

    #[test]
    fn test_check_runs_page_until_total_count() {
        // 250 runs: pages of 100, 100, 50.
        assert!(!check_runs_drained(100, 100, 250));
        assert!(!check_runs_drained(100, 200, 250));
        assert!(check_runs_drained(50, 250, 250));
    }

    #[test]
    fn test_check_runs_stop_on_exact_multiple_and_empty_page() {
        assert!(check_runs_drained(100, 100, 100));
        assert!(check_runs_drained(0, 120, 250));
        assert!(check_runs_drained(0, 0, 0));
    }
}
