//! Wire shapes returned by the GitHub REST API (directly, or via `gh api`).

use serde::Deserialize;

use super::types::{CheckConclusion, CheckStatus};

#[derive(Debug, Deserialize)]
pub struct PullRequestPayload {
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub head: PullRequestRef,
    pub base: PullRequestRef,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct FilePayload {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct LabelPayload {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRunsPage {
    pub total_count: u64,
    pub check_runs: Vec<CheckRunPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRunPayload {
    pub id: u64,
    pub name: String,
    pub head_sha: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    #[serde(default)]
    pub details_url: Option<String>,
    #[serde(default)]
    pub output: Option<CheckOutputPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CheckOutputPayload {
    #[serde(default)]
    pub summary: Option<String>,
}

/// Row of `gh pr list --json number,title,body,headRefName,headRefOid,baseRefName`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhPullRequestRow {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub head_ref_name: String,
    #[serde(default)]
    pub head_ref_oid: String,
    #[serde(default)]
    pub base_ref_name: String,
}
