use crate::platform::payloads::{CheckRunPayload, GhPullRequestRow, LabelPayload, PullRequestPayload};
use crate::platform::types;

/// Map a REST pull request to our platform PullRequest type.
pub fn map_pull_request(pr: PullRequestPayload) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        head_branch: pr.head.ref_name,
        head_sha: pr.head.sha,
        base_branch: pr.base.ref_name,
    }
}

/// Map a `gh pr list` row to our platform PullRequest type.
pub fn map_gh_pull_request(row: GhPullRequestRow) -> types::PullRequest {
    types::PullRequest {
        number: row.number,
        title: row.title,
        body: row.body,
        head_branch: row.head_ref_name,
        head_sha: row.head_ref_oid,
        base_branch: row.base_ref_name,
    }
}

pub fn map_label(label: LabelPayload) -> types::LabelDefinition {
    types::LabelDefinition {
        name: label.name,
        color: label.color,
        description: label.description.unwrap_or_default(),
    }
}

pub fn map_check_run(check: CheckRunPayload) -> types::CheckRun {
    types::CheckRun {
        id: check.id,
        name: check.name,
        head_sha: check.head_sha,
        status: check.status,
        conclusion: check.conclusion,
        summary: check
            .output
            .and_then(|o| o.summary)
            .unwrap_or_default(),
        details_url: check.details_url.unwrap_or_default(),
    }
}
