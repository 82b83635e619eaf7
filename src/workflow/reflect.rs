use std::collections::HashMap;

use crate::error::Result;
use crate::naming::{branch_name, synthetic_check_name};
use crate::platform::types::{CheckConclusion, CheckRun, CheckRunUpsert};
use crate::platform::Platform;
use crate::repos::SubtreeEntry;
use crate::workflow::types::{ReflectOutcome, StepReport};
use crate::workflow::PrTarget;

/// Mirror every mirrored PR's check runs onto the monorepo PR's head commit
/// as `"<subtree>: <check>"`, writing only what changed.
///
/// Fails before touching any subtree if the monorepo PR cannot be read.
pub async fn reflect_checks(
    platform: &dyn Platform,
    target: &PrTarget,
    entries: &[SubtreeEntry],
) -> Result<StepReport<ReflectOutcome>> {
    let monorepo_pr = platform.get_pull_request(&target.repo, target.pr).await?;
    let head_sha = monorepo_pr.head_sha;

    let mut reflected: HashMap<String, CheckRun> = platform
        .list_check_runs(&target.repo, &head_sha)
        .await?
        .into_iter()
        .map(|run| (run.name.clone(), run))
        .collect();
    tracing::debug!(repo = %target.repo, sha = %head_sha, checks = reflected.len(), "Loaded monorepo check runs");

    let mut report = StepReport::new("reflect-checks");
    for entry in entries {
        let result = reflect_subtree(platform, target, &head_sha, entry, &mut reflected).await;
        report.record(&entry.name, result);
    }
    Ok(report)
}

async fn reflect_subtree(
    platform: &dyn Platform,
    target: &PrTarget,
    head_sha: &str,
    entry: &SubtreeEntry,
    reflected: &mut HashMap<String, CheckRun>,
) -> Result<ReflectOutcome> {
    let branch = branch_name(target.pr, &entry.name);
    let Some(mirror) = platform.find_pr_by_branch(&entry.url, &branch).await? else {
        tracing::info!(repo = %entry.url, branch = %branch, "No open mirrored PR, skipping");
        return Ok(ReflectOutcome::NoMirror);
    };

    let checks = platform.list_check_runs(&entry.url, &mirror.head_sha).await?;
    let mut upserted = 0;
    let mut unchanged = 0;

    for check in checks {
        let desired = CheckRunUpsert {
            name: synthetic_check_name(&entry.name, &check.name),
            head_sha: head_sha.to_string(),
            status: check.status,
            conclusion: check.conclusion.unwrap_or(CheckConclusion::Neutral),
            summary: check.summary,
            details_url: check.details_url,
        };

        if let Some(existing) = reflected.get(&desired.name) {
            if !desired.differs_from(existing) {
                tracing::debug!(check = %desired.name, "Check unchanged, skipping");
                unchanged += 1;
                continue;
            }
        }

        tracing::info!(
            repo = %target.repo,
            check = %desired.name,
            status = desired.status.as_str(),
            conclusion = desired.conclusion.as_str(),
            "Reflecting check"
        );
        platform.upsert_check_run(&target.repo, &desired).await?;
        upserted += 1;

        // Later runs with the same name compare against what was just written.
        let id = reflected.get(&desired.name).map_or(0, |run| run.id);
        reflected.insert(
            desired.name.clone(),
            CheckRun {
                id,
                name: desired.name,
                head_sha: desired.head_sha,
                status: desired.status,
                conclusion: Some(desired.conclusion),
                summary: desired.summary,
                details_url: desired.details_url,
            },
        );
    }

    Ok(ReflectOutcome::Reflected { upserted, unchanged })
}
