use crate::error::Result;
use crate::naming::branch_name;
use crate::platform::Platform;
use crate::repos::SubtreeEntry;
use crate::workflow::types::{CloseOutcome, StepReport};
use crate::workflow::PrTarget;

/// Close every mirrored PR of a closed monorepo PR and delete its branch.
pub async fn close_fanouts(
    platform: &dyn Platform,
    target: &PrTarget,
    entries: &[SubtreeEntry],
) -> StepReport<CloseOutcome> {
    let mut report = StepReport::new("close-fanouts");
    for entry in entries {
        let result = close_subtree(platform, target, entry).await;
        report.record(&entry.name, result);
    }
    report
}

async fn close_subtree(
    platform: &dyn Platform,
    target: &PrTarget,
    entry: &SubtreeEntry,
) -> Result<CloseOutcome> {
    let branch = branch_name(target.pr, &entry.name);
    let Some(mirror) = platform.find_pr_by_branch(&entry.url, &branch).await? else {
        tracing::info!(repo = %entry.url, branch = %branch, "No open mirrored PR");
        return Ok(CloseOutcome::NoMirror);
    };

    tracing::info!(repo = %entry.url, pr = mirror.number, branch = %branch, "Closing mirrored PR");
    platform.close_pr_and_delete_branch(&entry.url, &mirror).await?;
    Ok(CloseOutcome::Closed {
        pr_number: mirror.number,
    })
}
