use crate::error::Result;
use crate::labels::labels_to_propagate;
use crate::naming::branch_name;
use crate::platform::Platform;
use crate::repos::SubtreeEntry;
use crate::workflow::types::{LabelSyncOutcome, StepReport};
use crate::workflow::PrTarget;

/// Copy the monorepo PR's labels onto each mirrored PR, limited to labels the
/// sub-repository defines. Never removes a label from a mirrored PR.
pub async fn sync_labels(
    platform: &dyn Platform,
    target: &PrTarget,
    entries: &[SubtreeEntry],
) -> Result<StepReport<LabelSyncOutcome>> {
    let source = platform
        .get_existing_labels(&target.repo, target.pr)
        .await?;
    tracing::debug!(repo = %target.repo, pr = target.pr, labels = ?source, "Monorepo PR labels");

    let mut report = StepReport::new("sync-labels");
    for entry in entries {
        let result = sync_subtree(platform, target, &source, entry).await;
        report.record(&entry.name, result);
    }
    Ok(report)
}

async fn sync_subtree(
    platform: &dyn Platform,
    target: &PrTarget,
    source: &[String],
    entry: &SubtreeEntry,
) -> Result<LabelSyncOutcome> {
    let branch = branch_name(target.pr, &entry.name);
    let Some(mirror) = platform.find_pr_by_branch(&entry.url, &branch).await? else {
        tracing::info!(repo = %entry.url, branch = %branch, "No open mirrored PR, skipping");
        return Ok(LabelSyncOutcome::NoMirror);
    };

    let vocabulary = platform.get_defined_labels(&entry.url).await?;
    let current = platform
        .get_existing_labels(&entry.url, mirror.number)
        .await?;

    let labels = labels_to_propagate(source, &vocabulary, &current);
    if labels.is_empty() {
        tracing::debug!(repo = %entry.url, pr = mirror.number, "Mirrored PR labels up to date");
    } else {
        tracing::info!(repo = %entry.url, pr = mirror.number, labels = ?labels, "Applying labels");
        platform
            .apply_labels(&entry.url, mirror.number, &labels)
            .await?;
    }
    Ok(LabelSyncOutcome::Applied(labels))
}
