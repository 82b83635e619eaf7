use crate::error::Result;
use crate::labels::{CategoryLabeler, LabelDiff};
use crate::matcher::matched_entries;
use crate::platform::Platform;
use crate::repos::SubtreeEntry;
use crate::workflow::PrTarget;

/// Bring the monorepo PR's `"<category>: <name>"` labels in line with the
/// subtrees it currently touches.
pub async fn update_category_labels(
    platform: &dyn Platform,
    target: &PrTarget,
    entries: &[SubtreeEntry],
    labeler: &CategoryLabeler,
) -> Result<LabelDiff> {
    let changed = platform.get_changed_files(&target.repo, target.pr).await?;
    let desired = labeler.desired(matched_entries(&changed, entries));
    let existing = platform.get_existing_labels(&target.repo, target.pr).await?;

    let diff = labeler.diff(&existing, &desired);
    if diff.is_empty() {
        tracing::info!(repo = %target.repo, pr = target.pr, "Category labels already up to date");
        return Ok(diff);
    }

    if !diff.add.is_empty() {
        tracing::info!(repo = %target.repo, pr = target.pr, labels = ?diff.add, "Adding category labels");
        platform
            .apply_labels(&target.repo, target.pr, &diff.add)
            .await?;
    }
    for label in &diff.remove {
        tracing::info!(repo = %target.repo, pr = target.pr, label = %label, "Removing category label");
        platform.remove_label(&target.repo, target.pr, label).await?;
    }

    Ok(diff)
}
