use crate::error::Result;
use crate::matcher::{find_matched_subtrees, valid_prefixes};
use crate::platform::Platform;
use crate::repos::SubtreeEntry;
use crate::workflow::PrTarget;

/// Names of the configured subtrees a pull request touches, sorted.
pub async fn detect_changed_subtrees(
    platform: &dyn Platform,
    target: &PrTarget,
    entries: &[SubtreeEntry],
) -> Result<Vec<String>> {
    let changed = platform.get_changed_files(&target.repo, target.pr).await?;
    tracing::debug!(repo = %target.repo, pr = target.pr, files = changed.len(), "Fetched changed files");

    let subtrees = find_matched_subtrees(&changed, &valid_prefixes(entries));
    if subtrees.is_empty() {
        tracing::info!(repo = %target.repo, pr = target.pr, "No configured subtree changed");
    } else {
        tracing::info!(repo = %target.repo, pr = target.pr, subtrees = ?subtrees, "Changed subtrees");
    }
    Ok(subtrees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use crate::workflow::testing::{entries, MONOREPO};

    #[tokio::test]
    async fn test_detects_sorted_subtrees() {
        let fake = FakePlatform::new();
        fake.set_changed_files(
            MONOREPO,
            12,
            &[
                "shared/rocSPARSE/b.h",
                "projects/rocBLAS/a.cpp",
                "projects/rocBLAS/CMakeLists.txt",
                "projects/unknown/x.c",
                "README.md",
            ],
        );

        let subtrees = detect_changed_subtrees(&fake, &PrTarget::new(MONOREPO, 12), &entries())
            .await
            .unwrap();
        assert_eq!(subtrees, vec!["rocBLAS", "rocSPARSE"]);
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn test_no_changes_is_empty() {
        let fake = FakePlatform::new();
        let subtrees = detect_changed_subtrees(&fake, &PrTarget::new(MONOREPO, 1), &entries())
            .await
            .unwrap();
        assert!(subtrees.is_empty());
    }
}
