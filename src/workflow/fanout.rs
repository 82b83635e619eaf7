use crate::error::Result;
use crate::naming::FanoutNaming;
use crate::platform::types::CreatePullRequest;
use crate::platform::Platform;
use crate::repos::SubtreeEntry;
use crate::workflow::types::{FanoutState, StepReport};
use crate::workflow::PrTarget;
use crate::workspace::SubtreePublisher;

/// Configured entries for the requested subtree names. Unknown names are skipped.
pub fn select_entries<'a>(entries: &'a [SubtreeEntry], names: &[String]) -> Vec<&'a SubtreeEntry> {
    for name in names {
        if !entries.iter().any(|e| &e.name == name) {
            tracing::warn!(subtree = %name, "Subtree is not configured, skipping");
        }
    }
    entries
        .iter()
        .filter(|e| names.iter().any(|n| n == &e.name))
        .collect()
}

/// Push each subtree and create or refresh its mirrored pull request.
///
/// A failure stops only the subtree it happened in.
pub async fn fanout(
    platform: &dyn Platform,
    publisher: &dyn SubtreePublisher,
    target: &PrTarget,
    subtrees: &[&SubtreeEntry],
) -> StepReport<FanoutState> {
    let mut report = StepReport::new("fanout");

    for entry in subtrees {
        let naming = FanoutNaming::new(target.pr, &target.repo, entry);
        tracing::info!(
            subtree = %entry.name,
            repo = %entry.url,
            branch = %naming.branch_name(),
            "Fanning out subtree"
        );

        let mut state = FanoutState::NoRemoteBranch;
        let result = fanout_subtree(platform, publisher, &naming, &mut state).await;
        if result.is_err() {
            tracing::warn!(subtree = %entry.name, reached = ?state, "Fanout stopped early");
        }
        report.record(&entry.name, result);
    }

    report
}

async fn fanout_subtree(
    platform: &dyn Platform,
    publisher: &dyn SubtreePublisher,
    naming: &FanoutNaming<'_>,
    state: &mut FanoutState,
) -> Result<FanoutState> {
    let repo = naming.entry.url.as_str();
    let branch = naming.branch_name();

    let token = platform.push_token(repo).await?;
    publisher
        .publish(&naming.prefix(), &branch, &naming.subrepo_url(), &token)
        .await?;
    *state = FanoutState::Pushed;

    let title = naming.pr_title();
    let body = naming.pr_body();

    *state = match platform.find_pr_by_branch(repo, &branch).await? {
        None => {
            platform
                .create_pull_request(
                    repo,
                    &CreatePullRequest {
                        title,
                        body,
                        head_branch: branch.clone(),
                        base_branch: naming.entry.branch.clone(),
                    },
                )
                .await?;
            tracing::info!(repo, branch = %branch, "Created mirrored pull request");
            FanoutState::PrOpen
        }
        Some(existing) if existing.title == title && existing.body == body => {
            tracing::debug!(repo, pr = existing.number, "Mirrored pull request unchanged");
            FanoutState::PrUpdated { changed: false }
        }
        Some(existing) => {
            platform
                .update_pull_request(repo, &existing, &title, &body)
                .await?;
            tracing::info!(repo, pr = existing.number, "Updated mirrored pull request");
            FanoutState::PrUpdated { changed: true }
        }
    };

    Ok(*state)
}
