//! Identity conventions shared by every fanout step.
//!
//! Fanout creates branches and pull requests under these names; reflection,
//! label sync, and cleanup find them again by recomputing the same strings.
//! Nothing is stored, so every function here must stay pure.

use crate::repos::SubtreeEntry;

const BRANCH_ROOT: &str = "monorepo-pr";

/// Head branch of the mirrored PR for `subtree_name` under monorepo PR `pr_number`.
pub fn branch_name(pr_number: u64, subtree_name: &str) -> String {
    format!("{BRANCH_ROOT}/{pr_number}/{subtree_name}")
}

/// Name of the check run reflected onto the monorepo PR.
pub fn synthetic_check_name(subtree_name: &str, check_name: &str) -> String {
    format!("{subtree_name}: {check_name}")
}

/// HTTPS clone URL for an `org/repo` identifier.
pub fn clone_url(org_repo: &str) -> String {
    format!("https://github.com/{org_repo}.git")
}

/// All names derived for one subtree of one monorepo pull request.
#[derive(Debug, Clone, Copy)]
pub struct FanoutNaming<'a> {
    pub pr_number: u64,
    pub monorepo: &'a str,
    pub entry: &'a SubtreeEntry,
}

impl<'a> FanoutNaming<'a> {
    pub fn new(pr_number: u64, monorepo: &'a str, entry: &'a SubtreeEntry) -> Self {
        Self {
            pr_number,
            monorepo,
            entry,
        }
    }

    pub fn branch_name(&self) -> String {
        branch_name(self.pr_number, &self.entry.name)
    }

    pub fn prefix(&self) -> String {
        self.entry.prefix()
    }

    pub fn pr_title(&self) -> String {
        format!(
            "[MONOREPO AUTO-FANOUT] PR #{} to {}",
            self.pr_number, self.entry.name
        )
    }

    pub fn pr_body(&self) -> String {
        format!(
            "This is an automated PR for subtree `{prefix}` originating from monorepo PR \
             [#{pr}](https://github.com/{monorepo}/pull/{pr}). \
             PLEASE DO NOT MERGE OR TOUCH THIS PR, AUTOMATED WORKFLOWS FROM THE MONOREPO ARE USING IT.",
            prefix = self.prefix(),
            pr = self.pr_number,
            monorepo = self.monorepo,
        )
    }

    pub fn subrepo_url(&self) -> String {
        clone_url(&self.entry.url)
    }
}
