use std::collections::HashMap;
use std::path::Path;

use git2::{
    Commit, Cred, ErrorCode, ObjectType, Oid, PushOptions, RemoteCallbacks, Repository, Sort,
    Tree,
};

use crate::error::{AppError, Result};

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` as defence in depth.
fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    Ok(())
}

/// Build `PushOptions` that authenticate via credential callback and turn
/// server-side ref rejections into errors.
/// The token is captured by the closure and never written to disk.
fn make_push_options(token: &str) -> PushOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    callbacks.push_update_reference(|refname, status| match status {
        Some(message) => Err(git2::Error::from_str(&format!(
            "Remote rejected {refname}: {message}"
        ))),
        None => Ok(()),
    });
    let mut opts = PushOptions::new();
    opts.remote_callbacks(callbacks);
    opts
}

/// The tree stored at `prefix` in `commit`, if that path is a directory.
fn subtree_at<'r>(repo: &'r Repository, commit: &Commit<'_>, prefix: &Path) -> Result<Option<Tree<'r>>> {
    let entry = match commit.tree()?.get_path(prefix) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if entry.kind() != Some(ObjectType::Tree) {
        return Ok(None);
    }
    Ok(Some(repo.find_tree(entry.id())?))
}

/// Rewrite `HEAD`'s history so that `prefix` becomes the repository root.
///
/// Commits that do not touch the subtree fold into their parent; the rest are
/// recreated with the original author, committer, and message, so the same
/// input history always yields the same commit ids.
fn split_history(repo: &Repository, prefix: &Path) -> Result<Option<Oid>> {
    let head = repo.head()?.peel_to_commit()?;

    let mut walk = repo.revwalk()?;
    walk.push(head.id())?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

    // original commit -> rewritten commit (None while the prefix is absent)
    let mut rewritten: HashMap<Oid, Option<Oid>> = HashMap::new();

    for oid in walk {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;

        let mut parents: Vec<Oid> = Vec::new();
        for parent in commit.parent_ids() {
            if let Some(Some(mapped)) = rewritten.get(&parent) {
                if !parents.contains(mapped) {
                    parents.push(*mapped);
                }
            }
        }

        let split = match subtree_at(repo, &commit, prefix)? {
            None => parents.first().copied(),
            Some(tree) => {
                let unchanged = parents.len() == 1
                    && repo.find_commit(parents[0])?.tree_id() == tree.id();
                if unchanged {
                    Some(parents[0])
                } else {
                    let parent_commits = parents
                        .iter()
                        .map(|p| repo.find_commit(*p))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    let parent_refs: Vec<&Commit<'_>> = parent_commits.iter().collect();
                    let message = String::from_utf8_lossy(commit.message_raw_bytes());
                    Some(repo.commit(
                        None,
                        &commit.author(),
                        &commit.committer(),
                        &message,
                        &tree,
                        &parent_refs,
                    )?)
                }
            }
        };
        rewritten.insert(oid, split);
    }

    Ok(rewritten.get(&head.id()).copied().flatten())
}

/// Split `prefix` out of the checkout at `dir` into local branch `branch`,
/// replacing the branch if it already exists.
pub async fn split_subtree(dir: &Path, prefix: &str, branch_name: &str) -> Result<Oid> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let prefix = prefix.to_string();
    let branch_name = branch_name.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let split = split_history(&repo, Path::new(&prefix))?.ok_or_else(|| {
            AppError::Git(format!("Subtree {prefix} does not exist at HEAD"))
        })?;
        repo.reference(
            &format!("refs/heads/{branch_name}"),
            split,
            true,
            &format!("fanout: split {prefix}"),
        )?;
        Ok(split)
    })
    .await
    .map_err(|e| AppError::Git(format!("Split task panicked: {e}")))?
}

/// Force-push local `branch` to the same branch name at `remote_url`.
pub async fn force_push(dir: &Path, branch_name: &str, remote_url: &str, token: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();
    let remote_url = remote_url.to_string();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut remote = repo.remote_anonymous(&remote_url)?;
        let refspec = format!("+refs/heads/{branch_name}:refs/heads/{branch_name}");
        let mut push_opts = make_push_options(&token);
        remote.push(&[&refspec], Some(&mut push_opts))?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Force-push task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{IndexAddOption, Signature, Time};
    use std::fs;

    fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str, when: i64) -> Oid {
        let root = repo.workdir().unwrap();
        for (path, contents) in files {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("Dev", "dev@example.com", &Time::new(when, 0)).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    fn monorepo() -> (tempfile::TempDir, Repository) {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        commit_files(
            &repo,
            &[("README.md", "mono"), ("projects/rocBLAS/a.txt", "a")],
            "add rocBLAS",
            1_700_000_000,
        );
        commit_files(&repo, &[("README.md", "mono v2")], "docs only", 1_700_000_100);
        commit_files(
            &repo,
            &[("projects/rocBLAS/b.txt", "b")],
            "rocBLAS: add b",
            1_700_000_200,
        );
        (tmp, repo)
    }

    #[test]
    fn test_validate_branch_name_rejects_dash_prefix() {
        assert!(validate_branch_name("-evil").is_err());
        assert!(validate_branch_name("--upload-pack").is_err());
    }

    #[test]
    fn test_validate_branch_name_accepts_normal() {
        assert!(validate_branch_name("develop").is_ok());
        assert!(validate_branch_name("monorepo-pr/42/rocBLAS").is_ok());
    }

    #[test]
    fn test_split_history_keeps_only_subtree_commits() {
        let (_tmp, repo) = monorepo();
        let split = split_history(&repo, Path::new("projects/rocBLAS"))
            .unwrap()
            .unwrap();

        let head = repo.find_commit(split).unwrap();
        assert_eq!(head.message(), Some("rocBLAS: add b"));
        let tree = head.tree().unwrap();
        assert!(tree.get_name("a.txt").is_some());
        assert!(tree.get_name("b.txt").is_some());
        assert!(tree.get_name("README.md").is_none());

        // The docs-only commit folds into the first split commit.
        assert_eq!(head.parent_count(), 1);
        let first = head.parent(0).unwrap();
        assert_eq!(first.message(), Some("add rocBLAS"));
        assert_eq!(first.parent_count(), 0);
    }

    #[test]
    fn test_split_history_is_deterministic() {
        let (_tmp, repo) = monorepo();
        let first = split_history(&repo, Path::new("projects/rocBLAS")).unwrap();
        let second = split_history(&repo, Path::new("projects/rocBLAS")).unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_history_missing_prefix() {
        let (_tmp, repo) = monorepo();
        assert!(split_history(&repo, Path::new("shared/rocSPARSE"))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_split_and_force_push_to_local_remote() {
        let (tmp, repo) = monorepo();
        let remote_dir = tempfile::tempdir().unwrap();
        Repository::init_bare(remote_dir.path()).unwrap();
        let remote_url = remote_dir.path().to_str().unwrap().to_string();
        let branch = "monorepo-pr/7/rocBLAS";

        let split = split_subtree(tmp.path(), "projects/rocBLAS", branch)
            .await
            .unwrap();
        force_push(tmp.path(), branch, &remote_url, "unused").await.unwrap();

        let remote = Repository::open_bare(remote_dir.path()).unwrap();
        let pushed = remote
            .find_reference(&format!("refs/heads/{branch}"))
            .unwrap()
            .target()
            .unwrap();
        assert_eq!(pushed, split);

        // A rewritten branch replaces the remote one.
        commit_files(&repo, &[("projects/rocBLAS/a.txt", "a2")], "rocBLAS: edit a", 1_700_000_300);
        let resplit = split_subtree(tmp.path(), "projects/rocBLAS", branch)
            .await
            .unwrap();
        force_push(tmp.path(), branch, &remote_url, "unused").await.unwrap();
        let pushed = remote
            .find_reference(&format!("refs/heads/{branch}"))
            .unwrap()
            .target()
            .unwrap();
        assert_eq!(pushed, resplit);
        assert_ne!(resplit, split);
    }

    #[tokio::test]
    async fn test_split_subtree_rejects_dash_branch() {
        let (tmp, _repo) = monorepo();
        let err = split_subtree(tmp.path(), "projects/rocBLAS", "-x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("starts with '-'"));
    }
}
