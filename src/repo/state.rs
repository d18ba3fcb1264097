//! repo::state
//!
//! Divergence classification and working-copy summaries.
//!
//! # Divergence
//!
//! A repository's relationship to its remote counterpart is derived
//! solely from the two commit-ancestor lists: compare each tip's
//! presence in the other side's `rev-list` output. Exactly four states
//! are reachable; nothing else exists.

use std::path::Path;

use serde::Serialize;

use crate::core::types::{BranchName, CommitHash};
use crate::git::{Git, GitError, DEFAULT_REMOTE};

/// A repository's relationship to its remote branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivergenceState {
    /// Local and remote tips are the same commit.
    UpToDate,
    /// Local has commits the remote lacks; a push would fast-forward.
    LocalAhead,
    /// Remote has commits local lacks; a pull would fast-forward.
    RemoteAhead,
    /// Each side has commits the other lacks.
    Diverged,
}

impl std::fmt::Display for DivergenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DivergenceState::UpToDate => "up to date",
            DivergenceState::LocalAhead => "ahead of remote",
            DivergenceState::RemoteAhead => "behind remote",
            DivergenceState::Diverged => "diverged",
        };
        write!(f, "{label}")
    }
}

/// Classify two ordered ancestor lists (newest first).
///
/// Pure function of the lists; [`divergence`] feeds it the live
/// `rev-list` output. Swapping the arguments swaps `LocalAhead` and
/// `RemoteAhead` and leaves the other two states fixed.
pub fn classify_ancestors(local: &[CommitHash], remote: &[CommitHash]) -> DivergenceState {
    match (local.first(), remote.first()) {
        (None, None) => DivergenceState::UpToDate,
        (Some(local_tip), Some(remote_tip)) => {
            if local_tip == remote_tip {
                DivergenceState::UpToDate
            } else {
                let remote_tip_in_local = local.contains(remote_tip);
                let local_tip_in_remote = remote.contains(local_tip);
                match (remote_tip_in_local, local_tip_in_remote) {
                    (true, false) => DivergenceState::LocalAhead,
                    (false, true) => DivergenceState::RemoteAhead,
                    // (true, true) would mean equal tips, handled above
                    _ => DivergenceState::Diverged,
                }
            }
        }
        // One side has no commits at all
        (Some(_), None) => DivergenceState::LocalAhead,
        (None, Some(_)) => DivergenceState::RemoteAhead,
    }
}

/// Fetch the branch from origin and classify local against remote.
pub fn divergence(git: &Git, branch: &BranchName) -> Result<DivergenceState, GitError> {
    git.fetch(DEFAULT_REMOTE, branch)?;
    let local = git.rev_list(branch.as_str())?;
    let remote = git.rev_list(&format!("{DEFAULT_REMOTE}/{branch}"))?;
    Ok(classify_ancestors(&local, &remote))
}

/// A working-copy summary for audit output.
#[derive(Debug, Clone, Serialize)]
pub struct GitSummary {
    /// Current branch, if HEAD is on one.
    pub branch: Option<String>,
    /// Count of staged + unstaged changes to tracked files.
    pub dirty: usize,
    /// Count of untracked files.
    pub untracked: usize,
    /// Abbreviated sha and message of the last commit.
    pub last_commit: Option<String>,
}

/// Summarize the repository at `path`, or `None` if the path is not a
/// repository.
pub fn git_summary(path: &Path) -> Option<GitSummary> {
    let git = Git::open(path).ok()?;
    let status = git.worktree_status().ok()?;
    let branch = git.current_branch().ok().map(|b| b.to_string());
    let last_commit = git
        .latest_commit()
        .ok()
        .map(|info| format!("{} \"{}\"", info.hash.short(7), info.summary));
    Some(GitSummary {
        branch,
        dirty: status.staged + status.unstaged,
        untracked: status.untracked,
        last_commit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> CommitHash {
        CommitHash::new(format!("{:040x}", n)).unwrap()
    }

    fn list(ns: &[u8]) -> Vec<CommitHash> {
        ns.iter().map(|&n| hash(n)).collect()
    }

    mod classify {
        use super::*;

        #[test]
        fn same_tip_is_up_to_date() {
            let local = list(&[3, 2, 1]);
            let remote = list(&[3, 2, 1]);
            assert_eq!(
                classify_ancestors(&local, &remote),
                DivergenceState::UpToDate
            );
        }

        #[test]
        fn local_ahead() {
            // local [c3,c2,c1], remote [c2,c1]: local tip not in remote,
            // remote tip in local
            let local = list(&[3, 2, 1]);
            let remote = list(&[2, 1]);
            assert_eq!(
                classify_ancestors(&local, &remote),
                DivergenceState::LocalAhead
            );
        }

        #[test]
        fn remote_ahead() {
            let local = list(&[2, 1]);
            let remote = list(&[3, 2, 1]);
            assert_eq!(
                classify_ancestors(&local, &remote),
                DivergenceState::RemoteAhead
            );
        }

        #[test]
        fn diverged() {
            let local = list(&[4, 2, 1]);
            let remote = list(&[3, 2, 1]);
            assert_eq!(
                classify_ancestors(&local, &remote),
                DivergenceState::Diverged
            );
        }

        #[test]
        fn swap_symmetry() {
            let local = list(&[3, 2, 1]);
            let remote = list(&[2, 1]);
            assert_eq!(
                classify_ancestors(&local, &remote),
                DivergenceState::LocalAhead
            );
            assert_eq!(
                classify_ancestors(&remote, &local),
                DivergenceState::RemoteAhead
            );
        }

        #[test]
        fn empty_lists() {
            assert_eq!(
                classify_ancestors(&[], &[]),
                DivergenceState::UpToDate
            );
            assert_eq!(
                classify_ancestors(&list(&[1]), &[]),
                DivergenceState::LocalAhead
            );
            assert_eq!(
                classify_ancestors(&[], &list(&[1])),
                DivergenceState::RemoteAhead
            );
        }
    }

    mod summary {
        use super::*;

        #[test]
        fn non_repo_is_none() {
            let dir = tempfile::TempDir::new().unwrap();
            assert!(git_summary(dir.path()).is_none());
        }
    }
}
