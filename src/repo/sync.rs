//! repo::sync
//!
//! Per-repository synchronization state machine.
//!
//! ```text
//! Unchecked -> BranchSelected -> Classified -> Ready | Failed
//! ```
//!
//! 1. `Unchecked -> BranchSelected`: check out the branch-lock branch
//!    when the current branch differs; checkout failure fails the repo.
//! 2. `BranchSelected -> Classified -> ...`: classify divergence.
//!    Up-to-date and ahead proceed untouched. Behind pulls when the
//!    working tree is pristine and fails otherwise. Diverged fails,
//!    unless the repository will not be committed anyway, in which case
//!    the run proceeds without pushing it.
//!
//! A failed repository aborts the whole run only when it was going to be
//! committed or pushed; otherwise it is excluded from later mutation
//! steps and its siblings continue.

use thiserror::Error;

use crate::core::types::BranchName;
use crate::git::{Git, GitError, DEFAULT_REMOTE};

use super::state::{divergence, DivergenceState};

/// Errors that fail a repository's synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Could not check out the branch the lock requires.
    #[error("[{repo}] failed to check out '{branch}': {source}")]
    Checkout {
        repo: String,
        branch: String,
        #[source]
        source: GitError,
    },

    /// Local and remote have diverged and the repository must be pushed.
    #[error(
        "[{repo}] {branch} and {remote}/{branch} have diverged. \
         This must be resolved before continuing."
    )]
    Diverged {
        repo: String,
        branch: String,
        remote: String,
    },

    /// Remote is ahead but uncommitted changes block the pull.
    #[error(
        "[{repo}] {remote}/{branch} is ahead of {branch} but {branch} has \
         uncommitted changes. This must be resolved before continuing."
    )]
    DirtyBehindRemote {
        repo: String,
        branch: String,
        remote: String,
    },

    /// The pull itself failed.
    #[error("[{repo}] pull failed: {source}")]
    Pull {
        repo: String,
        #[source]
        source: GitError,
    },

    /// Any other git failure during synchronization.
    #[error("[{repo}] {source}")]
    Git {
        repo: String,
        #[source]
        source: GitError,
    },

    /// A configuration problem (e.g. no branch-lock entry for the repo).
    #[error("[{repo}] {message}")]
    Config { repo: String, message: String },
}

/// The states a repository moves through during synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing verified yet.
    Unchecked,
    /// On the branch the lock requires.
    BranchSelected,
    /// Divergence computed.
    Classified(DivergenceState),
    /// Safe to mutate in later phases.
    Ready,
    /// Excluded from later phases.
    Failed,
}

/// What synchronization did to one repository.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Terminal state: `Ready` or `Failed`.
    pub state: SyncState,
    /// The divergence that was classified.
    pub divergence: DivergenceState,
    /// Whether a pull was performed.
    pub pulled: bool,
    /// Whether the branch was switched to satisfy the lock.
    pub switched_branch: bool,
    /// Log lines describing what happened, in order.
    pub log: Vec<String>,
}

/// Drive one repository through the state machine.
///
/// `will_commit` is the repository's commit/push intent: it decides
/// whether a diverged state is fatal or merely warned about.
pub fn synchronize(
    git: &Git,
    name: &str,
    required: &BranchName,
    will_commit: bool,
) -> Result<SyncOutcome, SyncError> {
    let mut log = Vec::new();

    // Unchecked -> BranchSelected
    let current = git.current_branch().map_err(|source| SyncError::Git {
        repo: name.to_string(),
        source,
    })?;
    let switched_branch = current != *required;
    if switched_branch {
        log.push(format!(
            "Switching from branch '{current}' to '{required}' as per branch lock entry"
        ));
        git.checkout(required).map_err(|source| SyncError::Checkout {
            repo: name.to_string(),
            branch: required.to_string(),
            source,
        })?;
    }

    // BranchSelected -> Classified
    let state = divergence(git, required).map_err(|source| SyncError::Git {
        repo: name.to_string(),
        source,
    })?;

    // Classified -> Ready | Failed
    let mut pulled = false;
    match state {
        DivergenceState::UpToDate => {
            log.push(format!(
                "{required} is up to date with {DEFAULT_REMOTE}/{required}"
            ));
        }
        DivergenceState::LocalAhead => {
            log.push(format!(
                "{required} is ahead of {DEFAULT_REMOTE}/{required} and can be pushed"
            ));
        }
        DivergenceState::RemoteAhead => {
            let status = git.worktree_status().map_err(|source| SyncError::Git {
                repo: name.to_string(),
                source,
            })?;
            if !status.is_pristine() {
                return Err(SyncError::DirtyBehindRemote {
                    repo: name.to_string(),
                    branch: required.to_string(),
                    remote: DEFAULT_REMOTE.to_string(),
                });
            }
            git.pull().map_err(|source| SyncError::Pull {
                repo: name.to_string(),
                source,
            })?;
            pulled = true;
            log.push(format!("Pulled {required} branch"));
        }
        DivergenceState::Diverged => {
            if will_commit {
                return Err(SyncError::Diverged {
                    repo: name.to_string(),
                    branch: required.to_string(),
                    remote: DEFAULT_REMOTE.to_string(),
                });
            }
            log.push(format!(
                "warning: {required} and {DEFAULT_REMOTE}/{required} have diverged; \
                 continuing without pushing this repository"
            ));
        }
    }
    log.push(format!("{required} - initialisation complete"));

    Ok(SyncOutcome {
        state: SyncState::Ready,
        divergence: state,
        pulled,
        switched_branch,
        log,
    })
}
