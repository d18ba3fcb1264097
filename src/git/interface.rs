//! git::interface
//!
//! Git interface implementation.
//!
//! This module provides the **single doorway** to all Git operations in
//! convoy. Reads that only touch the object database go through git2;
//! anything that mutates the worktree or talks to a remote (checkout,
//! fetch, pull, commit, push, tag) is delegated to the `git` binary so
//! that the user's transports, hooks, and credential helpers apply.
//!
//! # Error Handling
//!
//! Git failures are normalized into typed [`GitError`] variants so higher
//! layers can react to the categories that matter to a release run:
//! a path that is not a repository, a detached HEAD, a missing ref, or a
//! failed subprocess (with its stderr preserved).

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::core::types::{BranchName, CommitHash, TypeError};

/// The remote every fetch/pull/push targets.
pub const DEFAULT_REMOTE: &str = "origin";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// HEAD does not point at a branch.
    #[error("HEAD is detached or unborn")]
    DetachedHead,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// A `git` subprocess exited nonzero.
    #[error("git {command} failed: {stderr}")]
    CommandFailed {
        /// The subcommand that failed (e.g. "push")
        command: String,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// Failed to spawn the `git` binary at all.
    #[error("failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::Internal {
            message: err.to_string(),
        }
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// No changes to tracked files and no conflicts.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }

    /// Clean AND nothing untracked. A pull is only safe in this state,
    /// matching `git status` coming back empty.
    pub fn is_pristine(&self) -> bool {
        self.is_clean() && self.untracked == 0
    }

    /// Total count of changed files of any kind.
    pub fn changed(&self) -> usize {
        self.staged + self.unstaged + self.untracked
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit hash
    pub hash: CommitHash,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// The Git interface.
///
/// One instance per working copy. Opening discovers the repository root
/// from any path inside it and rejects bare repositories.
pub struct Git {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git").field("path", &self.workdir).finish()
    }
}

impl Git {
    /// Open a repository at the given path.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        let workdir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();
        Ok(Self { repo, workdir })
    }

    /// The working directory of the repository.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    // =========================================================================
    // Local queries (git2)
    // =========================================================================

    /// The current branch name.
    ///
    /// # Errors
    ///
    /// [`GitError::DetachedHead`] when HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<BranchName, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                return Err(GitError::DetachedHead)
            }
            Err(e) => return Err(e.into()),
        };
        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(BranchName::new(name)?);
            }
        }
        Err(GitError::DetachedHead)
    }

    /// Get working tree status summary, untracked files included.
    pub fn worktree_status(&self) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut result = WorktreeStatus::default();
        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_conflicted() {
                result.has_conflicts = true;
            }
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
            if status.is_wt_new() {
                result.untracked += 1;
            }
        }
        Ok(result)
    }

    /// The ordered commit-ancestor list for a ref, newest first.
    ///
    /// Accepts shorthand refs (`main`, `origin/main`) as well as full
    /// refnames.
    ///
    /// # Errors
    ///
    /// [`GitError::RefNotFound`] when the ref does not resolve.
    pub fn rev_list(&self, refname: &str) -> Result<Vec<CommitHash>, GitError> {
        let object = self
            .repo
            .revparse_single(refname)
            .map_err(|_| GitError::RefNotFound {
                refname: refname.to_string(),
            })?;
        let tip = object
            .peel_to_commit()
            .map_err(|_| GitError::RefNotFound {
                refname: refname.to_string(),
            })?
            .id();

        let mut revwalk = self.repo.revwalk().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;
        revwalk.push(tip).map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let mut hashes = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
            hashes.push(CommitHash::new(oid.to_string())?);
        }
        Ok(hashes)
    }

    /// Information about the commit HEAD points at.
    pub fn latest_commit(&self) -> Result<CommitInfo, GitError> {
        let commit = self.repo.head()?.peel_to_commit()?;
        let author = commit.author();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);

        Ok(CommitInfo {
            hash: CommitHash::new(commit.id().to_string())?,
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_time,
        })
    }

    /// The most recent tag reachable from HEAD, or `None` if there is no
    /// tag in the history.
    pub fn latest_tag(&self) -> Result<Option<String>, GitError> {
        match self.run(&["describe", "--tags", "--abbrev=0"]) {
            Ok(output) => Ok(Some(output.trim().to_string())),
            // describe exits nonzero when no tag is reachable
            Err(GitError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Worktree and remote mutations (git binary)
    // =========================================================================

    /// Run a `git` subcommand in the working directory, capturing stdout.
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        let output = Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .output()
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Check out a branch.
    pub fn checkout(&self, branch: &BranchName) -> Result<(), GitError> {
        self.run(&["checkout", branch.as_str()]).map(|_| ())
    }

    /// Fetch one branch from a remote.
    pub fn fetch(&self, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        self.run(&["fetch", remote, branch.as_str()]).map(|_| ())
    }

    /// Pull the current branch.
    pub fn pull(&self) -> Result<(), GitError> {
        self.run(&["pull"]).map(|_| ())
    }

    /// Stage everything, including untracked files.
    pub fn add_all(&self) -> Result<(), GitError> {
        self.run(&["add", "-A"]).map(|_| ())
    }

    /// Create a commit from the staged changes.
    ///
    /// Returns the new HEAD hash, or `None` when there was nothing to
    /// commit (and no amend was requested). With `no_edit` the previous
    /// message is kept and `message` is ignored.
    pub fn commit(
        &self,
        message: &str,
        amend: bool,
        no_edit: bool,
    ) -> Result<Option<CommitHash>, GitError> {
        let status = self.worktree_status()?;
        if status.staged == 0 && !amend {
            return Ok(None);
        }

        let mut args = vec!["commit"];
        if amend {
            args.push("--amend");
        }
        if no_edit {
            args.push("--no-edit");
        } else {
            args.push("-m");
            args.push(message);
        }
        self.run(&args)?;
        Ok(Some(self.latest_commit()?.hash))
    }

    /// Push the current branch to its same-name counterpart on origin.
    ///
    /// Pushing `HEAD` explicitly keeps this working in clones that never
    /// had an upstream configured.
    pub fn push(&self, force: bool) -> Result<(), GitError> {
        if force {
            self.run(&["push", "-f", DEFAULT_REMOTE, "HEAD"]).map(|_| ())
        } else {
            self.run(&["push", DEFAULT_REMOTE, "HEAD"]).map(|_| ())
        }
    }

    /// Tag the latest commit.
    pub fn tag(&self, name: &str) -> Result<(), GitError> {
        self.run(&["tag", name]).map(|_| ())
    }
}
