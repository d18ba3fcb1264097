//! git
//!
//! Single interface for all Git operations.
//!
//! All repository reads and writes flow through [`Git`]; no other module
//! imports `git2` or spawns the `git` binary directly. Local queries use
//! libgit2, worktree and network mutations shell out to `git`.

mod interface;

pub use interface::{CommitInfo, Git, GitError, WorktreeStatus, DEFAULT_REMOTE};
