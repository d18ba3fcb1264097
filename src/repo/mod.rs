//! repo
//!
//! Per-repository state: divergence classification against the remote,
//! branch-lock resolution across the participating set, and the
//! synchronization state machine that brings one working copy into a
//! releasable state.

pub mod branch_lock;
pub mod state;
pub mod sync;

pub use branch_lock::{BranchLockError, BranchLockRow, BranchLockTable};
pub use state::{classify_ancestors, divergence, git_summary, DivergenceState, GitSummary};
pub use sync::{synchronize, SyncError, SyncOutcome, SyncState};
