//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler validates command-specific arguments, calls the domain
//! layer, and formats output. The propagate command is async because its
//! phases fan out one task per repository; it builds its own tokio
//! runtime at the dispatch boundary.

mod check;
mod completion;
mod links;
mod lock_version;
mod propagate;
mod status;

pub use check::check;
pub use completion::completion;
pub use links::links;
pub use lock_version::lock_version;
pub use propagate::propagate;
pub use status::status;

use anyhow::Result;

use super::{Command, Context};

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Propagate { dry_run } => propagate(ctx, dry_run),
        Command::Check {
            path,
            dev,
            json,
            deps,
        } => check(ctx, path.as_deref(), dev, json, &deps),
        Command::Links { path, json } => links(ctx, path.as_deref(), json),
        Command::Status { json } => status(ctx, json),
        Command::LockVersion { name, path } => lock_version(ctx, &name, path.as_deref()),
        Command::Completion { shell } => completion(shell),
    }
}
