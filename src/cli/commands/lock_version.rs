//! lock-version command - resolved version of one dependency.

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::lockfile;

/// Print the version the lock snapshot resolved for one dependency.
pub fn lock_version(ctx: &Context, name: &str, path: Option<&Path>) -> Result<()> {
    let subtree = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ctx.cwd());

    let version = lockfile::lock_version(name, &subtree)
        .with_context(|| format!("failed to resolve '{name}'"))?;
    println!("{version}");
    Ok(())
}
