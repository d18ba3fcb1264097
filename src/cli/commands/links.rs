//! links command - map of locally-linked dependencies.

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::reconcile;
use crate::ui::output;

/// Print every locally-linked dependency of a subtree, with git state
/// and one level of its own dependencies.
pub fn links(ctx: &Context, path: Option<&Path>, json: bool) -> Result<()> {
    let subtree = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ctx.cwd());

    let linked = reconcile::linked_dependencies(&subtree)
        .with_context(|| format!("failed to inspect {}", subtree.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&linked)?);
        return Ok(());
    }

    if linked.is_empty() {
        output::print("No locally-linked dependencies.", ctx.verbosity);
        return Ok(());
    }

    output::header("MAP OF LINKED DEPENDENCIES", ctx.verbosity);
    for dep in &linked {
        output::print(
            format!("{} -> {}", dep.name, dep.absolute_path.display()),
            ctx.verbosity,
        );
        if let Some(git) = &dep.git {
            let branch = git.branch.as_deref().unwrap_or("(detached)");
            let last = git.last_commit.as_deref().unwrap_or("(no commits)");
            output::print(
                format!(
                    "  branch {branch}, {} dirty, {} untracked, last commit {last}",
                    git.dirty, git.untracked
                ),
                ctx.verbosity,
            );
        }
        for child in &dep.children {
            let version = child.version.as_deref().unwrap_or("(unresolved)");
            output::print(format!("  {} {version}", child.name), ctx.verbosity);
        }
    }
    Ok(())
}
