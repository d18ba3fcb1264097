//! status command - git state of every configured repository.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::config;
use crate::repo::state::git_summary;
use crate::ui::output;

/// Print the working-copy summary of every repository named in the
/// configuration, skipped ones included.
pub fn status(ctx: &Context, json: bool) -> Result<()> {
    let config_path = ctx.config_path();
    let config = config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let base = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ctx.cwd());

    let mut states = BTreeMap::new();
    for raw in config.consumed.iter().chain(&config.consuming) {
        let path = base.join(&raw.path);
        let name = raw.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| raw.path.clone())
        });
        states.insert(name, git_summary(&path));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&states)?);
        return Ok(());
    }

    output::header("LOCAL REPO STATUS", ctx.verbosity);
    for (name, summary) in &states {
        match summary {
            Some(git) => {
                let branch = git.branch.as_deref().unwrap_or("(detached)");
                let last = git.last_commit.as_deref().unwrap_or("(no commits)");
                output::print(
                    format!(
                        "{name}: branch {branch}, {} dirty, {} untracked, last commit {last}",
                        git.dirty, git.untracked
                    ),
                    ctx.verbosity,
                );
            }
            None => output::print(format!("{name}: not a git repository"), ctx.verbosity),
        }
    }
    Ok(())
}
