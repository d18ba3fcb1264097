//! propagate command - the full release run.

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::config;
use crate::propagate::Propagator;
use crate::ui::output;

/// Run the full release: resolve the branch lock, synchronize every
/// repository, publish consumed packages, update consuming packages,
/// and print the collected results.
pub fn propagate(ctx: &Context, dry_run: bool) -> Result<()> {
    let config_path = ctx.config_path();
    let config = config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let base = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ctx.cwd());

    let mut propagator = Propagator::from_config(&config, &base, ctx.verbosity)
        .context("failed to resolve package configuration")?;
    if dry_run {
        propagator = propagator.dry_run();
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(propagator.run())?;

    output::header("RESULT", ctx.verbosity);
    println!(
        "{}",
        serde_json::to_string_pretty(&report.processed).expect("report serializes")
    );
    output::header("SKIPPED", ctx.verbosity);
    println!(
        "{}",
        serde_json::to_string_pretty(&report.skipped).expect("report serializes")
    );

    Ok(())
}
