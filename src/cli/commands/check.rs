//! check command - installed vs specified dependency versions.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::types::DependencyKind;
use crate::lockfile;
use crate::reconcile::{self, ChildSpec, ReportEntry};
use crate::ui::output;

/// Reconcile the requested dependencies (or everything declared) for a
/// subtree and print the per-dependency report.
pub fn check(
    ctx: &Context,
    path: Option<&Path>,
    dev: bool,
    json: bool,
    deps: &[String],
) -> Result<()> {
    let subtree = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ctx.cwd());

    // The linked-dependency map first, mirroring what a developer wants
    // to see before trusting version comparisons.
    let linked = reconcile::linked_dependencies(&subtree)
        .with_context(|| format!("failed to inspect {}", subtree.display()))?;
    if !linked.is_empty() && !json {
        output::header("MAP OF LINKED DEPENDENCIES", ctx.verbosity);
        for dep in &linked {
            output::print(
                format!("{} -> {}", dep.name, dep.absolute_path.display()),
                ctx.verbosity,
            );
        }
    }

    let specs: Vec<ChildSpec> = if deps.is_empty() {
        let kinds: &[DependencyKind] = if dev {
            &DependencyKind::ALL
        } else {
            &[DependencyKind::Direct]
        };
        lockfile::load_dependencies(&subtree, kinds)
            .with_context(|| format!("failed to load dependencies of {}", subtree.display()))?
            .into_iter()
            .map(|record| ChildSpec::Name(record.name))
            .collect()
    } else {
        deps.iter().cloned().map(ChildSpec::Name).collect()
    };

    let report = reconcile::reconcile_tree(&subtree, &specs)
        .with_context(|| format!("failed to reconcile {}", subtree.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    output::header("DEPENDENCY VERSIONS", ctx.verbosity);
    print_report(&report, 0, ctx);
    Ok(())
}

fn print_report(report: &BTreeMap<String, ReportEntry>, depth: usize, ctx: &Context) {
    let indent = "  ".repeat(depth);
    for (name, entry) in report {
        match entry {
            ReportEntry::Leaf(classification) => {
                output::print(format!("{indent}{name}: {classification}"), ctx.verbosity);
            }
            ReportEntry::Branch { version, children } => {
                let version = version.as_deref().unwrap_or("(unresolved)");
                output::print(format!("{indent}{name}: {version}"), ctx.verbosity);
                print_report(children, depth + 1, ctx);
            }
        }
    }
}
