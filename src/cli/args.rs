//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--config <path>`: Configuration file (default: `convoy.toml` in cwd)
//! - `--debug`: Enable debug logging
//! - `--quiet`: Minimal output

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Convoy - coordinated version releases across linked repositories
#[derive(Parser, Debug)]
#[command(name = "convoy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if convoy was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full release: branch lock, sync, publish consumed
    /// packages, update consuming packages
    Propagate {
        /// Stop after the preliminary checks; mutate nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare installed dependency versions against the declared
    /// specifiers
    Check {
        /// Subtree to check (default: current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Include devDependencies
        #[arg(long)]
        dev: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Dependencies to check (default: everything declared)
        deps: Vec<String>,
    },

    /// Show the map of locally-linked dependencies
    Links {
        /// Subtree to inspect (default: current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Print the map as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the git state of every configured repository
    Status {
        /// Print the states as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved version of one dependency from the lock
    /// snapshot
    LockVersion {
        /// Dependency name
        name: String,

        /// Subtree whose lock snapshot to read (default: current
        /// directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Shells supported for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_propagate_flags() {
        let cli = Cli::try_parse_from(["convoy", "propagate", "--dry-run"]).unwrap();
        match cli.command {
            Command::Propagate { dry_run } => assert!(dry_run),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_check_with_deps() {
        let cli =
            Cli::try_parse_from(["convoy", "check", "--dev", "lib-a", "lib-b"]).unwrap();
        match cli.command {
            Command::Check { dev, deps, .. } => {
                assert!(dev);
                assert_eq!(deps, vec!["lib-a".to_string(), "lib-b".to_string()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["convoy", "status", "--quiet"]).unwrap();
        assert!(cli.quiet);
    }
}
