//! core::config
//!
//! Run configuration: loading, validation, and resolution.
//!
//! # Layout
//!
//! The configuration file (`convoy.toml` next to wherever the release is
//! driven from, or any path via `--config`) declares the branch-lock
//! table and the consumed/consuming package sets:
//!
//! ```toml
//! [[branch_lock]]
//! app = "main"
//! lib-a = "main"
//!
//! [[branch_lock]]
//! app = "release"
//! lib-a = "release"
//!
//! [[consumed]]
//! path = "../lib-a"
//! bump = "minor"
//! tag = true
//!
//! [[consuming]]
//! path = "../app"
//! color = "blue"
//! ```
//!
//! # Validation
//!
//! Config values are validated after parsing; raw records are then
//! resolved into immutable [`builder::PackageConfig`] values (absolute
//! paths, derived names, normalized flags) without ever mutating the
//! input.

mod builder;
mod schema;

pub use builder::PackageConfig;
pub use schema::{AmendMode, RawPackageConfig, RunConfig, VersionSource};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file at the expected location.
    #[error("no configuration file found at {path}")]
    Missing {
        /// The path that was searched
        path: PathBuf,
    },

    /// Filesystem failure.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse failure.
    #[error("malformed configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidValue(String),
}

/// The default configuration file name.
pub const DEFAULT_FILE_NAME: &str = "convoy.toml";

/// Load and validate a configuration file.
pub fn load(path: &Path) -> Result<RunConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: RunConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    config.validate()?;
    Ok(config)
}
