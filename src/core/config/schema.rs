//! core::config::schema
//!
//! Configuration schema types.
//!
//! Raw records parsed straight from TOML. Validation runs after parsing
//! to ensure values conform to expected formats (branch names, colors,
//! non-empty paths); resolution into usable [`super::PackageConfig`]
//! values happens separately and never mutates these records.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;
use crate::manifest::BumpKind;
use crate::repo::branch_lock::BranchLockTable;
use crate::ui::LogColor;

fn default_true() -> bool {
    true
}

fn default_manifest_paths() -> Vec<String> {
    vec![".".to_string()]
}

/// How (and whether) a package's latest commit is amended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AmendMode {
    /// Plain commit.
    #[default]
    Off,
    /// Amend the latest commit with a new message.
    Amend,
    /// Amend the latest commit, keeping its message.
    NoEdit,
}

impl AmendMode {
    /// Whether any amend is requested (which also forces a force-push).
    pub fn is_amend(&self) -> bool {
        !matches!(self, AmendMode::Off)
    }
}

/// Where a consumed package's published identifier is read from after
/// its release commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSource {
    /// The manifest's `version` field.
    #[default]
    PackageVersion,
    /// The latest commit hash.
    CommitHash,
    /// The most recent reachable tag.
    LatestTag,
}

/// One package record as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawPackageConfig {
    /// Repository path, relative to the configuration file.
    pub path: String,

    /// Display name override (defaults to the path basename).
    pub name: Option<String>,

    /// Manifest dependency key override (defaults to the path basename).
    pub package_name: Option<String>,

    /// Leave this repository out of the run entirely.
    pub skip: bool,

    /// Create a release commit.
    pub commit: bool,

    /// Push after committing (implies commit).
    pub push: bool,

    /// Tag the release commit.
    pub tag: bool,

    /// Amend behavior for the release commit.
    pub amend: AmendMode,

    /// Release commit message.
    pub commit_message: Option<String>,

    /// How to bump the package version.
    pub bump: BumpKind,

    /// Sub-paths containing manifests to update (relative to the
    /// repository root).
    pub manifest_paths: Vec<String>,

    /// Where the published identifier is read from.
    pub version_source: VersionSource,

    /// Log prefix color.
    pub color: Option<LogColor>,
}

impl Default for RawPackageConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            name: None,
            package_name: None,
            skip: false,
            commit: default_true(),
            push: default_true(),
            tag: false,
            amend: AmendMode::Off,
            commit_message: None,
            bump: BumpKind::Patch,
            manifest_paths: default_manifest_paths(),
            version_source: VersionSource::PackageVersion,
            color: None,
        }
    }
}

impl RawPackageConfig {
    /// Validate one record.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "package path cannot be empty".to_string(),
            ));
        }
        if self.manifest_paths.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "package '{}' has an empty manifest_paths list",
                self.path
            )));
        }
        Ok(())
    }
}

/// The whole run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// The ordered branch-lock table.
    pub branch_lock: BranchLockTable,

    /// Packages whose published version others depend on.
    pub consumed: Vec<RawPackageConfig>,

    /// Packages whose manifests receive the published versions.
    pub consuming: Vec<RawPackageConfig>,
}

impl RunConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for row in &self.branch_lock {
            for (repo, branch) in &row.0 {
                BranchName::new(branch.trim()).map_err(|e| {
                    ConfigError::InvalidValue(format!(
                        "branch lock entry for '{repo}' is invalid: {e}"
                    ))
                })?;
            }
        }
        for package in self.consumed.iter().chain(&self.consuming) {
            package.validate()?;
        }
        Ok(())
    }
}
