//! core::config::builder
//!
//! Resolution of raw package records into immutable run parameters.
//!
//! The original inputs stay untouched; everything derived (absolute
//! path, display name, normalized flags) lands in a [`PackageConfig`]
//! owned by the run. Run-mutable state (action logs, published
//! versions) lives in `propagate::PackageOutcome`, not here.

use std::path::{Path, PathBuf};

use super::schema::{AmendMode, RawPackageConfig, VersionSource};
use super::ConfigError;
use crate::manifest::BumpKind;
use crate::ui::LogColor;

/// Fully-resolved, immutable per-repository run parameters.
#[derive(Debug, Clone)]
pub struct PackageConfig {
    /// Display name for diagnostics.
    pub name: String,
    /// Manifest dependency key this package is declared under in
    /// consuming manifests.
    pub package_name: String,
    /// Absolute repository path.
    pub path: PathBuf,
    /// Create a release commit. Push forces this on.
    pub commit: bool,
    /// Push after committing.
    pub push: bool,
    /// Tag the release commit.
    pub tag: bool,
    /// Amend behavior.
    pub amend: AmendMode,
    /// Release commit message.
    pub commit_message: String,
    /// How to bump the package version.
    pub bump: BumpKind,
    /// Manifest sub-paths, relative to the repository root.
    pub manifest_paths: Vec<PathBuf>,
    /// Where the published identifier is read from.
    pub version_source: VersionSource,
    /// Log prefix color.
    pub color: LogColor,
}

impl PackageConfig {
    /// Resolve a raw record against the directory the configuration file
    /// lives in.
    ///
    /// `fallback_color` applies when the record names no color, so the
    /// consumed and consuming sets can default to distinct colors.
    pub fn resolve(
        raw: &RawPackageConfig,
        base: &Path,
        fallback_color: LogColor,
    ) -> Result<Self, ConfigError> {
        raw.validate()?;

        let joined = base.join(&raw.path);
        let path = joined.canonicalize().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "package path does not exist: {}",
                joined.display()
            ))
        })?;

        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "cannot derive a name from path: {}",
                    path.display()
                ))
            })?;

        let name = raw.name.clone().unwrap_or_else(|| basename.clone());
        let package_name = raw.package_name.clone().unwrap_or(basename);
        let commit_message = raw
            .commit_message
            .clone()
            .unwrap_or_else(|| format!("Release {name}"));

        Ok(Self {
            name,
            package_name,
            path,
            commit: raw.commit || raw.push,
            push: raw.push,
            tag: raw.tag,
            amend: raw.amend,
            commit_message,
            bump: raw.bump,
            manifest_paths: raw.manifest_paths.iter().map(PathBuf::from).collect(),
            version_source: raw.version_source,
            color: raw.color.unwrap_or(fallback_color),
        })
    }

    /// The absolute path of one of this package's manifest directories.
    pub fn manifest_dir(&self, sub_path: &Path) -> PathBuf {
        if sub_path == Path::new(".") {
            self.path.clone()
        } else {
            self.path.join(sub_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw(path: &str) -> RawPackageConfig {
        RawPackageConfig {
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn derives_names_from_basename() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir(base.path().join("lib-a")).unwrap();

        let resolved = PackageConfig::resolve(&raw("lib-a"), base.path(), LogColor::Cyan).unwrap();
        assert_eq!(resolved.name, "lib-a");
        assert_eq!(resolved.package_name, "lib-a");
        assert!(resolved.path.is_absolute());
        assert_eq!(resolved.commit_message, "Release lib-a");
        assert_eq!(resolved.color, LogColor::Cyan);
    }

    #[test]
    fn overrides_win() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir(base.path().join("lib-a")).unwrap();

        let mut input = raw("lib-a");
        input.name = Some("library".to_string());
        input.package_name = Some("@scope/lib-a".to_string());
        input.color = Some(LogColor::Green);
        input.commit_message = Some("chore: release".to_string());

        let resolved = PackageConfig::resolve(&input, base.path(), LogColor::Cyan).unwrap();
        assert_eq!(resolved.name, "library");
        assert_eq!(resolved.package_name, "@scope/lib-a");
        assert_eq!(resolved.color, LogColor::Green);
        assert_eq!(resolved.commit_message, "chore: release");
    }

    #[test]
    fn push_implies_commit() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir(base.path().join("lib-a")).unwrap();

        let mut input = raw("lib-a");
        input.commit = false;
        input.push = true;
        let resolved = PackageConfig::resolve(&input, base.path(), LogColor::Cyan).unwrap();
        assert!(resolved.commit);
    }

    #[test]
    fn missing_path_fails() {
        let base = TempDir::new().unwrap();
        let result = PackageConfig::resolve(&raw("ghost"), base.path(), LogColor::Cyan);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn input_record_is_not_mutated() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir(base.path().join("lib-a")).unwrap();

        let input = raw("lib-a");
        let before = input.clone();
        let _ = PackageConfig::resolve(&input, base.path(), LogColor::Cyan).unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn manifest_dir_resolution() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir(base.path().join("lib-a")).unwrap();

        let resolved = PackageConfig::resolve(&raw("lib-a"), base.path(), LogColor::Cyan).unwrap();
        assert_eq!(resolved.manifest_dir(Path::new(".")), resolved.path);
        assert_eq!(
            resolved.manifest_dir(Path::new("packages/core")),
            resolved.path.join("packages/core")
        );
    }
}
