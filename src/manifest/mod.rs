//! manifest
//!
//! Reading and rewriting `package.json` manifests.
//!
//! # Design
//!
//! The whole document is kept as a JSON object so fields convoy does not
//! understand survive a rewrite untouched. Writes are pretty-printed with
//! two-space indentation and a trailing newline; dependency tables are
//! sorted on save, with an optional primitive-values-first ordering for
//! callers that group scalar fields above nested ones.
//!
//! Specifier rewriting ([`rewrite_specifier`]) carries an existing range
//! operator over to a bare semver target, replaces only the `#<pin>`
//! fragment of a link/URL specifier, and reports an already-up-to-date
//! value as a no-op so callers can skip the disk write entirely.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::types::DependencyKind;
use crate::version::{RangeOp, VersionToken};

/// Errors from manifest access.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest at the expected location.
    #[error("no package.json found at {path}")]
    Missing {
        /// The directory that was searched
        path: PathBuf,
    },

    /// Filesystem failure.
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not valid JSON, or not a JSON object.
    #[error("malformed manifest at {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// The `version` field is absent or not a semantic version.
    #[error("manifest at {path} has no usable version field: {message}")]
    InvalidVersion { path: PathBuf, message: String },
}

/// How to bump a package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BumpKind {
    /// Increment the patch number.
    #[default]
    Patch,
    /// Increment the minor number, resetting patch.
    Minor,
    /// Increment the major number, resetting minor and patch.
    Major,
    /// Keep the triple, attach a timestamped pre-release suffix.
    Prerelease,
}

/// Compute the bumped form of a semantic version string.
///
/// `now` feeds the pre-release timestamp so callers (and tests) control
/// the clock.
pub fn bump_version(
    current: &str,
    kind: BumpKind,
    now: DateTime<Utc>,
) -> Result<String, semver::Error> {
    let mut version = semver::Version::parse(current)?;
    version.pre = semver::Prerelease::EMPTY;
    version.build = semver::BuildMetadata::EMPTY;
    match kind {
        BumpKind::Patch => version.patch += 1,
        BumpKind::Minor => {
            version.minor += 1;
            version.patch = 0;
        }
        BumpKind::Major => {
            version.major += 1;
            version.minor = 0;
            version.patch = 0;
        }
        BumpKind::Prerelease => {
            let stamp = now.format("%Y%m%d%H%M%S").to_string();
            version.pre = semver::Prerelease::new(&stamp)?;
        }
    }
    Ok(version.to_string())
}

/// Compute the rewritten dependency specifier, or `None` when the stored
/// value already points at `target`.
///
/// Three shapes, in precedence order:
/// - `link#pin`: only the fragment after `#` is replaced
/// - bare-semver target with a `^`/`~`-prefixed existing value: the
///   operator is carried over
/// - anything else: wholesale replacement
pub fn rewrite_specifier(existing: &str, target: &str) -> Option<String> {
    if let Some((link, pin)) = existing.split_once('#') {
        if pin == target {
            return None;
        }
        return Some(format!("{link}#{target}"));
    }

    let target_is_bare_semver = matches!(
        VersionToken::parse(target),
        Some(VersionToken::Semver { op: None, .. })
    ) && semver::Version::parse(target).is_ok();
    if target_is_bare_semver {
        if let Some(op) = existing.chars().next().and_then(RangeOp::from_char) {
            let carried = format!("{op}{target}");
            if existing == carried {
                return None;
            }
            return Some(carried);
        }
    }

    if existing == target {
        None
    } else {
        Some(target.to_string())
    }
}

/// Sort an object's keys alphabetically.
///
/// With `primitives_first`, keys holding scalar values come before keys
/// holding arrays or objects (each group alphabetical).
pub fn sort_object_keys(map: &Map<String, Value>, primitives_first: bool) -> Map<String, Value> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| {
        if primitives_first {
            let rank = |k: &str| match map.get(k) {
                Some(Value::Object(_)) | Some(Value::Array(_)) => 1,
                _ => 0,
            };
            rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
        } else {
            a.cmp(b)
        }
    });
    let mut sorted = Map::new();
    for key in keys {
        sorted.insert(key.clone(), map[key].clone());
    }
    sorted
}

/// An in-memory `package.json`.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    doc: Map<String, Value>,
}

impl Manifest {
    /// Load the manifest from `dir/package.json`.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join("package.json");
        if !path.is_file() {
            return Err(ManifestError::Missing {
                path: dir.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| ManifestError::Malformed {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let doc = match value {
            Value::Object(map) => map,
            _ => {
                return Err(ManifestError::Malformed {
                    path,
                    message: "top level is not an object".to_string(),
                })
            }
        };
        Ok(Self { path, doc })
    }

    /// The file this manifest was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `name` field.
    pub fn name(&self) -> Option<&str> {
        self.doc.get("name").and_then(Value::as_str)
    }

    /// The `version` field.
    pub fn version(&self) -> Option<&str> {
        self.doc.get("version").and_then(Value::as_str)
    }

    /// Overwrite the `version` field.
    pub fn set_version(&mut self, version: &str) {
        self.doc
            .insert("version".to_string(), Value::String(version.to_string()));
    }

    /// The declared specifier for one dependency, if present in the
    /// given table.
    pub fn dependency(&self, kind: DependencyKind, name: &str) -> Option<&str> {
        self.doc
            .get(kind.manifest_key())
            .and_then(Value::as_object)
            .and_then(|deps| deps.get(name))
            .and_then(Value::as_str)
    }

    /// All `name -> specifier` pairs in the given table, in declaration
    /// order. Non-string values are skipped.
    pub fn dependencies(&self, kind: DependencyKind) -> Vec<(String, String)> {
        self.doc
            .get(kind.manifest_key())
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Overwrite one dependency's specifier. The table must already
    /// declare the dependency; returns false when it does not.
    pub fn set_dependency(&mut self, kind: DependencyKind, name: &str, value: &str) -> bool {
        match self
            .doc
            .get_mut(kind.manifest_key())
            .and_then(Value::as_object_mut)
        {
            Some(deps) if deps.contains_key(name) => {
                deps.insert(name.to_string(), Value::String(value.to_string()));
                true
            }
            _ => false,
        }
    }

    /// Write the manifest back to disk: pretty-printed, two-space
    /// indent, dependency tables sorted, trailing newline.
    pub fn save(&mut self) -> Result<(), ManifestError> {
        for kind in DependencyKind::ALL {
            if let Some(Value::Object(deps)) = self.doc.get(kind.manifest_key()) {
                let sorted = sort_object_keys(deps, false);
                self.doc
                    .insert(kind.manifest_key().to_string(), Value::Object(sorted));
            }
        }
        let mut text = serde_json::to_string_pretty(&Value::Object(self.doc.clone()))
            .expect("manifest is valid JSON");
        text.push('\n');
        std::fs::write(&self.path, text).map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Bump the `version` field in place and return the new version.
    pub fn bump(&mut self, kind: BumpKind, now: DateTime<Utc>) -> Result<String, ManifestError> {
        let current = self
            .version()
            .ok_or_else(|| ManifestError::InvalidVersion {
                path: self.path.clone(),
                message: "missing version field".to_string(),
            })?
            .to_string();
        let bumped =
            bump_version(&current, kind, now).map_err(|e| ManifestError::InvalidVersion {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        self.set_version(&bumped);
        Ok(bumped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    mod bump {
        use super::*;

        #[test]
        fn patch_minor_major() {
            let now = utc("2026-08-07T12:00:00Z");
            assert_eq!(bump_version("1.2.3", BumpKind::Patch, now).unwrap(), "1.2.4");
            assert_eq!(bump_version("1.2.3", BumpKind::Minor, now).unwrap(), "1.3.0");
            assert_eq!(bump_version("1.2.3", BumpKind::Major, now).unwrap(), "2.0.0");
        }

        #[test]
        fn prerelease_is_timestamped() {
            let now = utc("2026-08-07T09:30:05Z");
            assert_eq!(
                bump_version("1.2.3", BumpKind::Prerelease, now).unwrap(),
                "1.2.3-20260807093005"
            );
        }

        #[test]
        fn existing_prerelease_is_dropped_on_bump() {
            let now = utc("2026-08-07T12:00:00Z");
            assert_eq!(
                bump_version("1.2.3-20250101000000", BumpKind::Patch, now).unwrap(),
                "1.2.4"
            );
        }

        #[test]
        fn invalid_version_errors() {
            assert!(bump_version("not-a-version", BumpKind::Patch, Utc::now()).is_err());
        }
    }

    mod rewrite {
        use super::*;

        const SHA: &str = "0f52b9ba2222e3e26871e1eb8e7e48e98f51a807";

        #[test]
        fn carries_caret_prefix() {
            assert_eq!(
                rewrite_specifier("^1.0.0", "2.0.0"),
                Some("^2.0.0".to_string())
            );
        }

        #[test]
        fn carries_tilde_prefix() {
            assert_eq!(
                rewrite_specifier("~1.0.0", "1.0.5"),
                Some("~1.0.5".to_string())
            );
        }

        #[test]
        fn bare_to_bare() {
            assert_eq!(
                rewrite_specifier("1.0.0", "2.0.0"),
                Some("2.0.0".to_string())
            );
        }

        #[test]
        fn replaces_pin_fragment_only() {
            let existing = "github:org/lib#aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
            assert_eq!(
                rewrite_specifier(existing, SHA),
                Some(format!("github:org/lib#{SHA}"))
            );
        }

        #[test]
        fn already_set_is_noop() {
            assert_eq!(rewrite_specifier("^2.0.0", "2.0.0"), None);
            assert_eq!(rewrite_specifier("2.0.0", "2.0.0"), None);
            assert_eq!(
                rewrite_specifier(&format!("github:org/lib#{SHA}"), SHA),
                None
            );
        }

        #[test]
        fn non_semver_target_replaces_wholesale() {
            assert_eq!(
                rewrite_specifier("^1.0.0", "next"),
                Some("next".to_string())
            );
        }
    }

    mod sorting {
        use super::*;

        fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()
        }

        #[test]
        fn alphabetical() {
            let sorted = sort_object_keys(
                &map(&[("zeta", Value::Null), ("alpha", Value::Null)]),
                false,
            );
            let keys: Vec<&String> = sorted.keys().collect();
            assert_eq!(keys, ["alpha", "zeta"]);
        }

        #[test]
        fn primitives_first() {
            let sorted = sort_object_keys(
                &map(&[
                    ("deps", Value::Object(Map::new())),
                    ("zeta", Value::String("1".into())),
                    ("alpha", Value::Bool(true)),
                ]),
                true,
            );
            let keys: Vec<&String> = sorted.keys().collect();
            assert_eq!(keys, ["alpha", "zeta", "deps"]);
        }
    }

    mod manifest_io {
        use super::*;
        use tempfile::TempDir;

        fn write_fixture(dir: &Path, json: &str) {
            std::fs::write(dir.join("package.json"), json).unwrap();
        }

        #[test]
        fn load_reads_fields() {
            let dir = TempDir::new().unwrap();
            write_fixture(
                dir.path(),
                r#"{"name":"app","version":"1.2.3","dependencies":{"lib-a":"^1.0.0"}}"#,
            );
            let manifest = Manifest::load(dir.path()).unwrap();
            assert_eq!(manifest.name(), Some("app"));
            assert_eq!(manifest.version(), Some("1.2.3"));
            assert_eq!(
                manifest.dependency(DependencyKind::Direct, "lib-a"),
                Some("^1.0.0")
            );
            assert_eq!(manifest.dependency(DependencyKind::Dev, "lib-a"), None);
        }

        #[test]
        fn missing_manifest() {
            let dir = TempDir::new().unwrap();
            assert!(matches!(
                Manifest::load(dir.path()),
                Err(ManifestError::Missing { .. })
            ));
        }

        #[test]
        fn set_dependency_requires_declaration() {
            let dir = TempDir::new().unwrap();
            write_fixture(dir.path(), r#"{"version":"1.0.0","dependencies":{}}"#);
            let mut manifest = Manifest::load(dir.path()).unwrap();
            assert!(!manifest.set_dependency(DependencyKind::Direct, "ghost", "1.0.0"));
        }

        #[test]
        fn save_sorts_and_appends_newline() {
            let dir = TempDir::new().unwrap();
            write_fixture(
                dir.path(),
                r#"{"version":"1.0.0","dependencies":{"zeta":"1.0.0","alpha":"2.0.0"}}"#,
            );
            let mut manifest = Manifest::load(dir.path()).unwrap();
            manifest.save().unwrap();

            let text = std::fs::read_to_string(dir.path().join("package.json")).unwrap();
            assert!(text.ends_with('\n'));
            let alpha = text.find("alpha").unwrap();
            let zeta = text.find("zeta").unwrap();
            assert!(alpha < zeta);
        }

        #[test]
        fn bump_updates_version_field() {
            let dir = TempDir::new().unwrap();
            write_fixture(dir.path(), r#"{"version":"0.9.9"}"#);
            let mut manifest = Manifest::load(dir.path()).unwrap();
            let bumped = manifest.bump(BumpKind::Minor, Utc::now()).unwrap();
            assert_eq!(bumped, "0.10.0");
            assert_eq!(manifest.version(), Some("0.10.0"));
        }

        #[test]
        fn unknown_fields_survive_rewrite() {
            let dir = TempDir::new().unwrap();
            write_fixture(
                dir.path(),
                r#"{"version":"1.0.0","scripts":{"build":"tsc"},"private":true}"#,
            );
            let mut manifest = Manifest::load(dir.path()).unwrap();
            manifest.set_version("1.0.1");
            manifest.save().unwrap();

            let reread = Manifest::load(dir.path()).unwrap();
            assert_eq!(reread.version(), Some("1.0.1"));
            assert!(reread.doc.contains_key("scripts"));
            assert_eq!(reread.doc.get("private"), Some(&Value::Bool(true)));
        }
    }
}
