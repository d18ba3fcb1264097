//! lockfile::snapshot
//!
//! Typed schema for `pnpm-lock.yaml`.
//!
//! Only the parts the reconciler needs are modeled: the per-kind
//! dependency tables (at top level for a standalone package, or under
//! `importers` for a workspace member), and the flat `packages` table
//! keyed by artifact identifier with per-artifact dependency maps and
//! resolution objects. Everything else in the file is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::LockReadError;

/// One resolved dependency row: the declared specifier and the exact
/// installed version (or `link:` target).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    pub specifier: String,
    pub version: String,
}

/// The resolution object of a `packages` entry; content-addressed
/// artifacts carry a commit or tarball hash.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resolution {
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub tarball: Option<String>,
    #[serde(default)]
    pub integrity: Option<String>,
}

/// One entry of the flat `packages` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

/// The dependency tables of one importer (workspace member).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImporterEntry {
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, LockEntry>>,
    #[serde(default)]
    pub dev_dependencies: Option<BTreeMap<String, LockEntry>>,
}

/// A parsed `pnpm-lock.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSnapshot {
    #[serde(default)]
    pub importers: Option<BTreeMap<String, ImporterEntry>>,
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, LockEntry>>,
    #[serde(default)]
    pub dev_dependencies: Option<BTreeMap<String, LockEntry>>,
    #[serde(default)]
    pub packages: Option<BTreeMap<String, PackageEntry>>,
}

impl LockSnapshot {
    /// The lock file name pnpm writes.
    pub const FILE_NAME: &'static str = "pnpm-lock.yaml";

    /// Parse the snapshot in `dir`.
    pub fn load(dir: &Path) -> Result<Self, LockReadError> {
        let path = dir.join(Self::FILE_NAME);
        if !path.is_file() {
            return Err(LockReadError::MissingLock {
                path: dir.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|source| LockReadError::Io {
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|e| LockReadError::Malformed {
            path,
            message: e.to_string(),
        })
    }

    /// Whether this snapshot describes a multi-package workspace.
    pub fn is_workspace(&self) -> bool {
        self.importers.is_some()
    }
}

/// The package-name component of a `packages` table key.
///
/// Handles the pnpm key shapes:
/// - `/name@1.2.3` and `/@scope/name@1.2.3` (v6+, `@` separator)
/// - `/name/1.2.3` and `/@scope/name/1.2.3` (v5, `/` separator)
///
/// Peer-dependency suffixes in parentheses are ignored because the
/// version separator is found before them.
pub fn artifact_name(key: &str) -> Option<&str> {
    let key = key.strip_prefix('/').unwrap_or(key);
    if key.is_empty() {
        return None;
    }
    // For scoped packages the name spans the first '/', so the version
    // separator search starts after the scope segment.
    let search_from = if key.starts_with('@') {
        key.find('/')? + 1
    } else {
        0
    };
    let rest = &key[search_from..];
    if let Some(at) = rest.find('@') {
        if at > 0 {
            return Some(&key[..search_from + at]);
        }
    }
    if let Some(slash) = rest.find('/') {
        return Some(&key[..search_from + slash]);
    }
    Some(key)
}

/// The version component of a `packages` table key, with any
/// peer-dependency suffix (`(...)`) stripped.
pub fn artifact_version(key: &str) -> Option<&str> {
    let name = artifact_name(key)?;
    let key = key.strip_prefix('/').unwrap_or(key);
    let rest = key.get(name.len()..)?;
    let rest = rest.strip_prefix(['@', '/'])?;
    match rest.find('(') {
        Some(paren) => Some(&rest[..paren]),
        None => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod artifact_keys {
        use super::*;

        #[test]
        fn plain_name_at_separator() {
            assert_eq!(artifact_name("/lib-a@1.2.3"), Some("lib-a"));
            assert_eq!(artifact_version("/lib-a@1.2.3"), Some("1.2.3"));
        }

        #[test]
        fn scoped_name_at_separator() {
            assert_eq!(artifact_name("/@scope/lib-a@1.2.3"), Some("@scope/lib-a"));
            assert_eq!(artifact_version("/@scope/lib-a@1.2.3"), Some("1.2.3"));
        }

        #[test]
        fn legacy_slash_separator() {
            assert_eq!(artifact_name("/lib-a/1.2.3"), Some("lib-a"));
            assert_eq!(artifact_version("/lib-a/1.2.3"), Some("1.2.3"));
        }

        #[test]
        fn peer_suffix_stripped_from_version() {
            assert_eq!(
                artifact_name("/lib-a@1.2.3(react@18.0.0)"),
                Some("lib-a")
            );
            assert_eq!(
                artifact_version("/lib-a@1.2.3(react@18.0.0)"),
                Some("1.2.3")
            );
        }

        #[test]
        fn empty_key() {
            assert_eq!(artifact_name("/"), None);
        }
    }

    mod parsing {
        use super::*;
        use tempfile::TempDir;

        const STANDALONE: &str = r#"
lockfileVersion: '9.0'
dependencies:
  lib-a:
    specifier: ^1.2.3
    version: 1.2.3
devDependencies:
  lib-test:
    specifier: ~2.0.0
    version: 2.0.1
packages:
  /lib-a@1.2.3:
    resolution: {integrity: sha512-deadbeef}
    dependencies:
      lib-b: 2.0.0
"#;

        const WORKSPACE: &str = r#"
lockfileVersion: '9.0'
importers:
  .:
    dependencies:
      lib-a:
        specifier: ^1.2.3
        version: 1.2.3
  packages/app:
    dependencies:
      lib-b:
        specifier: link:../lib-b
        version: link:../lib-b
"#;

        #[test]
        fn standalone_tables() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join(LockSnapshot::FILE_NAME), STANDALONE).unwrap();
            let snapshot = LockSnapshot::load(dir.path()).unwrap();

            assert!(!snapshot.is_workspace());
            let deps = snapshot.dependencies.as_ref().unwrap();
            assert_eq!(
                deps.get("lib-a"),
                Some(&LockEntry {
                    specifier: "^1.2.3".to_string(),
                    version: "1.2.3".to_string(),
                })
            );
            let dev = snapshot.dev_dependencies.as_ref().unwrap();
            assert_eq!(dev.get("lib-test").unwrap().version, "2.0.1");

            let packages = snapshot.packages.as_ref().unwrap();
            let entry = packages.get("/lib-a@1.2.3").unwrap();
            assert_eq!(
                entry.dependencies.as_ref().unwrap().get("lib-b"),
                Some(&"2.0.0".to_string())
            );
        }

        #[test]
        fn workspace_importers() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join(LockSnapshot::FILE_NAME), WORKSPACE).unwrap();
            let snapshot = LockSnapshot::load(dir.path()).unwrap();

            assert!(snapshot.is_workspace());
            let importers = snapshot.importers.as_ref().unwrap();
            assert!(importers.contains_key("."));
            let app = importers.get("packages/app").unwrap();
            let entry = app.dependencies.as_ref().unwrap().get("lib-b").unwrap();
            assert_eq!(entry.version, "link:../lib-b");
        }

        #[test]
        fn missing_lock() {
            let dir = TempDir::new().unwrap();
            assert!(matches!(
                LockSnapshot::load(dir.path()),
                Err(LockReadError::MissingLock { .. })
            ));
        }

        #[test]
        fn malformed_lock() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join(LockSnapshot::FILE_NAME), "{{nope").unwrap();
            assert!(matches!(
                LockSnapshot::load(dir.path()),
                Err(LockReadError::Malformed { .. })
            ));
        }
    }
}
