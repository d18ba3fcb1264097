//! lockfile::reader
//!
//! Joins a lock snapshot with a subtree's manifest into flat
//! [`DependencyRecord`] rows.
//!
//! # Workspace awareness
//!
//! The lock file for a workspace member lives at the workspace root, so
//! the reader walks up from the subtree until it finds `pnpm-lock.yaml`
//! and, when the snapshot carries an `importers` table, selects the
//! member's own import entry (keyed by the subtree path relative to the
//! root, `"."` for the root itself) in place of the top-level tables.
//!
//! # Local links
//!
//! A lock entry whose resolved value starts with `link:` points at a
//! filesystem path rather than a registry artifact; the record carries
//! the link target resolved relative to the subtree.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::DependencyKind;
use crate::manifest::{Manifest, ManifestError};

use super::snapshot::{LockEntry, LockSnapshot};

/// Errors from reading a lock tree.
///
/// These are configuration errors: a missing or malformed snapshot is
/// not retried.
#[derive(Debug, Error)]
pub enum LockReadError {
    /// No `pnpm-lock.yaml` at the subtree or any ancestor.
    #[error("no pnpm-lock.yaml found at {path} or any ancestor")]
    MissingLock {
        /// The subtree that was searched
        path: PathBuf,
    },

    /// Filesystem failure.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot is not valid YAML of the expected shape.
    #[error("malformed lock snapshot at {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// The workspace snapshot has no importer entry for the subtree.
    #[error("lock snapshot at {root} has no importer entry '{key}'")]
    MissingImporter { root: PathBuf, key: String },

    /// The dependency is not present in the lock snapshot.
    #[error("dependency '{name}' not found in lock snapshot under {path}")]
    UnknownDependency { name: String, path: PathBuf },

    /// Manifest problems surface through the same reader.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// One row in a dependency tree.
///
/// `declared_specifier` comes from the manifest, `resolved_value` from
/// the lock snapshot. `children` stays empty unless explicitly requested
/// via [`load_link_children`].
#[derive(Debug, Clone)]
pub struct DependencyRecord {
    pub name: String,
    pub kind: DependencyKind,
    pub declared_specifier: String,
    pub resolved_value: Option<String>,
    pub is_local_link: bool,
    pub link_target_path: Option<PathBuf>,
    pub children: Vec<DependencyRecord>,
}

/// A snapshot located for a subtree: the parsed lock plus where it was
/// found and which importer applies.
struct LocatedSnapshot {
    snapshot: LockSnapshot,
    root: PathBuf,
    importer_key: String,
}

/// Walk up from `subtree` to the nearest directory holding a lock file.
fn locate(subtree: &Path) -> Result<LocatedSnapshot, LockReadError> {
    let mut dir = subtree;
    loop {
        if dir.join(LockSnapshot::FILE_NAME).is_file() {
            let snapshot = LockSnapshot::load(dir)?;
            let importer_key = if dir == subtree {
                ".".to_string()
            } else {
                subtree
                    .strip_prefix(dir)
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|_| ".".to_string())
            };
            return Ok(LocatedSnapshot {
                snapshot,
                root: dir.to_path_buf(),
                importer_key,
            });
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => {
                return Err(LockReadError::MissingLock {
                    path: subtree.to_path_buf(),
                })
            }
        }
    }
}

impl LocatedSnapshot {
    /// The lock table of the given kind that applies to the subtree.
    fn table(&self, kind: DependencyKind) -> Result<Option<&std::collections::BTreeMap<String, LockEntry>>, LockReadError> {
        if let Some(importers) = &self.snapshot.importers {
            let importer = importers.get(&self.importer_key).ok_or_else(|| {
                LockReadError::MissingImporter {
                    root: self.root.clone(),
                    key: self.importer_key.clone(),
                }
            })?;
            Ok(match kind {
                DependencyKind::Direct => importer.dependencies.as_ref(),
                DependencyKind::Dev => importer.dev_dependencies.as_ref(),
            })
        } else {
            Ok(match kind {
                DependencyKind::Direct => self.snapshot.dependencies.as_ref(),
                DependencyKind::Dev => self.snapshot.dev_dependencies.as_ref(),
            })
        }
    }
}

fn record_from(
    subtree: &Path,
    name: &str,
    kind: DependencyKind,
    declared: &str,
    lock_entry: Option<&LockEntry>,
) -> DependencyRecord {
    let resolved = lock_entry.map(|e| e.version.clone());
    let link_target = resolved
        .as_deref()
        .and_then(|v| v.strip_prefix("link:"))
        .map(|rel| {
            let joined = subtree.join(rel);
            joined.canonicalize().unwrap_or(joined)
        });
    DependencyRecord {
        name: name.to_string(),
        kind,
        declared_specifier: declared.to_string(),
        resolved_value: resolved,
        is_local_link: link_target.is_some(),
        link_target_path: link_target,
        children: Vec::new(),
    }
}

/// The lock snapshot that governs a subtree (walking up to the
/// workspace root when necessary).
pub fn load_snapshot(subtree: &Path) -> Result<LockSnapshot, LockReadError> {
    locate(subtree).map(|located| located.snapshot)
}

/// Load every declared dependency of the requested kinds for a subtree.
///
/// Iterates the manifest's dependency tables; each declared name becomes
/// a record with the lock snapshot's resolved value joined in (absent
/// when the lock has no entry for it).
pub fn load_dependencies(
    subtree: &Path,
    kinds: &[DependencyKind],
) -> Result<Vec<DependencyRecord>, LockReadError> {
    let located = locate(subtree)?;
    let manifest = Manifest::load(subtree)?;

    let mut records = Vec::new();
    for &kind in kinds {
        let lock_table = located.table(kind)?;
        for (name, declared) in manifest.dependencies(kind) {
            let lock_entry = lock_table.and_then(|t| t.get(&name));
            records.push(record_from(subtree, &name, kind, &declared, lock_entry));
        }
    }
    Ok(records)
}

/// Find one declared dependency by name, across both kinds.
pub fn find_dependency(
    name: &str,
    subtree: &Path,
) -> Result<Option<DependencyRecord>, LockReadError> {
    let records = load_dependencies(subtree, &DependencyKind::ALL)?;
    Ok(records.into_iter().find(|r| r.name == name))
}

/// The resolved version for one dependency straight from the lock
/// snapshot, whichever kind declares it.
pub fn lock_version(name: &str, subtree: &Path) -> Result<String, LockReadError> {
    let located = locate(subtree)?;
    for kind in DependencyKind::ALL {
        if let Some(entry) = located.table(kind)?.and_then(|t| t.get(name)) {
            return Ok(entry.version.clone());
        }
    }
    Err(LockReadError::UnknownDependency {
        name: name.to_string(),
        path: subtree.to_path_buf(),
    })
}

/// Populate one level of children for a local-link record by reading the
/// link target's own manifest and lock tree.
pub fn load_link_children(record: &DependencyRecord) -> Result<Vec<DependencyRecord>, LockReadError> {
    match &record.link_target_path {
        Some(target) => load_dependencies(target, &[DependencyKind::Direct]),
        None => Ok(Vec::new()),
    }
}
