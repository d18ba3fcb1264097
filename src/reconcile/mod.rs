//! reconcile
//!
//! Comparing declared dependency specifiers against what the lock
//! snapshot actually resolved, one subtree at a time.
//!
//! # Classification
//!
//! Locally-linked dependencies are reported, never version-compared: a
//! link target's contents are whatever is on disk. Everything else is
//! compared by extracted comparable token (hash or bare semver triple),
//! falling back to raw string equality when neither side yields a token.
//!
//! # Tree walks
//!
//! [`reconcile_tree`] recurses one level per requested child. Children
//! of a locally-linked parent are looked up in the link target's own
//! lock tree; children of a registry parent are looked up in the flat
//! artifact table of the same snapshot, joined with the parent
//! artifact's declared dependency block. An artifact key matches a child
//! only on exact equality of its package-name component; anything looser
//! is ambiguity, and ambiguity is an error rather than a guess.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::types::DependencyKind;
use crate::lockfile::{
    self, artifact_name, artifact_version, DependencyRecord, LockReadError, LockSnapshot,
};
use crate::repo::state::{git_summary, GitSummary};
use crate::version::extract_comparable;

/// Errors from reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A requested dependency is not declared in the subtree.
    #[error("dependency '{name}' not found under {trail}")]
    UnknownDependency { name: String, trail: String },

    /// More than one artifact key matched a child by exact name.
    #[error("ambiguous artifact match for '{name}' under {trail}: {candidates:?}")]
    AmbiguousDependency {
        name: String,
        trail: String,
        candidates: Vec<String>,
    },

    /// Lock or manifest reading failed.
    #[error(transparent)]
    Lock(#[from] LockReadError),
}

/// The outcome of comparing a declared specifier against a resolved
/// value.
///
/// `Match` carries the agreed token; `Mismatch` carries the best-effort
/// token for each side, falling back to the raw string when extraction
/// fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum ComparisonResult {
    Match {
        value: String,
    },
    Mismatch {
        specified: String,
        installed: String,
    },
}

impl std::fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonResult::Match { value } => write!(f, "match ({value})"),
            ComparisonResult::Mismatch {
                specified,
                installed,
            } => write!(f, "MISMATCH: specified {specified}, installed {installed}"),
        }
    }
}

/// What `classify` concludes about one dependency record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Classification {
    /// The dependency is a filesystem link; reported, not compared.
    LinkedLocally { linked: PathBuf },
    /// A registry dependency with a comparison outcome.
    Versioned(ComparisonResult),
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::LinkedLocally { linked } => {
                write!(f, "linked locally -> {}", linked.display())
            }
            Classification::Versioned(result) => write!(f, "{result}"),
        }
    }
}

/// Compare two raw specifier strings by token, then by literal equality.
fn compare(declared: &str, resolved: &str) -> ComparisonResult {
    let spec_token = extract_comparable(declared);
    let inst_token = extract_comparable(resolved);
    match (spec_token, inst_token) {
        (Some(s), Some(i)) if s == i => ComparisonResult::Match {
            value: s.to_string(),
        },
        _ if declared == resolved => ComparisonResult::Match {
            value: declared.to_string(),
        },
        _ => ComparisonResult::Mismatch {
            specified: spec_token.unwrap_or(declared).to_string(),
            installed: inst_token.unwrap_or(resolved).to_string(),
        },
    }
}

/// Classify one dependency record.
pub fn classify(record: &DependencyRecord) -> Classification {
    if record.is_local_link {
        return Classification::LinkedLocally {
            linked: record
                .link_target_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(record.resolved_value.as_deref().unwrap_or(""))),
        };
    }
    match record.resolved_value.as_deref() {
        Some(resolved) => Classification::Versioned(compare(&record.declared_specifier, resolved)),
        None => Classification::Versioned(ComparisonResult::Mismatch {
            specified: extract_comparable(&record.declared_specifier)
                .unwrap_or(&record.declared_specifier)
                .to_string(),
            installed: "(not installed)".to_string(),
        }),
    }
}

/// A dependency to reconcile, optionally with children of its own.
///
/// Resolved once at the public API boundary; the recursive walk only
/// ever sees this tagged form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildSpec {
    /// Check the named dependency itself.
    Name(String),
    /// Check the named dependency and, one level down, these children.
    WithChildren {
        name: String,
        children: Vec<ChildSpec>,
    },
}

impl ChildSpec {
    /// The dependency name this spec refers to.
    pub fn name(&self) -> &str {
        match self {
            ChildSpec::Name(name) => name,
            ChildSpec::WithChildren { name, .. } => name,
        }
    }

    fn children(&self) -> &[ChildSpec] {
        match self {
            ChildSpec::Name(_) => &[],
            ChildSpec::WithChildren { children, .. } => children,
        }
    }
}

/// One node of the reconciliation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    /// A terminal comparison.
    Leaf(Classification),
    /// A dependency whose children were also checked.
    Branch {
        version: Option<String>,
        children: BTreeMap<String, ReportEntry>,
    },
}

fn trail_string(trail: &[&str]) -> String {
    if trail.is_empty() {
        "(root)".to_string()
    } else {
        trail.join(" -> ")
    }
}

/// Reconcile a set of dependencies of `subtree`, recursing one level per
/// requested child.
pub fn reconcile_tree(
    subtree: &Path,
    specs: &[ChildSpec],
) -> Result<BTreeMap<String, ReportEntry>, ReconcileError> {
    let mut report = BTreeMap::new();
    for spec in specs {
        let entry = reconcile_spec(subtree, spec, &[])?;
        report.insert(spec.name().to_string(), entry);
    }
    Ok(report)
}

fn reconcile_spec(
    subtree: &Path,
    spec: &ChildSpec,
    trail: &[&str],
) -> Result<ReportEntry, ReconcileError> {
    let name = spec.name();
    let record = lockfile::find_dependency(name, subtree)?.ok_or_else(|| {
        ReconcileError::UnknownDependency {
            name: name.to_string(),
            trail: trail_string(trail),
        }
    })?;

    if spec.children().is_empty() {
        return Ok(ReportEntry::Leaf(classify(&record)));
    }

    let mut child_trail: Vec<&str> = trail.to_vec();
    child_trail.push(name);

    let mut children = BTreeMap::new();
    if let Some(target) = record.link_target_path.as_deref() {
        // Linked parent: the children live in the link target's own
        // lock tree, so recurse into it as a fresh subtree.
        for child in spec.children() {
            let entry = reconcile_spec(target, child, &child_trail)?;
            children.insert(child.name().to_string(), entry);
        }
    } else {
        let snapshot = lockfile::load_snapshot(subtree)?;
        for child in spec.children() {
            let entry = resolve_artifact_child(&snapshot, name, child, &child_trail)?;
            children.insert(child.name().to_string(), entry);
        }
    }

    Ok(ReportEntry::Branch {
        version: record.resolved_value.clone(),
        children,
    })
}

/// Resolve one child of a registry dependency from the snapshot's flat
/// artifact table.
fn resolve_artifact_child(
    snapshot: &LockSnapshot,
    parent: &str,
    child: &ChildSpec,
    trail: &[&str],
) -> Result<ReportEntry, ReconcileError> {
    let name = child.name();
    let packages = snapshot.packages.as_ref();

    // The child's installed version, by exact-name artifact key match.
    let mut candidates: Vec<&str> = packages
        .map(|table| {
            table
                .keys()
                .filter(|key| artifact_name(key) == Some(name))
                .map(String::as_str)
                .collect()
        })
        .unwrap_or_default();
    candidates.sort_unstable();
    candidates.dedup();
    if candidates.len() > 1 {
        return Err(ReconcileError::AmbiguousDependency {
            name: name.to_string(),
            trail: trail_string(trail),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        });
    }
    let installed = candidates.first().and_then(|key| artifact_version(key));

    // The expected specifier, from the parent artifact's own dependency
    // block.
    let declared = packages.and_then(|table| {
        table
            .iter()
            .find(|(key, _)| artifact_name(key) == Some(parent))
            .and_then(|(_, entry)| entry.dependencies.as_ref())
            .and_then(|deps| deps.get(name))
            .map(String::as_str)
    });

    let result = match (declared, installed) {
        (None, None) => {
            return Err(ReconcileError::UnknownDependency {
                name: name.to_string(),
                trail: trail_string(trail),
            })
        }
        (Some(declared), Some(installed)) => compare(declared, installed),
        (Some(declared), None) => ComparisonResult::Mismatch {
            specified: extract_comparable(declared).unwrap_or(declared).to_string(),
            installed: "(not installed)".to_string(),
        },
        (None, Some(installed)) => ComparisonResult::Mismatch {
            specified: format!("(not declared by {parent})"),
            installed: installed.to_string(),
        },
    };

    if child.children().is_empty() {
        Ok(ReportEntry::Leaf(Classification::Versioned(result)))
    } else {
        // Grandchildren of a registry parent resolve in the same flat
        // table, with the child as the new parent.
        let mut grandchildren = BTreeMap::new();
        let mut child_trail: Vec<&str> = trail.to_vec();
        child_trail.push(name);
        for grandchild in child.children() {
            let entry = resolve_artifact_child(snapshot, name, grandchild, &child_trail)?;
            grandchildren.insert(grandchild.name().to_string(), entry);
        }
        Ok(ReportEntry::Branch {
            version: installed.map(str::to_string),
            children: grandchildren,
        })
    }
}

/// One locally-linked dependency, for the linked-dependency map.
#[derive(Debug, Serialize)]
pub struct LinkedDependency {
    pub name: String,
    pub absolute_path: PathBuf,
    pub git: Option<GitSummary>,
    pub children: Vec<LinkedChild>,
}

/// One direct dependency of a link target.
#[derive(Debug, Serialize)]
pub struct LinkedChild {
    pub name: String,
    pub version: Option<String>,
}

/// Every locally-linked dependency of a subtree, with its git summary
/// and one level of its own dependencies.
pub fn linked_dependencies(subtree: &Path) -> Result<Vec<LinkedDependency>, ReconcileError> {
    let mut records = lockfile::load_dependencies(subtree, &DependencyKind::ALL)?;
    let mut linked = Vec::new();
    for record in records.iter_mut().filter(|r| r.is_local_link) {
        record.children = lockfile::load_link_children(record).unwrap_or_default();
        let target = record
            .link_target_path
            .clone()
            .expect("local link has a target");
        let children = record
            .children
            .iter()
            .map(|child| LinkedChild {
                name: child.name.clone(),
                version: child.resolved_value.clone(),
            })
            .collect();
        linked.push(LinkedDependency {
            name: record.name.clone(),
            git: git_summary(&target),
            absolute_path: target,
            children,
        });
    }
    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(declared: &str, resolved: Option<&str>) -> DependencyRecord {
        DependencyRecord {
            name: "lib-a".to_string(),
            kind: DependencyKind::Direct,
            declared_specifier: declared.to_string(),
            resolved_value: resolved.map(str::to_string),
            is_local_link: false,
            link_target_path: None,
            children: Vec::new(),
        }
    }

    mod classify {
        use super::*;

        const SHA: &str = "0f52b9ba2222e3e26871e1eb8e7e48e98f51a807";

        #[test]
        fn equal_triples_match_across_operators() {
            let result = classify(&record("^1.2.3", Some("1.2.3")));
            assert_eq!(
                result,
                Classification::Versioned(ComparisonResult::Match {
                    value: "1.2.3".to_string()
                })
            );
        }

        #[test]
        fn differing_triples_mismatch() {
            let result = classify(&record("^1.2.3", Some("1.4.0")));
            assert_eq!(
                result,
                Classification::Versioned(ComparisonResult::Mismatch {
                    specified: "1.2.3".to_string(),
                    installed: "1.4.0".to_string(),
                })
            );
        }

        #[test]
        fn hash_pins_compare_by_hash() {
            let declared = format!("github:org/lib#{SHA}");
            let result = classify(&record(&declared, Some(SHA)));
            assert_eq!(
                result,
                Classification::Versioned(ComparisonResult::Match {
                    value: SHA.to_string()
                })
            );
        }

        #[test]
        fn opaque_but_identical_strings_match() {
            let result = classify(&record("workspace:*", Some("workspace:*")));
            assert_eq!(
                result,
                Classification::Versioned(ComparisonResult::Match {
                    value: "workspace:*".to_string()
                })
            );
        }

        #[test]
        fn opaque_differing_strings_fall_back_to_raw() {
            let result = classify(&record("latest", Some("next")));
            assert_eq!(
                result,
                Classification::Versioned(ComparisonResult::Mismatch {
                    specified: "latest".to_string(),
                    installed: "next".to_string(),
                })
            );
        }

        #[test]
        fn links_are_reported_not_compared() {
            let mut rec = record("workspace:*", Some("link:../lib-a"));
            rec.is_local_link = true;
            rec.link_target_path = Some(PathBuf::from("/repos/lib-a"));
            assert_eq!(
                classify(&rec),
                Classification::LinkedLocally {
                    linked: PathBuf::from("/repos/lib-a")
                }
            );
        }

        #[test]
        fn missing_installation_is_a_mismatch() {
            let result = classify(&record("^1.2.3", None));
            assert_eq!(
                result,
                Classification::Versioned(ComparisonResult::Mismatch {
                    specified: "1.2.3".to_string(),
                    installed: "(not installed)".to_string(),
                })
            );
        }
    }

    mod display {
        use super::*;

        #[test]
        fn formats() {
            let m = ComparisonResult::Match {
                value: "1.2.3".to_string(),
            };
            assert_eq!(m.to_string(), "match (1.2.3)");

            let mm = ComparisonResult::Mismatch {
                specified: "1.2.3".to_string(),
                installed: "1.4.0".to_string(),
            };
            assert!(mm.to_string().contains("MISMATCH"));
        }
    }

    mod child_spec {
        use super::*;

        #[test]
        fn names() {
            assert_eq!(ChildSpec::Name("a".into()).name(), "a");
            let nested = ChildSpec::WithChildren {
                name: "a".into(),
                children: vec![ChildSpec::Name("b".into())],
            };
            assert_eq!(nested.name(), "a");
            assert_eq!(nested.children().len(), 1);
        }
    }
}
