//! repo::branch_lock
//!
//! Branch-lock resolution.
//!
//! A branch lock is a declarative table pinning which branch every
//! participating repository must be on for a given release train.
//! Multiple rows support distinct trains (e.g. "stable" vs "next");
//! exactly one row must match the live branch configuration of all
//! participating repositories, which is the single gate that prevents
//! cross-wiring trains.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from branch-lock resolution.
#[derive(Debug, Error)]
pub enum BranchLockError {
    /// Zero or more than one row matched the live branch map.
    #[error(
        "no unique branch lock row for the live branches ({matched} rows matched): {live:?}"
    )]
    NoMatchingBranchLock {
        /// How many rows matched
        matched: usize,
        /// The computed repo -> branch map
        live: BTreeMap<String, String>,
    },

    /// The resolved row carries no entry for a participating repository.
    #[error("branch lock row does not specify a branch for '{repo}'")]
    MissingEntry {
        /// The repository with no entry
        repo: String,
    },
}

/// One row of the branch-lock table: repository name -> required branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchLockRow(pub BTreeMap<String, String>);

impl BranchLockRow {
    /// The required branch for one repository.
    pub fn required_branch(&self, repo: &str) -> Result<&str, BranchLockError> {
        self.0
            .get(repo)
            .map(|b| b.trim())
            .ok_or_else(|| BranchLockError::MissingEntry {
                repo: repo.to_string(),
            })
    }

    /// Whether this row is compatible with a live branch map: every repo
    /// in the map must have an identical (whitespace-trimmed) branch
    /// here. Rows may carry entries for repositories outside the map.
    fn matches(&self, live: &BTreeMap<String, String>) -> bool {
        live.iter()
            .all(|(repo, branch)| self.0.get(repo).map(|b| b.trim()) == Some(branch.as_str()))
    }

    /// A copy restricted to the given participants, for display.
    pub fn restricted_to<'a>(
        &self,
        participants: impl IntoIterator<Item = &'a str>,
    ) -> BranchLockRow {
        let names: Vec<&str> = participants.into_iter().collect();
        BranchLockRow(
            self.0
                .iter()
                .filter(|(repo, _)| names.contains(&repo.as_str()))
                .map(|(repo, branch)| (repo.clone(), branch.clone()))
                .collect(),
        )
    }
}

/// The ordered branch-lock table.
pub type BranchLockTable = Vec<BranchLockRow>;

/// Find the unique row compatible with the live branch map.
///
/// Resolution is a function of the *set* of live branches: the order in
/// which repositories were queried cannot change which row is selected.
///
/// # Errors
///
/// [`BranchLockError::NoMatchingBranchLock`] when zero rows or more than
/// one row qualify.
pub fn resolve<'a>(
    live: &BTreeMap<String, String>,
    table: &'a [BranchLockRow],
) -> Result<&'a BranchLockRow, BranchLockError> {
    let matches: Vec<&BranchLockRow> = table.iter().filter(|row| row.matches(live)).collect();
    match matches.as_slice() {
        [row] => Ok(row),
        _ => Err(BranchLockError::NoMatchingBranchLock {
            matched: matches.len(),
            live: live.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> BranchLockRow {
        BranchLockRow(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn live(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unique_row_resolves() {
        let table = vec![
            row(&[("app", "main"), ("lib-a", "main")]),
            row(&[("app", "release"), ("lib-a", "release")]),
        ];
        let resolved = resolve(&live(&[("app", "release"), ("lib-a", "release")]), &table).unwrap();
        assert_eq!(resolved, &table[1]);
    }

    #[test]
    fn mixed_branches_fail() {
        let table = vec![
            row(&[("app", "main"), ("lib-a", "main")]),
            row(&[("app", "release"), ("lib-a", "release")]),
        ];
        let result = resolve(&live(&[("app", "main"), ("lib-a", "release")]), &table);
        assert!(matches!(
            result,
            Err(BranchLockError::NoMatchingBranchLock { matched: 0, .. })
        ));
    }

    #[test]
    fn ambiguous_rows_fail() {
        let table = vec![
            row(&[("app", "main"), ("lib-a", "main")]),
            row(&[("app", "main"), ("lib-a", "main"), ("lib-b", "main")]),
        ];
        let result = resolve(&live(&[("app", "main"), ("lib-a", "main")]), &table);
        assert!(matches!(
            result,
            Err(BranchLockError::NoMatchingBranchLock { matched: 2, .. })
        ));
    }

    #[test]
    fn rows_may_carry_extra_repos() {
        let table = vec![row(&[("app", "main"), ("lib-a", "main"), ("lib-b", "next")])];
        let resolved = resolve(&live(&[("app", "main"), ("lib-a", "main")]), &table).unwrap();
        assert_eq!(resolved, &table[0]);
    }

    #[test]
    fn branch_values_are_trimmed() {
        let table = vec![row(&[("app", "main ")])];
        assert!(resolve(&live(&[("app", "main")]), &table).is_ok());
    }

    #[test]
    fn missing_entry_error() {
        let r = row(&[("app", "main")]);
        assert_eq!(r.required_branch("app").unwrap(), "main");
        assert!(matches!(
            r.required_branch("ghost"),
            Err(BranchLockError::MissingEntry { .. })
        ));
    }

    #[test]
    fn restriction_for_display() {
        let r = row(&[("app", "main"), ("lib-a", "main"), ("other", "next")]);
        let display = r.restricted_to(["app", "lib-a"]);
        assert_eq!(display, row(&[("app", "main"), ("lib-a", "main")]));
    }
}
