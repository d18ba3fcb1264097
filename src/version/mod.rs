//! version
//!
//! Extraction of comparable version tokens from free-form specifier
//! strings found in manifest and lock entries.
//!
//! # Recognized shapes
//!
//! - A contiguous 40-character lowercase hex run (a content hash)
//! - A `digits.digits.digits` run, optionally preceded by one arbitrary
//!   character (which retains a leading range operator such as `^` or `~`)
//!
//! A hash always wins over a semver triple: content hashes are the
//! higher-fidelity pin. Strings matching neither shape are opaque and
//! non-comparable; every function here returns `None` for them rather
//! than erroring, and callers must handle the absence explicitly.
//!
//! [`VersionToken`] layers a validated parse on top of the raw
//! extraction, so callers that need more than string equality get a
//! typed hash or a real `semver::Version` instead of a best-effort
//! substring.

use std::sync::OnceLock;

use regex::Regex;

use crate::core::types::CommitHash;

fn hash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9a-f]{40}").unwrap())
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r".?\d+\.\d+\.\d+").unwrap())
}

fn numbers_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d+\.\d+").unwrap())
}

/// Extract a 40-character lowercase hex run, if one is present.
///
/// Surrounding noise (URL prefixes, `#` fragments) is ignored.
pub fn extract_hash(specifier: &str) -> Option<&str> {
    hash_re().find(specifier).map(|m| m.as_str())
}

/// Extract the first semver triple, keeping a single leading character.
///
/// The retained character preserves a range operator when one is present:
/// `"^1.2.3"` extracts as `"^1.2.3"`, while `"1.2.3"` extracts as
/// `"1.2.3"`.
pub fn extract_semver_token(specifier: &str) -> Option<&str> {
    token_re().find(specifier).map(|m| m.as_str())
}

/// Extract the first semver triple, discarding any leading operator.
pub fn extract_semver_numbers(specifier: &str) -> Option<&str> {
    numbers_re().find(specifier).map(|m| m.as_str())
}

/// Extract the best comparable token: hash if present, else the bare
/// semver triple, else `None`.
pub fn extract_comparable(specifier: &str) -> Option<&str> {
    extract_hash(specifier).or_else(|| extract_semver_numbers(specifier))
}

/// A range operator prefix on a semver specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    /// `^` - compatible within major
    Caret,
    /// `~` - compatible within minor
    Tilde,
}

impl RangeOp {
    /// Parse a single operator character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '^' => Some(RangeOp::Caret),
            '~' => Some(RangeOp::Tilde),
            _ => None,
        }
    }

    /// The operator character.
    pub fn as_char(&self) -> char {
        match self {
            RangeOp::Caret => '^',
            RangeOp::Tilde => '~',
        }
    }
}

impl std::fmt::Display for RangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A validated version token parsed out of a specifier string.
///
/// Unlike the raw `extract_*` functions, which hand back best-effort
/// substrings, a `VersionToken` is either a real [`CommitHash`] or a
/// parsed [`semver::Version`]; strings conforming to neither shape are
/// flagged by the `None` return instead of degrading silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    /// A 40-hex content hash.
    Hash(CommitHash),
    /// A semantic version, with the range operator that prefixed it.
    Semver {
        op: Option<RangeOp>,
        version: semver::Version,
    },
}

impl VersionToken {
    /// Parse the best token out of a specifier. Hash wins over semver.
    pub fn parse(specifier: &str) -> Option<Self> {
        if let Some(hash) = extract_hash(specifier) {
            // The regex guarantees 40 lowercase hex characters.
            return Some(VersionToken::Hash(
                CommitHash::new(hash).expect("regex-matched hash is valid"),
            ));
        }
        let token = extract_semver_token(specifier)?;
        let (op, numbers) = match token.chars().next() {
            Some(c) if !c.is_ascii_digit() => (RangeOp::from_char(c), &token[c.len_utf8()..]),
            _ => (None, token),
        };
        let version = semver::Version::parse(numbers).ok()?;
        Some(VersionToken::Semver { op, version })
    }

    /// The comparable form: the hash itself, or the bare version triple
    /// with any operator dropped.
    pub fn comparable(&self) -> String {
        match self {
            VersionToken::Hash(hash) => hash.to_string(),
            VersionToken::Semver { version, .. } => version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "0f52b9ba2222e3e26871e1eb8e7e48e98f51a807";

    mod extract_hash {
        use super::*;

        #[test]
        fn bare_hash() {
            assert_eq!(extract_hash(SHA), Some(SHA));
        }

        #[test]
        fn hash_with_noise() {
            let spec = format!("git+https://example.com/lib.git#{SHA}");
            assert_eq!(extract_hash(&spec), Some(SHA));
        }

        #[test]
        fn too_short() {
            assert_eq!(extract_hash(&SHA[..39]), None);
        }

        #[test]
        fn uppercase_not_matched() {
            assert_eq!(extract_hash(&SHA.to_uppercase()), None);
        }
    }

    mod extract_semver {
        use super::*;

        #[test]
        fn bare_triple() {
            assert_eq!(extract_semver_token("1.2.3"), Some("1.2.3"));
            assert_eq!(extract_semver_numbers("1.2.3"), Some("1.2.3"));
        }

        #[test]
        fn keeps_range_operator() {
            assert_eq!(extract_semver_token("^1.2.3"), Some("^1.2.3"));
            assert_eq!(extract_semver_token("~10.20.30"), Some("~10.20.30"));
        }

        #[test]
        fn drops_range_operator() {
            assert_eq!(extract_semver_numbers("^1.2.3"), Some("1.2.3"));
            assert_eq!(extract_semver_numbers("~10.20.30"), Some("10.20.30"));
        }

        #[test]
        fn first_occurrence_wins() {
            assert_eq!(extract_semver_numbers("1.2.3 || 4.5.6"), Some("1.2.3"));
        }

        #[test]
        fn no_triple() {
            assert_eq!(extract_semver_token("latest"), None);
            assert_eq!(extract_semver_token("1.2"), None);
        }
    }

    mod extract_comparable {
        use super::*;

        #[test]
        fn hash_beats_semver() {
            let spec = format!("1.2.3+{SHA}");
            assert_eq!(extract_comparable(&spec), Some(SHA));
        }

        #[test]
        fn semver_fallback() {
            assert_eq!(extract_comparable("^1.2.3"), Some("1.2.3"));
        }

        #[test]
        fn opaque_is_none() {
            assert_eq!(extract_comparable("workspace:*"), None);
        }
    }

    mod version_token {
        use super::*;

        #[test]
        fn parses_hash() {
            let spec = format!("github:org/lib#{SHA}");
            match VersionToken::parse(&spec) {
                Some(VersionToken::Hash(hash)) => assert_eq!(hash.as_str(), SHA),
                other => panic!("expected hash token, got {other:?}"),
            }
        }

        #[test]
        fn parses_semver_with_operator() {
            match VersionToken::parse("^1.2.3") {
                Some(VersionToken::Semver { op, version }) => {
                    assert_eq!(op, Some(RangeOp::Caret));
                    assert_eq!(version, semver::Version::new(1, 2, 3));
                }
                other => panic!("expected semver token, got {other:?}"),
            }
        }

        #[test]
        fn comparable_drops_operator() {
            let token = VersionToken::parse("~2.0.1").unwrap();
            assert_eq!(token.comparable(), "2.0.1");
        }

        #[test]
        fn opaque_is_none() {
            assert!(VersionToken::parse("workspace:*").is_none());
            assert!(VersionToken::parse("latest").is_none());
        }

        #[test]
        fn equal_triples_compare_equal_across_operators() {
            let a = VersionToken::parse("^1.2.3").unwrap();
            let b = VersionToken::parse("1.2.3").unwrap();
            assert_eq!(a.comparable(), b.comparable());
        }
    }
}
