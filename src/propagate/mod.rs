//! propagate
//!
//! The full release run, in strictly ordered phases:
//!
//! 1. **Resolve** - branch lock over every participating repository
//! 2. **Synchronize** - per-repository state machine, in parallel
//! 3. **Publish** - bump/commit/push each consumed package, in parallel
//! 4. **Barrier** - every published version known before anything reads it
//! 5. **Update** - rewrite consuming manifests, bump/commit/push/tag
//! 6. **Collect** - per-repository outcome records plus a skipped audit
//!
//! One blocking task per repository per phase; a phase's tasks are all
//! joined before the next phase starts. Each repository's working copy
//! and manifests are owned exclusively by its task; the only cross-task
//! values are the resolved branch-lock row and the published version
//! list, both immutable once the next phase begins.
//!
//! Per-repository failures in the publish and update phases are caught,
//! reported with the repository-name prefix, and excluded from the
//! result list without aborting sibling repositories. The two run-wide
//! gates are branch-lock resolution and a divergence failure on a
//! repository that must be committed or pushed.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::core::config::{PackageConfig, RunConfig, VersionSource};
use crate::core::types::{BranchName, CommitHash, DependencyKind};
use crate::git::{Git, GitError};
use crate::manifest::{rewrite_specifier, Manifest, ManifestError};
use crate::repo::branch_lock::{self, BranchLockError, BranchLockRow, BranchLockTable};
use crate::repo::state::{git_summary, GitSummary};
use crate::repo::sync::{synchronize, SyncError};
use crate::ui::output::{self, Verbosity};
use crate::ui::LogColor;

/// Errors from a release run.
#[derive(Debug, Error)]
pub enum PropagateError {
    /// Branch-lock resolution failed; nothing was mutated.
    #[error(transparent)]
    BranchLock(#[from] BranchLockError),

    /// A repository that must be committed or pushed failed to
    /// synchronize.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Git failure attributed to one repository.
    #[error("[{repo}] {source}")]
    Git {
        repo: String,
        #[source]
        source: GitError,
    },

    /// Manifest failure attributed to one repository.
    #[error("[{repo}] {source}")]
    Manifest {
        repo: String,
        #[source]
        source: ManifestError,
    },

    /// A consumed package is not declared in any of a consuming
    /// package's manifests.
    #[error("[{repo}] dependency '{dependency}' is not declared in any manifest")]
    MissingDependency { repo: String, dependency: String },

    /// A repository task panicked or was cancelled.
    #[error("repository task failed: {0}")]
    Task(String),
}

/// A consumed package's published identity, read back after its release
/// commit.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedVersion {
    /// The manifest dependency key consuming packages declare.
    pub package_name: String,
    /// The value consuming manifests are rewritten to.
    pub version: String,
}

/// What happened to one processed repository.
#[derive(Debug, Serialize)]
pub struct PackageOutcome {
    pub name: String,
    /// The manifest version after the run.
    pub package_version: Option<String>,
    /// The published identifier handed to consuming packages
    /// (consumed packages only).
    pub consumed_version: Option<String>,
    pub commit_sha: Option<CommitHash>,
    pub latest_tag: Option<String>,
    pub latest_commit_message: Option<String>,
    pub git: Option<GitSummary>,
    /// Ordered log of operation outcomes.
    pub actions: Vec<String>,
}

/// A repository left out of the run, with its last-known state for
/// audit visibility.
#[derive(Debug, Serialize)]
pub struct SkippedRepo {
    pub name: String,
    pub git: Option<GitSummary>,
}

/// The structured result of a run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub processed: Vec<PackageOutcome>,
    pub skipped: Vec<SkippedRepo>,
}

/// The release orchestrator.
pub struct Propagator {
    branch_lock: BranchLockTable,
    consumed: Vec<PackageConfig>,
    consuming: Vec<PackageConfig>,
    skipped: Vec<SkippedRepo>,
    verbosity: Verbosity,
    dry_run: bool,
}

impl Propagator {
    /// Build a propagator from a validated configuration.
    ///
    /// `base` is the directory package paths are relative to (the
    /// configuration file's directory). Skip-marked packages are set
    /// aside for the audit list and never resolved against the
    /// filesystem.
    pub fn from_config(
        config: &RunConfig,
        base: &Path,
        verbosity: Verbosity,
    ) -> Result<Self, crate::core::config::ConfigError> {
        let mut skipped = Vec::new();
        let mut resolve_set = |raws: &[crate::core::config::RawPackageConfig],
                               fallback: LogColor|
         -> Result<Vec<PackageConfig>, crate::core::config::ConfigError> {
            let mut resolved = Vec::new();
            for raw in raws {
                if raw.skip {
                    let path = base.join(&raw.path);
                    let name = raw.name.clone().unwrap_or_else(|| {
                        path.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| raw.path.clone())
                    });
                    skipped.push(SkippedRepo {
                        git: git_summary(&path),
                        name,
                    });
                    continue;
                }
                resolved.push(PackageConfig::resolve(raw, base, fallback)?);
            }
            Ok(resolved)
        };

        let consumed = resolve_set(&config.consumed, LogColor::Cyan)?;
        let consuming = resolve_set(&config.consuming, LogColor::Blue)?;

        Ok(Self {
            branch_lock: config.branch_lock.clone(),
            consumed,
            consuming,
            skipped,
            verbosity,
            dry_run: false,
        })
    }

    /// Build a propagator from already-resolved parts.
    pub fn new(
        branch_lock: BranchLockTable,
        consumed: Vec<PackageConfig>,
        consuming: Vec<PackageConfig>,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            branch_lock,
            consumed,
            consuming,
            skipped: Vec::new(),
            verbosity,
            dry_run: false,
        }
    }

    /// Enable dry-run mode: stop after synchronization, mutate nothing.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    fn participants(&self) -> impl Iterator<Item = &PackageConfig> {
        self.consumed.iter().chain(self.consuming.iter())
    }

    /// Run the full release.
    pub async fn run(mut self) -> Result<RunReport, PropagateError> {
        // Phase 1: resolve the branch lock.
        let row = self.resolve_branch_lock()?;
        output::header("BRANCH LOCK SUMMARY", self.verbosity);
        output::print(
            "The following is a breakdown of which branches will be updated in the listed repos.",
            self.verbosity,
        );
        let names: Vec<&str> = self.participants().map(|p| p.name.as_str()).collect();
        let display = row.restricted_to(names.iter().copied());
        output::print(
            serde_json::to_string_pretty(&display).expect("branch lock row serializes"),
            self.verbosity,
        );

        // Phase 2: synchronize every participant.
        output::header("PRELIMINARY CHECKS STARTED", self.verbosity);
        let excluded = self.synchronize_all(Arc::new(row)).await?;
        let mut excluded_skips = Vec::new();
        for name in &excluded {
            output::warn(
                format!("{name} failed preliminary checks and is excluded from this run"),
                self.verbosity,
            );
            let path = self
                .participants()
                .find(|p| p.name == *name)
                .map(|p| p.path.clone());
            excluded_skips.push(SkippedRepo {
                git: path.as_deref().and_then(git_summary),
                name: name.clone(),
            });
        }
        self.consumed.retain(|p| !excluded.contains(&p.name));
        self.consuming.retain(|p| !excluded.contains(&p.name));
        self.skipped.extend(excluded_skips);

        if self.dry_run {
            output::print("Dry run: stopping before any mutation.", self.verbosity);
            return Ok(self.collect(Vec::new()));
        }

        output::header(
            "PRELIMINARY CHECKS COMPLETED, UPDATING CONSUMING PACKAGES",
            self.verbosity,
        );

        // Phase 3: publish the consumed set. Phase 4 is the join below:
        // every published version is known before any consumer reads one.
        let (mut outcomes, published) = self.publish_consumed().await;

        // Phase 5: update the consuming set.
        let published = Arc::new(published);
        outcomes.extend(self.update_consuming(published).await);

        // Phase 6: collect.
        Ok(self.collect(outcomes))
    }

    fn resolve_branch_lock(&self) -> Result<BranchLockRow, PropagateError> {
        let mut live = BTreeMap::new();
        for package in self.participants() {
            let git = Git::open(&package.path).map_err(|source| PropagateError::Git {
                repo: package.name.clone(),
                source,
            })?;
            let branch = git.current_branch().map_err(|source| PropagateError::Git {
                repo: package.name.clone(),
                source,
            })?;
            live.insert(package.name.clone(), branch.to_string());
        }
        Ok(branch_lock::resolve(&live, &self.branch_lock)?.clone())
    }

    /// Synchronize every participant in parallel. Returns the names of
    /// repositories excluded from later phases.
    ///
    /// A failure on a repository that will be committed or pushed aborts
    /// the run; any other failure merely excludes that repository.
    async fn synchronize_all(
        &self,
        row: Arc<BranchLockRow>,
    ) -> Result<BTreeSet<String>, PropagateError> {
        let mut tasks: JoinSet<(String, bool, Result<Vec<String>, SyncError>)> = JoinSet::new();
        for package in self.participants() {
            let name = package.name.clone();
            let path = package.path.clone();
            let will_commit = package.commit || package.push;
            let row = row.clone();
            tasks.spawn_blocking(move || {
                let result = (|| {
                    let required = row.required_branch(&name).map_err(|e| SyncError::Config {
                        repo: name.clone(),
                        message: e.to_string(),
                    })?;
                    let required = BranchName::new(required).map_err(|e| SyncError::Config {
                        repo: name.clone(),
                        message: e.to_string(),
                    })?;
                    let git = Git::open(&path).map_err(|source| SyncError::Git {
                        repo: name.clone(),
                        source,
                    })?;
                    synchronize(&git, &name, &required, will_commit).map(|outcome| outcome.log)
                })();
                (name, will_commit, result)
            });
        }

        let colors: BTreeMap<String, LogColor> = self
            .participants()
            .map(|p| (p.name.clone(), p.color))
            .collect();

        let mut excluded = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, will_commit, result) =
                joined.map_err(|e| PropagateError::Task(e.to_string()))?;
            let color = colors.get(&name).copied().unwrap_or_default();
            match result {
                Ok(log) => {
                    for line in log {
                        output::repo_line(color, &name, line, self.verbosity);
                    }
                }
                Err(err) if will_commit => return Err(err.into()),
                Err(err) => {
                    output::error(err);
                    excluded.insert(name);
                }
            }
        }
        Ok(excluded)
    }

    /// Phase 3: one task per consumed package. Failures are logged and
    /// dropped; successes contribute a published version.
    async fn publish_consumed(&self) -> (Vec<PackageOutcome>, Vec<PublishedVersion>) {
        let mut tasks: JoinSet<Result<PackageOutcome, PropagateError>> = JoinSet::new();
        for package in &self.consumed {
            let cfg = package.clone();
            let verbosity = self.verbosity;
            tasks.spawn_blocking(move || publish_consumed_package(cfg, verbosity));
        }

        let mut outcomes = Vec::new();
        let mut published = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    if let Some(version) = outcome.consumed_version.clone() {
                        // The outcome name is the display name; the
                        // manifest key travels with the config.
                        if let Some(cfg) = self.consumed.iter().find(|c| c.name == outcome.name) {
                            published.push(PublishedVersion {
                                package_name: cfg.package_name.clone(),
                                version,
                            });
                        }
                    }
                    outcomes.push(outcome);
                }
                Ok(Err(err)) => output::error(err),
                Err(err) => output::error(PropagateError::Task(err.to_string())),
            }
        }
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));
        (outcomes, published)
    }

    /// Phase 5: one task per consuming package, each reading the full
    /// published list assembled behind the phase barrier.
    async fn update_consuming(
        &self,
        published: Arc<Vec<PublishedVersion>>,
    ) -> Vec<PackageOutcome> {
        let mut tasks: JoinSet<Result<PackageOutcome, PropagateError>> = JoinSet::new();
        for package in &self.consuming {
            let cfg = package.clone();
            let verbosity = self.verbosity;
            let published = published.clone();
            tasks.spawn_blocking(move || update_consuming_package(cfg, &published, verbosity));
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(err)) => output::error(err),
                Err(err) => output::error(PropagateError::Task(err.to_string())),
            }
        }
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));
        outcomes
    }

    fn collect(self, processed: Vec<PackageOutcome>) -> RunReport {
        RunReport {
            processed,
            skipped: self.skipped,
        }
    }
}

/// Stage, commit, and push one package per its flags, appending outcome
/// strings to its action log.
fn commit_and_push(
    git: &Git,
    cfg: &PackageConfig,
    actions: &mut Vec<String>,
    verbosity: Verbosity,
) -> Result<(), PropagateError> {
    if cfg.commit {
        git.add_all().map_err(|source| {
            actions.push("Committing failed".to_string());
            PropagateError::Git {
                repo: cfg.name.clone(),
                source,
            }
        })?;
        let (amend, no_edit) = match cfg.amend {
            crate::core::config::AmendMode::Off => (false, false),
            crate::core::config::AmendMode::Amend => (true, false),
            crate::core::config::AmendMode::NoEdit => (true, true),
        };
        match git.commit(&cfg.commit_message, amend, no_edit) {
            Ok(Some(sha)) => {
                actions.push("Committing succeeded".to_string());
                output::repo_line(
                    cfg.color,
                    &cfg.name,
                    format!("Added commit {}", sha.short(7)),
                    verbosity,
                );
            }
            Ok(None) => {
                actions.push("Nothing to commit".to_string());
                output::repo_line(cfg.color, &cfg.name, "Nothing to commit", verbosity);
            }
            Err(source) => {
                actions.push("Committing failed".to_string());
                return Err(PropagateError::Git {
                    repo: cfg.name.clone(),
                    source,
                });
            }
        }
    } else {
        output::repo_line(cfg.color, &cfg.name, "code not committed.", verbosity);
    }

    if cfg.push {
        match git.push(cfg.amend.is_amend()) {
            Ok(()) => {
                actions.push("Pushing succeeded".to_string());
                let message = if cfg.amend.is_amend() {
                    "Force pushed code"
                } else {
                    "Pushed code"
                };
                output::repo_line(cfg.color, &cfg.name, message, verbosity);
            }
            Err(source) => {
                actions.push("Pushing failed".to_string());
                return Err(PropagateError::Git {
                    repo: cfg.name.clone(),
                    source,
                });
            }
        }
    } else if cfg.commit {
        output::repo_line(
            cfg.color,
            &cfg.name,
            "code committed but not pushed.",
            verbosity,
        );
    }
    Ok(())
}

/// Bump the version in every configured manifest sub-path, reusing the
/// version computed from the first.
fn bump_manifests(
    cfg: &PackageConfig,
    actions: &mut Vec<String>,
    verbosity: Verbosity,
) -> Result<String, PropagateError> {
    let now = Utc::now();
    let mut new_version: Option<String> = None;
    for sub in &cfg.manifest_paths {
        let dir = cfg.manifest_dir(sub);
        let mut manifest = Manifest::load(&dir).map_err(|source| PropagateError::Manifest {
            repo: cfg.name.clone(),
            source,
        })?;
        let version = match &new_version {
            None => {
                let bumped =
                    manifest
                        .bump(cfg.bump, now)
                        .map_err(|source| PropagateError::Manifest {
                            repo: cfg.name.clone(),
                            source,
                        })?;
                new_version = Some(bumped.clone());
                bumped
            }
            Some(version) => {
                manifest.set_version(version);
                version.clone()
            }
        };
        manifest
            .save()
            .map_err(|source| PropagateError::Manifest {
                repo: cfg.name.clone(),
                source,
            })?;
        output::repo_line(
            cfg.color,
            &cfg.name,
            format!("Bumped version to {version}"),
            verbosity,
        );
    }
    let version = new_version.expect("manifest_paths is validated non-empty");
    actions.push(format!("Bumped version to {version}"));
    Ok(version)
}

/// Read back the package's collectible state after its mutations.
fn read_back(
    git: &Git,
    cfg: &PackageConfig,
    consumed_version: Option<String>,
    actions: Vec<String>,
) -> Result<PackageOutcome, PropagateError> {
    let info = git.latest_commit().map_err(|source| PropagateError::Git {
        repo: cfg.name.clone(),
        source,
    })?;
    let latest_tag = git.latest_tag().map_err(|source| PropagateError::Git {
        repo: cfg.name.clone(),
        source,
    })?;
    let package_version = Manifest::load(&cfg.manifest_dir(&cfg.manifest_paths[0]))
        .ok()
        .and_then(|m| m.version().map(str::to_string));
    Ok(PackageOutcome {
        name: cfg.name.clone(),
        package_version,
        consumed_version,
        commit_sha: Some(info.hash),
        latest_commit_message: Some(info.summary),
        latest_tag,
        git: git_summary(&cfg.path),
        actions,
    })
}

/// Phase-3 work for one consumed package.
fn publish_consumed_package(
    cfg: PackageConfig,
    verbosity: Verbosity,
) -> Result<PackageOutcome, PropagateError> {
    let git = Git::open(&cfg.path).map_err(|source| PropagateError::Git {
        repo: cfg.name.clone(),
        source,
    })?;
    let mut actions = Vec::new();

    let new_version = bump_manifests(&cfg, &mut actions, verbosity)?;
    commit_and_push(&git, &cfg, &mut actions, verbosity)?;

    let consumed_version = match cfg.version_source {
        VersionSource::PackageVersion => Some(new_version.clone()),
        VersionSource::CommitHash => Some(
            git.latest_commit()
                .map_err(|source| PropagateError::Git {
                    repo: cfg.name.clone(),
                    source,
                })?
                .hash
                .to_string(),
        ),
        VersionSource::LatestTag => git.latest_tag().map_err(|source| PropagateError::Git {
            repo: cfg.name.clone(),
            source,
        })?,
    };

    if cfg.tag {
        let tag_name = format!("v{new_version}");
        git.tag(&tag_name).map_err(|source| {
            actions.push("Tagging failed".to_string());
            PropagateError::Git {
                repo: cfg.name.clone(),
                source,
            }
        })?;
        actions.push(format!("Tagged {tag_name}"));
        output::repo_line(cfg.color, &cfg.name, format!("Tagged {tag_name}"), verbosity);
    }

    read_back(&git, &cfg, consumed_version, actions)
}

/// Rewrite one published dependency across a consuming package's
/// manifests. Errors when no manifest declares it.
fn update_dependency(
    cfg: &PackageConfig,
    published: &PublishedVersion,
    actions: &mut Vec<String>,
    verbosity: Verbosity,
) -> Result<(), PropagateError> {
    let mut declared_anywhere = false;
    for sub in &cfg.manifest_paths {
        let dir = cfg.manifest_dir(sub);
        let mut manifest = Manifest::load(&dir).map_err(|source| PropagateError::Manifest {
            repo: cfg.name.clone(),
            source,
        })?;
        let mut changed = false;
        for kind in DependencyKind::ALL {
            let Some(existing) = manifest
                .dependency(kind, &published.package_name)
                .map(str::to_string)
            else {
                continue;
            };
            declared_anywhere = true;
            match rewrite_specifier(&existing, &published.version) {
                Some(rewritten) => {
                    manifest.set_dependency(kind, &published.package_name, &rewritten);
                    changed = true;
                    actions.push(format!(
                        "Updated {} to {rewritten}",
                        published.package_name
                    ));
                    output::repo_line(
                        cfg.color,
                        &cfg.name,
                        format!("Updated version of {} to {rewritten}", published.package_name),
                        verbosity,
                    );
                }
                None => {
                    actions.push(format!(
                        "{} already set to {}, no update required",
                        published.package_name, published.version
                    ));
                    output::repo_line(
                        cfg.color,
                        &cfg.name,
                        format!(
                            "Version already set to {}, no update required.",
                            published.version
                        ),
                        verbosity,
                    );
                }
            }
        }
        if changed {
            manifest
                .save()
                .map_err(|source| PropagateError::Manifest {
                    repo: cfg.name.clone(),
                    source,
                })?;
        }
    }
    if !declared_anywhere {
        return Err(PropagateError::MissingDependency {
            repo: cfg.name.clone(),
            dependency: published.package_name.clone(),
        });
    }
    Ok(())
}

/// Rewrite every published dependency across one package's manifests,
/// without committing anything. Returns the ordered action log.
///
/// This is the idempotent half of the consuming-package update: calling
/// it again with unchanged versions writes nothing and logs the
/// "already set" outcome per dependency.
pub fn apply_published(
    cfg: &PackageConfig,
    published: &[PublishedVersion],
    verbosity: Verbosity,
) -> Result<Vec<String>, PropagateError> {
    let mut actions = Vec::new();
    for version in published {
        update_dependency(cfg, version, &mut actions, verbosity)?;
    }
    Ok(actions)
}

/// Phase-5 work for one consuming package.
fn update_consuming_package(
    cfg: PackageConfig,
    published: &[PublishedVersion],
    verbosity: Verbosity,
) -> Result<PackageOutcome, PropagateError> {
    let git = Git::open(&cfg.path).map_err(|source| PropagateError::Git {
        repo: cfg.name.clone(),
        source,
    })?;
    let mut actions = apply_published(&cfg, published, verbosity)?;

    let new_version = bump_manifests(&cfg, &mut actions, verbosity)?;
    commit_and_push(&git, &cfg, &mut actions, verbosity)?;

    if cfg.tag {
        let tag_name = format!("v{new_version}");
        git.tag(&tag_name).map_err(|source| {
            actions.push("Tagging failed".to_string());
            PropagateError::Git {
                repo: cfg.name.clone(),
                source,
            }
        })?;
        actions.push(format!("Tagged {tag_name}"));
        output::repo_line(cfg.color, &cfg.name, format!("Tagged {tag_name}"), verbosity);
    }

    read_back(&git, &cfg, None, actions)
}
