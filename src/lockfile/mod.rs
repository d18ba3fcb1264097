//! lockfile
//!
//! Reading pnpm lock snapshots and joining them with manifests.
//!
//! The lock snapshot is the resolved, exact record of every dependency's
//! installed version or hash, distinct from the manifest's looser range
//! declarations. [`snapshot`] holds the typed YAML schema; [`reader`]
//! joins a snapshot with the subtree's manifest into flat
//! [`DependencyRecord`] rows, handling workspace importers and `link:`
//! entries.

mod reader;
mod snapshot;

pub use reader::{
    find_dependency, load_dependencies, load_link_children, load_snapshot, lock_version,
    DependencyRecord, LockReadError,
};
pub use snapshot::{artifact_name, artifact_version, LockEntry, LockSnapshot, PackageEntry};
