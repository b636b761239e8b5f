//! Incremental cross-project dependency graph and invalidation engine.
//!
//! After an edit to one source file in a multi-project build, this crate
//! decides exactly which previously computed analysis results must be
//! recomputed. Analysis threads report discovered edges into a per-pass
//! [`DependencyCollector`]; `DependencyGraph::update` consolidates one pass
//! into the next immutable snapshot with structural sharing; and
//! [`compute_invalidated`] diffs a snapshot against the referenced projects'
//! current hashes to produce the recomputation set.
//!
//! Identities cross process boundaries as pure value hashes
//! ([`ProjectIdentity`], [`TypeIdentityKey`]), so a snapshot persisted by
//! [`GraphStore`] is usable by a later process without shared symbol tables.

mod builder;
mod collector;
mod error;
mod graph;
mod hash;
mod identity;
mod invalidation;
mod store;

pub use collector::{DependencyCollector, EdgeSet};
pub use error::{GraphError, Result};
pub use graph::{DependencyGraph, DependentSet, ProjectGraph, UnitBucket};
pub use hash::{fingerprint_bytes, fingerprint_config, hash_bytes, hash_file};
pub use identity::{
    ContentHash, Fingerprint, ProjectIdentity, TypeIdentityKey, UnitHash, UnitPath,
};
pub use invalidation::{
    compute_invalidated, InvalidationEngine, InvalidationResult, ProjectState, ReferencedProjects,
};
pub use store::{GraphStore, GRAPH_FORMAT_VERSION, SNAPSHOT_FILE_NAME, STORE_DIR_NAME};
