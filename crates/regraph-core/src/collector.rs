use dashmap::DashMap;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::identity::{ProjectIdentity, TypeIdentityKey, UnitHash, UnitPath};

/// Everything one dependent source unit was observed to depend on during a
/// single analysis pass: master units (with their content hash at analysis
/// time) and partial types, both grouped by master project.
///
/// Structural equality compares master paths, hashes, and type keys; `update`
/// uses it to detect dependents whose edges did not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSet {
    pub(crate) units: FxHashMap<ProjectIdentity, FxHashMap<UnitPath, UnitHash>>,
    pub(crate) types: FxHashMap<ProjectIdentity, FxHashSet<TypeIdentityKey>>,
}

impl EdgeSet {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.types.is_empty()
    }

    /// Number of master-unit edges.
    pub fn unit_edge_count(&self) -> usize {
        self.units.values().map(|units| units.len()).sum()
    }

    /// Number of partial-type edges.
    pub fn type_edge_count(&self) -> usize {
        self.types.values().map(|keys| keys.len()).sum()
    }

    /// Look up the content hash recorded for a master unit.
    pub fn unit_hash(&self, project: &ProjectIdentity, master: &UnitPath) -> Option<UnitHash> {
        self.units.get(project)?.get(master.as_path()).copied()
    }

    /// Whether a partial-type edge was recorded.
    pub fn depends_on_type(&self, project: &ProjectIdentity, key: &TypeIdentityKey) -> bool {
        self.types
            .get(project)
            .is_some_and(|keys| keys.contains(key))
    }
}

/// Per-pass, thread-safe accumulator of discovered dependency edges.
///
/// Many source units are analyzed in parallel and all report into one
/// collector per compilation pass, so edges land in a sharded concurrent map
/// keyed by dependent path; each shard's lock covers that dependent's edge
/// set, which keeps contention local to units that happen to share a shard.
///
/// A collector is write-once-read-once: its contents are drained by
/// [`DependencyCollector::into_edge_sets`] (normally via
/// `DependencyGraph::update`) and never reused across passes.
pub struct DependencyCollector {
    /// Identity of the project whose units are being analyzed.
    project: ProjectIdentity,
    edges: DashMap<UnitPath, EdgeSet, FxBuildHasher>,
    /// Set by `freeze`; mutation is rejected afterwards in debug builds only.
    frozen: AtomicBool,
}

impl DependencyCollector {
    pub fn new(project: ProjectIdentity) -> Self {
        Self {
            project,
            edges: DashMap::with_hasher(FxBuildHasher::default()),
            frozen: AtomicBool::new(false),
        }
    }

    /// Identity of the project under analysis.
    pub fn project(&self) -> &ProjectIdentity {
        &self.project
    }

    /// Record that `dependent` depends on the master unit
    /// `master_project`/`master_path` whose content hashed to `master_hash`.
    ///
    /// Idempotent: reporting the same edge twice is a no-op. Reporting two
    /// different hashes for the same master unit under one dependent is an
    /// invariant violation (a bug in edge discovery) and fails fast.
    pub fn add_unit_dependency(
        &self,
        dependent: UnitPath,
        master_project: ProjectIdentity,
        master_path: UnitPath,
        master_hash: UnitHash,
    ) {
        self.assert_mutable();

        let mut edges = self.edges.entry(dependent).or_default();
        let units = edges.units.entry(master_project).or_default();
        if let Some(previous) = units.insert(master_path.clone(), master_hash) {
            assert_eq!(
                previous, master_hash,
                "conflicting content hashes reported for master unit {}",
                master_path
            );
        }
    }

    /// Record that `dependent` depends on a partial type defined in
    /// `master_project`. Idempotent and safe to call concurrently.
    pub fn add_type_dependency(
        &self,
        dependent: UnitPath,
        master_project: ProjectIdentity,
        type_key: TypeIdentityKey,
    ) {
        self.assert_mutable();

        let mut edges = self.edges.entry(dependent).or_default();
        edges.types.entry(master_project).or_default().insert(type_key);
    }

    /// Transition the collector to read-only.
    ///
    /// Debug-only lifecycle guard: subsequent mutation attempts trip a
    /// `debug_assert`. Exists to catch use-after-finalize bugs during
    /// development, not to provide production safety.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Number of dependent paths with at least one recorded edge.
    pub fn dependent_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drain the accumulated edges, grouped by dependent path.
    pub fn into_edge_sets(self) -> impl Iterator<Item = (UnitPath, EdgeSet)> {
        self.edges.into_iter()
    }

    fn assert_mutable(&self) {
        debug_assert!(
            !self.frozen.load(Ordering::Acquire),
            "dependency collector mutated after freeze"
        );
    }
}
