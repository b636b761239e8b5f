use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::graph::{DependencyGraph, DependentSet};
use crate::identity::{ContentHash, Fingerprint, UnitHash, UnitPath};

/// Host-supplied view of the referenced projects as they are *now*: one
/// overall fingerprint per project, plus per-unit content hashes for the
/// units the host actually inspected.
#[derive(Debug, Clone, Default)]
pub struct ReferencedProjects {
    projects: FxHashMap<Arc<str>, ProjectState>,
}

/// Current fingerprint and unit hashes of one referenced project.
#[derive(Debug, Clone)]
pub struct ProjectState {
    fingerprint: Fingerprint,
    unit_hashes: FxHashMap<UnitPath, ContentHash>,
}

impl ProjectState {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            unit_hashes: FxHashMap::default(),
        }
    }

    pub fn insert_unit_hash(&mut self, path: UnitPath, hash: ContentHash) {
        self.unit_hashes.insert(path, hash);
    }
}

impl ReferencedProjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a referenced project's current fingerprint, returning its
    /// state so unit hashes can be added.
    pub fn insert_project(
        &mut self,
        name: impl Into<Arc<str>>,
        fingerprint: Fingerprint,
    ) -> &mut ProjectState {
        self.projects
            .entry(name.into())
            .or_insert_with(|| ProjectState::new(fingerprint))
    }

    pub fn get(&self, name: &str) -> Option<&ProjectState> {
        self.projects.get(name)
    }
}

/// Outcome of an invalidation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationResult {
    /// A referenced project's compile-time shape changed in a way too broad
    /// to diff per unit; every previously computed result for the tracked
    /// project must be recomputed. `invalidated_paths` is meaningless when
    /// this is set.
    pub whole_configuration_invalidated: bool,

    /// Dependent source units whose analysis results must be recomputed.
    pub invalidated_paths: FxHashSet<UnitPath>,
}

impl InvalidationResult {
    pub fn whole_configuration() -> Self {
        Self {
            whole_configuration_invalidated: true,
            invalidated_paths: FxHashSet::default(),
        }
    }

    pub fn units(invalidated_paths: FxHashSet<UnitPath>) -> Self {
        Self {
            whole_configuration_invalidated: false,
            invalidated_paths,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.whole_configuration_invalidated && self.invalidated_paths.is_empty()
    }
}

/// Engine for computing which dependent source units need recomputation
/// after the referenced projects changed.
pub struct InvalidationEngine<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> InvalidationEngine<'a> {
    /// Create a new invalidation engine over a snapshot.
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Compute the invalidated set.
    ///
    /// 1. A referenced project whose fingerprint changed short-circuits into
    ///    whole-configuration invalidation.
    /// 2. Otherwise every master unit whose stored content hash differs from
    ///    the current one contributes its dependent set.
    ///
    /// A project or unit missing from `current` is treated as "that edge is
    /// no longer needed": references legitimately disappear when code is
    /// deleted. Read-only over the graph; safe to call concurrently with
    /// other readers.
    pub fn compute(&self, current: &ReferencedProjects) -> InvalidationResult {
        let mut invalidated: FxHashSet<UnitPath> = FxHashSet::default();

        for (identity, project) in &self.graph.projects {
            let Some(state) = current.get(identity.name()) else {
                warn!(
                    "referenced project {} no longer present; dropping its edges",
                    identity.name()
                );
                continue;
            };

            if state.fingerprint != identity.fingerprint() {
                info!(
                    "fingerprint of {} changed; invalidating whole configuration",
                    identity.name()
                );
                return InvalidationResult::whole_configuration();
            }

            for (master, bucket) in &project.units {
                let UnitHash::Content(stored) = bucket.hash() else {
                    continue;
                };
                match state.unit_hashes.get(master.as_path()) {
                    Some(current_hash) if *current_hash != stored => {
                        self.collect(bucket.dependents(), &mut invalidated);
                    }
                    Some(_) => {}
                    None => {
                        debug!(
                            "master unit {} of {} not found; treating its edges as removed",
                            master,
                            identity.name()
                        );
                    }
                }
            }
        }

        InvalidationResult::units(invalidated)
    }

    fn collect(&self, dependents: &DependentSet, invalidated: &mut FxHashSet<UnitPath>) {
        for dependent in dependents {
            invalidated.insert(dependent.clone());
        }
    }
}

/// Compute which dependent source units must be recomputed given a snapshot
/// and the current state of all referenced projects.
pub fn compute_invalidated(
    graph: &DependencyGraph,
    current: &ReferencedProjects,
) -> InvalidationResult {
    InvalidationEngine::new(graph).compute(current)
}
