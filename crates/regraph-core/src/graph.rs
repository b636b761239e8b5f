use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::builder::GraphBuilder;
use crate::collector::{DependencyCollector, EdgeSet};
use crate::error::{GraphError, Result};
use crate::identity::{ProjectIdentity, TypeIdentityKey, UnitHash, UnitPath};

/// Paths of the source units that depend on one master unit or type.
/// Never stored empty: a bucket whose last dependent leaves is pruned.
pub type DependentSet = FxHashSet<UnitPath>;

/// Reverse-index entry for one master source unit: the content hash it had
/// when its dependents were analyzed, and who depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitBucket {
    pub(crate) hash: UnitHash,
    pub(crate) dependents: DependentSet,
}

impl UnitBucket {
    pub fn hash(&self) -> UnitHash {
        self.hash
    }

    pub fn dependents(&self) -> &DependentSet {
        &self.dependents
    }
}

/// Reverse index for one master project: master unit path -> bucket, and
/// master type key -> dependent set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGraph {
    pub(crate) units: FxHashMap<UnitPath, Arc<UnitBucket>>,
    pub(crate) types: FxHashMap<TypeIdentityKey, Arc<DependentSet>>,
}

impl ProjectGraph {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.types.is_empty()
    }

    pub fn unit_bucket(&self, master: &Path) -> Option<&Arc<UnitBucket>> {
        self.units.get(master)
    }

    pub fn type_bucket(&self, key: &TypeIdentityKey) -> Option<&Arc<DependentSet>> {
        self.types.get(key)
    }

    pub fn master_units(&self) -> impl Iterator<Item = (&UnitPath, &Arc<UnitBucket>)> {
        self.units.iter()
    }

    pub fn master_types(&self) -> impl Iterator<Item = (&TypeIdentityKey, &Arc<DependentSet>)> {
        self.types.iter()
    }
}

/// Immutable snapshot of the cross-project dependency graph for one tracked
/// project.
///
/// A snapshot is created once and only ever replaced by [`DependencyGraph::update`],
/// which returns a new snapshot sharing every untouched sub-structure with
/// its predecessor by `Arc`. Readers of a published snapshot are never
/// affected by later updates, so any number of threads may hold and read old
/// snapshots while a new one is being built.
///
/// Two indexes are kept: the reverse index (master project -> master unit or
/// type -> dependents), which serves invalidation, and a forward index
/// (dependent path -> its last reported [`EdgeSet`]), which lets `update`
/// detect unchanged dependents and compute bucket removals without a full
/// graph scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub(crate) projects: FxHashMap<ProjectIdentity, Arc<ProjectGraph>>,
    pub(crate) dependents: FxHashMap<UnitPath, Arc<EdgeSet>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consolidate one analysis pass into the next snapshot.
    ///
    /// * Dependents whose reported edges structurally equal their previous
    ///   edges keep their sub-structures untouched (shared by reference).
    /// * Changed dependents are unlinked from buckets they no longer
    ///   reference and linked into newly referenced ones; buckets and project
    ///   sub-graphs that become empty are pruned.
    /// * Paths present in `current_units` but absent from the collector no
    ///   longer have dependencies and are removed entirely. Tracked paths
    ///   that left `current_units` were deleted outright and are removed
    ///   as well.
    ///
    /// Exactly one thread performs the update for a given project per pass;
    /// the batch is short and always runs to completion.
    pub fn update(
        &self,
        current_units: &FxHashSet<UnitPath>,
        collector: DependencyCollector,
    ) -> DependencyGraph {
        collector.freeze();

        let mut builder = GraphBuilder::new(self);
        let mut reported: FxHashSet<UnitPath> = FxHashSet::default();

        for (dependent, edges) in collector.into_edge_sets() {
            reported.insert(dependent.clone());
            builder.record(dependent, edges);
        }

        for path in current_units {
            if !reported.contains(path) {
                builder.remove_dependent(path.as_path());
            }
        }

        // Tracked dependents that left the unit list were deleted.
        let deleted: Vec<UnitPath> = self
            .dependents
            .keys()
            .filter(|path| !current_units.contains(*path) && !reported.contains(*path))
            .cloned()
            .collect();
        for path in deleted {
            builder.remove_dependent(path.as_path());
        }

        let next = builder.into_snapshot();
        debug!(
            "dependency graph updated: {} projects, {} dependents",
            next.projects.len(),
            next.dependents.len()
        );
        next
    }

    /// Dependents of one master source unit, if any are recorded.
    pub fn dependents_of_unit(
        &self,
        project: &ProjectIdentity,
        master: &Path,
    ) -> Option<&DependentSet> {
        self.projects
            .get(project)?
            .units
            .get(master)
            .map(|bucket| &bucket.dependents)
    }

    /// Dependents of one partial type, if any are recorded.
    ///
    /// Partial-type invalidation is driven by the host: it knows which
    /// declared types changed and unions these sets itself.
    pub fn dependents_of_type(
        &self,
        project: &ProjectIdentity,
        key: &TypeIdentityKey,
    ) -> Option<&DependentSet> {
        self.projects
            .get(project)?
            .types
            .get(key)
            .map(|set| set.as_ref())
    }

    /// The last reported edge set of one dependent path.
    pub fn edge_set(&self, dependent: &Path) -> Option<&Arc<EdgeSet>> {
        self.dependents.get(dependent)
    }

    /// Reverse sub-graph of one master project.
    pub fn project_graph(&self, project: &ProjectIdentity) -> Option<&Arc<ProjectGraph>> {
        self.projects.get(project)
    }

    /// Master projects with at least one recorded edge.
    pub fn projects(&self) -> impl Iterator<Item = &ProjectIdentity> {
        self.projects.keys()
    }

    /// Number of dependent paths tracked.
    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.dependents.is_empty()
    }

    /// Serialize the snapshot to binary format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(GraphError::from)
    }

    /// Deserialize a snapshot from binary format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(GraphError::from)
    }
}
