use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Arc;

use crate::collector::EdgeSet;
use crate::graph::{DependencyGraph, DependentSet, ProjectGraph, UnitBucket};
use crate::identity::{ProjectIdentity, TypeIdentityKey, UnitHash, UnitPath};

/// Short-lived, single-owner mutation scope backing `DependencyGraph::update`.
///
/// Starts as a shallow clone of the previous snapshot (outer maps of `Arc`s)
/// and mutates sub-structures through `Arc::make_mut`: a touched project
/// sub-graph or bucket that is still shared with the previous snapshot is
/// copied exactly once per batch, after which the builder holds the unique
/// reference and further mutation is in place. Untouched branches keep their
/// previous `Arc` and end up shared by pointer in the next snapshot.
pub(crate) struct GraphBuilder {
    projects: FxHashMap<ProjectIdentity, Arc<ProjectGraph>>,
    dependents: FxHashMap<UnitPath, Arc<EdgeSet>>,
    /// Master hashes seen so far in this batch, for cross-dependent
    /// consistency checking.
    batch_hashes: FxHashMap<(ProjectIdentity, UnitPath), UnitHash>,
}

impl GraphBuilder {
    pub(crate) fn new(prev: &DependencyGraph) -> Self {
        Self {
            projects: prev.projects.clone(),
            dependents: prev.dependents.clone(),
            batch_hashes: FxHashMap::default(),
        }
    }

    /// Apply one dependent's reported edge set.
    pub(crate) fn record(&mut self, dependent: UnitPath, edges: EdgeSet) {
        self.check_batch_consistency(&edges);

        if edges.is_empty() {
            self.remove_dependent(dependent.as_path());
            return;
        }

        if let Some(previous) = self.dependents.get(&dependent) {
            if previous.as_ref() == &edges {
                // Structurally unchanged: reuse the previous sub-structure.
                return;
            }
            let previous = Arc::clone(previous);
            self.unlink_stale(&dependent, &previous, &edges);
        }

        self.link(&dependent, &edges);
        self.dependents.insert(dependent, Arc::new(edges));
    }

    /// Remove a dependent and all its contributions. No-op if untracked.
    pub(crate) fn remove_dependent(&mut self, dependent: &Path) {
        let Some(old) = self.dependents.remove(dependent) else {
            return;
        };

        for (project, units) in &old.units {
            for master in units.keys() {
                self.remove_from_unit_bucket(project, master, dependent);
            }
        }
        for (project, keys) in &old.types {
            for key in keys {
                self.remove_from_type_bucket(project, key, dependent);
            }
        }
    }

    /// Produce the next immutable snapshot.
    pub(crate) fn into_snapshot(self) -> DependencyGraph {
        let next = DependencyGraph {
            projects: self.projects,
            dependents: self.dependents,
        };

        #[cfg(debug_assertions)]
        for project in next.projects.values() {
            debug_assert!(!project.is_empty(), "empty project sub-graph not pruned");
            for bucket in project.units.values() {
                debug_assert!(!bucket.dependents.is_empty(), "empty unit bucket not pruned");
            }
            for dependents in project.types.values() {
                debug_assert!(!dependents.is_empty(), "empty type bucket not pruned");
            }
        }

        next
    }

    /// Within one batch a master unit has exactly one content hash; two
    /// different hashes mean edge discovery is broken.
    fn check_batch_consistency(&mut self, edges: &EdgeSet) {
        for (project, units) in &edges.units {
            for (master, hash) in units {
                match self
                    .batch_hashes
                    .entry((project.clone(), master.clone()))
                {
                    Entry::Occupied(seen) => assert_eq!(
                        *seen.get(),
                        *hash,
                        "conflicting content hashes for master unit {} in one update batch",
                        master
                    ),
                    Entry::Vacant(slot) => {
                        slot.insert(*hash);
                    }
                }
            }
        }
    }

    /// Remove the dependent from every bucket its old edges referenced that
    /// its new edges no longer do.
    fn unlink_stale(&mut self, dependent: &UnitPath, old: &EdgeSet, new: &EdgeSet) {
        for (project, units) in &old.units {
            for master in units.keys() {
                let still_referenced = new
                    .units
                    .get(project)
                    .is_some_and(|units| units.contains_key(master.as_path()));
                if !still_referenced {
                    self.remove_from_unit_bucket(project, master, dependent.as_path());
                }
            }
        }
        for (project, keys) in &old.types {
            for key in keys {
                let still_referenced = new
                    .types
                    .get(project)
                    .is_some_and(|keys| keys.contains(key));
                if !still_referenced {
                    self.remove_from_type_bucket(project, key, dependent.as_path());
                }
            }
        }
    }

    /// Add the dependent to every bucket its new edges reference.
    fn link(&mut self, dependent: &UnitPath, edges: &EdgeSet) {
        for (project, units) in &edges.units {
            for (master, hash) in units {
                self.add_to_unit_bucket(project, master, *hash, dependent);
            }
        }
        for (project, keys) in &edges.types {
            for key in keys {
                self.add_to_type_bucket(project, key, dependent);
            }
        }
    }

    fn add_to_unit_bucket(
        &mut self,
        project: &ProjectIdentity,
        master: &UnitPath,
        hash: UnitHash,
        dependent: &UnitPath,
    ) {
        let graph = Arc::make_mut(self.projects.entry(project.clone()).or_default());
        match graph.units.get_mut(master.as_path()) {
            Some(bucket) => {
                if bucket.hash == hash && bucket.dependents.contains(dependent.as_path()) {
                    // Already linked with the same hash; keep the bucket shared.
                    return;
                }
                let bucket = Arc::make_mut(bucket);
                bucket.hash = hash;
                bucket.dependents.insert(dependent.clone());
            }
            None => {
                let mut dependents = DependentSet::default();
                dependents.insert(dependent.clone());
                graph
                    .units
                    .insert(master.clone(), Arc::new(UnitBucket { hash, dependents }));
            }
        }
    }

    fn add_to_type_bucket(
        &mut self,
        project: &ProjectIdentity,
        key: &TypeIdentityKey,
        dependent: &UnitPath,
    ) {
        let graph = Arc::make_mut(self.projects.entry(project.clone()).or_default());
        match graph.types.get_mut(key) {
            Some(dependents) => {
                if dependents.contains(dependent.as_path()) {
                    return;
                }
                Arc::make_mut(dependents).insert(dependent.clone());
            }
            None => {
                let mut dependents = DependentSet::default();
                dependents.insert(dependent.clone());
                graph.types.insert(key.clone(), Arc::new(dependents));
            }
        }
    }

    fn remove_from_unit_bucket(
        &mut self,
        project: &ProjectIdentity,
        master: &UnitPath,
        dependent: &Path,
    ) {
        let mut project_empty = false;
        if let Some(graph) = self.projects.get_mut(project) {
            let graph = Arc::make_mut(graph);
            if let Some(bucket) = graph.units.get_mut(master.as_path()) {
                let bucket = Arc::make_mut(bucket);
                bucket.dependents.remove(dependent);
                if bucket.dependents.is_empty() {
                    graph.units.remove(master.as_path());
                }
            }
            project_empty = graph.is_empty();
        }
        if project_empty {
            self.projects.remove(project);
        }
    }

    fn remove_from_type_bucket(
        &mut self,
        project: &ProjectIdentity,
        key: &TypeIdentityKey,
        dependent: &Path,
    ) {
        let mut project_empty = false;
        if let Some(graph) = self.projects.get_mut(project) {
            let graph = Arc::make_mut(graph);
            if let Some(dependents) = graph.types.get_mut(key) {
                let dependents = Arc::make_mut(dependents);
                dependents.remove(dependent);
                if dependents.is_empty() {
                    graph.types.remove(key);
                }
            }
            project_empty = graph.is_empty();
        }
        if project_empty {
            self.projects.remove(project);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{fingerprint_bytes, hash_bytes};

    fn project(name: &str) -> ProjectIdentity {
        ProjectIdentity::new(name.to_string(), fingerprint_bytes(name.as_bytes()))
    }

    fn edge_set(project_id: &ProjectIdentity, edges: &[(&str, &[u8])]) -> EdgeSet {
        let mut set = EdgeSet::default();
        let units = set.units.entry(project_id.clone()).or_default();
        for (master, content) in edges {
            units.insert(
                UnitPath::from(*master),
                UnitHash::Content(hash_bytes(content)),
            );
        }
        set
    }

    #[test]
    fn test_touched_bucket_is_copied_once_per_batch() {
        let lib = project("Lib");
        let prev = DependencyGraph::new();
        let mut builder = GraphBuilder::new(&prev);

        // Two dependents landing in the same bucket within one batch must
        // not clone the bucket per edge.
        builder.record(UnitPath::from("B.cs"), edge_set(&lib, &[("A.cs", b"a")]));
        builder.record(UnitPath::from("C.cs"), edge_set(&lib, &[("A.cs", b"a")]));

        let graph = builder.into_snapshot();
        let bucket = graph
            .dependents_of_unit(&lib, Path::new("A.cs"))
            .expect("bucket for A.cs");
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    #[should_panic(expected = "conflicting content hashes")]
    fn test_cross_dependent_hash_conflict_fails_fast() {
        let lib = project("Lib");
        let prev = DependencyGraph::new();
        let mut builder = GraphBuilder::new(&prev);

        builder.record(UnitPath::from("B.cs"), edge_set(&lib, &[("A.cs", b"v1")]));
        builder.record(UnitPath::from("C.cs"), edge_set(&lib, &[("A.cs", b"v2")]));
    }

    #[test]
    fn test_empty_edge_set_removes_dependent() {
        let lib = project("Lib");
        let prev = DependencyGraph::new();
        let mut builder = GraphBuilder::new(&prev);
        builder.record(UnitPath::from("B.cs"), edge_set(&lib, &[("A.cs", b"a")]));
        let graph = builder.into_snapshot();

        let mut builder = GraphBuilder::new(&graph);
        builder.record(UnitPath::from("B.cs"), EdgeSet::default());
        let graph = builder.into_snapshot();

        assert!(graph.is_empty());
    }

    #[test]
    fn test_remove_unknown_dependent_is_noop() {
        let prev = DependencyGraph::new();
        let mut builder = GraphBuilder::new(&prev);
        builder.remove_dependent(Path::new("ghost.cs"));

        assert!(builder.into_snapshot().is_empty());
    }

    #[test]
    fn test_previous_snapshot_is_not_mutated() {
        let lib = project("Lib");
        let prev = DependencyGraph::new();
        let mut builder = GraphBuilder::new(&prev);
        builder.record(UnitPath::from("B.cs"), edge_set(&lib, &[("A.cs", b"a")]));
        builder.record(UnitPath::from("C.cs"), edge_set(&lib, &[("A.cs", b"a")]));
        let first = builder.into_snapshot();

        let mut builder = GraphBuilder::new(&first);
        builder.remove_dependent(Path::new("B.cs"));
        let second = builder.into_snapshot();

        // The earlier snapshot still sees both dependents.
        assert_eq!(
            first
                .dependents_of_unit(&lib, Path::new("A.cs"))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            second
                .dependents_of_unit(&lib, Path::new("A.cs"))
                .unwrap()
                .len(),
            1
        );
    }
}
