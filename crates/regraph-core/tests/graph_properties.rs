//! Property-based tests for the dependency graph and invalidation engine.
//!
//! These verify the update/invalidation contract across randomly generated
//! edge topologies rather than hand-picked scenarios.

use proptest::prelude::*;
use rustc_hash::FxHashSet;
use std::path::Path;
use std::sync::Arc;

use regraph_core::{
    compute_invalidated, fingerprint_bytes, hash_bytes, ContentHash, DependencyCollector,
    DependencyGraph, ProjectIdentity, ReferencedProjects, UnitHash, UnitPath,
};

const MAX_MASTERS: usize = 5;
const MAX_DEPENDENTS: usize = 6;

fn lib_project() -> ProjectIdentity {
    ProjectIdentity::new("Lib", fingerprint_bytes(b"lib config"))
}

fn app_project() -> ProjectIdentity {
    ProjectIdentity::new("App", fingerprint_bytes(b"app config"))
}

fn master_path(index: usize) -> UnitPath {
    UnitPath::from(format!("master{}.cs", index).as_str())
}

fn dependent_path(index: usize) -> UnitPath {
    UnitPath::from(format!("dep{}.cs", index).as_str())
}

fn master_hash(index: usize, version: u32) -> ContentHash {
    hash_bytes(format!("master{} v{}", index, version).as_bytes())
}

/// An edge topology: for each dependent, the set of master indices it uses.
fn edges_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(
        prop::collection::hash_set(0..MAX_MASTERS, 0..MAX_MASTERS)
            .prop_map(|set| set.into_iter().collect()),
        1..MAX_DEPENDENTS,
    )
}

fn build_graph(edges: &[Vec<usize>]) -> DependencyGraph {
    let lib = lib_project();
    let collector = DependencyCollector::new(app_project());
    let mut current = FxHashSet::default();

    for (dep_index, masters) in edges.iter().enumerate() {
        let dependent = dependent_path(dep_index);
        current.insert(dependent.clone());
        for &master_index in masters {
            collector.add_unit_dependency(
                dependent.clone(),
                lib.clone(),
                master_path(master_index),
                UnitHash::Content(master_hash(master_index, 1)),
            );
        }
    }

    DependencyGraph::new().update(&current, collector)
}

proptest! {
    /// Every dependent of a changed master is invalidated, and nothing else.
    #[test]
    fn invalidation_is_complete_and_minimal(
        edges in edges_strategy(),
        changed in prop::collection::hash_set(0..MAX_MASTERS, 0..=MAX_MASTERS),
    ) {
        let graph = build_graph(&edges);
        let lib = lib_project();

        let mut refs = ReferencedProjects::new();
        let state = refs.insert_project("Lib", lib.fingerprint());
        for master_index in 0..MAX_MASTERS {
            let version = if changed.contains(&master_index) { 2 } else { 1 };
            state.insert_unit_hash(master_path(master_index), master_hash(master_index, version));
        }

        let result = compute_invalidated(&graph, &refs);
        prop_assert!(!result.whole_configuration_invalidated);

        let expected: FxHashSet<UnitPath> = edges
            .iter()
            .enumerate()
            .filter(|(_, masters)| masters.iter().any(|m| changed.contains(m)))
            .map(|(dep_index, _)| dependent_path(dep_index))
            .collect();

        prop_assert_eq!(result.invalidated_paths, expected);
    }

    /// Re-applying an identical pass reuses every branch by reference.
    #[test]
    fn update_is_idempotent(edges in edges_strategy()) {
        let lib = lib_project();
        let first = build_graph(&edges);
        let second = build_graph_from(&first, &edges);

        prop_assert_eq!(first.dependent_count(), second.dependent_count());
        match (first.project_graph(&lib), second.project_graph(&lib)) {
            (Some(a), Some(b)) => prop_assert!(Arc::ptr_eq(a, b)),
            (None, None) => {}
            _ => prop_assert!(false, "project presence diverged"),
        }
        for dep_index in 0..edges.len() {
            let path = dependent_path(dep_index);
            match (first.edge_set(&path), second.edge_set(&path)) {
                (Some(a), Some(b)) => prop_assert!(Arc::ptr_eq(a, b)),
                (None, None) => {}
                _ => prop_assert!(false, "dependent presence diverged"),
            }
        }
    }

    /// A changed fingerprint always wins over per-unit diffing.
    #[test]
    fn fingerprint_change_always_short_circuits(edges in edges_strategy()) {
        let graph = build_graph(&edges);
        prop_assume!(!graph.is_empty());

        let mut refs = ReferencedProjects::new();
        refs.insert_project("Lib", fingerprint_bytes(b"different config"));

        let result = compute_invalidated(&graph, &refs);
        prop_assert!(result.whole_configuration_invalidated);
    }

    /// Dropping one dependent from the unit list removes exactly its
    /// contributions; buckets shared with other dependents survive.
    #[test]
    fn removal_only_affects_the_removed_dependent(edges in edges_strategy()) {
        prop_assume!(edges.len() > 1);
        let lib = lib_project();
        let first = build_graph(&edges);

        // Re-report everything except dependent 0, which is deleted.
        let collector = DependencyCollector::new(app_project());
        let mut current = FxHashSet::default();
        for (dep_index, masters) in edges.iter().enumerate().skip(1) {
            let dependent = dependent_path(dep_index);
            current.insert(dependent.clone());
            for &master_index in masters {
                collector.add_unit_dependency(
                    dependent.clone(),
                    lib.clone(),
                    master_path(master_index),
                    UnitHash::Content(master_hash(master_index, 1)),
                );
            }
        }
        let second = first.update(&current, collector);

        prop_assert!(second.edge_set(Path::new("dep0.cs")).is_none());
        for master_index in 0..MAX_MASTERS {
            let expected: FxHashSet<UnitPath> = edges
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, masters)| masters.contains(&master_index))
                .map(|(dep_index, _)| dependent_path(dep_index))
                .collect();

            let actual = second.dependents_of_unit(&lib, master_path(master_index).as_path());
            match actual {
                Some(set) => {
                    let actual: FxHashSet<UnitPath> = set.iter().cloned().collect();
                    prop_assert_eq!(actual, expected);
                }
                None => prop_assert!(expected.is_empty(), "bucket missing for master{}", master_index),
            }
        }
    }
}

/// Like `build_graph` but applied on top of an existing snapshot.
fn build_graph_from(previous: &DependencyGraph, edges: &[Vec<usize>]) -> DependencyGraph {
    let lib = lib_project();
    let collector = DependencyCollector::new(app_project());
    let mut current = FxHashSet::default();

    for (dep_index, masters) in edges.iter().enumerate() {
        let dependent = dependent_path(dep_index);
        current.insert(dependent.clone());
        for &master_index in masters {
            collector.add_unit_dependency(
                dependent.clone(),
                lib.clone(),
                master_path(master_index),
                UnitHash::Content(master_hash(master_index, 1)),
            );
        }
    }

    previous.update(&current, collector)
}
