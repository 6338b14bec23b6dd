// tests/transitive_closure.rs

use missiongraph::graph::{IncrementalTransitiveClosure, RelationGraph};

fn graph(edges: &[(u32, u32)]) -> RelationGraph<u32, ()> {
    let mut g = RelationGraph::new("source");
    for &(a, b) in edges {
        g.add_edge(a, b, None).unwrap();
    }
    g
}

#[test]
fn added_edges_compose_known_paths() {
    let mut closure = IncrementalTransitiveClosure::new();
    closure.added_edge(1, 2);
    closure.added_edge(2, 3);
    closure.added_edge(0, 1);

    assert!(closure.contains(1, 3));
    assert!(closure.contains(0, 3));
    assert!(closure.contains(0, 2));
    assert!(!closure.contains(3, 0));
    assert!(closure.reachable::<()>(0, 3, None));
}

#[test]
fn a_miss_falls_back_to_the_source_graph_and_caches_the_answer() {
    let source = graph(&[(1, 2), (2, 3)]);
    let mut closure = IncrementalTransitiveClosure::new();

    assert!(!closure.reachable::<()>(1, 3, None), "without a source graph a miss is negative");
    assert!(closure.reachable(1, 3, Some(&source)));
    assert!(closure.contains(1, 3));
    assert!(closure.contains(1, 2));
    assert!(!closure.reachable(3, 1, Some(&source)));
}

#[test]
fn removing_an_edge_of_a_larger_structure_drops_the_whole_cache() {
    let mut closure = IncrementalTransitiveClosure::new();
    closure.added_edge(1, 2);
    closure.added_edge(2, 3);
    assert_eq!(closure.reset_count(), 0);

    closure.removed_edge(2, 3);
    assert!(closure.is_empty());
    assert_eq!(closure.reset_count(), 1);
}

#[test]
fn removing_an_isolated_pair_only_drops_that_pair() {
    let mut closure = IncrementalTransitiveClosure::new();
    closure.added_edge(1, 2);
    closure.added_edge(5, 6);

    closure.removed_edge(5, 6);
    assert!(!closure.contains(5, 6));
    assert!(closure.contains(1, 2));
    assert_eq!(closure.reset_count(), 0);
}

#[test]
fn removing_an_unknown_edge_keeps_the_cache() {
    let mut closure = IncrementalTransitiveClosure::new();
    closure.added_edge(1, 2);
    closure.removed_edge(7, 8);
    closure.removed_vertex(9);
    assert!(closure.contains(1, 2));
    assert_eq!(closure.reset_count(), 0);
}

#[test]
fn no_stale_positive_after_removal() {
    let mut source = graph(&[(1, 2), (2, 3)]);
    let mut closure = IncrementalTransitiveClosure::new();
    closure.added_edge(1, 2);
    closure.added_edge(2, 3);
    assert!(closure.reachable(1, 3, Some(&source)));

    source.remove_edge(2, 3);
    closure.removed_edge(2, 3);
    assert!(!closure.reachable(1, 3, Some(&source)));

    source.remove_vertex(2);
    closure.removed_vertex(2);
    assert!(!closure.reachable(1, 2, Some(&source)));
}
