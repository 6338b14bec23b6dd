// tests/relation_graph.rs

use std::collections::BTreeSet;

use missiongraph::errors::PlanError;
use missiongraph::graph::algo::{
    components, directed_component, directed_components, reverse_directed_component,
    reverse_directed_components, topological_sort,
};
use missiongraph::graph::{prefer_new, Direction, EdgeKind, EdgeMask, RelationGraph};

type Graph = RelationGraph<u32, String>;

fn chain(edges: &[(u32, u32)]) -> Graph {
    let mut g = Graph::new("test");
    for &(a, b) in edges {
        g.add_edge(a, b, None).unwrap();
    }
    g
}

#[test]
fn add_edge_keeps_forward_and_backward_in_sync() {
    let mut g = chain(&[(1, 2), (1, 3), (2, 3)]);
    assert_eq!(g.num_edges(), 3);
    assert_eq!(g.out_neighbours(1).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(g.in_neighbours(3).collect::<Vec<_>>(), vec![1, 2]);
    g.verify_consistency().unwrap();

    assert!(g.remove_edge(1, 3));
    assert!(!g.remove_edge(1, 3));
    assert_eq!(g.in_neighbours(3).collect::<Vec<_>>(), vec![2]);
    g.verify_consistency().unwrap();
}

#[test]
fn self_loops_are_refused() {
    let mut g = Graph::new("test");
    let err = g.add_edge(4, 4, None).unwrap_err();
    assert!(matches!(err, PlanError::Argument(_)));
    assert!(!g.has_vertex(4));
}

#[test]
fn absent_payload_never_overrides_present_one() {
    let mut g = Graph::new("test");
    g.add_edge(1, 2, Some("a".to_string())).unwrap();
    g.add_edge(1, 2, None).unwrap();
    assert_eq!(g.edge_info(1, 2).unwrap(), Some(&"a".to_string()));

    // Equal payloads are fine even without a merge policy.
    g.add_edge(1, 2, Some("a".to_string())).unwrap();
    assert_eq!(g.num_edges(), 1);
}

#[test]
fn conflicting_payloads_need_a_merge_policy() {
    let mut g = Graph::new("test");
    g.add_edge(1, 2, Some("a".to_string())).unwrap();
    let err = g.add_edge(1, 2, Some("b".to_string())).unwrap_err();
    assert!(matches!(err, PlanError::Argument(_)));
    assert_eq!(g.edge_info(1, 2).unwrap(), Some(&"a".to_string()));

    let mut merging = Graph::with_merge("merging", prefer_new::<u32, String>);
    merging.add_edge(1, 2, Some("a".to_string())).unwrap();
    merging.add_edge(1, 2, Some("b".to_string())).unwrap();
    assert_eq!(merging.edge_info(1, 2).unwrap(), Some(&"b".to_string()));
}

#[test]
fn set_edge_info_requires_the_edge() {
    let mut g = chain(&[(1, 2)]);
    g.set_edge_info(1, 2, Some("x".to_string())).unwrap();
    assert_eq!(g.edge_info(1, 2).unwrap(), Some(&"x".to_string()));
    assert!(matches!(
        g.set_edge_info(2, 1, None),
        Err(PlanError::Argument(_))
    ));
    assert!(g.edge_info(2, 1).is_err());
}

#[test]
fn remove_vertex_drops_every_incident_edge() {
    let mut g = chain(&[(1, 2), (2, 3), (4, 2)]);
    assert!(g.remove_vertex(2));
    assert!(!g.has_vertex(2));
    assert_eq!(g.num_edges(), 0);
    assert!(g.is_singleton(1) && g.is_singleton(3) && g.is_singleton(4));
    g.verify_consistency().unwrap();

    g.insert(9);
    assert!(!g.remove_vertex(9), "a vertex without edges reports no edges removed");
}

#[test]
fn degree_queries() {
    let g = chain(&[(1, 2), (2, 3)]);
    assert!(g.is_root(1) && !g.is_leaf(1));
    assert!(g.is_leaf(3) && !g.is_root(3));
    assert_eq!(g.in_degree(2), 1);
    assert_eq!(g.out_degree(2), 1);
    assert!(g.related(3, 2));
    assert!(!g.related(1, 3));
}

#[test]
fn traversals_report_discovery_order() {
    let g = chain(&[(1, 2), (1, 3), (2, 4), (3, 4), (4, 5)]);
    assert_eq!(g.dfs_from(1), vec![1, 2, 4, 5, 3]);
    assert_eq!(g.bfs_from(1), vec![1, 2, 3, 4, 5]);
    assert_eq!(g.reverse_dfs_from(4), vec![4, 2, 1, 3]);
    assert_eq!(g.dfs_filtered(1, |v| v != 2), vec![1, 2, 3, 4, 5]);
    assert_eq!(g.dfs_filtered(1, |v| v != 4), vec![1, 2, 4, 3]);
    assert!(g.dfs_from(42).is_empty());
}

#[test]
fn breadth_first_visits_in_every_direction() {
    let g = chain(&[(1, 2), (1, 3), (2, 4), (3, 4), (4, 5)]);
    assert_eq!(g.reverse_bfs_from(4), vec![4, 2, 3, 1]);
    assert_eq!(g.undirected_bfs_from(3), vec![3, 1, 4, 2, 5]);
    assert!(g.undirected_bfs_from(42).is_empty());
}

#[test]
fn depth_first_edges_are_classified() {
    use EdgeKind::*;
    let g = chain(&[(1, 2), (2, 3), (3, 1), (1, 3)]);
    assert_eq!(
        g.dfs_edges(1, Direction::Forward, EdgeMask::ALL),
        vec![(1, 2, Tree), (2, 3, Tree), (3, 1, Back), (1, 3, ForwardOrCross)]
    );
    assert_eq!(
        g.dfs_edges(1, Direction::Forward, EdgeMask::TREE),
        vec![(1, 2, Tree), (2, 3, Tree)]
    );
    assert_eq!(
        g.dfs_edges(1, Direction::Forward, EdgeMask::NON_TREE),
        vec![(3, 1, Back), (1, 3, ForwardOrCross)]
    );
    assert_eq!(
        g.dfs_edges(1, Direction::Forward, EdgeMask::BACK),
        vec![(3, 1, Back)]
    );
}

#[test]
fn breadth_first_edges_only_split_tree_from_non_tree() {
    use EdgeKind::*;
    let g = chain(&[(1, 2), (1, 3), (2, 4), (3, 4)]);
    assert_eq!(
        g.bfs_edges(1, Direction::Forward, EdgeMask::ALL).unwrap(),
        vec![(1, 2, Tree), (1, 3, Tree), (2, 4, Tree), (3, 4, NonTree)]
    );
    assert_eq!(
        g.bfs_edges(4, Direction::Undirected, EdgeMask::ALL).unwrap(),
        vec![(4, 2, Tree), (4, 3, Tree), (2, 1, Tree), (3, 1, NonTree)]
    );
    assert_eq!(
        g.bfs_edges(4, Direction::Reverse, EdgeMask::NON_TREE).unwrap(),
        vec![(3, 1, NonTree)]
    );
    assert!(matches!(
        g.bfs_edges(1, Direction::Forward, EdgeMask::BACK),
        Err(PlanError::Argument(_))
    ));
    assert!(g
        .bfs_edges(1, Direction::Forward, EdgeMask::TREE | EdgeMask::FORWARD_OR_CROSS)
        .is_err());
}

#[test]
fn seeded_directed_components_share_visited_vertices() {
    let g = chain(&[(1, 2), (2, 3), (4, 3), (5, 6)]);
    let set = |v: &[u32]| v.iter().copied().collect::<BTreeSet<u32>>();

    assert_eq!(
        directed_components(&g, None),
        vec![set(&[1, 2, 3]), set(&[4]), set(&[5, 6])]
    );
    assert_eq!(
        directed_components(&g, Some(&[2, 9, 1])),
        vec![set(&[2, 3]), set(&[9]), set(&[1])]
    );
    assert_eq!(
        reverse_directed_components(&g, None),
        vec![set(&[1, 2, 3, 4]), set(&[5, 6])]
    );
    assert_eq!(
        reverse_directed_components(&g, Some(&[6])),
        vec![set(&[5, 6])]
    );
}

#[test]
fn reachable_is_trivially_true_on_identity() {
    let g = chain(&[(1, 2), (2, 3)]);
    assert!(g.reachable(1, 3));
    assert!(!g.reachable(3, 1));
    assert!(g.reachable(7, 7));
}

#[test]
fn difference_is_expressed_in_the_other_graph() {
    // local 10 stands for 1 in the other graph.
    let mut local = Graph::new("local");
    local.add_edge(10, 2, Some("new".to_string())).unwrap();
    local.add_edge(2, 3, Some("changed".to_string())).unwrap();

    let mut other = Graph::new("other");
    other.add_edge(2, 3, Some("old".to_string())).unwrap();
    other.add_edge(3, 1, None).unwrap();

    let diff = local.difference(&other, [10, 2, 3], |v| if v == 10 { 1 } else { v });
    assert_eq!(diff.new_edges, vec![(1, 2, Some("new".to_string()))]);
    assert_eq!(diff.changed_info, vec![(2, 3, Some("changed".to_string()))]);
    assert_eq!(diff.missing_edges, vec![(3, 1)]);
}

#[test]
fn replace_vertex_moves_edges_and_drops_self_loops() {
    let mut g = chain(&[(1, 2), (2, 3), (3, 4)]);
    g.replace_vertex(2, 3, true).unwrap();
    assert!(!g.has_vertex(2));
    assert!(g.has_edge(1, 3));
    assert!(g.has_edge(3, 4));
    assert!(!g.has_edge(3, 3));
    g.verify_consistency().unwrap();
}

#[test]
fn merge_and_reverse() {
    let mut a = chain(&[(1, 2)]);
    let b = chain(&[(2, 3), (1, 2)]);
    a.merge(&b).unwrap();
    assert_eq!(a.num_edges(), 2);

    let r = a.reverse();
    assert!(r.has_edge(2, 1) && r.has_edge(3, 2));
    assert_eq!(r.num_edges(), 2);
    r.verify_consistency().unwrap();
}

#[test]
fn components_and_topological_order() {
    let mut g = chain(&[(1, 2), (3, 2), (5, 6)]);
    g.insert(9);

    let all = components(&g, None);
    assert_eq!(all.len(), 3);

    let seeded = components(&g, Some(&[3, 42]));
    assert_eq!(seeded.len(), 2);
    assert!(seeded[0].contains(&1) && seeded[0].contains(&2));
    assert_eq!(seeded[1].len(), 1);

    assert_eq!(directed_component(&g, 1).into_iter().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(
        reverse_directed_component(&g, 2).into_iter().collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let order = topological_sort(&g).unwrap();
    let pos = |v: u32| order.iter().position(|x| *x == v).unwrap();
    assert!(pos(1) < pos(2) && pos(3) < pos(2) && pos(5) < pos(6));

    g.add_edge(2, 1, None).unwrap();
    assert!(matches!(topological_sort(&g), Err(PlanError::CycleFound(_))));
}
