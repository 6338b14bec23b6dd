// src/graph/algo.rs

//! Whole-graph algorithms backed by `petgraph`.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::unionfind::UnionFind;

use crate::errors::{PlanError, Result};
use crate::graph::relation_graph::{Direction, RelationGraph, Vertex};

/// Export the structure of `graph` (payloads dropped) for external tooling.
pub fn to_petgraph<V: Vertex, I: Clone + PartialEq>(graph: &RelationGraph<V, I>) -> DiGraphMap<V, ()> {
    let mut exported = DiGraphMap::with_capacity(graph.len(), graph.num_edges());
    for vertex in graph.vertices() {
        exported.add_node(vertex);
    }
    for (source, target, _) in graph.each_edge() {
        exported.add_edge(source, target, ());
    }
    exported
}

/// Vertices of `graph` in topological order.
pub fn topological_sort<V: Vertex, I: Clone + PartialEq>(graph: &RelationGraph<V, I>) -> Result<Vec<V>> {
    let exported = to_petgraph(graph);
    toposort(&exported, None).map_err(|cycle| {
        PlanError::CycleFound(format!(
            "{} contains a cycle involving {:?}",
            graph.name(),
            cycle.node_id()
        ))
    })
}

/// Connected components of `graph`, ignoring edge direction.
///
/// With `seeds`, only the components containing at least one seed are
/// returned; seeds that are not in the graph form singleton components.
pub fn components<V: Vertex, I: Clone + PartialEq>(
    graph: &RelationGraph<V, I>,
    seeds: Option<&[V]>,
) -> Vec<BTreeSet<V>> {
    let index: BTreeMap<V, usize> = graph.vertices().enumerate().map(|(i, v)| (v, i)).collect();
    let mut sets = UnionFind::new(index.len());
    for (source, target, _) in graph.each_edge() {
        sets.union(index[&source], index[&target]);
    }

    let mut grouped: BTreeMap<usize, BTreeSet<V>> = BTreeMap::new();
    for (vertex, i) in &index {
        grouped.entry(sets.find(*i)).or_default().insert(*vertex);
    }

    match seeds {
        None => grouped.into_values().collect(),
        Some(seeds) => {
            let mut result: Vec<BTreeSet<V>> = Vec::new();
            for seed in seeds {
                let component = match index.get(seed) {
                    Some(i) => grouped.get(&sets.find(*i)).cloned().unwrap_or_default(),
                    None => BTreeSet::from([*seed]),
                };
                if !result.contains(&component) {
                    result.push(component);
                }
            }
            result
        }
    }
}

/// `vertex` and everything reachable from it.
pub fn directed_component<V: Vertex, I: Clone + PartialEq>(graph: &RelationGraph<V, I>, vertex: V) -> BTreeSet<V> {
    graph.dfs_from(vertex).into_iter().collect()
}

/// `vertex` and everything that reaches it.
pub fn reverse_directed_component<V: Vertex, I: Clone + PartialEq>(
    graph: &RelationGraph<V, I>,
    vertex: V,
) -> BTreeSet<V> {
    graph.reverse_dfs_from(vertex).into_iter().collect()
}

/// Vertices discovered from each seed, following edges forward.
///
/// Seeds share the visited set, so a seed already reached from an earlier
/// one yields nothing and every vertex lands in at most one component.
/// Seeds missing from the graph form singleton components. Without seeds,
/// the graph's roots are used.
pub fn directed_components<V: Vertex, I: Clone + PartialEq>(
    graph: &RelationGraph<V, I>,
    seeds: Option<&[V]>,
) -> Vec<BTreeSet<V>> {
    seeded_components(graph, seeds, Direction::Forward)
}

/// Like [`directed_components`] following edges backwards; without seeds
/// the graph's leaves are used.
pub fn reverse_directed_components<V: Vertex, I: Clone + PartialEq>(
    graph: &RelationGraph<V, I>,
    seeds: Option<&[V]>,
) -> Vec<BTreeSet<V>> {
    seeded_components(graph, seeds, Direction::Reverse)
}

fn seeded_components<V: Vertex, I: Clone + PartialEq>(
    graph: &RelationGraph<V, I>,
    seeds: Option<&[V]>,
    direction: Direction,
) -> Vec<BTreeSet<V>> {
    let seeds: Vec<V> = match seeds {
        Some(seeds) => seeds.to_vec(),
        None => graph
            .vertices()
            .filter(|v| match direction {
                Direction::Reverse => graph.is_leaf(*v),
                _ => graph.is_root(*v),
            })
            .collect(),
    };

    let mut visited = BTreeSet::new();
    let mut result = Vec::new();
    for seed in seeds {
        if !graph.has_vertex(seed) {
            result.push(BTreeSet::from([seed]));
            continue;
        }
        if visited.contains(&seed) {
            continue;
        }
        let mut component = BTreeSet::from([seed]);
        let mut stack = vec![seed];
        visited.insert(seed);
        while let Some(vertex) = stack.pop() {
            let next: Vec<V> = match direction {
                Direction::Reverse => graph.in_neighbours(vertex).collect(),
                _ => graph.out_neighbours(vertex).collect(),
            };
            for n in next {
                if visited.insert(n) {
                    component.insert(n);
                    stack.push(n);
                }
            }
        }
        result.push(component);
    }
    result
}
