// src/graph/closure.rs

//! Incrementally maintained reachability cache.

use std::collections::BTreeSet;

use tracing::debug;

use crate::graph::relation_graph::{RelationGraph, Vertex};

/// Cache of known-positive reachability pairs for a source graph.
///
/// An edge `(a, b)` in the cache means `b` is reachable from `a` in the
/// source graph. The converse does not hold: a missing pair only means the
/// answer is unknown, and [`IncrementalTransitiveClosure::reachable`] falls
/// back to searching the source graph when one is given.
///
/// Removals never try to patch the cache: whenever a removed edge or vertex
/// could be part of a cached path, the whole cache is dropped.
#[derive(Debug, Clone)]
pub struct IncrementalTransitiveClosure<V: Vertex> {
    graph: RelationGraph<V, ()>,
    resets: usize,
}

impl<V: Vertex> Default for IncrementalTransitiveClosure<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Vertex> IncrementalTransitiveClosure<V> {
    pub fn new() -> Self {
        Self {
            graph: RelationGraph::new("transitive-closure"),
            resets: 0,
        }
    }

    /// Number of cached reachability pairs.
    pub fn len(&self) -> usize {
        self.graph.num_edges()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.num_edges() == 0
    }

    /// How many times the cache has been dropped because of a removal.
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Whether `(a, b)` is currently cached.
    pub fn contains(&self, a: V, b: V) -> bool {
        self.graph.has_edge(a, b)
    }

    pub fn clear(&mut self) {
        self.graph.clear();
    }

    fn reset(&mut self) {
        debug!(pairs = self.graph.num_edges(), "dropping transitive closure cache");
        self.graph.clear();
        self.resets += 1;
    }

    fn record(&mut self, source: V, target: V) {
        if source != target {
            // Payload-free edges never need merging and self-loops are
            // filtered above, so this cannot fail.
            let _ = self.graph.add_edge(source, target, None);
        }
    }

    /// Record the new source edge `source -> target`.
    ///
    /// Every known predecessor of `source` (and `source` itself) now reaches
    /// every known successor of `target` (and `target` itself).
    pub fn added_edge(&mut self, source: V, target: V) {
        let mut sources: Vec<V> = self.graph.in_neighbours(source).collect();
        sources.push(source);
        let mut targets: Vec<V> = self.graph.out_neighbours(target).collect();
        targets.push(target);

        for &s in &sources {
            for &t in &targets {
                self.record(s, t);
            }
        }
    }

    /// The source edge `source -> target` was removed.
    pub fn removed_edge(&mut self, source: V, target: V) {
        // A path discovered through this edge would have recorded both ends.
        if !self.graph.has_vertex(source) || !self.graph.has_vertex(target) {
            return;
        }

        let isolated = self.graph.has_edge(source, target)
            && self.graph.in_degree(source) == 0
            && self.graph.out_degree(source) == 1
            && self.graph.in_degree(target) == 1
            && self.graph.out_degree(target) == 0;

        if isolated {
            self.graph.remove_vertex(source);
            self.graph.remove_vertex(target);
        } else {
            self.reset();
        }
    }

    /// The source vertex `vertex` was removed.
    pub fn removed_vertex(&mut self, vertex: V) {
        if !self.graph.has_vertex(vertex) {
            return;
        }
        if self.graph.is_singleton(vertex) {
            self.graph.remove_vertex(vertex);
        } else {
            self.reset();
        }
    }

    /// Whether `b` is reachable from `a`.
    ///
    /// Answers from the cache when possible. Otherwise, if `source_graph` is
    /// given, searches it and caches every reachability pair it discovers.
    /// Without a source graph a cache miss answers `false`.
    pub fn reachable<I: Clone + PartialEq>(
        &mut self,
        a: V,
        b: V,
        source_graph: Option<&RelationGraph<V, I>>,
    ) -> bool {
        if a == b || self.graph.has_edge(a, b) {
            return true;
        }
        let Some(source_graph) = source_graph else {
            return false;
        };

        let mut found = false;
        let mut visited = BTreeSet::new();
        let mut stack = vec![a];
        let mut discovered = Vec::new();
        while let Some(v) = stack.pop() {
            if !visited.insert(v) {
                continue;
            }
            if v != a {
                discovered.push(v);
            }
            if v == b || self.graph.has_edge(v, b) {
                found = true;
                break;
            }
            for child in source_graph.out_neighbours(v) {
                if !visited.contains(&child) {
                    stack.push(child);
                }
            }
        }

        for v in discovered {
            self.record(a, v);
        }
        if found {
            self.record(a, b);
        }
        found
    }
}
