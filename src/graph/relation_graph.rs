// src/graph/relation_graph.rs

//! Typed directed graph with paired forward/backward adjacency.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::errors::{PlanError, Result};

/// Handle types usable as graph vertices.
pub trait Vertex: Copy + Ord + Hash + fmt::Debug {}

impl<T: Copy + Ord + Hash + fmt::Debug> Vertex for T {}

/// Resolves the payload of an edge that already carries one when a different
/// payload is added: `merge(source, target, old, new)`.
pub type MergeFn<V, I> = fn(&V, &V, &I, &I) -> Result<I>;

/// Default merge policy: two different payloads on the same edge are a
/// programming error.
pub fn refuse_merge<V: fmt::Debug, I>(source: &V, target: &V, _old: &I, _new: &I) -> Result<I> {
    Err(PlanError::Argument(format!(
        "edge {source:?} -> {target:?} already carries a different payload and the relation defines no merge policy"
    )))
}

/// Merge policy where the newly added payload replaces the existing one.
pub fn prefer_new<V, I: Clone>(_source: &V, _target: &V, _old: &I, new: &I) -> Result<I> {
    Ok(new.clone())
}

/// Which way a traversal follows edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
    Undirected,
}

/// Classification of an edge met during a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// The edge through which its target was discovered.
    Tree,
    /// Leads to a vertex still on the depth-first stack.
    Back,
    /// Leads to an already finished vertex.
    ForwardOrCross,
    /// Any non-tree edge of a breadth-first visit.
    NonTree,
}

/// Set of [`EdgeKind`]s a traversal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeMask(u8);

impl EdgeMask {
    pub const TREE: EdgeMask = EdgeMask(1);
    pub const BACK: EdgeMask = EdgeMask(2);
    pub const FORWARD_OR_CROSS: EdgeMask = EdgeMask(4);
    pub const NON_TREE: EdgeMask = EdgeMask(6);
    pub const ALL: EdgeMask = EdgeMask(7);

    pub fn contains(self, kind: EdgeKind) -> bool {
        let bits = match kind {
            EdgeKind::Tree => Self::TREE.0,
            EdgeKind::Back => Self::BACK.0,
            EdgeKind::ForwardOrCross => Self::FORWARD_OR_CROSS.0,
            EdgeKind::NonTree => Self::NON_TREE.0,
        };
        self.0 & bits != 0
    }
}

impl std::ops::BitOr for EdgeMask {
    type Output = EdgeMask;

    fn bitor(self, rhs: EdgeMask) -> EdgeMask {
        EdgeMask(self.0 | rhs.0)
    }
}

/// Result of [`RelationGraph::difference`], expressed in the vertex space of
/// the graph compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphDifference<V, I> {
    /// Edges present in `self` but not in `other`, with `self`'s payload.
    pub new_edges: Vec<(V, V, Option<I>)>,
    /// Edges present in `other` (between mapped vertices) but not in `self`.
    pub missing_edges: Vec<(V, V)>,
    /// Edges present in both whose payloads differ, with `self`'s payload.
    pub changed_info: Vec<(V, V, Option<I>)>,
}

impl<V, I> GraphDifference<V, I> {
    pub fn is_empty(&self) -> bool {
        self.new_edges.is_empty() && self.missing_edges.is_empty() && self.changed_info.is_empty()
    }
}

/// Directed graph over vertex handles `V` whose edges carry an optional
/// payload `I`.
///
/// Every vertex has an entry in both `forward` and `backward`, and every
/// forward edge `(u, v)` has exactly one backward entry `(v, u)`. Self-loops
/// are rejected. [`RelationGraph::verify_consistency`] checks both
/// properties.
#[derive(Clone)]
pub struct RelationGraph<V, I> {
    name: String,
    forward: BTreeMap<V, BTreeMap<V, Option<I>>>,
    backward: BTreeMap<V, BTreeSet<V>>,
    edge_count: usize,
    merge: MergeFn<V, I>,
}

impl<V: Vertex, I: fmt::Debug> fmt::Debug for RelationGraph<V, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationGraph")
            .field("name", &self.name)
            .field("vertices", &self.forward.len())
            .field("edges", &self.edge_count)
            .field("forward", &self.forward)
            .finish_non_exhaustive()
    }
}

impl<V: Vertex, I: Clone + PartialEq> RelationGraph<V, I> {
    /// Empty graph that refuses to merge conflicting payloads.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_merge(name, refuse_merge::<V, I>)
    }

    pub fn with_merge(name: impl Into<String>, merge: MergeFn<V, I>) -> Self {
        Self {
            name: name.into(),
            forward: BTreeMap::new(),
            backward: BTreeMap::new(),
            edge_count: 0,
            merge,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn merge_fn(&self) -> MergeFn<V, I> {
        self.merge
    }

    /// Add `vertex` without any edge. Returns `true` if it was not present.
    pub fn insert(&mut self, vertex: V) -> bool {
        if self.forward.contains_key(&vertex) {
            return false;
        }
        self.forward.insert(vertex, BTreeMap::new());
        self.backward.insert(vertex, BTreeSet::new());
        true
    }

    pub fn has_vertex(&self, vertex: V) -> bool {
        self.forward.contains_key(&vertex)
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_count
    }

    pub fn vertices(&self) -> impl Iterator<Item = V> + '_ {
        self.forward.keys().copied()
    }

    /// Remove every vertex and edge.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.backward.clear();
        self.edge_count = 0;
    }

    pub fn has_edge(&self, source: V, target: V) -> bool {
        self.forward
            .get(&source)
            .is_some_and(|children| children.contains_key(&target))
    }

    /// `true` if `a -> b` or `b -> a` exists.
    pub fn related(&self, a: V, b: V) -> bool {
        self.has_edge(a, b) || self.has_edge(b, a)
    }

    /// Compute the payload that adding `(source, target, info)` would leave on
    /// the edge, without modifying the graph.
    ///
    /// An absent payload never overrides a present one; equal payloads are
    /// kept as-is; different payloads go through the merge policy.
    pub fn resolved_info(&self, source: V, target: V, info: Option<I>) -> Result<Option<I>> {
        let existing = self
            .forward
            .get(&source)
            .and_then(|children| children.get(&target));

        match (existing, info) {
            (None, info) => Ok(info),
            (Some(old), None) => Ok(old.clone()),
            (Some(None), Some(new)) => Ok(Some(new)),
            (Some(Some(old)), Some(new)) if *old == new => Ok(Some(new)),
            (Some(Some(old)), Some(new)) => (self.merge)(&source, &target, old, &new).map(Some),
        }
    }

    /// Add the edge `source -> target`.
    ///
    /// Fails with [`PlanError::Argument`] on a self-loop or when the payloads
    /// of an existing edge cannot be merged. On failure nothing is modified.
    pub fn add_edge(&mut self, source: V, target: V, info: Option<I>) -> Result<()> {
        if source == target {
            return Err(PlanError::Argument(format!(
                "cannot add self-loop on {source:?} in {}",
                self.name
            )));
        }
        let resolved = self.resolved_info(source, target, info)?;
        self.install_edge(source, target, resolved);
        Ok(())
    }

    /// Store an already-resolved payload. Callers have checked for
    /// self-loops.
    pub(crate) fn install_edge(&mut self, source: V, target: V, info: Option<I>) {
        self.insert(source);
        self.insert(target);

        let children = self.forward.entry(source).or_default();
        if children.insert(target, info).is_none() {
            self.backward.entry(target).or_default().insert(source);
            self.edge_count += 1;
            trace!(graph = %self.name, ?source, ?target, "edge added");
        }
    }

    /// Remove the edge `source -> target`. Returns whether it existed.
    pub fn remove_edge(&mut self, source: V, target: V) -> bool {
        let removed = self
            .forward
            .get_mut(&source)
            .is_some_and(|children| children.remove(&target).is_some());

        if removed {
            if let Some(parents) = self.backward.get_mut(&target) {
                parents.remove(&source);
            }
            self.edge_count -= 1;
            trace!(graph = %self.name, ?source, ?target, "edge removed");
        }
        removed
    }

    /// Remove `vertex` and all its edges. Returns whether any edge existed.
    pub fn remove_vertex(&mut self, vertex: V) -> bool {
        let Some(children) = self.forward.remove(&vertex) else {
            return false;
        };
        let parents = self.backward.remove(&vertex).unwrap_or_default();
        let had_edges = !children.is_empty() || !parents.is_empty();

        for child in children.keys() {
            if let Some(set) = self.backward.get_mut(child) {
                set.remove(&vertex);
            }
        }
        for parent in &parents {
            if let Some(map) = self.forward.get_mut(parent) {
                map.remove(&vertex);
            }
        }
        self.edge_count -= children.len() + parents.len();
        had_edges
    }

    /// Payload of `source -> target`. Fails if the edge does not exist.
    pub fn edge_info(&self, source: V, target: V) -> Result<Option<&I>> {
        self.forward
            .get(&source)
            .and_then(|children| children.get(&target))
            .map(|info| info.as_ref())
            .ok_or_else(|| {
                PlanError::Argument(format!(
                    "no edge {source:?} -> {target:?} in {}",
                    self.name
                ))
            })
    }

    /// Overwrite the payload of an existing edge.
    pub fn set_edge_info(&mut self, source: V, target: V, info: Option<I>) -> Result<()> {
        match self
            .forward
            .get_mut(&source)
            .and_then(|children| children.get_mut(&target))
        {
            Some(slot) => {
                *slot = info;
                Ok(())
            }
            None => Err(PlanError::Argument(format!(
                "no edge {source:?} -> {target:?} in {}",
                self.name
            ))),
        }
    }

    /// All edges as `(source, target, payload)`, ordered by source then target.
    pub fn each_edge(&self) -> impl Iterator<Item = (V, V, Option<&I>)> + '_ {
        self.forward.iter().flat_map(|(source, children)| {
            children
                .iter()
                .map(move |(target, info)| (*source, *target, info.as_ref()))
        })
    }

    /// Direct children of `vertex`.
    pub fn out_neighbours(&self, vertex: V) -> impl Iterator<Item = V> + '_ {
        self.forward
            .get(&vertex)
            .into_iter()
            .flat_map(|children| children.keys().copied())
    }

    /// Direct parents of `vertex`.
    pub fn in_neighbours(&self, vertex: V) -> impl Iterator<Item = V> + '_ {
        self.backward
            .get(&vertex)
            .into_iter()
            .flat_map(|parents| parents.iter().copied())
    }

    pub fn out_degree(&self, vertex: V) -> usize {
        self.forward.get(&vertex).map_or(0, BTreeMap::len)
    }

    pub fn in_degree(&self, vertex: V) -> usize {
        self.backward.get(&vertex).map_or(0, BTreeSet::len)
    }

    /// No parents in this graph.
    pub fn is_root(&self, vertex: V) -> bool {
        self.in_degree(vertex) == 0
    }

    /// No children in this graph.
    pub fn is_leaf(&self, vertex: V) -> bool {
        self.out_degree(vertex) == 0
    }

    /// Not linked to any other vertex.
    pub fn is_singleton(&self, vertex: V) -> bool {
        self.is_root(vertex) && self.is_leaf(vertex)
    }

    /// Depth-first search over forward adjacency. Trivially true if `a == b`.
    pub fn reachable(&self, a: V, b: V) -> bool {
        if a == b {
            return true;
        }
        let mut stack = vec![a];
        let mut visited = BTreeSet::new();
        while let Some(v) = stack.pop() {
            if !visited.insert(v) {
                continue;
            }
            for child in self.out_neighbours(v) {
                if child == b {
                    return true;
                }
                stack.push(child);
            }
        }
        false
    }

    /// Vertices reachable from `root` (inclusive) in depth-first discovery
    /// order.
    pub fn dfs_from(&self, root: V) -> Vec<V> {
        self.dfs_filtered(root, |_| true)
    }

    /// Like [`RelationGraph::dfs_from`] following edges backwards.
    pub fn reverse_dfs_from(&self, root: V) -> Vec<V> {
        self.traverse(root, true, |_| true)
    }

    /// Depth-first discovery that does not descend below vertices for which
    /// `keep` returns `false`. Those vertices are still reported.
    pub fn dfs_filtered(&self, root: V, keep: impl FnMut(V) -> bool) -> Vec<V> {
        self.traverse(root, false, keep)
    }

    fn traverse(&self, root: V, reverse: bool, mut keep: impl FnMut(V) -> bool) -> Vec<V> {
        if !self.has_vertex(root) {
            return Vec::new();
        }
        let mut order = Vec::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(v) = stack.pop() {
            if !visited.insert(v) {
                continue;
            }
            order.push(v);
            if !keep(v) {
                continue;
            }
            let next: Vec<V> = if reverse {
                self.in_neighbours(v).collect()
            } else {
                self.out_neighbours(v).collect()
            };
            // Reverse so that lower handles are discovered first.
            stack.extend(next.into_iter().rev().filter(|n| !visited.contains(n)));
        }
        order
    }

    /// Vertices reachable from `root` (inclusive) in breadth-first order.
    pub fn bfs_from(&self, root: V) -> Vec<V> {
        if !self.has_vertex(root) {
            return Vec::new();
        }
        let mut order = Vec::new();
        let mut visited = BTreeSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for child in self.out_neighbours(v) {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// Vertices that reach `root` (inclusive) in breadth-first order.
    pub fn reverse_bfs_from(&self, root: V) -> Vec<V> {
        self.bfs_vertices(root, Direction::Reverse)
    }

    /// Vertices connected to `root` (inclusive) in breadth-first order,
    /// ignoring edge direction.
    pub fn undirected_bfs_from(&self, root: V) -> Vec<V> {
        self.bfs_vertices(root, Direction::Undirected)
    }

    fn bfs_vertices(&self, root: V, direction: Direction) -> Vec<V> {
        if !self.has_vertex(root) {
            return Vec::new();
        }
        let mut order = vec![root];
        order.extend(
            self.bfs_walk(root, direction, EdgeMask::TREE)
                .into_iter()
                .map(|(_, target, _)| target),
        );
        order
    }

    fn neighbours(&self, vertex: V, direction: Direction) -> Vec<V> {
        match direction {
            Direction::Forward => self.out_neighbours(vertex).collect(),
            Direction::Reverse => self.in_neighbours(vertex).collect(),
            Direction::Undirected => {
                let mut all: Vec<V> = self.out_neighbours(vertex).chain(self.in_neighbours(vertex)).collect();
                all.sort();
                all.dedup();
                all
            }
        }
    }

    /// Edges met by a depth-first visit from `root`, each tagged
    /// [`EdgeKind::Tree`], [`EdgeKind::Back`] or [`EdgeKind::ForwardOrCross`].
    /// Only the kinds in `mask` are returned. Edges are reported in the
    /// orientation they were traversed, so a [`Direction::Reverse`] visit
    /// yields `(child, parent)` pairs.
    pub fn dfs_edges(&self, root: V, direction: Direction, mask: EdgeMask) -> Vec<(V, V, EdgeKind)> {
        let mut edges = Vec::new();
        if !self.has_vertex(root) {
            return edges;
        }
        let mut discovered = BTreeSet::from([root]);
        let mut finished = BTreeSet::new();
        let mut stack = vec![(root, self.neighbours(root, direction), 0usize)];
        while let Some((vertex, next, cursor)) = stack.last_mut() {
            let vertex = *vertex;
            let Some(&target) = next.get(*cursor) else {
                finished.insert(vertex);
                stack.pop();
                continue;
            };
            *cursor += 1;

            let kind = if !discovered.contains(&target) {
                EdgeKind::Tree
            } else if !finished.contains(&target) {
                EdgeKind::Back
            } else {
                EdgeKind::ForwardOrCross
            };
            // An undirected visit sees the edge to its parent again.
            let parent_edge = direction == Direction::Undirected
                && kind == EdgeKind::Back
                && stack.len() >= 2
                && stack[stack.len() - 2].0 == target;
            if parent_edge {
                continue;
            }
            if mask.contains(kind) {
                edges.push((vertex, target, kind));
            }
            if kind == EdgeKind::Tree {
                discovered.insert(target);
                stack.push((target, self.neighbours(target, direction), 0));
            }
        }
        edges
    }

    /// Edges met by a breadth-first visit from `root`: [`EdgeKind::Tree`]
    /// for the edge discovering a vertex, [`EdgeKind::NonTree`] for any
    /// other. An undirected visit reports each edge once.
    ///
    /// Breadth-first search cannot tell back edges from forward or cross
    /// ones, so a mask selecting only one of them is refused.
    pub fn bfs_edges(&self, root: V, direction: Direction, mask: EdgeMask) -> Result<Vec<(V, V, EdgeKind)>> {
        let partial = mask.0 & EdgeMask::NON_TREE.0;
        if partial != 0 && partial != EdgeMask::NON_TREE.0 {
            return Err(PlanError::Argument(
                "breadth-first visits cannot select back or forward/cross edges alone".to_string(),
            ));
        }
        Ok(self.bfs_walk(root, direction, mask))
    }

    fn bfs_walk(&self, root: V, direction: Direction, mask: EdgeMask) -> Vec<(V, V, EdgeKind)> {
        let mut edges = Vec::new();
        if !self.has_vertex(root) {
            return edges;
        }
        let mut discovered = BTreeSet::from([root]);
        let mut seen_undirected = BTreeSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(vertex) = queue.pop_front() {
            for target in self.neighbours(vertex, direction) {
                if direction == Direction::Undirected {
                    let key = if vertex < target { (vertex, target) } else { (target, vertex) };
                    if !seen_undirected.insert(key) {
                        continue;
                    }
                }
                let kind = if discovered.insert(target) {
                    queue.push_back(target);
                    EdgeKind::Tree
                } else {
                    EdgeKind::NonTree
                };
                if mask.contains(kind) {
                    edges.push((vertex, target, kind));
                }
            }
        }
        edges
    }

    /// Compare `self` against `other` restricted to `vertex_subset`.
    ///
    /// `mapping` translates vertices of `self` into vertices of `other`; it
    /// must be injective on the subset. The result is expressed in `other`'s
    /// vertex space so it can be applied to `other` directly. Payloads are
    /// compared by value.
    pub fn difference(
        &self,
        other: &RelationGraph<V, I>,
        vertex_subset: impl IntoIterator<Item = V>,
        mapping: impl Fn(V) -> V,
    ) -> GraphDifference<V, I> {
        let subset: BTreeSet<V> = vertex_subset.into_iter().collect();
        let mapped: BTreeMap<V, V> = subset.iter().map(|v| (mapping(*v), *v)).collect();

        let mut new_edges = Vec::new();
        let mut changed_info = Vec::new();
        let mut missing_edges = Vec::new();

        for &source in &subset {
            let mapped_source = mapping(source);
            for (target, info) in self.forward.get(&source).into_iter().flatten() {
                if !subset.contains(target) {
                    continue;
                }
                let mapped_target = mapping(*target);
                match other.edge_info(mapped_source, mapped_target) {
                    Ok(other_info) => {
                        if other_info != info.as_ref() {
                            changed_info.push((mapped_source, mapped_target, info.clone()));
                        }
                    }
                    Err(_) => new_edges.push((mapped_source, mapped_target, info.clone())),
                }
            }

            for other_target in other.out_neighbours(mapped_source) {
                if let Some(&local_target) = mapped.get(&other_target) {
                    if !self.has_edge(source, local_target) {
                        missing_edges.push((mapped_source, other_target));
                    }
                }
            }
        }

        GraphDifference {
            new_edges,
            missing_edges,
            changed_info,
        }
    }

    /// Move every edge of `old` onto `new`, keeping payloads. Edges that
    /// would become self-loops on `new` are dropped. If `remove` is set, `old`
    /// is deleted afterwards.
    pub fn replace_vertex(&mut self, old: V, new: V, remove: bool) -> Result<()> {
        if old == new {
            return Ok(());
        }

        let parents: Vec<(V, Option<I>)> = self
            .in_neighbours(old)
            .filter_map(|p| {
                self.edge_info(p, old)
                    .ok()
                    .map(|info| (p, info.cloned()))
            })
            .collect();
        let children: Vec<(V, Option<I>)> = self
            .forward
            .get(&old)
            .into_iter()
            .flatten()
            .map(|(c, info)| (*c, info.clone()))
            .collect();

        // Resolve every payload first so that a merge failure leaves the
        // graph untouched.
        let mut resolved = Vec::with_capacity(parents.len() + children.len());
        for (parent, info) in parents {
            if parent != new {
                resolved.push((parent, new, self.resolved_info(parent, new, info)?));
            }
        }
        for (child, info) in children {
            if child != new {
                resolved.push((new, child, self.resolved_info(new, child, info)?));
            }
        }

        let old_parents: Vec<V> = self.in_neighbours(old).collect();
        let old_children: Vec<V> = self.out_neighbours(old).collect();
        for parent in old_parents {
            self.remove_edge(parent, old);
        }
        for child in old_children {
            self.remove_edge(old, child);
        }

        self.insert(new);
        for (source, target, info) in resolved {
            self.install_edge(source, target, info);
        }
        if remove {
            self.remove_vertex(old);
        }
        debug!(graph = %self.name, ?old, ?new, remove, "replaced vertex");
        Ok(())
    }

    /// Add every vertex and edge of `other` into `self`. Conflicting payloads
    /// are resolved by `self`'s merge policy, with `other`'s payload as the
    /// new value. `other` is never modified.
    ///
    /// On a merge failure nothing is modified.
    pub fn merge(&mut self, other: &RelationGraph<V, I>) -> Result<()> {
        let mut resolved = Vec::with_capacity(other.num_edges());
        for (source, target, info) in other.each_edge() {
            resolved.push((source, target, self.resolved_info(source, target, info.cloned())?));
        }
        for vertex in other.vertices() {
            self.insert(vertex);
        }
        for (source, target, info) in resolved {
            self.install_edge(source, target, info);
        }
        Ok(())
    }

    /// Copy of this graph with every edge reversed.
    pub fn reverse(&self) -> RelationGraph<V, I> {
        let mut reversed = RelationGraph::with_merge(format!("{}-reverse", self.name), self.merge);
        for vertex in self.vertices() {
            reversed.insert(vertex);
        }
        for (source, target, info) in self.each_edge() {
            reversed.install_edge(target, source, info.cloned());
        }
        reversed
    }

    /// Check that forward and backward adjacency agree.
    ///
    /// O(V + E). Not meant for the execution hot path.
    pub fn verify_consistency(&self) -> Result<()> {
        let inconsistent = |msg: String| PlanError::Inconsistent(format!("{}: {msg}", self.name));

        if self.forward.len() != self.backward.len() {
            return Err(inconsistent(format!(
                "{} vertices in forward index, {} in backward index",
                self.forward.len(),
                self.backward.len()
            )));
        }

        let mut forward_edges = 0;
        for (source, children) in &self.forward {
            for target in children.keys() {
                if source == target {
                    return Err(inconsistent(format!("self-loop on {source:?}")));
                }
                let has_back = self
                    .backward
                    .get(target)
                    .is_some_and(|parents| parents.contains(source));
                if !has_back {
                    return Err(inconsistent(format!(
                        "edge {source:?} -> {target:?} has no backward entry"
                    )));
                }
                forward_edges += 1;
            }
        }

        let mut backward_edges = 0;
        for (target, parents) in &self.backward {
            if !self.forward.contains_key(target) {
                return Err(inconsistent(format!(
                    "{target:?} is in the backward index only"
                )));
            }
            for source in parents {
                if !self.has_edge(*source, *target) {
                    return Err(inconsistent(format!(
                        "backward entry {target:?} <- {source:?} has no forward edge"
                    )));
                }
                backward_edges += 1;
            }
        }

        if forward_edges != backward_edges || forward_edges != self.edge_count {
            return Err(inconsistent(format!(
                "edge counts disagree: forward={forward_edges} backward={backward_edges} cached={}",
                self.edge_count
            )));
        }
        Ok(())
    }
}
