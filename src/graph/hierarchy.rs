// src/graph/hierarchy.rs

//! Families of relation graphs composed through subset/superset links.
//!
//! A [`RelationSpace`] owns one [`RelationGraph`] per relation kind. Kinds
//! may be declared subsets of other kinds, forming a forest:
//!
//! - adding an edge to a subset also adds it to every ancestor, innermost
//!   first, so supersets see every edge created in a descendant;
//! - edges added directly to a superset never show up in its subsets;
//! - removing an edge removes it from every descendant and from every
//!   ancestor no other subset still needs it in, keeping subset edges a
//!   subset of superset edges.
//!
//! Relations flagged as DAGs keep an [`IncrementalTransitiveClosure`] that
//! rejects cycle-closing edges before anything is committed.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::errors::{PlanError, Result};
use crate::graph::closure::IncrementalTransitiveClosure;
use crate::graph::relation_graph::{refuse_merge, MergeFn, RelationGraph, Vertex};

/// A relation kind: identifies one graph inside a [`RelationSpace`].
pub trait Relation: Copy + Ord + fmt::Debug + Send + 'static {
    type Vertex: Vertex + Send;
    type Info: Clone + PartialEq + fmt::Debug + Send;

    /// Every kind of this relation family.
    fn all() -> &'static [Self];

    fn name(self) -> &'static str;

    /// Kind this one is declared a subset of.
    fn superset(self) -> Option<Self> {
        None
    }

    /// Whether edges closing a cycle must be refused.
    fn is_dag(self) -> bool {
        false
    }

    fn merge_fn(self) -> MergeFn<Self::Vertex, Self::Info> {
        refuse_merge::<Self::Vertex, Self::Info>
    }
}

/// Change notifications for a [`RelationSpace`].
///
/// `adding` may refuse an edge by returning an error; it is called for every
/// affected level before anything is committed.
pub trait RelationObserver<K: Relation>: Send {
    fn adding(
        &mut self,
        _relation: K,
        _parent: K::Vertex,
        _child: K::Vertex,
        _info: Option<&K::Info>,
    ) -> Result<()> {
        Ok(())
    }

    fn added(&mut self, _relation: K, _parent: K::Vertex, _child: K::Vertex, _info: Option<&K::Info>) {}

    fn removed(&mut self, _relation: K, _parent: K::Vertex, _child: K::Vertex) {}

    fn removed_vertex(&mut self, _relation: K, _vertex: K::Vertex) {}
}

pub struct RelationSpace<K: Relation> {
    graphs: BTreeMap<K, RelationGraph<K::Vertex, K::Info>>,
    /// subset -> superset
    supersets: BTreeMap<K, K>,
    closures: BTreeMap<K, IncrementalTransitiveClosure<K::Vertex>>,
    observers: Vec<Box<dyn RelationObserver<K>>>,
}

impl<K: Relation> fmt::Debug for RelationSpace<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationSpace")
            .field("graphs", &self.graphs)
            .field("supersets", &self.supersets)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl<K: Relation> Default for RelationSpace<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Relation> RelationSpace<K> {
    /// One empty graph per kind in [`Relation::all`], with the subset links
    /// declared by [`Relation::superset`].
    pub fn new() -> Self {
        let mut graphs = BTreeMap::new();
        let mut closures = BTreeMap::new();
        let mut supersets = BTreeMap::new();
        for &kind in K::all() {
            graphs.insert(kind, RelationGraph::with_merge(kind.name(), kind.merge_fn()));
            if kind.is_dag() {
                closures.insert(kind, IncrementalTransitiveClosure::new());
            }
            if let Some(parent) = kind.superset() {
                supersets.insert(kind, parent);
            }
        }
        Self {
            graphs,
            supersets,
            closures,
            observers: Vec::new(),
        }
    }

    /// Copy of every graph and of the hierarchy, without observers.
    pub fn detached_copy(&self) -> Self {
        Self {
            graphs: self.graphs.clone(),
            supersets: self.supersets.clone(),
            closures: self.closures.clone(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn RelationObserver<K>>) {
        self.observers.push(observer);
    }

    /// Graph of `relation`. Every kind exists from construction on.
    pub fn graph(&self, relation: K) -> &RelationGraph<K::Vertex, K::Info> {
        &self.graphs[&relation]
    }

    pub fn graphs(&self) -> impl Iterator<Item = (K, &RelationGraph<K::Vertex, K::Info>)> + '_ {
        self.graphs.iter().map(|(k, g)| (*k, g))
    }

    fn graph_mut(&mut self, relation: K) -> &mut RelationGraph<K::Vertex, K::Info> {
        self.graphs
            .entry(relation)
            .or_insert_with(|| RelationGraph::with_merge(relation.name(), relation.merge_fn()))
    }

    pub fn superset_of(&self, relation: K) -> Option<K> {
        self.supersets.get(&relation).copied()
    }

    /// Direct subsets of `relation`.
    pub fn subsets_of(&self, relation: K) -> Vec<K> {
        self.supersets
            .iter()
            .filter(|(_, parent)| **parent == relation)
            .map(|(child, _)| *child)
            .collect()
    }

    /// `relation` followed by its supersets, innermost first.
    pub fn ancestors(&self, relation: K) -> Vec<K> {
        let mut chain = vec![relation];
        let mut current = relation;
        while let Some(parent) = self.superset_of(current) {
            if chain.contains(&parent) {
                warn!(?relation, "cyclic relation hierarchy; stopping ancestor walk");
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Every transitive subset of `relation` (excluding itself).
    pub fn descendants(&self, relation: K) -> Vec<K> {
        let mut result = Vec::new();
        let mut stack = self.subsets_of(relation);
        while let Some(kind) = stack.pop() {
            if kind == relation || result.contains(&kind) {
                continue;
            }
            result.push(kind);
            stack.extend(self.subsets_of(kind));
        }
        result
    }

    /// Declare `subset` a subset of `superset`.
    ///
    /// Only allowed while `subset`'s graph is empty, and only if the forest
    /// stays a forest.
    pub fn declare_subset(&mut self, superset: K, subset: K) -> Result<()> {
        if superset == subset {
            return Err(PlanError::Argument(format!(
                "{} cannot be a subset of itself",
                subset.name()
            )));
        }
        if !self.graph(subset).is_empty() {
            return Err(PlanError::Argument(format!(
                "{} can only become a subset of {} while empty",
                subset.name(),
                superset.name()
            )));
        }
        if let Some(existing) = self.superset_of(subset) {
            if existing != superset {
                return Err(PlanError::Argument(format!(
                    "{} is already a subset of {}",
                    subset.name(),
                    existing.name()
                )));
            }
            return Ok(());
        }
        if self.ancestors(superset).contains(&subset) {
            return Err(PlanError::Argument(format!(
                "making {} a subset of {} would create a cycle in the relation hierarchy",
                subset.name(),
                superset.name()
            )));
        }
        self.supersets.insert(subset, superset);
        debug!(superset = superset.name(), subset = subset.name(), "declared relation subset");
        Ok(())
    }

    /// Add `parent -> child` to `relation` and all its supersets.
    ///
    /// Refused without modifying anything if the edge is a self-loop, would
    /// close a cycle in a DAG level or cannot be merged with an existing
    /// payload at some level. Levels are then installed innermost first,
    /// each between the observers' `adding` and `added` hooks; `added` gets
    /// the payload stored at that level. If an `adding` hook fails, the
    /// levels already installed are reverted.
    pub fn add_relation(
        &mut self,
        relation: K,
        parent: K::Vertex,
        child: K::Vertex,
        info: Option<K::Info>,
    ) -> Result<()> {
        if parent == child {
            return Err(PlanError::Argument(format!(
                "cannot add self-loop on {parent:?} in {}",
                relation.name()
            )));
        }

        let levels = self.ancestors(relation);

        for &level in &levels {
            if let Some(closure) = self.closures.get_mut(&level) {
                if !self.graphs[&level].has_edge(parent, child)
                    && closure.reachable(child, parent, Some(&self.graphs[&level]))
                {
                    return Err(PlanError::CycleFound(format!(
                        "adding {parent:?} -> {child:?} to {} would create a cycle",
                        level.name()
                    )));
                }
            }
        }

        let mut resolved = Vec::with_capacity(levels.len());
        for &level in &levels {
            let info = self.graphs[&level].resolved_info(parent, child, info.clone())?;
            resolved.push((level, info));
        }

        let mut installed: Vec<(K, Option<Option<K::Info>>)> = Vec::with_capacity(resolved.len());
        for (level, level_info) in resolved {
            let refused = self
                .observers
                .iter_mut()
                .try_for_each(|observer| observer.adding(level, parent, child, level_info.as_ref()));
            if let Err(err) = refused {
                self.undo_install(parent, child, installed);
                return Err(err);
            }

            let previous = self.graphs[&level]
                .edge_info(parent, child)
                .ok()
                .map(|info| info.cloned());
            self.graph_mut(level).install_edge(parent, child, level_info.clone());
            if let Some(closure) = self.closures.get_mut(&level) {
                closure.added_edge(parent, child);
            }
            installed.push((level, previous));

            for observer in self.observers.iter_mut() {
                observer.added(level, parent, child, level_info.as_ref());
            }
        }
        Ok(())
    }

    /// Revert the levels of a refused [`add_relation`](Self::add_relation),
    /// innermost last.
    fn undo_install(&mut self, parent: K::Vertex, child: K::Vertex, installed: Vec<(K, Option<Option<K::Info>>)>) {
        for (level, previous) in installed.into_iter().rev() {
            match previous {
                Some(info) => self.graph_mut(level).install_edge(parent, child, info),
                None => {
                    self.graph_mut(level).remove_edge(parent, child);
                    if let Some(closure) = self.closures.get_mut(&level) {
                        closure.removed_edge(parent, child);
                    }
                    for observer in self.observers.iter_mut() {
                        observer.removed(level, parent, child);
                    }
                }
            }
        }
    }

    /// Remove `parent -> child` from `relation`, its descendants and its
    /// ancestors. An ancestor keeps the edge while another of its subsets
    /// still holds it. Returns whether any graph held the edge.
    pub fn remove_relation(&mut self, relation: K, parent: K::Vertex, child: K::Vertex) -> bool {
        let mut levels: Vec<(K, bool)> = self.descendants(relation).into_iter().map(|k| (k, false)).collect();
        levels.push((relation, false));
        levels.extend(self.ancestors(relation).into_iter().skip(1).map(|k| (k, true)));

        let mut removed_any = false;
        for (level, is_ancestor) in levels {
            let held_below = is_ancestor
                && self
                    .subsets_of(level)
                    .into_iter()
                    .any(|subset| self.graph(subset).has_edge(parent, child));
            if held_below || !self.graph_mut(level).remove_edge(parent, child) {
                continue;
            }
            removed_any = true;
            if let Some(closure) = self.closures.get_mut(&level) {
                closure.removed_edge(parent, child);
            }
            for observer in self.observers.iter_mut() {
                observer.removed(level, parent, child);
            }
        }
        removed_any
    }

    /// Overwrite the payload of `parent -> child` in `relation` and in every
    /// ancestor holding the edge.
    pub fn set_info(
        &mut self,
        relation: K,
        parent: K::Vertex,
        child: K::Vertex,
        info: Option<K::Info>,
    ) -> Result<()> {
        self.graph_mut(relation).set_edge_info(parent, child, info.clone())?;
        for level in self.ancestors(relation).into_iter().skip(1) {
            let graph = self.graph_mut(level);
            if graph.has_edge(parent, child) {
                graph.set_edge_info(parent, child, info.clone())?;
            }
        }
        Ok(())
    }

    /// Remove `vertex` from every graph. Returns whether it had any edge.
    pub fn remove_vertex(&mut self, vertex: K::Vertex) -> bool {
        let mut had_edges = false;
        let kinds: Vec<K> = self.graphs.keys().copied().collect();
        for kind in kinds {
            let graph = self.graph_mut(kind);
            if !graph.has_vertex(vertex) {
                continue;
            }
            had_edges |= graph.remove_vertex(vertex);
            if let Some(closure) = self.closures.get_mut(&kind) {
                closure.removed_vertex(vertex);
            }
            for observer in self.observers.iter_mut() {
                observer.removed_vertex(kind, vertex);
            }
        }
        had_edges
    }

    /// Move every edge of `old` onto `new` in every graph and delete `old`.
    ///
    /// Payload merges are resolved for all graphs before any of them is
    /// modified.
    pub fn replace_vertex(&mut self, old: K::Vertex, new: K::Vertex) -> Result<()> {
        let kinds = self.graphs_of(old);
        let mut replaced = Vec::with_capacity(kinds.len());
        for &kind in &kinds {
            let mut graph = self.graphs[&kind].clone();
            graph.replace_vertex(old, new, true)?;
            replaced.push((kind, graph));
        }

        for (kind, graph) in replaced {
            let new_edges: Vec<(K::Vertex, K::Vertex)> = graph
                .in_neighbours(new)
                .map(|p| (p, new))
                .chain(graph.out_neighbours(new).map(|c| (new, c)))
                .collect();
            self.graphs.insert(kind, graph);
            if let Some(closure) = self.closures.get_mut(&kind) {
                closure.removed_vertex(old);
                for (parent, child) in new_edges {
                    closure.added_edge(parent, child);
                }
            }
            for observer in self.observers.iter_mut() {
                observer.removed_vertex(kind, old);
            }
        }
        Ok(())
    }

    /// Reachability in `relation`, through the closure cache for DAG kinds.
    pub fn reachable(&mut self, relation: K, a: K::Vertex, b: K::Vertex) -> bool {
        match self.closures.get_mut(&relation) {
            Some(closure) => closure.reachable(a, b, Some(&self.graphs[&relation])),
            None => self.graphs[&relation].reachable(a, b),
        }
    }

    pub fn closure(&self, relation: K) -> Option<&IncrementalTransitiveClosure<K::Vertex>> {
        self.closures.get(&relation)
    }

    pub fn children_of(&self, relation: K, vertex: K::Vertex) -> Vec<K::Vertex> {
        self.graph(relation).out_neighbours(vertex).collect()
    }

    pub fn parents_of(&self, relation: K, vertex: K::Vertex) -> Vec<K::Vertex> {
        self.graph(relation).in_neighbours(vertex).collect()
    }

    /// Kinds whose graph currently contains `vertex`.
    pub fn graphs_of(&self, vertex: K::Vertex) -> Vec<K> {
        self.graphs
            .iter()
            .filter(|(_, g)| g.has_vertex(vertex))
            .map(|(k, _)| *k)
            .collect()
    }

    /// Check every graph's adjacency and that subset edges are present in
    /// their supersets.
    pub fn verify_consistency(&self) -> Result<()> {
        for graph in self.graphs.values() {
            graph.verify_consistency()?;
        }
        for (subset, superset) in &self.supersets {
            let outer = self.graph(*superset);
            for (parent, child, _) in self.graph(*subset).each_edge() {
                if !outer.has_edge(parent, child) {
                    return Err(PlanError::Inconsistent(format!(
                        "edge {parent:?} -> {child:?} of {} missing from superset {}",
                        subset.name(),
                        superset.name()
                    )));
                }
            }
        }
        Ok(())
    }
}
