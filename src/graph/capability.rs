// src/graph/capability.rs

use crate::errors::Result;
use crate::graph::hierarchy::{Relation, RelationSpace};
use crate::graph::relation_graph::RelationGraph;

/// Uniform access to the relation graphs a vertex takes part in.
///
/// Implemented by the live plan and by transactions, each of which owns its
/// own set of graphs. Accessors are indexed by relation kind instead of
/// being generated per relation.
pub trait VertexCapability<K: Relation> {
    fn relations(&self) -> &RelationSpace<K>;

    fn relations_mut(&mut self) -> &mut RelationSpace<K>;

    fn relation_graph(&self, relation: K) -> &RelationGraph<K::Vertex, K::Info> {
        self.relations().graph(relation)
    }

    fn children_of(&self, relation: K, vertex: K::Vertex) -> Vec<K::Vertex> {
        self.relations().children_of(relation, vertex)
    }

    fn parents_of(&self, relation: K, vertex: K::Vertex) -> Vec<K::Vertex> {
        self.relations().parents_of(relation, vertex)
    }

    fn add_relation(
        &mut self,
        relation: K,
        parent: K::Vertex,
        child: K::Vertex,
        info: Option<K::Info>,
    ) -> Result<()> {
        self.relations_mut().add_relation(relation, parent, child, info)
    }

    fn remove_relation(&mut self, relation: K, parent: K::Vertex, child: K::Vertex) -> bool {
        self.relations_mut().remove_relation(relation, parent, child)
    }

    /// Relation kinds whose graph currently contains `vertex`.
    fn graphs_of(&self, vertex: K::Vertex) -> Vec<K> {
        self.relations().graphs_of(vertex)
    }
}

impl<K: Relation> VertexCapability<K> for RelationSpace<K> {
    fn relations(&self) -> &RelationSpace<K> {
        self
    }

    fn relations_mut(&mut self) -> &mut RelationSpace<K> {
        self
    }
}
