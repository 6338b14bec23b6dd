// src/graph/mod.rs

//! Relation graph engine.
//!
//! - [`relation_graph`] holds the typed directed graph with paired
//!   forward/backward adjacency and edge payloads.
//! - [`closure`] contains the incrementally maintained reachability cache.
//! - [`hierarchy`] composes graphs into subset/superset families.
//! - [`capability`] defines the per-relation accessor interface.
//! - [`algo`] provides whole-graph algorithms (components, topological
//!   order) on top of `petgraph`.

pub mod algo;
pub mod capability;
pub mod closure;
pub mod hierarchy;
pub mod relation_graph;

pub use capability::VertexCapability;
pub use closure::IncrementalTransitiveClosure;
pub use hierarchy::{Relation, RelationObserver, RelationSpace};
pub use relation_graph::{
    prefer_new, refuse_merge, Direction, EdgeKind, EdgeMask, GraphDifference, MergeFn, RelationGraph, Vertex,
};
