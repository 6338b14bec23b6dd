// src/plan/mod.rs

//! The plan: tasks, events and the relations between them.
//!
//! Tasks and events live in arenas owned by [`Plan`] and are referred to by
//! copyable handles ([`TaskId`], [`EventId`]). Relations between them are
//! stored in two [`RelationSpace`](crate::graph::RelationSpace)s, one per
//! vertex type.

use std::fmt;

pub mod event;
pub mod gc;
pub mod live;
pub mod relations;
pub mod task;
pub mod transaction;

/// Handle of a task in a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Handle of an event generator in a [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

pub use event::{ContextValue, Emission, EmissionRecord, EventGenerator};
pub use gc::{GarbageCollector, ReachabilityCollector};
pub use live::Plan;
pub use relations::{DependencyInfo, EventRelation, TaskRelation};
pub use task::{Task, TaskState, TaskTemplate};
pub use transaction::{CommitReport, Transaction};
