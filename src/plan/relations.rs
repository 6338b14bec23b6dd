// src/plan/relations.rs

//! Relation kinds between tasks and between events.

use std::collections::BTreeSet;

use crate::errors::Result;
use crate::graph::hierarchy::Relation;
use crate::graph::relation_graph::{refuse_merge, MergeFn};
use crate::plan::task::{FAILED, SUCCESS};
use crate::plan::{EventId, TaskId};

/// Relations between tasks. None of them are nested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskRelation {
    /// parent -> child: the parent needs the child to reach one of its
    /// success events.
    Dependency,
    /// planned task -> planning task.
    PlannedBy,
    /// task -> agent executing it.
    ExecutionAgent,
    /// fault-handling task -> task it is repairing.
    ErrorHandling,
}

const TASK_RELATIONS: &[TaskRelation] = &[
    TaskRelation::Dependency,
    TaskRelation::PlannedBy,
    TaskRelation::ExecutionAgent,
    TaskRelation::ErrorHandling,
];

impl Relation for TaskRelation {
    type Vertex = TaskId;
    /// Only [`TaskRelation::Dependency`] edges carry a payload.
    type Info = DependencyInfo;

    fn all() -> &'static [Self] {
        TASK_RELATIONS
    }

    fn name(self) -> &'static str {
        match self {
            TaskRelation::Dependency => "dependency",
            TaskRelation::PlannedBy => "planned_by",
            TaskRelation::ExecutionAgent => "execution_agent",
            TaskRelation::ErrorHandling => "error_handling",
        }
    }

    fn is_dag(self) -> bool {
        matches!(self, TaskRelation::Dependency | TaskRelation::PlannedBy)
    }

    fn merge_fn(self) -> MergeFn<TaskId, DependencyInfo> {
        match self {
            TaskRelation::Dependency => merge_dependency,
            _ => refuse_merge::<TaskId, DependencyInfo>,
        }
    }
}

/// Payload of a dependency edge.
///
/// An empty `success` set makes the edge a pure keep-alive: the child
/// finishing without any particular event is not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    /// Names under which the parent refers to the child.
    pub roles: BTreeSet<String>,
    /// Child events any of which fulfils the dependency.
    pub success: BTreeSet<String>,
    /// Child events any of which breaks the dependency.
    pub failure: BTreeSet<String>,
}

impl Default for DependencyInfo {
    fn default() -> Self {
        Self {
            roles: BTreeSet::new(),
            success: BTreeSet::from([SUCCESS.to_string()]),
            failure: BTreeSet::from([FAILED.to_string()]),
        }
    }
}

impl DependencyInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Replace the success events.
    pub fn with_success<S: Into<String>>(mut self, events: impl IntoIterator<Item = S>) -> Self {
        self.success = events.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the failure events.
    pub fn with_failure<S: Into<String>>(mut self, events: impl IntoIterator<Item = S>) -> Self {
        self.failure = events.into_iter().map(Into::into).collect();
        self
    }
}

/// Merge two dependency payloads between the same pair of tasks: roles and
/// event sets are united.
pub fn merge_dependency(
    _parent: &TaskId,
    _child: &TaskId,
    old: &DependencyInfo,
    new: &DependencyInfo,
) -> Result<DependencyInfo> {
    Ok(DependencyInfo {
        roles: old.roles.union(&new.roles).cloned().collect(),
        success: old.success.union(&new.success).cloned().collect(),
        failure: old.failure.union(&new.failure).cloned().collect(),
    })
}

/// Relations between events, nested as
/// `Signal, Forwarding ⊂ CausalLink ⊂ Precedence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventRelation {
    /// Ordering constraint: the source happens before the target.
    Precedence,
    /// The source's emission may cause the target's.
    CausalLink,
    /// Emitting the source calls the target's command.
    Signal,
    /// Emitting the source emits the target.
    Forwarding,
}

const EVENT_RELATIONS: &[EventRelation] = &[
    EventRelation::Precedence,
    EventRelation::CausalLink,
    EventRelation::Signal,
    EventRelation::Forwarding,
];

impl Relation for EventRelation {
    type Vertex = EventId;
    type Info = ();

    fn all() -> &'static [Self] {
        EVENT_RELATIONS
    }

    fn name(self) -> &'static str {
        match self {
            EventRelation::Precedence => "precedence",
            EventRelation::CausalLink => "causal_link",
            EventRelation::Signal => "signal",
            EventRelation::Forwarding => "forwarding",
        }
    }

    fn superset(self) -> Option<Self> {
        match self {
            EventRelation::Precedence => None,
            EventRelation::CausalLink => Some(EventRelation::Precedence),
            EventRelation::Signal | EventRelation::Forwarding => Some(EventRelation::CausalLink),
        }
    }

    fn is_dag(self) -> bool {
        self == EventRelation::Precedence
    }
}
