// src/plan/transaction.rs

//! Isolated edits of the task relations, applied to the plan at commit.
//!
//! A [`Transaction`] works on a detached copy of the plan's task relations
//! and keeps a second, untouched copy of how they looked when it was opened.
//! At [`Transaction::commit`] the difference between the two is the set of
//! edits the transaction made; only those are replayed on the plan, so
//! edges the plan gained or lost in the meantime are left alone.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::errors::{PlanError, Result};
use crate::graph::capability::VertexCapability;
use crate::graph::hierarchy::{Relation, RelationSpace};
use crate::plan::live::Plan;
use crate::plan::relations::{DependencyInfo, TaskRelation};
use crate::plan::task::TaskTemplate;
use crate::plan::TaskId;

/// Handles of tasks created inside a transaction live above this value
/// until commit.
const LOCAL_TASK_BASE: u64 = 1 << 63;

/// Counts of changes applied by a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Local handle -> plan handle for every task created in the transaction.
    pub created: BTreeMap<TaskId, TaskId>,
    pub added_edges: usize,
    pub removed_edges: usize,
    pub changed_edges: usize,
}

/// One edit of a task relation, in transaction handles.
#[derive(Debug, Clone)]
enum Edit {
    Remove(TaskRelation, TaskId, TaskId),
    /// Set the payload of an edge, adding the edge if the plan lost it.
    Change(TaskRelation, TaskId, TaskId, Option<DependencyInfo>),
    Add(TaskRelation, TaskId, TaskId, Option<DependencyInfo>),
}

impl Edit {
    fn endpoints(&self) -> (TaskId, TaskId) {
        match self {
            Edit::Remove(_, p, c) | Edit::Change(_, p, c, _) | Edit::Add(_, p, c, _) => (*p, *c),
        }
    }
}

#[derive(Debug)]
pub struct Transaction {
    relations: RelationSpace<TaskRelation>,
    /// The task relations as they were when the transaction was opened.
    opened_with: RelationSpace<TaskRelation>,
    /// Live plan tasks at the time the transaction was opened.
    base_tasks: BTreeSet<TaskId>,
    new_tasks: BTreeMap<TaskId, TaskTemplate>,
    next_local: u64,
}

impl Transaction {
    pub fn new(plan: &Plan) -> Self {
        Self {
            relations: plan.task_relations().detached_copy(),
            opened_with: plan.task_relations().detached_copy(),
            base_tasks: plan.live_tasks().into_iter().collect(),
            new_tasks: BTreeMap::new(),
            next_local: LOCAL_TASK_BASE,
        }
    }

    /// Add a task to the transaction. The returned handle is only valid
    /// within this transaction.
    pub fn add_task(&mut self, template: TaskTemplate) -> TaskId {
        let id = TaskId(self.next_local);
        self.next_local += 1;
        self.new_tasks.insert(id, template);
        id
    }

    pub fn is_local(&self, task: TaskId) -> bool {
        self.new_tasks.contains_key(&task)
    }

    pub fn knows(&self, task: TaskId) -> bool {
        self.base_tasks.contains(&task) || self.new_tasks.contains_key(&task)
    }

    /// Abandon every change.
    pub fn discard(self) {}

    /// Edits made since the transaction was opened: removals first, then
    /// payload changes, then additions.
    fn edits(&self) -> Vec<Edit> {
        let mut removals = Vec::new();
        let mut changes = Vec::new();
        let mut additions = Vec::new();
        for &kind in TaskRelation::all() {
            let mine = self.relations.graph(kind);
            let before = self.opened_with.graph(kind);
            let vertices: BTreeSet<TaskId> = mine.vertices().chain(before.vertices()).collect();
            let diff = mine.difference(before, vertices, |v| v);

            removals.extend(
                diff.missing_edges
                    .into_iter()
                    .map(|(p, c)| Edit::Remove(kind, p, c)),
            );
            changes.extend(
                diff.changed_info
                    .into_iter()
                    .map(|(p, c, info)| Edit::Change(kind, p, c, info)),
            );
            additions.extend(
                diff.new_edges
                    .into_iter()
                    .map(|(p, c, info)| Edit::Add(kind, p, c, info)),
            );
        }
        removals.into_iter().chain(changes).chain(additions).collect()
    }

    /// Apply the transaction to `plan`.
    ///
    /// Every edit is first replayed on a staged copy of the plan's
    /// relations: an edit naming a task that left the plan, closing a cycle
    /// or carrying a payload that cannot be merged aborts the commit before
    /// the plan is modified.
    pub fn commit(self, plan: &mut Plan) -> Result<CommitReport> {
        let edits = self.edits();

        for edit in &edits {
            let (parent, child) = edit.endpoints();
            for task in [parent, child] {
                if !self.is_local(task) && !plan.is_live(task) {
                    return Err(PlanError::UnknownTask(format!(
                        "{parent} -> {child} refers to a task no longer in the plan"
                    )));
                }
            }
        }
        let mut staged = plan.task_relations().detached_copy();
        for edit in &edits {
            apply(&mut staged, edit)?;
        }

        let mut report = CommitReport::default();
        for (local, template) in &self.new_tasks {
            match plan.add_task(template.clone()) {
                Ok(real) => {
                    report.created.insert(*local, real);
                }
                Err(err) => {
                    for real in report.created.values() {
                        if let Err(err) = plan.finalize_task(*real) {
                            warn!(task = %real, "could not drop task of aborted commit: {err}");
                        }
                    }
                    return Err(err);
                }
            }
        }

        let map = |task: TaskId| report.created.get(&task).copied().unwrap_or(task);
        let mapped: Vec<Edit> = edits
            .into_iter()
            .map(|edit| match edit {
                Edit::Remove(k, p, c) => Edit::Remove(k, map(p), map(c)),
                Edit::Change(k, p, c, info) => Edit::Change(k, map(p), map(c), info),
                Edit::Add(k, p, c, info) => Edit::Add(k, map(p), map(c), info),
            })
            .collect();

        for edit in &mapped {
            match apply(VertexCapability::<TaskRelation>::relations_mut(plan), edit)? {
                Applied::Removed => report.removed_edges += 1,
                Applied::Changed => report.changed_edges += 1,
                Applied::Added => report.added_edges += 1,
                Applied::Nothing => {}
            }
        }

        info!(
            created = report.created.len(),
            added = report.added_edges,
            removed = report.removed_edges,
            changed = report.changed_edges,
            "transaction committed"
        );
        Ok(report)
    }
}

enum Applied {
    Removed,
    Changed,
    Added,
    Nothing,
}

fn apply(relations: &mut RelationSpace<TaskRelation>, edit: &Edit) -> Result<Applied> {
    match edit {
        Edit::Remove(kind, parent, child) => Ok(if relations.remove_relation(*kind, *parent, *child) {
            Applied::Removed
        } else {
            debug!(%parent, %child, relation = kind.name(), "edge already gone from the plan");
            Applied::Nothing
        }),
        Edit::Change(kind, parent, child, info) if relations.graph(*kind).has_edge(*parent, *child) => {
            relations.set_info(*kind, *parent, *child, info.clone())?;
            Ok(Applied::Changed)
        }
        // An edge the plan gained meanwhile is merged with, not overwritten.
        Edit::Change(kind, parent, child, info) | Edit::Add(kind, parent, child, info) => {
            relations.add_relation(*kind, *parent, *child, info.clone())?;
            Ok(Applied::Added)
        }
    }
}

impl VertexCapability<TaskRelation> for Transaction {
    fn relations(&self) -> &RelationSpace<TaskRelation> {
        &self.relations
    }

    fn relations_mut(&mut self) -> &mut RelationSpace<TaskRelation> {
        &mut self.relations
    }
}
