// src/fault/handler.rs

//! Fault handlers: locate the tasks to react on, stop them, and optionally
//! restart the affected missions.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::errors::{PlanException, Result};
use crate::graph::capability::VertexCapability;
use crate::plan::relations::TaskRelation;
use crate::plan::task::{TaskTemplate, SUCCESS};
use crate::plan::{Plan, TaskId};

/// Model of the tasks representing an ongoing fault response.
pub const FAULT_HANDLING_MODEL: &str = "FaultHandlingTask";

/// Where a fault handler reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatePolicy {
    /// The failing task itself.
    Origin,
    /// Running missions among the origin and its dependency ancestors.
    Missions,
    /// Running tasks among the origin and its dependency ancestors that
    /// were produced by a planning task.
    Actions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultHandler {
    policy: LocatePolicy,
    try_again: bool,
    table: String,
}

impl FaultHandler {
    pub fn new(policy: LocatePolicy) -> Self {
        Self {
            policy,
            try_again: false,
            table: String::new(),
        }
    }

    /// Restart the stopped missions once they have finished.
    pub fn try_again(mut self) -> Self {
        self.try_again = true;
        self
    }

    pub(crate) fn in_table(mut self, table: String) -> Self {
        self.table = table;
        self
    }

    pub fn policy(&self) -> LocatePolicy {
        self.policy
    }

    pub fn retries(&self) -> bool {
        self.try_again
    }

    pub fn locate(&self, plan: &Plan, origin: TaskId) -> Vec<TaskId> {
        match self.policy {
            LocatePolicy::Origin => locate_on_origin(plan, origin),
            LocatePolicy::Missions => locate_on_missions(plan, origin),
            LocatePolicy::Actions => locate_on_actions(plan, origin),
        }
    }

    /// Start handling `exception`: spawn the fault-handling task, put the
    /// response locations under it and stop them.
    pub fn activate(&self, plan: &mut Plan, exception: &PlanException) -> Result<ActiveFaultHandler> {
        let origin = exception.origin;
        let locations = self.locate(plan, origin);

        let template = TaskTemplate::new(FAULT_HANDLING_MODEL)
            .with_argument("table", self.table.clone())
            .with_argument("origin", origin.0 as i64);
        let task = plan.add_task(template)?;
        plan.add_permanent(task)?;
        plan.start_task(task)?;

        let mut missions = Vec::new();
        for &location in &locations {
            VertexCapability::<TaskRelation>::add_relation(
                plan,
                TaskRelation::ErrorHandling,
                task,
                location,
                None,
            )?;
            if plan.is_mission(location) {
                missions.push((location, plan.task(location)?.template().clone()));
            }
        }

        info!(
            handler = %task,
            %origin,
            table = %self.table,
            locations = ?locations,
            "fault handler activated: {}",
            exception.error
        );

        for &location in &locations {
            if let Err(err) = plan.stop_task(location) {
                warn!(%location, "could not stop response location: {err}");
            }
        }

        Ok(ActiveFaultHandler {
            task,
            handler: self.clone(),
            origin,
            locations,
            missions,
            finished: false,
        })
    }
}

/// A fault response in progress.
#[derive(Debug, Clone)]
pub struct ActiveFaultHandler {
    task: TaskId,
    handler: FaultHandler,
    origin: TaskId,
    locations: Vec<TaskId>,
    /// Locations that were missions when the handler started, with the
    /// template to restart them from.
    missions: Vec<(TaskId, TaskTemplate)>,
    finished: bool,
}

impl ActiveFaultHandler {
    /// The fault-handling task.
    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn origin(&self) -> TaskId {
        self.origin
    }

    pub fn locations(&self) -> &[TaskId] {
        &self.locations
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Finish the response once every location has stopped: restart the
    /// missions if asked to, then let the fault-handling task succeed and be
    /// collected. Returns the restarted missions.
    pub fn poll(&mut self, plan: &mut Plan) -> Result<Vec<TaskId>> {
        if self.finished {
            return Ok(Vec::new());
        }
        let all_stopped = self
            .locations
            .iter()
            .all(|t| plan.task_state(*t).map_or(true, |state| state.is_finished()));
        if !all_stopped {
            return Ok(Vec::new());
        }

        let mut restarted = Vec::new();
        if self.handler.retries() {
            for (mission, template) in &self.missions {
                let mission = *mission;
                let replacement = plan.add_task(template.clone())?;
                if plan.is_live(mission) {
                    plan.replace_task(mission, replacement)?;
                } else {
                    plan.add_mission(replacement)?;
                }
                plan.start_task(replacement)?;
                info!(old = %mission, new = %replacement, "mission restarted");
                restarted.push(replacement);
            }
        }

        self.finished = true;
        plan.remove_permanent(self.task);
        if plan.task(self.task).is_ok_and(|task| task.is_running()) {
            plan.emit_task_event(self.task, SUCCESS, Vec::new())?;
        }
        info!(handler = %self.task, origin = %self.origin, "fault handler finished");
        Ok(restarted)
    }
}

pub fn locate_on_origin(_plan: &Plan, origin: TaskId) -> Vec<TaskId> {
    vec![origin]
}

/// Running missions among `origin` and its dependency ancestors.
///
/// Every such mission is returned, outermost chains included: on
/// `mission0 -> mission1 -> task`, locating from `task` gives both
/// missions.
pub fn locate_on_missions(plan: &Plan, origin: TaskId) -> Vec<TaskId> {
    ancestors_where(plan, origin, |task| plan.is_mission(task))
}

/// Running tasks among `origin` and its dependency ancestors that have a
/// planning task.
pub fn locate_on_actions(plan: &Plan, origin: TaskId) -> Vec<TaskId> {
    let planned_by = plan.task_relations().graph(TaskRelation::PlannedBy);
    ancestors_where(plan, origin, |task| planned_by.out_degree(task) > 0)
}

fn ancestors_where(plan: &Plan, origin: TaskId, keep: impl Fn(TaskId) -> bool) -> Vec<TaskId> {
    let dependency = plan.task_relations().graph(TaskRelation::Dependency);
    let mut candidates: BTreeSet<TaskId> = dependency.reverse_dfs_from(origin).into_iter().collect();
    candidates.insert(origin);
    candidates
        .into_iter()
        .filter(|t| plan.task(*t).is_ok_and(|task| task.is_running()))
        .filter(|t| keep(*t))
        .collect()
}
