#![allow(dead_code)]

pub use missiongraph_test_utils::builders;
pub use missiongraph_test_utils::{init_tracing, with_timeout};

use missiongraph::engine::ExecutionCore;
use missiongraph::plan::{DependencyInfo, Plan, TaskId, TaskState, TaskTemplate};

/// Emit `event` of `task`, panicking with the plan error otherwise.
pub fn emit(plan: &mut Plan, task: TaskId, event: &str) {
    plan.emit_task_event(task, event, Vec::new())
        .unwrap_or_else(|e| panic!("emitting {task}/{event} failed: {e}"));
}

/// State of `task`, including [`TaskState::Finalized`] once it left the plan.
pub fn state(plan: &Plan, task: TaskId) -> TaskState {
    plan.task_state(task).expect("task should have been allocated")
}

/// Whether `task/event` has been emitted at least once.
pub fn emitted(plan: &Plan, task: TaskId, event: &str) -> bool {
    let id = plan.task_event(task, event).expect("event should exist");
    plan.event(id).expect("event should exist").emitted()
}

/// Running mission instantiated from `template` inside an engine.
pub fn start_mission(core: &mut ExecutionCore, template: TaskTemplate) -> TaskId {
    let plan = core.plan_mut();
    let task = plan.add_task(template).expect("task should be added");
    plan.start_task(task).expect("task should start");
    plan.add_mission(task).expect("mission should be added");
    task
}

/// Running task from `template` that `parent` depends on under `role`.
pub fn start_child(core: &mut ExecutionCore, parent: TaskId, template: TaskTemplate, role: &str) -> TaskId {
    let plan = core.plan_mut();
    let task = plan.add_task(template).expect("task should be added");
    plan.depends_on(parent, task, DependencyInfo::new().with_role(role))
        .expect("dependency should be added");
    plan.start_task(task).expect("task should start");
    task
}
