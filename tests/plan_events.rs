// tests/plan_events.rs

mod common;
use crate::common::builders::PlanFixture;
use crate::common::{emit, emitted, init_tracing, state};

use std::time::Duration;

use missiongraph::errors::{ErrorKind, PlanError};
use missiongraph::plan::relations::DependencyInfo;
use missiongraph::plan::task::{FAILED, START, STOP, SUCCESS};
use missiongraph::plan::{TaskState, TaskTemplate};

#[test]
fn start_is_only_accepted_while_pending() {
    init_tracing();
    let mut fx = PlanFixture::new();
    let task = fx.task("Move");

    let err = fx.plan.emit_task_event(task, SUCCESS, Vec::new()).unwrap_err();
    assert!(matches!(err, PlanError::EmissionFailed(_)));

    emit(&mut fx.plan, task, START);
    assert_eq!(state(&fx.plan, task), TaskState::Running);
    assert!(fx.plan.task(task).unwrap().started_at().is_some());

    let err = fx.plan.start_task(task).unwrap_err();
    assert!(matches!(err, PlanError::EmissionFailed(_)));
}

#[test]
fn success_forwards_to_stop_and_finishes_the_task() {
    let mut fx = PlanFixture::new();
    let task = fx.running("Move");

    emit(&mut fx.plan, task, SUCCESS);
    assert!(emitted(&fx.plan, task, STOP));
    assert_eq!(state(&fx.plan, task), TaskState::Success);
    assert!(fx.plan.task(task).unwrap().finished_at().is_some());

    // Everything not emitted is now unreachable.
    let failed = fx.plan.task_event(task, FAILED).unwrap();
    assert!(fx.plan.event(failed).unwrap().is_unreachable());
    assert!(fx.plan.emit(failed, Vec::new()).is_err());
}

#[test]
fn aborted_goes_through_failed() {
    let mut fx = PlanFixture::new();
    let task = fx.running("Move");

    emit(&mut fx.plan, task, "aborted");
    assert!(emitted(&fx.plan, task, FAILED));
    assert!(emitted(&fx.plan, task, STOP));
    assert_eq!(state(&fx.plan, task), TaskState::Failed);
}

#[test]
fn stop_without_outcome_leaves_the_task_stopped() {
    let mut fx = PlanFixture::new();
    let task = fx.running("Move");
    fx.plan.stop_task(task).unwrap();
    assert_eq!(state(&fx.plan, task), TaskState::Stopped);

    // Stopping a finished task is a no-op.
    fx.plan.stop_task(task).unwrap();
}

#[test]
fn stopping_a_pending_task_makes_every_event_unreachable() {
    let mut fx = PlanFixture::new();
    let task = fx.task("Move");
    fx.plan.stop_task(task).unwrap();

    assert_eq!(state(&fx.plan, task), TaskState::Stopped);
    let start = fx.plan.task_event(task, START).unwrap();
    assert!(fx.plan.event(start).unwrap().is_unreachable());
}

#[test]
fn emissions_are_sequenced_and_timestamped() {
    let mut fx = PlanFixture::new();
    let task = fx.running("Move");
    let start_seq = fx.plan.emission_seq();

    fx.clock.advance(Duration::from_secs(2));
    fx.plan
        .emit_task_event(task, SUCCESS, vec![toml::Value::Integer(42)])
        .unwrap();

    let success = fx.plan.task_event(task, SUCCESS).unwrap();
    let stop = fx.plan.task_event(task, STOP).unwrap();
    let success = fx.plan.event(success).unwrap().last().unwrap().clone();
    let stop = fx.plan.event(stop).unwrap().last().unwrap().clone();

    assert_eq!(success.seq, start_seq + 1);
    assert_eq!(stop.seq, start_seq + 2);
    assert_eq!(stop.context, vec![toml::Value::Integer(42)], "forwarding keeps the context");
    assert!(success.time >= fx.plan.task(task).unwrap().started_at().unwrap() + Duration::from_secs(2));

    let records = fx.plan.take_emissions();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec![START, SUCCESS, STOP]);
    assert!(!fx.plan.has_pending_emissions());
}

#[test]
fn signals_and_forwardings_propagate_across_tasks() {
    let mut fx = PlanFixture::new();
    let a = fx.running("A");
    let b = fx.task("B");

    let a_success = fx.plan.task_event(a, SUCCESS).unwrap();
    let b_start = fx.plan.task_event(b, START).unwrap();
    fx.plan.signal(a_success, b_start).unwrap();

    emit(&mut fx.plan, a, SUCCESS);
    assert_eq!(state(&fx.plan, b), TaskState::Running);

    // Free events carry forwardings too.
    let tick = fx.plan.add_event("tick");
    let b_success = fx.plan.task_event(b, SUCCESS).unwrap();
    fx.plan.forward(tick, b_success).unwrap();
    fx.plan.emit(tick, Vec::new()).unwrap();
    assert_eq!(state(&fx.plan, b), TaskState::Success);
}

#[test]
fn refused_emissions_down_the_line_become_exceptions() {
    let mut fx = PlanFixture::new();
    let a = fx.running("A");
    let b = fx.task("B");

    let a_success = fx.plan.task_event(a, SUCCESS).unwrap();
    let b_success = fx.plan.task_event(b, SUCCESS).unwrap();
    fx.plan.forward(a_success, b_success).unwrap();

    emit(&mut fx.plan, a, SUCCESS);
    let exceptions = fx.plan.take_exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].origin, b);
    assert_eq!(exceptions[0].kind(), ErrorKind::EmissionFailed);
    assert_eq!(exceptions[0].failure_event.as_deref(), Some(SUCCESS));
}

#[test]
fn forwarding_loops_are_refused() {
    let mut fx = PlanFixture::new();
    let a = fx.running("A");
    let b = fx.running("B");

    let a_success = fx.plan.task_event(a, SUCCESS).unwrap();
    let b_success = fx.plan.task_event(b, SUCCESS).unwrap();
    fx.plan.forward(a_success, b_success).unwrap();
    let err = fx.plan.signal(b_success, a_success).unwrap_err();
    assert!(matches!(err, PlanError::CycleFound(_)));
}

#[test]
fn template_events_and_forwardings_are_instantiated() {
    let mut fx = PlanFixture::new();
    let template = TaskTemplate::new("Dock")
        .with_argument("port", 3i64)
        .with_event("blocked")
        .with_forwarding("blocked", FAILED);
    let task = fx.plan.add_task(template).unwrap();
    fx.plan.start_task(task).unwrap();

    assert_eq!(
        fx.plan.task(task).unwrap().arguments().get("port"),
        Some(&toml::Value::Integer(3))
    );
    emit(&mut fx.plan, task, "blocked");
    assert_eq!(state(&fx.plan, task), TaskState::Failed);

    let bad = TaskTemplate::new("Dock").with_forwarding("missing", FAILED);
    assert!(matches!(fx.plan.add_task(bad), Err(PlanError::Argument(_))));
}

#[test]
fn failed_child_raises_child_failed_on_running_parents() {
    let mut fx = PlanFixture::new();
    let chain = fx.mission_chain(&["Mission", "Move"]);
    let (parent, child) = (chain[0], chain[1]);

    emit(&mut fx.plan, child, FAILED);
    let exceptions = fx.plan.take_exceptions();
    assert_eq!(exceptions.len(), 1, "failed -> stop must not raise twice");
    let exception = &exceptions[0];
    assert_eq!(exception.kind(), ErrorKind::ChildFailed);
    assert_eq!(exception.origin, child);
    assert_eq!(exception.trace, vec![child, parent]);
    assert_eq!(exception.failure_event.as_deref(), Some(FAILED));
}

#[test]
fn child_stopping_without_success_breaks_the_dependency() {
    let mut fx = PlanFixture::new();
    let chain = fx.mission_chain(&["Mission", "Move"]);
    fx.plan.stop_task(chain[1]).unwrap();

    let exceptions = fx.plan.take_exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].failure_event.as_deref(), Some(STOP));
}

#[test]
fn successful_child_and_keep_alive_edges_raise_nothing() {
    let mut fx = PlanFixture::new();
    let parent = fx.mission("Mission");
    let ok = fx.running("Ok");
    let kept = fx.running("Kept");
    fx.depend(parent, ok, "ok");
    fx.plan
        .depends_on(parent, kept, DependencyInfo::new().with_success(Vec::<String>::new()))
        .unwrap();

    emit(&mut fx.plan, ok, SUCCESS);
    fx.plan.stop_task(kept).unwrap();
    assert!(fx.plan.take_exceptions().is_empty());
}

#[test]
fn roles_merge_and_are_removed_one_by_one() {
    let mut fx = PlanFixture::new();
    let parent = fx.mission("Mission");
    let child = fx.running("Move");
    fx.depend(parent, child, "first");
    fx.depend(parent, child, "second");

    assert_eq!(fx.plan.child_with_role(parent, "first"), Some(child));
    assert_eq!(fx.plan.child_with_role(parent, "second"), Some(child));

    assert!(!fx.plan.remove_role(parent, child, "first").unwrap());
    assert_eq!(fx.plan.child_with_role(parent, "first"), None);
    assert!(fx.plan.remove_role(parent, child, "second").unwrap());
    assert!(fx.plan.dependency_info(parent, child).is_none());
}

#[test]
fn replace_task_moves_parents_and_mission_status() {
    let mut fx = PlanFixture::new();
    let mission = fx.mission("Mission");
    let parent = fx.running("Parent");
    let grandchild = fx.running("Leaf");
    fx.depend(parent, mission, "mission");
    fx.depend(mission, grandchild, "leaf");

    let replacement = fx.running("Mission");
    fx.plan.replace_task(mission, replacement).unwrap();

    assert!(fx.plan.is_mission(replacement));
    assert!(!fx.plan.is_mission(mission));
    assert_eq!(fx.plan.child_with_role(parent, "mission"), Some(replacement));
    assert_eq!(fx.plan.child_with_role(mission, "leaf"), Some(grandchild), "children stay");
    assert_eq!(fx.plan.child_with_role(replacement, "leaf"), None);
    fx.plan.verify_consistency().unwrap();
}

#[test]
fn finalize_refuses_running_tasks() {
    let mut fx = PlanFixture::new();
    let task = fx.running("Move");
    assert!(matches!(fx.plan.finalize_task(task), Err(PlanError::Argument(_))));

    emit(&mut fx.plan, task, SUCCESS);
    let success = fx.plan.task_event(task, SUCCESS).unwrap();
    let events_before = fx.plan.event_count();
    fx.plan.finalize_task(task).unwrap();
    assert_eq!(state(&fx.plan, task), TaskState::Finalized);
    assert!(!fx.plan.is_live(task));
    assert!(fx.plan.is_finalized(task));
    fx.plan.finalize_task(task).unwrap();

    assert!(fx.plan.event_count() < events_before, "events leave with their task");
    assert!(matches!(fx.plan.event(success), Err(PlanError::UnknownEvent(_))));
    assert!(matches!(
        fx.plan.check_emittable(success),
        Err(PlanError::EmissionFailed(_))
    ));
    assert!(matches!(fx.plan.task(task), Err(PlanError::UnknownTask(_))));
    fx.plan.verify_consistency().unwrap();
}

#[test]
fn propagation_is_bounded() {
    let mut fx = PlanFixture::new();
    fx.plan.set_max_propagation_steps(3);
    let events: Vec<_> = (0..5).map(|i| fx.plan.add_event(format!("e{i}"))).collect();
    for pair in events.windows(2) {
        fx.plan.forward(pair[0], pair[1]).unwrap();
    }
    let err = fx.plan.emit(events[0], Vec::new()).unwrap_err();
    assert!(matches!(err, PlanError::EmissionFailed(_)));
}
