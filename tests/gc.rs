// tests/gc.rs

mod common;
use crate::common::builders::{EngineConfigBuilder, PlanFixture};
use crate::common::{emit, init_tracing, state};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use missiongraph::plan::task::SUCCESS;
use missiongraph::plan::{GarbageCollector, Plan, ReachabilityCollector, TaskId, TaskState, TaskTemplate};

#[test]
fn finished_tasks_nobody_needs_are_finalized() {
    init_tracing();
    let mut fx = PlanFixture::new();
    let chain = fx.mission_chain(&["Mission", "Move"]);
    let orphan = fx.running("Orphan");
    emit(&mut fx.plan, orphan, SUCCESS);

    let finalized = fx.plan.garbage_collect(&mut ReachabilityCollector);
    assert_eq!(finalized, vec![orphan]);
    assert_eq!(state(&fx.plan, orphan), TaskState::Finalized);
    assert!(chain.iter().all(|t| fx.plan.is_live(*t)));
}

#[test]
fn running_orphans_are_stopped_then_finalized() {
    let mut fx = PlanFixture::new();
    let orphan = fx.running("Orphan");

    assert!(fx.plan.garbage_collect(&mut ReachabilityCollector).is_empty());
    assert_eq!(state(&fx.plan, orphan), TaskState::Stopped);

    assert_eq!(fx.plan.garbage_collect(&mut ReachabilityCollector), vec![orphan]);
}

#[test]
fn pending_tasks_are_left_alone() {
    let mut fx = PlanFixture::new();
    let pending = fx.task("Later");
    assert!(fx.plan.garbage_collect(&mut ReachabilityCollector).is_empty());
    assert_eq!(state(&fx.plan, pending), TaskState::Pending);
}

#[test]
fn permanent_tasks_keep_their_children() {
    let mut fx = PlanFixture::new();
    let keeper = fx.running("Keeper");
    fx.plan.add_permanent(keeper).unwrap();
    let done = fx.running("Done");
    fx.depend(keeper, done, "done");
    emit(&mut fx.plan, done, SUCCESS);

    assert!(fx.plan.garbage_collect(&mut ReachabilityCollector).is_empty());
    assert!(fx.plan.is_live(done));
}

#[test]
fn a_finished_mission_releases_everything_below_it() {
    let mut fx = PlanFixture::new();
    let chain = fx.mission_chain(&["Mission", "Move"]);
    let (mission, child) = (chain[0], chain[1]);
    emit(&mut fx.plan, mission, SUCCESS);

    let finalized = fx.plan.garbage_collect(&mut ReachabilityCollector);
    assert_eq!(finalized, vec![mission]);
    assert_eq!(state(&fx.plan, child), TaskState::Stopped);
    assert!(fx.plan.take_exceptions().is_empty(), "the parent is no longer running");

    assert_eq!(fx.plan.garbage_collect(&mut ReachabilityCollector), vec![child]);
    fx.plan.verify_consistency().unwrap();
}

#[test]
fn the_engine_collects_once_per_cycle() {
    let (mut core, _clock) = EngineConfigBuilder::new().engine();
    let orphan = core.plan_mut().add_task(TaskTemplate::new("Orphan")).unwrap();
    core.plan_mut().start_task(orphan).unwrap();

    let first = core.process_cycle().unwrap();
    assert!(first.finalized.is_empty());
    let second = core.process_cycle().unwrap();
    assert_eq!(second.finalized, vec![orphan]);
}

#[test]
fn collection_can_be_turned_off() {
    let (mut core, _clock) = EngineConfigBuilder::new().garbage_collect(false).engine();
    let orphan = core.plan_mut().add_task(TaskTemplate::new("Orphan")).unwrap();
    core.plan_mut().start_task(orphan).unwrap();

    core.process_cycle().unwrap();
    core.process_cycle().unwrap();
    assert!(core.plan().task(orphan).unwrap().is_running());
}

struct Counting {
    passes: Arc<AtomicUsize>,
}

impl GarbageCollector for Counting {
    fn collect(&mut self, _plan: &mut Plan) -> Vec<TaskId> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    }
}

#[test]
fn the_collector_is_pluggable() {
    let passes = Arc::new(AtomicUsize::new(0));
    let (mut core, _clock) = EngineConfigBuilder::new().engine();
    core.set_garbage_collector(Box::new(Counting {
        passes: Arc::clone(&passes),
    }));
    let orphan = core.plan_mut().add_task(TaskTemplate::new("Orphan")).unwrap();
    core.plan_mut().start_task(orphan).unwrap();

    core.process_cycle().unwrap();
    core.process_cycle().unwrap();
    assert_eq!(passes.load(Ordering::SeqCst), 2);
    assert!(core.plan().task(orphan).unwrap().is_running());
}
