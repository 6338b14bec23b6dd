// tests/runtime.rs

mod common;
use crate::common::builders::EngineConfigBuilder;
use crate::common::{emitted, init_tracing, start_mission, with_timeout};

use std::time::Duration;

use missiongraph::plan::TaskTemplate;
use missiongraph::{spawn_channel, ControlRequest};

#[tokio::test]
async fn emit_requests_are_processed_before_shutdown() {
    init_tracing();
    let (mut core, _clock) = EngineConfigBuilder::new().cycle_length_ms(5).engine();
    let root = start_mission(&mut core, TaskTemplate::new("Patrol").with_event("ping"));
    let ping = core.plan().task_event(root, "ping").unwrap();

    let (runtime, tx) = spawn_channel(core, 8);
    let handle = tokio::spawn(runtime.run());

    tx.send(ControlRequest::Emit {
        event: ping,
        context: vec![toml::Value::Boolean(true)],
    })
    .await
    .unwrap();
    tx.send(ControlRequest::Shutdown).await.unwrap();

    let core = with_timeout(handle).await.unwrap().unwrap();
    assert!(emitted(core.plan(), root, "ping"));
    let last = core.plan().event(ping).unwrap().last().unwrap().clone();
    assert_eq!(last.context, vec![toml::Value::Boolean(true)]);
}

#[tokio::test]
async fn the_runtime_ends_when_every_sender_is_gone() {
    let (core, _clock) = EngineConfigBuilder::new().cycle_length_ms(5).engine();
    let (runtime, tx) = spawn_channel(core, 1);
    drop(tx);

    let core = with_timeout(runtime.run()).await.unwrap();
    assert!(core.cycle() >= 1, "a last cycle always runs");
}

#[tokio::test]
async fn cycles_keep_ticking_between_requests() {
    let (mut core, _clock) = EngineConfigBuilder::new().cycle_length_ms(5).engine();
    start_mission(&mut core, TaskTemplate::new("Patrol"));
    let (runtime, tx) = spawn_channel(core, 4);
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(Duration::from_millis(60)).await;
    tx.send(ControlRequest::Shutdown).await.unwrap();

    let core = with_timeout(handle).await.unwrap().unwrap();
    assert!(core.cycle() > 2, "only {} cycles ran", core.cycle());
}

#[tokio::test]
async fn failed_queued_emissions_become_exceptions() {
    let (mut core, _clock) = EngineConfigBuilder::new()
        .cycle_length_ms(5)
        .garbage_collect(false)
        .engine();
    let pending = core.plan_mut().add_task(TaskTemplate::new("Idle")).unwrap();
    let success = core.plan().task_event(pending, "success").unwrap();

    core.queue_emit(success, Vec::new());
    let report = core.process_cycle().unwrap();
    assert_eq!(report.unhandled.len(), 1);
    assert_eq!(report.unhandled[0].origin, pending);
    assert!(!core.plan().event(success).unwrap().emitted());
}
