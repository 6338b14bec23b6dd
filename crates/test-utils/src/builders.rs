#![allow(dead_code)]

use std::sync::Arc;

use missiongraph::clock::MockClock;
use missiongraph::config::{EngineConfig, EngineSection, LoggingSection, RawEngineConfig};
use missiongraph::engine::ExecutionCore;
use missiongraph::plan::relations::DependencyInfo;
use missiongraph::plan::task::TaskTemplate;
use missiongraph::plan::{Plan, TaskId};
use missiongraph::types::UnhandledExceptionPolicy;

/// Builder for `EngineConfig` to simplify test setup.
pub struct EngineConfigBuilder {
    config: RawEngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawEngineConfig {
                engine: EngineSection::default(),
                logging: LoggingSection::default(),
            },
        }
    }

    pub fn cycle_length_ms(mut self, ms: u64) -> Self {
        self.config.engine.cycle_length_ms = ms;
        self
    }

    pub fn garbage_collect(mut self, enabled: bool) -> Self {
        self.config.engine.garbage_collect = enabled;
        self
    }

    pub fn verify_consistency(mut self, enabled: bool) -> Self {
        self.config.engine.verify_consistency = enabled;
        self
    }

    pub fn max_propagation_steps(mut self, steps: usize) -> Self {
        self.config.engine.max_propagation_steps = steps;
        self
    }

    pub fn unhandled_exceptions(mut self, policy: UnhandledExceptionPolicy) -> Self {
        self.config.engine.unhandled_exceptions = policy;
        self
    }

    pub fn build(self) -> EngineConfig {
        EngineConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Engine on a fresh mock clock, consistency checks on.
    pub fn engine(self) -> (ExecutionCore, MockClock) {
        let clock = MockClock::new();
        let core = ExecutionCore::new(self.verify_consistency(true).build(), Arc::new(clock.clone()));
        (core, clock)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A plan on a mock clock plus shortcuts for common shapes.
pub struct PlanFixture {
    pub plan: Plan,
    pub clock: MockClock,
}

impl PlanFixture {
    pub fn new() -> Self {
        let clock = MockClock::new();
        Self {
            plan: Plan::new(Arc::new(clock.clone())),
            clock,
        }
    }

    /// Pending task of `model`.
    pub fn task(&mut self, model: &str) -> TaskId {
        self.plan
            .add_task(TaskTemplate::new(model))
            .expect("task should be added")
    }

    /// Running task of `model`.
    pub fn running(&mut self, model: &str) -> TaskId {
        let task = self.task(model);
        self.plan.start_task(task).expect("task should start");
        task
    }

    /// Running mission of `model`.
    pub fn mission(&mut self, model: &str) -> TaskId {
        let task = self.running(model);
        self.plan.add_mission(task).expect("mission should be added");
        task
    }

    /// `parent` depends on `child` under `role` with the default success and
    /// failure events.
    pub fn depend(&mut self, parent: TaskId, child: TaskId, role: &str) {
        self.plan
            .depends_on(parent, child, DependencyInfo::new().with_role(role))
            .expect("dependency should be added");
    }

    /// `models[0] -> models[1] -> ...`, every task running, the first one a
    /// mission. Returns the tasks in chain order.
    pub fn mission_chain(&mut self, models: &[&str]) -> Vec<TaskId> {
        let mut tasks = Vec::with_capacity(models.len());
        for (i, model) in models.iter().enumerate() {
            let task = if i == 0 { self.mission(model) } else { self.running(model) };
            if let Some(&parent) = tasks.last() {
                self.depend(parent, task, model);
            }
            tasks.push(task);
        }
        tasks
    }
}

impl Default for PlanFixture {
    fn default() -> Self {
        Self::new()
    }
}
