// src/engine/core.rs

//! Synchronous cycle driver.
//!
//! [`ExecutionCore`] owns the plan and everything that reacts to it. One
//! call to [`ExecutionCore::process_cycle`] runs, in order:
//! - pruning of what earlier cycles left behind: terminated scripts and
//!   state machines whose root was finalized
//! - the emissions queued since the last cycle, with their propagation
//! - listener dispatch (state machines, captures)
//! - every script, in registration order, settling emissions after each
//! - exception handling: fault-response tables first, then the
//!   unhandled-exception policy
//! - the garbage-collection trigger
//! - the optional consistency check
//!
//! It has no channels and no timers; the async shell
//! (`engine::runtime::Runtime`) decides when cycles happen.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::coordination::action_state_machine::{ActionStateMachine, ActionStateMachineModel};
use crate::coordination::script::Script;
use crate::coordination::task_state_machine::{StateMachineModel, TaskStateMachine};
use crate::engine::propagation::{apply_unhandled_policy, dispatch_emissions, start_if_ready, Attached};
use crate::engine::{ControlRequest, CycleReport, ExceptionSummary, MachineId, ScriptId};
use crate::errors::{PlanException, Result};
use crate::fault::handler::ActiveFaultHandler;
use crate::fault::table::FaultResponseTable;
use crate::plan::event::ContextValue;
use crate::plan::gc::{GarbageCollector, ReachabilityCollector};
use crate::plan::{EventId, Plan};

pub struct ExecutionCore {
    plan: Plan,
    config: EngineConfig,
    scripts: BTreeMap<ScriptId, Script>,
    task_machines: BTreeMap<MachineId, Attached<TaskStateMachine>>,
    action_machines: BTreeMap<MachineId, Attached<ActionStateMachine>>,
    next_script: usize,
    next_machine: usize,
    fault_tables: Vec<FaultResponseTable>,
    fault_handlers: Vec<ActiveFaultHandler>,
    collector: Box<dyn GarbageCollector>,
    queued: VecDeque<(EventId, Vec<ContextValue>)>,
    cycle: u64,
}

impl std::fmt::Debug for ExecutionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCore")
            .field("plan", &self.plan)
            .field("cycle", &self.cycle)
            .field("scripts", &self.scripts.len())
            .field("task_machines", &self.task_machines.len())
            .field("action_machines", &self.action_machines.len())
            .field("fault_tables", &self.fault_tables.len())
            .field("fault_handlers", &self.fault_handlers.len())
            .field("queued", &self.queued.len())
            .finish_non_exhaustive()
    }
}

impl ExecutionCore {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let mut plan = Plan::new(clock);
        plan.set_max_propagation_steps(config.engine.max_propagation_steps);
        Self {
            plan,
            config,
            scripts: BTreeMap::new(),
            task_machines: BTreeMap::new(),
            action_machines: BTreeMap::new(),
            next_script: 0,
            next_machine: 0,
            fault_tables: Vec::new(),
            fault_handlers: Vec::new(),
            collector: Box::new(ReachabilityCollector),
            queued: VecDeque::new(),
            cycle: 0,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut Plan {
        &mut self.plan
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of cycles processed so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn set_garbage_collector(&mut self, collector: Box<dyn GarbageCollector>) {
        self.collector = collector;
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Register a script. Scripts are stepped in registration order once
    /// their root runs.
    pub fn add_script(&mut self, script: Script) -> ScriptId {
        let id = ScriptId(self.next_script);
        self.next_script += 1;
        debug!(script = %script.name(), root = %script.root(), id = id.0, "script added");
        self.scripts.insert(id, script);
        id
    }

    /// A registered script. Scripts that finished, failed or were cancelled
    /// stay visible until the next cycle starts.
    pub fn script(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.get(&id)
    }

    /// Number of scripts still registered.
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Number of state machines (task and action) still attached.
    pub fn machine_count(&self) -> usize {
        self.task_machines.len() + self.action_machines.len()
    }

    /// Cancel a script and release whatever it holds.
    pub fn cancel_script(&mut self, id: ScriptId) -> bool {
        match self.scripts.get_mut(&id) {
            Some(script) if script.is_active() => {
                script.cancel(&mut self.plan);
                true
            }
            _ => false,
        }
    }

    /// Disable one instruction of a script.
    pub fn cancel_instruction(&mut self, id: ScriptId, index: usize) -> bool {
        self.scripts
            .get_mut(&id)
            .is_some_and(|script| script.cancel_instruction(index, &mut self.plan))
    }

    /// Attach a state machine to `root`. It starts as soon as `root` runs.
    pub fn add_task_state_machine(
        &mut self,
        model: Arc<StateMachineModel>,
        root: crate::plan::TaskId,
        start_state: Option<String>,
    ) -> Result<MachineId> {
        self.plan.task(root)?;
        let mut slot = Attached {
            machine: TaskStateMachine::new(model, root),
            start_state,
        };
        start_if_ready(&mut slot, &mut self.plan);
        let id = self.allocate_machine();
        self.task_machines.insert(id, slot);
        Ok(id)
    }

    /// An attached task state machine. Machines are dropped at the start of
    /// the cycle after their root was finalized.
    pub fn task_state_machine(&self, id: MachineId) -> Option<&TaskStateMachine> {
        self.task_machines.get(&id).map(|slot| &slot.machine)
    }

    fn allocate_machine(&mut self) -> MachineId {
        let id = MachineId(self.next_machine);
        self.next_machine += 1;
        id
    }

    /// Attach an action state machine to `root`. It starts as soon as `root`
    /// runs.
    pub fn add_action_state_machine(
        &mut self,
        model: Arc<ActionStateMachineModel>,
        root: crate::plan::TaskId,
        start_state: Option<String>,
    ) -> Result<MachineId> {
        self.plan.task(root)?;
        model.validate()?;
        let mut slot = Attached {
            machine: ActionStateMachine::new(model, root),
            start_state,
        };
        start_if_ready(&mut slot, &mut self.plan);
        let id = self.allocate_machine();
        self.action_machines.insert(id, slot);
        Ok(id)
    }

    pub fn action_state_machine(&self, id: MachineId) -> Option<&ActionStateMachine> {
        self.action_machines.get(&id).map(|slot| &slot.machine)
    }

    pub fn use_fault_response_table(&mut self, table: FaultResponseTable) {
        info!(table = %table.name(), rules = table.responses().len(), "fault response table in use");
        self.fault_tables.push(table);
    }

    pub fn fault_handlers(&self) -> &[ActiveFaultHandler] {
        &self.fault_handlers
    }

    // ---------------------------------------------------------------------
    // Control
    // ---------------------------------------------------------------------

    /// Emit `event` at the start of the next cycle.
    pub fn queue_emit(&mut self, event: EventId, context: Vec<ContextValue>) {
        self.queued.push_back((event, context));
    }

    /// Handle a control request. Returns whether the runtime should keep
    /// running.
    pub fn step(&mut self, request: ControlRequest) -> bool {
        match request {
            ControlRequest::Emit { event, context } => {
                self.queue_emit(event, context);
                true
            }
            ControlRequest::Shutdown => false,
        }
    }

    // ---------------------------------------------------------------------
    // Cycle
    // ---------------------------------------------------------------------

    /// Run one execution cycle.
    ///
    /// Errors are only returned for conditions that make the plan unusable
    /// (runaway propagation, broken graph invariants). Everything else is
    /// turned into plan exceptions and reported.
    pub fn process_cycle(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let mut report = CycleReport::new(self.cycle);
        self.prune();

        while let Some((event, context)) = self.queued.pop_front() {
            if let Err(err) = self.plan.emit(event, context) {
                warn!(event = %self.plan.describe_event(event), "queued emission failed: {err}");
                self.plan.raise_on_event(event, err);
            }
        }
        self.settle(&mut report)?;

        let ids: Vec<ScriptId> = self.scripts.keys().copied().collect();
        for id in ids {
            self.step_script(id, &mut report);
            self.settle(&mut report)?;
        }

        self.handle_exceptions(&mut report)?;

        if self.config.engine.garbage_collect {
            let finalized = self.plan.garbage_collect(self.collector.as_mut());
            report.finalized.extend(finalized);
            self.settle(&mut report)?;
            self.handle_exceptions(&mut report)?;
        }
        self.release_orphaned_scripts();

        if self.config.engine.verify_consistency {
            self.plan.verify_consistency()?;
        }

        debug!(
            cycle = report.cycle,
            emissions = report.emissions,
            transitions = report.transitions,
            unhandled = report.unhandled.len(),
            finalized = report.finalized.len(),
            "cycle done"
        );
        Ok(report)
    }

    fn settle(&mut self, report: &mut CycleReport) -> Result<()> {
        dispatch_emissions(
            &mut self.plan,
            &mut self.task_machines,
            &mut self.action_machines,
            report,
            self.config.engine.max_propagation_steps,
        )
    }

    /// Drop terminated scripts and machines whose root left the plan.
    fn prune(&mut self) {
        let scripts = self.scripts.len();
        let machines = self.machine_count();
        self.scripts.retain(|_, script| script.is_active());
        let plan = &self.plan;
        self.task_machines
            .retain(|_, slot| !plan.is_finalized(slot.machine.root()));
        self.action_machines
            .retain(|_, slot| !plan.is_finalized(slot.machine.root()));

        let dropped_scripts = scripts - self.scripts.len();
        let dropped_machines = machines - self.machine_count();
        if dropped_scripts + dropped_machines > 0 {
            debug!(
                scripts = dropped_scripts,
                machines = dropped_machines,
                "pruned terminated listeners"
            );
        }
    }

    fn step_script(&mut self, id: ScriptId, report: &mut CycleReport) {
        let Some(script) = self.scripts.get_mut(&id) else {
            return;
        };
        if !script.is_active() {
            return;
        }
        let root = script.root();
        let (live, running, finished) = match self.plan.task(root) {
            Ok(task) => (self.plan.is_live(root), task.is_running(), task.is_finished()),
            Err(_) => (false, false, true),
        };
        if !live || finished {
            script.cancel(&mut self.plan);
            return;
        }
        if !running {
            return;
        }

        match script.step(&mut self.plan) {
            Ok(()) => {
                if script.is_finished() {
                    report.scripts_finished.push(id);
                }
            }
            Err(err) => {
                warn!(script = %script.name(), %root, "script failed: {err}");
                report.scripts_failed.push(id);
                self.plan.raise(PlanException::new(err, root));
            }
        }
    }

    /// Cancel scripts whose root is gone or finished.
    fn release_orphaned_scripts(&mut self) {
        for script in self.scripts.values_mut().filter(|s| s.is_active()) {
            let root = script.root();
            let orphaned = self
                .plan
                .task(root)
                .map_or(true, |task| task.is_finished());
            if orphaned {
                script.cancel(&mut self.plan);
            }
        }
    }

    fn handle_exceptions(&mut self, report: &mut CycleReport) -> Result<()> {
        let rounds = self.config.engine.max_propagation_steps;
        for _ in 0..rounds {
            let exceptions = self.plan.take_exceptions();
            if exceptions.is_empty() {
                break;
            }
            for exception in exceptions {
                self.handle_exception(exception, report);
            }
            self.settle(report)?;
        }

        for handler in self.fault_handlers.iter_mut() {
            match handler.poll(&mut self.plan) {
                Ok(restarted) => report.restarted.extend(restarted),
                Err(err) => warn!(handler = %handler.task(), "fault handler failed to finish: {err}"),
            }
        }
        self.fault_handlers.retain(|h| !h.is_finished());
        self.settle(report)
    }

    fn handle_exception(&mut self, exception: PlanException, report: &mut CycleReport) {
        let summary = ExceptionSummary::from(&exception);

        let handler = self
            .fault_tables
            .iter()
            .find_map(|table| table.find(&exception, &self.plan))
            .cloned();
        if let Some(handler) = handler {
            match handler.activate(&mut self.plan, &exception) {
                Ok(active) => {
                    report.fault_handlers_started.push(active.task());
                    report.handled.push(summary);
                    self.fault_handlers.push(active);
                    return;
                }
                Err(err) => warn!(origin = %exception.origin, "fault handler failed to start: {err}"),
            }
        }

        apply_unhandled_policy(
            &mut self.plan,
            &exception,
            self.config.engine.unhandled_exceptions,
        );
        report.unhandled.push(summary);
    }
}
