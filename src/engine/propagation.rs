// src/engine/propagation.rs

//! Listener dispatch and exception policies used by the cycle driver.

use std::collections::BTreeMap;

use tracing::{debug, error, warn};

use crate::coordination::action_state_machine::ActionStateMachine;
use crate::coordination::task_state_machine::TaskStateMachine;
use crate::engine::{CycleReport, MachineId};
use crate::errors::{PlanError, PlanException, Result};
use crate::plan::event::EmissionRecord;
use crate::plan::task::START;
use crate::plan::{Plan, TaskId};
use crate::types::UnhandledExceptionPolicy;

/// A state machine waiting for (or running on) its root task.
#[derive(Debug)]
pub struct Attached<M> {
    pub machine: M,
    pub start_state: Option<String>,
}

/// Something reacting to settled emissions.
pub trait EmissionListener {
    fn root(&self) -> TaskId;

    fn is_started(&self) -> bool;

    /// Enter the start state. Called once the root runs.
    fn start(&mut self, plan: &mut Plan, start_state: Option<&str>) -> Result<()>;

    /// React to one emission. Returns whether a transition fired.
    fn on_emission(&mut self, record: &EmissionRecord, plan: &mut Plan) -> Result<bool>;
}

impl EmissionListener for TaskStateMachine {
    fn root(&self) -> TaskId {
        TaskStateMachine::root(self)
    }

    fn is_started(&self) -> bool {
        TaskStateMachine::is_started(self)
    }

    fn start(&mut self, plan: &mut Plan, start_state: Option<&str>) -> Result<()> {
        TaskStateMachine::start(self, plan, start_state)
    }

    fn on_emission(&mut self, record: &EmissionRecord, plan: &mut Plan) -> Result<bool> {
        Ok(self.handle(record, plan).is_some())
    }
}

impl EmissionListener for ActionStateMachine {
    fn root(&self) -> TaskId {
        ActionStateMachine::root(self)
    }

    fn is_started(&self) -> bool {
        ActionStateMachine::is_started(self)
    }

    fn start(&mut self, plan: &mut Plan, start_state: Option<&str>) -> Result<()> {
        ActionStateMachine::start(self, plan, start_state).map(|_| ())
    }

    fn on_emission(&mut self, record: &EmissionRecord, plan: &mut Plan) -> Result<bool> {
        Ok(self.handle(record, plan)?.is_some())
    }
}

/// Start `slot`'s machine if its root is running and it has not started.
pub fn start_if_ready<M: EmissionListener>(slot: &mut Attached<M>, plan: &mut Plan) {
    let root = slot.machine.root();
    if slot.machine.is_started() || !plan.task(root).is_ok_and(|t| t.is_running()) {
        return;
    }
    if let Err(err) = slot.machine.start(plan, slot.start_state.as_deref()) {
        warn!(%root, "state machine failed to start: {err}");
        plan.raise(PlanException::new(err, root));
    }
}

fn notify<M: EmissionListener>(
    slots: &mut BTreeMap<MachineId, Attached<M>>,
    record: &EmissionRecord,
    plan: &mut Plan,
    report: &mut CycleReport,
) {
    for slot in slots.values_mut() {
        let root = slot.machine.root();
        if !slot.machine.is_started() {
            if record.task == Some(root) && record.name == START {
                start_if_ready(slot, plan);
            }
            continue;
        }
        match slot.machine.on_emission(record, plan) {
            Ok(true) => report.transitions += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(%root, "state machine transition failed: {err}");
                plan.raise(PlanException::new(err, root));
            }
        }
    }
}

/// Hand every pending emission to the listeners, in emission order, until
/// no listener causes further emissions.
///
/// Each emission is seen by every listener before the next one is
/// dispatched.
pub fn dispatch_emissions(
    plan: &mut Plan,
    task_machines: &mut BTreeMap<MachineId, Attached<TaskStateMachine>>,
    action_machines: &mut BTreeMap<MachineId, Attached<ActionStateMachine>>,
    report: &mut CycleReport,
    limit: usize,
) -> Result<()> {
    let mut dispatched = 0usize;
    while plan.has_pending_emissions() {
        for record in plan.take_emissions() {
            dispatched += 1;
            if dispatched > limit {
                return Err(PlanError::EmissionFailed(format!(
                    "more than {limit} emissions dispatched in one cycle"
                )));
            }
            notify(task_machines, &record, plan, report);
            notify(action_machines, &record, plan, report);
        }
    }
    report.emissions += dispatched;
    Ok(())
}

/// Apply the default policy to an exception no fault-response table took.
pub fn apply_unhandled_policy(
    plan: &mut Plan,
    exception: &PlanException,
    policy: UnhandledExceptionPolicy,
) {
    error!(
        origin = %exception.origin,
        trace = ?exception.trace,
        ?policy,
        "unhandled exception: {}",
        exception.error
    );
    if policy != UnhandledExceptionPolicy::StopChain {
        return;
    }
    for &task in &exception.trace {
        if !plan.task(task).is_ok_and(|t| t.is_running()) {
            continue;
        }
        debug!(%task, "stopping task involved in unhandled exception");
        if let Err(err) = plan.stop_task(task) {
            warn!(%task, "could not stop: {err}");
        }
    }
}
