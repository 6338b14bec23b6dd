// src/coordination/action_state_machine.rs

//! State machines whose states instantiate tasks.
//!
//! Each state wraps a task template. Entering a state instantiates it as a
//! dependency of the root under a role named after the state, drops the
//! previous state's dependency and moves the declared forwardings onto the
//! new task.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coordination::capture::{Capture, CaptureStore};
use crate::coordination::task_state_machine::{StateMachineModel, Trigger};
use crate::errors::{PlanError, Result};
use crate::plan::event::EmissionRecord;
use crate::plan::relations::DependencyInfo;
use crate::plan::task::{TaskTemplate, FAILED, STANDARD_EVENTS};
use crate::plan::{EventId, Plan, TaskId};

/// What a state instantiates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionState {
    pub template: TaskTemplate,
    /// Children of the state's task, instantiated with it.
    pub dependencies: Vec<(String, TaskTemplate)>,
    /// `(argument, capture)`: template arguments filled from captures.
    pub bindings: Vec<(String, String)>,
    /// `(state task event, root event)` forwardings active while the state
    /// is current.
    pub forwards: Vec<(String, String)>,
}

impl ActionState {
    pub fn new(template: TaskTemplate) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    pub fn with_dependency(mut self, role: impl Into<String>, template: TaskTemplate) -> Self {
        self.dependencies.push((role.into(), template));
        self
    }

    pub fn bind(mut self, argument: impl Into<String>, capture: impl Into<String>) -> Self {
        self.bindings.push((argument.into(), capture.into()));
        self
    }

    pub fn forward(mut self, event: impl Into<String>, root_event: impl Into<String>) -> Self {
        self.forwards.push((event.into(), root_event.into()));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionStateMachineModel {
    machine: StateMachineModel,
    actions: BTreeMap<String, ActionState>,
    captures: Vec<Capture>,
}

impl ActionStateMachineModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            machine: StateMachineModel::new(name),
            ..Self::default()
        }
    }

    pub fn state(mut self, name: impl Into<String>, action: ActionState) -> Self {
        let name = name.into();
        self.machine = self.machine.state(name.clone());
        self.actions.insert(name, action);
        self
    }

    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.machine = self.machine.start(name);
        self
    }

    pub fn transition(mut self, from: impl Into<String>, trigger: Trigger, to: impl Into<String>) -> Self {
        self.machine = self.machine.transition(from, trigger, to);
        self
    }

    pub fn dependency(mut self, role: impl Into<String>, template: TaskTemplate) -> Self {
        self.machine = self.machine.dependency(role, template);
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.captures.retain(|c| c.name != capture.name);
        self.captures.push(capture);
        self
    }

    /// Merge `parent` under this model; this model's states override the
    /// parent's states of the same name.
    pub fn inherit(self, parent: &ActionStateMachineModel) -> Self {
        let mut actions = parent.actions.clone();
        actions.extend(self.actions);
        let mut merged = ActionStateMachineModel {
            machine: self.machine.inherit(&parent.machine),
            actions,
            captures: parent.captures.clone(),
        };
        for capture in self.captures {
            merged = merged.capture(capture);
        }
        merged
    }

    pub fn machine(&self) -> &StateMachineModel {
        &self.machine
    }

    pub fn action(&self, state: &str) -> Option<&ActionState> {
        self.actions.get(state)
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// Every state needs an action, and every forwarding must start from
    /// an event its state's task has.
    pub fn validate(&self) -> Result<()> {
        for state in self.machine.states() {
            let Some(action) = self.actions.get(state) else {
                return Err(PlanError::Argument(format!(
                    "state {state} of {} has no action",
                    self.machine.name()
                )));
            };
            for (event, _) in &action.forwards {
                let known = STANDARD_EVENTS.contains(&event.as_str())
                    || action.template.events.iter().any(|e| e == event);
                if !known {
                    return Err(PlanError::Argument(format!(
                        "state {state} of {} forwards {event}, which {} does not have",
                        self.machine.name(),
                        action.template.model
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A running action state machine.
#[derive(Debug, Clone)]
pub struct ActionStateMachine {
    model: Arc<ActionStateMachineModel>,
    root: TaskId,
    current: Option<String>,
    current_task: Option<TaskId>,
    /// Forwardings installed for the current state.
    forwardings: Vec<(EventId, EventId)>,
    captures: CaptureStore,
    /// `(state, task)` for every state entered.
    history: Vec<(String, TaskId)>,
}

impl ActionStateMachine {
    pub fn new(model: Arc<ActionStateMachineModel>, root: TaskId) -> Self {
        Self {
            model,
            root,
            current: None,
            current_task: None,
            forwardings: Vec::new(),
            captures: CaptureStore::new(),
            history: Vec::new(),
        }
    }

    pub fn model(&self) -> &ActionStateMachineModel {
        &self.model
    }

    pub fn root(&self) -> TaskId {
        self.root
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task
    }

    pub fn captures(&self) -> &CaptureStore {
        &self.captures
    }

    pub fn history(&self) -> &[(String, TaskId)] {
        &self.history
    }

    pub fn is_started(&self) -> bool {
        self.current.is_some()
    }

    /// Instantiate the machine-wide dependencies and enter the start state
    /// (or `start_override`).
    pub fn start(&mut self, plan: &mut Plan, start_override: Option<&str>) -> Result<TaskId> {
        self.model.validate()?;
        let start = self.model.machine().resolve_start(start_override)?;
        self.model
            .machine()
            .instantiate_dependencies(plan, self.root)
            .map_err(|err| self.transition_failed(err))?;
        let task = self.enter(plan, &start)?;
        info!(
            machine = %self.model.machine().name(),
            root = %self.root,
            state = %start,
            %task,
            "action state machine started"
        );
        Ok(task)
    }

    /// React to one emission: record captures, then fire at most one
    /// transition. Returns the task instantiated for the new state.
    ///
    /// Nothing happens once the root has finished. On failure the machine
    /// stays in its current state.
    pub fn handle(&mut self, record: &EmissionRecord, plan: &mut Plan) -> Result<Option<TaskId>> {
        let Some(current) = self.current.clone() else {
            return Ok(None);
        };
        if !plan.task(self.root).is_ok_and(|t| t.is_running()) {
            return Ok(None);
        }

        for capture in self.model.captures() {
            if capture.state.as_ref().is_some_and(|s| *s != current) {
                continue;
            }
            if capture.trigger.resolve(plan, self.root, self.current_task) == Some(record.event) {
                self.captures.bind(&capture.name, &record.emission.context);
            }
        }

        let Some(target) = self
            .model
            .machine()
            .find_transition(&current, plan, self.root, self.current_task, record.event)
            .map(|t| t.to.clone())
        else {
            return Ok(None);
        };

        debug!(
            machine = %self.model.machine().name(),
            root = %self.root,
            from = %current,
            to = %target,
            "action state transition"
        );
        self.enter(plan, &target).map(Some)
    }

    fn transition_failed(&self, err: PlanError) -> PlanError {
        let mut tasks = vec![self.root];
        tasks.extend(self.current_task);
        PlanError::ActionStateTransitionFailed {
            source: Box::new(err),
            tasks,
        }
    }

    /// Instantiate `state` and make it current.
    fn enter(&mut self, plan: &mut Plan, state: &str) -> Result<TaskId> {
        let action = self
            .model
            .action(state)
            .ok_or_else(|| {
                PlanError::Argument(format!("state {state} of {} has no action", self.model.machine().name()))
            })
            .map_err(|err| self.transition_failed(err))?;

        let mut template = action.template.clone();
        for (argument, capture) in &action.bindings {
            let value = self
                .captures
                .resolve(capture)
                .map_err(|err| self.transition_failed(err))?;
            template.arguments.insert(argument.clone(), value);
        }

        let root_events = action
            .forwards
            .iter()
            .map(|(event, root_event)| {
                plan.task_event(self.root, root_event)
                    .map(|target| (event.as_str(), target))
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|err| self.transition_failed(err))?;

        let task = self
            .instantiate(plan, state, template, action)
            .map_err(|err| self.transition_failed(err))?;

        let mut installed = Vec::with_capacity(root_events.len());
        let handover = (|| -> Result<()> {
            for (event, target) in root_events {
                let source = plan.task_event(task, event)?;
                plan.forward(source, target)?;
                installed.push((source, target));
            }
            match (self.current_task, self.current.as_deref()) {
                (Some(previous_task), Some(previous_state)) if previous_task != task => {
                    if !plan.remove_role(self.root, previous_task, previous_state)? {
                        debug!(task = %previous_task, "previous state task still held by another role");
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        })();

        if let Err(err) = handover {
            warn!(%task, state, "could not hand over to state: {err}");
            for (source, target) in installed {
                plan.remove_forwarding(source, target);
            }
            self.abandon(plan, state, task);
            return Err(self.transition_failed(err));
        }

        for (source, target) in std::mem::replace(&mut self.forwardings, installed) {
            plan.remove_forwarding(source, target);
        }
        self.current = Some(state.to_string());
        self.current_task = Some(task);
        self.history.push((state.to_string(), task));
        Ok(task)
    }

    /// Drop a task instantiated for a state that could not be entered.
    fn abandon(&self, plan: &mut Plan, state: &str, task: TaskId) {
        if let Err(err) = plan.remove_role(self.root, task, state) {
            warn!(%task, "could not drop role {state}: {err}");
        }
        if let Err(err) = plan.stop_task(task) {
            warn!(%task, "could not stop abandoned state task: {err}");
        }
        if plan.task(task).is_ok_and(|t| !t.is_running()) {
            if let Err(err) = plan.finalize_task(task) {
                warn!(%task, "could not finalize abandoned state task: {err}");
            }
        }
    }

    fn instantiate(
        &self,
        plan: &mut Plan,
        state: &str,
        template: TaskTemplate,
        action: &ActionState,
    ) -> Result<TaskId> {
        let task = plan.add_task(template)?;

        // Failures the machine reacts to are not failures of the root.
        let mut failure: Vec<String> = vec![FAILED.to_string()];
        failure.retain(|event| {
            !self
                .model
                .machine()
                .transitions_from(state)
                .any(|t| matches!(&t.trigger, Trigger::State(e) if e == event))
        });
        let info = DependencyInfo::new()
            .with_role(state)
            .with_success(Vec::<String>::new())
            .with_failure(failure);

        let setup = (|| {
            plan.depends_on(self.root, task, info)?;
            for (role, child_template) in &action.dependencies {
                let child = plan.add_task(child_template.clone())?;
                plan.depends_on(task, child, DependencyInfo::new().with_role(role.clone()))?;
                plan.start_task(child)?;
            }
            plan.start_task(task)
        })();

        if let Err(err) = setup {
            warn!(%task, state, "could not enter state: {err}");
            plan.remove_role(self.root, task, state)?;
            if plan.task(task)?.is_pending() {
                plan.finalize_task(task)?;
            }
            return Err(err);
        }
        Ok(task)
    }
}
