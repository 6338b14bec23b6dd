// src/coordination/task_state_machine.rs

//! State machines partitioning a task's running phase.
//!
//! A [`StateMachineModel`] is a flat transition table. Refinement of a model
//! is done once, with [`StateMachineModel::inherit`], which merges the
//! parent's table into the child's. Running machines never walk a chain of
//! models.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{PlanError, Result};
use crate::plan::event::EmissionRecord;
use crate::plan::relations::DependencyInfo;
use crate::plan::task::TaskTemplate;
use crate::plan::{EventId, Plan, TaskId};

/// Event a transition listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Event of the machine's root task.
    Root(String),
    /// Event of the task instantiated for the current state.
    State(String),
    /// Event of a declared dependency: the current state's child under
    /// `role` if there is one, otherwise the root's.
    Dependency { role: String, event: String },
}

impl Trigger {
    pub fn root(event: impl Into<String>) -> Self {
        Trigger::Root(event.into())
    }

    pub fn state(event: impl Into<String>) -> Self {
        Trigger::State(event.into())
    }

    pub fn dependency(role: impl Into<String>, event: impl Into<String>) -> Self {
        Trigger::Dependency {
            role: role.into(),
            event: event.into(),
        }
    }

    pub fn event_name(&self) -> &str {
        match self {
            Trigger::Root(event) | Trigger::State(event) => event,
            Trigger::Dependency { event, .. } => event,
        }
    }

    /// Generator this trigger designates right now, if any.
    pub fn resolve(&self, plan: &Plan, root: TaskId, state_task: Option<TaskId>) -> Option<EventId> {
        let task = match self {
            Trigger::Root(_) => Some(root),
            Trigger::State(_) => state_task,
            Trigger::Dependency { role, .. } => state_task
                .and_then(|t| plan.child_with_role(t, role))
                .or_else(|| plan.child_with_role(root, role)),
        }?;
        plan.task_event(task, self.event_name()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: String,
    pub trigger: Trigger,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateMachineModel {
    name: String,
    states: Vec<String>,
    start: Option<String>,
    transitions: Vec<Transition>,
    /// Children of the root instantiated when the machine starts.
    dependencies: Vec<(String, TaskTemplate)>,
}

impl StateMachineModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn state(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.states.contains(&name) {
            self.states.push(name);
        }
        self
    }

    pub fn start(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self = self.state(name.clone());
        self.start = Some(name);
        self
    }

    pub fn transition(mut self, from: impl Into<String>, trigger: Trigger, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        self = self.state(from.clone()).state(to.clone());
        self.transitions.push(Transition { from, trigger, to });
        self
    }

    pub fn dependency(mut self, role: impl Into<String>, template: TaskTemplate) -> Self {
        let role = role.into();
        self.dependencies.retain(|(r, _)| *r != role);
        self.dependencies.push((role, template));
        self
    }

    /// Merge `parent`'s table under this one.
    ///
    /// States, transitions and dependencies are the union of both, parent
    /// entries first; this model's start state and dependency templates win
    /// over the parent's.
    pub fn inherit(self, parent: &StateMachineModel) -> Self {
        let mut merged = StateMachineModel {
            name: self.name,
            states: parent.states.clone(),
            start: self.start.or_else(|| parent.start.clone()),
            transitions: parent.transitions.clone(),
            dependencies: parent.dependencies.clone(),
        };
        for state in self.states {
            merged = merged.state(state);
        }
        for transition in self.transitions {
            if !merged.transitions.contains(&transition) {
                merged.transitions.push(transition);
            }
        }
        for (role, template) in self.dependencies {
            merged = merged.dependency(role, template);
        }
        merged
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    pub fn start_state(&self) -> Option<&str> {
        self.start.as_deref()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transitions_from<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    pub fn dependencies(&self) -> &[(String, TaskTemplate)] {
        &self.dependencies
    }

    /// Pick the start state, honouring an override.
    pub(crate) fn resolve_start(&self, start_override: Option<&str>) -> Result<String> {
        let start = start_override.or(self.start_state()).ok_or_else(|| {
            PlanError::Argument(format!("state machine {} has no start state", self.name))
        })?;
        if !self.has_state(start) {
            return Err(PlanError::Argument(format!(
                "state machine {} has no state {start}",
                self.name
            )));
        }
        Ok(start.to_string())
    }

    /// First transition out of `current` whose trigger designates `event`.
    ///
    /// Transitions are matched on generator identity, so at most one fires
    /// per emission however many share an event name.
    pub(crate) fn find_transition(
        &self,
        current: &str,
        plan: &Plan,
        root: TaskId,
        state_task: Option<TaskId>,
        event: EventId,
    ) -> Option<&Transition> {
        self.transitions
            .iter()
            .filter(|t| t.from == current)
            .find(|t| t.trigger.resolve(plan, root, state_task) == Some(event))
    }

    /// Instantiate and start the machine-wide dependencies under `root`.
    pub(crate) fn instantiate_dependencies(&self, plan: &mut Plan, root: TaskId) -> Result<Vec<TaskId>> {
        let mut children = Vec::with_capacity(self.dependencies.len());
        for (role, template) in &self.dependencies {
            if plan.child_with_role(root, role).is_some() {
                continue;
            }
            let child = plan.add_task(template.clone())?;
            plan.depends_on(root, child, DependencyInfo::new().with_role(role.clone()))?;
            plan.start_task(child)?;
            children.push(child);
        }
        Ok(children)
    }
}

/// A running machine whose states are plain names.
#[derive(Debug, Clone)]
pub struct TaskStateMachine {
    model: Arc<StateMachineModel>,
    root: TaskId,
    current: Option<String>,
    history: Vec<String>,
}

impl TaskStateMachine {
    pub fn new(model: Arc<StateMachineModel>, root: TaskId) -> Self {
        Self {
            model,
            root,
            current: None,
            history: Vec::new(),
        }
    }

    pub fn model(&self) -> &StateMachineModel {
        &self.model
    }

    pub fn root(&self) -> TaskId {
        self.root
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// States entered so far, start state included.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn is_started(&self) -> bool {
        self.current.is_some()
    }

    /// Enter the start state (or `start_override`) and instantiate the
    /// machine-wide dependencies.
    pub fn start(&mut self, plan: &mut Plan, start_override: Option<&str>) -> Result<()> {
        let start = self.model.resolve_start(start_override)?;
        self.model.instantiate_dependencies(plan, self.root)?;
        info!(machine = %self.model.name(), root = %self.root, state = %start, "state machine started");
        self.history.push(start.clone());
        self.current = Some(start);
        Ok(())
    }

    /// React to one emission. Returns the state entered, if any.
    pub fn handle(&mut self, record: &EmissionRecord, plan: &Plan) -> Option<&str> {
        let current = self.current.as_deref()?;
        if !plan.task(self.root).is_ok_and(|t| t.is_running()) {
            return None;
        }
        let transition = self
            .model
            .find_transition(current, plan, self.root, None, record.event)?;
        let target = transition.to.clone();
        debug!(
            machine = %self.model.name(),
            root = %self.root,
            from = %current,
            to = %target,
            "state transition"
        );
        self.history.push(target.clone());
        self.current = Some(target);
        self.current.as_deref()
    }
}
