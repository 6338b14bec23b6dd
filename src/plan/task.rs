// src/plan/task.rs

//! Tasks: vertices with a bounded lifecycle and named events.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::plan::event::ContextValue;
use crate::plan::{EventId, TaskId};

pub const START: &str = "start";
pub const SUCCESS: &str = "success";
pub const FAILED: &str = "failed";
pub const STOP: &str = "stop";
pub const ABORTED: &str = "aborted";
pub const INTERNAL_ERROR: &str = "internal_error";

/// Events every task has.
pub const STANDARD_EVENTS: &[&str] = &[START, SUCCESS, FAILED, STOP, ABORTED, INTERNAL_ERROR];

/// Forwardings every task has between its own events.
pub const INTRINSIC_FORWARDINGS: &[(&str, &str)] = &[
    (SUCCESS, STOP),
    (FAILED, STOP),
    (ABORTED, FAILED),
    (INTERNAL_ERROR, FAILED),
];

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Added to the plan, `start` not emitted yet.
    Pending,
    /// `start` emitted; includes the finishing phase until `stop`.
    Running,
    /// `stop` emitted after `success`.
    Success,
    /// `stop` emitted after `failed`.
    Failed,
    /// `stop` emitted with neither `success` nor `failed`, or never started.
    Stopped,
    /// Removed from the live plan.
    Finalized,
}

impl TaskState {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failed | TaskState::Stopped | TaskState::Finalized
        )
    }
}

/// Description from which tasks are instantiated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskTemplate {
    pub model: String,
    pub arguments: BTreeMap<String, ContextValue>,
    /// Events on top of [`STANDARD_EVENTS`].
    pub events: Vec<String>,
    /// Forwardings between the task's own events, on top of
    /// [`INTRINSIC_FORWARDINGS`] (e.g. `("blocked", "failed")`).
    pub forwardings: Vec<(String, String)>,
}

impl TaskTemplate {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.events.push(name.into());
        self
    }

    pub fn with_forwarding(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.forwardings.push((from.into(), to.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) template: TaskTemplate,
    pub(crate) state: TaskState,
    /// Terminal outcome decided while finishing, applied when `stop` fires.
    pub(crate) terminal: Option<TaskState>,
    pub(crate) events: BTreeMap<String, EventId>,
    pub(crate) started_at: Option<Instant>,
    pub(crate) finished_at: Option<Instant>,
}

impl Task {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn model(&self) -> &str {
        &self.template.model
    }

    pub fn template(&self) -> &TaskTemplate {
        &self.template
    }

    pub fn arguments(&self) -> &BTreeMap<String, ContextValue> {
        &self.template.arguments
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == TaskState::Pending
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Whether a terminal event has fired and `stop` is on its way.
    pub fn is_finishing(&self) -> bool {
        self.state == TaskState::Running && self.terminal.is_some()
    }

    pub fn event(&self, name: &str) -> Option<EventId> {
        self.events.get(name).copied()
    }

    pub fn events(&self) -> impl Iterator<Item = (&str, EventId)> + '_ {
        self.events.iter().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }
}
