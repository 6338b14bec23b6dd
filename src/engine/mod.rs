// src/engine/mod.rs

//! Execution engine for the plan.
//!
//! This module ties together:
//! - the plan and its event propagation
//! - scripts and state machines reacting to emissions
//! - fault-response tables and the default unhandled-exception policy
//! - the garbage-collection trigger
//!
//! The synchronous cycle driver lives in [`core`]; the async shell that
//! ticks it and feeds it control requests is implemented in [`runtime`].

use crate::errors::{ErrorKind, PlanException};
use crate::plan::event::ContextValue;
use crate::plan::{EventId, TaskId};

/// Handle of a script registered in an [`ExecutionCore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptId(pub usize);

/// Handle of a state machine registered in an [`ExecutionCore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineId(pub usize);

/// Requests flowing into the runtime from outside the cycle.
#[derive(Debug, Clone)]
pub enum ControlRequest {
    /// Emit an event at the start of the next cycle.
    Emit {
        event: EventId,
        context: Vec<ContextValue>,
    },
    /// Graceful shutdown requested.
    Shutdown,
}

/// What a plan exception was, once it has been dealt with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionSummary {
    pub kind: ErrorKind,
    pub origin: TaskId,
    pub message: String,
}

impl From<&PlanException> for ExceptionSummary {
    fn from(exception: &PlanException) -> Self {
        Self {
            kind: exception.kind(),
            origin: exception.origin,
            message: exception.error.to_string(),
        }
    }
}

/// Outcome of one execution cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Emissions dispatched to listeners.
    pub emissions: usize,
    /// State machine transitions fired.
    pub transitions: usize,
    pub scripts_finished: Vec<ScriptId>,
    pub scripts_failed: Vec<ScriptId>,
    /// Exceptions taken over by a fault-response table.
    pub handled: Vec<ExceptionSummary>,
    /// Exceptions that went to the unhandled-exception policy.
    pub unhandled: Vec<ExceptionSummary>,
    /// Fault-handling tasks started.
    pub fault_handlers_started: Vec<TaskId>,
    /// Missions re-instantiated by fault handlers.
    pub restarted: Vec<TaskId>,
    /// Tasks finalized by garbage collection.
    pub finalized: Vec<TaskId>,
}

impl CycleReport {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Self::default()
        }
    }
}

pub mod core;
pub mod propagation;
pub mod runtime;

pub use self::core::ExecutionCore;
pub use runtime::Runtime;
