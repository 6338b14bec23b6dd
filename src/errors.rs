// src/errors.rs

//! Crate-wide error type and helpers.

use std::fmt;

use thiserror::Error;

use crate::plan::TaskId;

#[derive(Error, Debug)]
pub enum PlanError {
    /// Adding an edge would close a cycle in a relation that must stay acyclic.
    #[error("cycle found: {0}")]
    CycleFound(String),

    /// Forward and backward adjacency disagree. Never expected at runtime.
    #[error("inconsistent relation graph: {0}")]
    Inconsistent(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    /// The condition a script instruction waits on can no longer happen.
    #[error("dead instruction: {0}")]
    DeadInstruction(String),

    #[error("timed out: {0}")]
    TimedOut(String),

    #[error("action state transition failed: {source}")]
    ActionStateTransitionFailed {
        #[source]
        source: Box<PlanError>,
        tasks: Vec<TaskId>,
    },

    #[error("child failed: {0}")]
    ChildFailed(String),

    #[error("planning failed: {0}")]
    PlanningFailed(String),

    /// A capture was resolved before its source event fired.
    #[error("unbound capture: {0}")]
    Unbound(String),

    #[error("emission failed: {0}")]
    EmissionFailed(String),

    #[error("task not found: {0}")]
    UnknownTask(String),

    #[error("event not found: {0}")]
    UnknownEvent(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fieldless discriminant of [`PlanError`], used by fault-response matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    CycleFound,
    Inconsistent,
    Argument,
    DeadInstruction,
    TimedOut,
    ActionStateTransitionFailed,
    ChildFailed,
    PlanningFailed,
    Unbound,
    EmissionFailed,
    UnknownTask,
    UnknownEvent,
    Config,
    Io,
    Toml,
    Other,
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::CycleFound(_) => ErrorKind::CycleFound,
            PlanError::Inconsistent(_) => ErrorKind::Inconsistent,
            PlanError::Argument(_) => ErrorKind::Argument,
            PlanError::DeadInstruction(_) => ErrorKind::DeadInstruction,
            PlanError::TimedOut(_) => ErrorKind::TimedOut,
            PlanError::ActionStateTransitionFailed { .. } => {
                ErrorKind::ActionStateTransitionFailed
            }
            PlanError::ChildFailed(_) => ErrorKind::ChildFailed,
            PlanError::PlanningFailed(_) => ErrorKind::PlanningFailed,
            PlanError::Unbound(_) => ErrorKind::Unbound,
            PlanError::EmissionFailed(_) => ErrorKind::EmissionFailed,
            PlanError::UnknownTask(_) => ErrorKind::UnknownTask,
            PlanError::UnknownEvent(_) => ErrorKind::UnknownEvent,
            PlanError::Config(_) => ErrorKind::Config,
            PlanError::Io(_) => ErrorKind::Io,
            PlanError::Toml(_) => ErrorKind::Toml,
            PlanError::Other(_) => ErrorKind::Other,
        }
    }
}

/// An error attributed to a location in the plan.
///
/// These are collected while a cycle runs and handled at the cycle boundary,
/// where fault-response tables get the first chance to react.
#[derive(Debug)]
pub struct PlanException {
    pub error: PlanError,
    /// Task the error was raised on.
    pub origin: TaskId,
    /// Tasks the error has been propagated through so far (origin first).
    pub trace: Vec<TaskId>,
    /// Name of the event whose emission (or unreachability) caused the error.
    pub failure_event: Option<String>,
}

impl PlanException {
    pub fn new(error: PlanError, origin: TaskId) -> Self {
        Self {
            error,
            origin,
            trace: vec![origin],
            failure_event: None,
        }
    }

    pub fn with_failure_event(mut self, event: impl Into<String>) -> Self {
        self.failure_event = Some(event.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for PlanException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (origin {})", self.error, self.origin)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlanError>;
