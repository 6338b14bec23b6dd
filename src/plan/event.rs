// src/plan/event.rs

//! Event generators and their emission history.

use std::time::Instant;

use crate::plan::{EventId, TaskId};

/// Value carried in an emission context.
pub type ContextValue = toml::Value;

/// One occurrence of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// Plan-wide emission sequence number; strictly increasing.
    pub seq: u64,
    pub time: Instant,
    pub context: Vec<ContextValue>,
}

/// Emission as reported to listeners once propagation has settled.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionRecord {
    pub event: EventId,
    pub task: Option<TaskId>,
    pub name: String,
    pub emission: Emission,
}

/// A class of discrete occurrences, optionally owned by a task.
#[derive(Debug, Clone)]
pub struct EventGenerator {
    id: EventId,
    name: String,
    task: Option<TaskId>,
    history: Vec<Emission>,
    unreachable: Option<String>,
}

impl EventGenerator {
    pub(crate) fn new(id: EventId, name: impl Into<String>, task: Option<TaskId>) -> Self {
        Self {
            id,
            name: name.into(),
            task,
            history: Vec::new(),
            unreachable: None,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    /// Every emission so far, oldest first.
    pub fn history(&self) -> &[Emission] {
        &self.history
    }

    pub fn last(&self) -> Option<&Emission> {
        self.history.last()
    }

    pub fn emitted(&self) -> bool {
        !self.history.is_empty()
    }

    /// First emission whose sequence number is strictly greater than `seq`.
    pub fn emitted_after_seq(&self, seq: u64) -> Option<&Emission> {
        self.history.iter().find(|e| e.seq > seq)
    }

    /// First emission at or after `deadline`.
    pub fn emitted_since(&self, deadline: Instant) -> Option<&Emission> {
        self.history.iter().find(|e| e.time >= deadline)
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable.is_some()
    }

    pub fn unreachability_reason(&self) -> Option<&str> {
        self.unreachable.as_deref()
    }

    pub(crate) fn record(&mut self, emission: Emission) {
        self.history.push(emission);
    }

    /// Returns `true` if the event was reachable until now.
    pub(crate) fn mark_unreachable(&mut self, reason: impl Into<String>) -> bool {
        if self.unreachable.is_some() {
            return false;
        }
        self.unreachable = Some(reason.into());
        true
    }
}
