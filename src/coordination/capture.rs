// src/coordination/capture.rs

//! Values snapshotted from event emissions for use by later states.

use std::collections::BTreeMap;

use tracing::debug;

use crate::coordination::task_state_machine::Trigger;
use crate::errors::{PlanError, Result};
use crate::plan::event::ContextValue;

/// Declares that the emission context of `trigger`, while `state` is
/// current, is kept under `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    /// State during which the trigger is watched; `None` watches in every
    /// state.
    pub state: Option<String>,
    pub trigger: Trigger,
}

impl Capture {
    pub fn new(name: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            name: name.into(),
            state: None,
            trigger,
        }
    }

    pub fn in_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Captured values of one running machine.
#[derive(Debug, Clone, Default)]
pub struct CaptureStore {
    values: BTreeMap<String, Vec<ContextValue>>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the context of the latest emission of `name`'s source.
    pub fn bind(&mut self, name: &str, context: &[ContextValue]) {
        debug!(capture = name, values = context.len(), "captured");
        self.values.insert(name.to_string(), context.to_vec());
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Value of `name`: the single context value, or an array when the
    /// emission carried zero or several.
    pub fn resolve(&self, name: &str) -> Result<ContextValue> {
        let context = self
            .values
            .get(name)
            .ok_or_else(|| PlanError::Unbound(format!("capture {name} has not fired yet")))?;
        Ok(match context.as_slice() {
            [single] => single.clone(),
            many => ContextValue::Array(many.to_vec()),
        })
    }
}
