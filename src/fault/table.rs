// src/fault/table.rs

//! Declarative fault-reaction rules.

use tracing::debug;

use crate::errors::{ErrorKind, PlanException};
use crate::fault::handler::{FaultHandler, LocatePolicy};
use crate::plan::Plan;

/// Predicate over plan exceptions. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultMatcher {
    kind: Option<ErrorKind>,
    origin_model: Option<String>,
    failure_event: Option<String>,
}

impl FaultMatcher {
    /// Matches every exception.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn kind(kind: ErrorKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_origin_model(mut self, model: impl Into<String>) -> Self {
        self.origin_model = Some(model.into());
        self
    }

    pub fn with_failure_event(mut self, event: impl Into<String>) -> Self {
        self.failure_event = Some(event.into());
        self
    }

    pub fn matches(&self, exception: &PlanException, plan: &Plan) -> bool {
        if self.kind.is_some_and(|k| k != exception.kind()) {
            return false;
        }
        if let Some(model) = &self.origin_model {
            let origin_model = plan.task(exception.origin).map(|t| t.model().to_string());
            if origin_model.ok().as_deref() != Some(model.as_str()) {
                return false;
            }
        }
        if let Some(event) = &self.failure_event {
            if exception.failure_event.as_deref() != Some(event.as_str()) {
                return false;
            }
        }
        true
    }
}

/// One rule of a [`FaultResponseTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultResponse {
    pub matcher: FaultMatcher,
    pub handler: FaultHandler,
}

/// Ordered set of fault rules; the first matching rule wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultResponseTable {
    name: String,
    responses: Vec<FaultResponse>,
}

impl FaultResponseTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Any exception matching `matcher` spawns a fault-handling task that
    /// locates with `policy`.
    pub fn on_fault(self, matcher: FaultMatcher, policy: LocatePolicy) -> Self {
        self.on_fault_with(matcher, FaultHandler::new(policy))
    }

    pub fn on_fault_with(mut self, matcher: FaultMatcher, handler: FaultHandler) -> Self {
        let handler = handler.in_table(self.name.clone());
        self.responses.push(FaultResponse { matcher, handler });
        self
    }

    pub fn responses(&self) -> &[FaultResponse] {
        &self.responses
    }

    pub fn find(&self, exception: &PlanException, plan: &Plan) -> Option<&FaultHandler> {
        let found = self
            .responses
            .iter()
            .find(|r| r.matcher.matches(exception, plan))
            .map(|r| &r.handler);
        if found.is_some() {
            debug!(table = %self.name, origin = %exception.origin, "fault response matched");
        }
        found
    }
}
