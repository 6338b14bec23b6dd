// src/coordination/script.rs

//! Instruction scripts bound to a root task.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::coordination::instruction::{
    EventRef, Instruction, ScriptContext, Sequence,
};
use crate::errors::Result;
use crate::plan::task::TaskTemplate;
use crate::plan::{Plan, TaskId};

/// Lifecycle of a [`Script`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    /// Not stepped yet.
    Pending,
    /// Prepared and stepped at least once.
    Running,
    /// Cursor past the last instruction.
    Finished,
    /// An instruction failed; the script is never stepped again.
    Failed,
    /// Cancelled, or its root went away.
    Cancelled,
}

/// An ordered list of instructions executed against a root task, one step
/// per cycle.
///
/// A script is prepared the first time it is stepped: emissions that
/// happened before that point never satisfy its `wait` instructions.
#[derive(Debug)]
pub struct Script {
    name: String,
    root: TaskId,
    body: Sequence,
    state: ScriptState,
    /// Emission sequence number at preparation.
    barrier: u64,
    prepared_at: Option<Instant>,
}

impl Script {
    pub fn new(name: impl Into<String>, root: TaskId) -> Self {
        Self {
            name: name.into(),
            root,
            body: Sequence::default(),
            state: ScriptState::Pending,
            barrier: 0,
            prepared_at: None,
        }
    }

    pub fn push(mut self, instruction: Instruction) -> Self {
        self.body.push(instruction);
        self
    }

    pub fn execute(
        self,
        block: impl FnMut(&mut ScriptContext<'_>) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.push(Instruction::execute_block(block))
    }

    pub fn emit(self, event: EventRef) -> Self {
        self.push(Instruction::emit(event))
    }

    pub fn wait(self, event: EventRef) -> Self {
        self.push(Instruction::wait(event))
    }

    pub fn wait_after(self, event: EventRef, deadline: Instant) -> Self {
        self.push(Instruction::wait_after(event, deadline))
    }

    pub fn wait_any(self, events: Vec<EventRef>) -> Self {
        self.push(Instruction::wait_any(events))
    }

    pub fn poll(
        self,
        block: impl FnMut(&mut ScriptContext<'_>) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.push(Instruction::poll(block))
    }

    pub fn sleep(self, duration: Duration) -> Self {
        self.push(Instruction::sleep(duration))
    }

    pub fn timeout(self, duration: Duration, emit: Option<EventRef>, body: Vec<Instruction>) -> Self {
        self.push(Instruction::timeout(duration, emit, body))
    }

    pub fn start(self, template: TaskTemplate, role: impl Into<String>) -> Self {
        self.push(Instruction::start(template, role))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> TaskId {
        self.root
    }

    pub fn state(&self) -> ScriptState {
        self.state
    }

    pub fn prepared_at(&self) -> Option<Instant> {
        self.prepared_at
    }

    /// Index of the instruction the cursor is on.
    pub fn cursor(&self) -> usize {
        self.body.cursor()
    }

    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.body.current()
    }

    /// True once the cursor is past the last instruction. Vacuously true
    /// for an empty script.
    pub fn is_finished(&self) -> bool {
        self.body.is_finished()
    }

    /// Whether the script will ever be stepped again.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ScriptState::Pending | ScriptState::Running)
    }

    fn prepare(&mut self, plan: &Plan) {
        self.barrier = plan.emission_seq();
        self.prepared_at = Some(plan.now());
        self.state = ScriptState::Running;
        debug!(script = %self.name, root = %self.root, barrier = self.barrier, "script prepared");
    }

    /// Advance the script as far as it can go this cycle.
    ///
    /// On error the script is marked failed and releases whatever its
    /// instructions held; the error is returned for the caller to raise.
    pub fn step(&mut self, plan: &mut Plan) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        if self.state == ScriptState::Pending {
            self.prepare(plan);
        }

        let mut ctx = ScriptContext::new(plan, self.root, self.barrier);
        let result = self.body.step(&mut ctx);
        match result {
            Ok(()) => {
                if self.body.is_finished() {
                    self.state = ScriptState::Finished;
                    info!(script = %self.name, root = %self.root, "script finished");
                }
                Ok(())
            }
            Err(err) => {
                self.state = ScriptState::Failed;
                self.body.release(plan, self.root);
                Err(err)
            }
        }
    }

    /// Disable the instruction at `index`. Returns whether it was enabled.
    pub fn cancel_instruction(&mut self, index: usize, plan: &mut Plan) -> bool {
        self.body.disable(index, plan, self.root)
    }

    /// Stop stepping the script and release whatever it holds.
    pub fn cancel(&mut self, plan: &mut Plan) {
        if !self.is_active() {
            return;
        }
        self.body.release(plan, self.root);
        self.state = ScriptState::Cancelled;
        debug!(script = %self.name, root = %self.root, "script cancelled");
    }
}
