// src/coordination/mod.rs

//! Coordination layer: scripts and state machines driven by emissions.
//!
//! - [`script`] / [`instruction`]: instruction lists with a cursor, stepped
//!   once per cycle against a root task.
//! - [`task_state_machine`]: flat transition tables over plain states.
//! - [`action_state_machine`]: states that instantiate tasks.
//! - [`capture`]: emission contexts kept for later states.

pub mod action_state_machine;
pub mod capture;
pub mod instruction;
pub mod script;
pub mod task_state_machine;

pub use action_state_machine::{ActionState, ActionStateMachine, ActionStateMachineModel};
pub use capture::{Capture, CaptureStore};
pub use instruction::{Block, EventRef, Instruction, InstructionKind, ScriptContext, Sequence};
pub use script::{Script, ScriptState};
pub use task_state_machine::{StateMachineModel, TaskStateMachine, Transition, Trigger};
