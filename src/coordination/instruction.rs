// src/coordination/instruction.rs

//! Script instructions and the references they use to name events.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::{PlanError, Result};
use crate::plan::relations::DependencyInfo;
use crate::plan::task::TaskTemplate;
use crate::plan::{EventId, Plan, TaskId};

/// State shared by the instructions of one script during a step.
pub struct ScriptContext<'a> {
    pub plan: &'a mut Plan,
    pub root: TaskId,
    /// Emissions with a sequence number at or below this one happened before
    /// the script was prepared.
    pub(crate) barrier: u64,
    transitioned: bool,
}

impl<'a> ScriptContext<'a> {
    pub(crate) fn new(plan: &'a mut Plan, root: TaskId, barrier: u64) -> Self {
        Self {
            plan,
            root,
            barrier,
            transitioned: false,
        }
    }

    /// Let the current `poll` instruction advance.
    pub fn transition(&mut self) {
        self.transitioned = true;
    }

    pub fn now(&self) -> Instant {
        self.plan.now()
    }
}

/// User code run by `execute` and `poll` instructions.
pub type Block = Box<dyn FnMut(&mut ScriptContext<'_>) -> anyhow::Result<()> + Send>;

/// Names an event relative to a script's root task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRef {
    /// Event of the root task.
    Root(String),
    /// Event of the root's child registered under `role`, looked up when
    /// the instruction runs.
    Role { role: String, event: String },
    /// Event of an arbitrary task.
    Task { task: TaskId, event: String },
    Event(EventId),
}

impl EventRef {
    pub fn root(event: impl Into<String>) -> Self {
        EventRef::Root(event.into())
    }

    pub fn role(role: impl Into<String>, event: impl Into<String>) -> Self {
        EventRef::Role {
            role: role.into(),
            event: event.into(),
        }
    }

    pub fn task(task: TaskId, event: impl Into<String>) -> Self {
        EventRef::Task {
            task,
            event: event.into(),
        }
    }

    /// The event this reference names right now. A target that is gone or
    /// was never there is a `DeadInstruction`.
    pub fn resolve(&self, plan: &Plan, root: TaskId) -> Result<EventId> {
        self.lookup(plan, root).map_err(|err| match err {
            PlanError::UnknownTask(_) | PlanError::UnknownEvent(_) => {
                PlanError::DeadInstruction(format!("{self}: {err}"))
            }
            err => err,
        })
    }

    fn lookup(&self, plan: &Plan, root: TaskId) -> Result<EventId> {
        match self {
            EventRef::Root(event) => plan.task_event(root, event),
            EventRef::Role { role, event } => {
                let child = plan.child_with_role(root, role).ok_or_else(|| {
                    PlanError::DeadInstruction(format!("{root} has no child with role {role}"))
                })?;
                plan.task_event(child, event)
            }
            EventRef::Task { task, event } => plan.task_event(*task, event),
            EventRef::Event(id) => {
                plan.event(*id)?;
                Ok(*id)
            }
        }
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRef::Root(event) => write!(f, "root/{event}"),
            EventRef::Role { role, event } => write!(f, "{role}/{event}"),
            EventRef::Task { task, event } => write!(f, "{task}/{event}"),
            EventRef::Event(id) => write!(f, "{id}"),
        }
    }
}

/// An ordered list of instructions with a cursor.
#[derive(Default)]
pub struct Sequence {
    instructions: Vec<Instruction>,
    cursor: usize,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("instructions", &self.instructions)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Sequence {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            cursor: 0,
        }
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Instruction> {
        self.instructions.get(self.cursor)
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.instructions.len()
    }

    /// Run instructions from the cursor until one asks to be re-evaluated
    /// later or the sequence is exhausted. Disabled instructions are
    /// skipped.
    pub(crate) fn step(&mut self, ctx: &mut ScriptContext<'_>) -> Result<()> {
        while let Some(instruction) = self.instructions.get_mut(self.cursor) {
            if instruction.disabled {
                self.cursor += 1;
                continue;
            }
            if !instruction.execute(ctx)? {
                return Ok(());
            }
            self.cursor += 1;
        }
        Ok(())
    }

    /// Disable the instruction at `index`, undoing whatever it holds.
    pub(crate) fn disable(&mut self, index: usize, plan: &mut Plan, root: TaskId) -> bool {
        match self.instructions.get_mut(index) {
            Some(instruction) if !instruction.disabled => {
                instruction.release(plan, root);
                instruction.disabled = true;
                true
            }
            _ => false,
        }
    }

    /// Undo whatever the instructions still hold.
    pub(crate) fn release(&mut self, plan: &mut Plan, root: TaskId) {
        for instruction in &mut self.instructions {
            instruction.release(plan, root);
        }
    }
}

pub enum InstructionKind {
    /// Run a block once.
    Execute(Block),
    /// Emit an event.
    Emit(EventRef),
    /// Wait for an emission that happens after the script was prepared, or
    /// after `after` when given.
    Wait {
        event: EventRef,
        after: Option<Instant>,
        /// Keep-alive `(task, role)` taken on the awaited task.
        held: Option<(TaskId, String)>,
    },
    /// Wait for the first of several events.
    WaitAny(Vec<EventRef>),
    /// Run a block every cycle until it calls [`ScriptContext::transition`].
    Poll(Block),
    Sleep {
        duration: Duration,
        started: Option<Instant>,
    },
    /// Run `body`; once `duration` has elapsed, emit `emit` and move on, or
    /// fail with `TimedOut` if there is nothing to emit.
    Timeout {
        duration: Duration,
        emit: Option<EventRef>,
        body: Sequence,
        started: Option<Instant>,
    },
    /// Instantiate and start a child of the root under `role`.
    Start { template: TaskTemplate, role: String },
}

pub struct Instruction {
    kind: InstructionKind,
    disabled: bool,
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())?;
        if self.disabled {
            write!(f, " (disabled)")?;
        }
        Ok(())
    }
}

impl Instruction {
    fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            disabled: false,
        }
    }

    pub fn execute_block(
        block: impl FnMut(&mut ScriptContext<'_>) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        Self::new(InstructionKind::Execute(Box::new(block)))
    }

    pub fn emit(event: EventRef) -> Self {
        Self::new(InstructionKind::Emit(event))
    }

    pub fn wait(event: EventRef) -> Self {
        Self::new(InstructionKind::Wait {
            event,
            after: None,
            held: None,
        })
    }

    pub fn wait_after(event: EventRef, deadline: Instant) -> Self {
        Self::new(InstructionKind::Wait {
            event,
            after: Some(deadline),
            held: None,
        })
    }

    pub fn wait_any(events: Vec<EventRef>) -> Self {
        Self::new(InstructionKind::WaitAny(events))
    }

    pub fn poll(
        block: impl FnMut(&mut ScriptContext<'_>) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        Self::new(InstructionKind::Poll(Box::new(block)))
    }

    pub fn sleep(duration: Duration) -> Self {
        Self::new(InstructionKind::Sleep {
            duration,
            started: None,
        })
    }

    pub fn timeout(duration: Duration, emit: Option<EventRef>, body: Vec<Instruction>) -> Self {
        Self::new(InstructionKind::Timeout {
            duration,
            emit,
            body: Sequence::new(body),
            started: None,
        })
    }

    pub fn start(template: TaskTemplate, role: impl Into<String>) -> Self {
        Self::new(InstructionKind::Start {
            template,
            role: role.into(),
        })
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            InstructionKind::Execute(_) => "execute".to_string(),
            InstructionKind::Emit(event) => format!("emit({event})"),
            InstructionKind::Wait { event, .. } => format!("wait({event})"),
            InstructionKind::WaitAny(events) => {
                let names: Vec<String> = events.iter().map(ToString::to_string).collect();
                format!("wait_any({})", names.join(", "))
            }
            InstructionKind::Poll(_) => "poll".to_string(),
            InstructionKind::Sleep { duration, .. } => format!("sleep({duration:?})"),
            InstructionKind::Timeout { duration, .. } => format!("timeout({duration:?})"),
            InstructionKind::Start { template, role } => {
                format!("start({}, role: {role})", template.model)
            }
        }
    }

    /// Run the instruction. `Ok(true)` advances the cursor, `Ok(false)`
    /// re-evaluates it next cycle.
    pub(crate) fn execute(&mut self, ctx: &mut ScriptContext<'_>) -> Result<bool> {
        match &mut self.kind {
            InstructionKind::Execute(block) => {
                block(ctx)?;
                Ok(true)
            }
            InstructionKind::Emit(event) => {
                let id = event.resolve(ctx.plan, ctx.root)?;
                ctx.plan
                    .emit(id, Vec::new())
                    .map_err(|err| PlanError::DeadInstruction(format!("emit({event}): {err}")))?;
                Ok(true)
            }
            InstructionKind::Wait { event, after, held } => {
                let id = event.resolve(ctx.plan, ctx.root)?;
                if held.is_none() {
                    *held = hold_task(ctx, event)?;
                }
                let generator = ctx.plan.event(id)?;
                let satisfied = match after {
                    Some(deadline) => generator.emitted_since(*deadline).is_some(),
                    None => generator.emitted_after_seq(ctx.barrier).is_some(),
                };
                if satisfied {
                    release_held(ctx.plan, ctx.root, held);
                    return Ok(true);
                }
                if generator.is_unreachable() {
                    let reason = generator
                        .unreachability_reason()
                        .unwrap_or("unreachable")
                        .to_string();
                    release_held(ctx.plan, ctx.root, held);
                    return Err(PlanError::DeadInstruction(format!("wait({event}): {reason}")));
                }
                Ok(false)
            }
            InstructionKind::WaitAny(events) => {
                let mut all_dead = !events.is_empty();
                for event in events.iter() {
                    let id = match event.resolve(ctx.plan, ctx.root) {
                        Ok(id) => id,
                        Err(PlanError::DeadInstruction(_)) => continue,
                        Err(err) => return Err(err),
                    };
                    let generator = ctx.plan.event(id)?;
                    if generator.emitted_after_seq(ctx.barrier).is_some() {
                        return Ok(true);
                    }
                    all_dead &= generator.is_unreachable();
                }
                if all_dead {
                    return Err(PlanError::DeadInstruction(
                        "wait_any: every awaited event is unreachable".to_string(),
                    ));
                }
                Ok(false)
            }
            InstructionKind::Poll(block) => {
                ctx.transitioned = false;
                block(ctx)?;
                Ok(std::mem::take(&mut ctx.transitioned))
            }
            InstructionKind::Sleep { duration, started } => {
                let now = ctx.now();
                let start = *started.get_or_insert(now);
                Ok(now.duration_since(start) >= *duration)
            }
            InstructionKind::Timeout {
                duration,
                emit,
                body,
                started,
            } => {
                let now = ctx.now();
                let start = *started.get_or_insert(now);
                body.step(ctx)?;
                if body.is_finished() {
                    return Ok(true);
                }
                if now.duration_since(start) < *duration {
                    return Ok(false);
                }
                body.release(ctx.plan, ctx.root);
                match emit {
                    Some(event) => {
                        debug!(%event, "timeout elapsed; emitting");
                        let id = event.resolve(ctx.plan, ctx.root)?;
                        ctx.plan.emit(id, Vec::new()).map_err(|err| {
                            PlanError::DeadInstruction(format!("timeout emit({event}): {err}"))
                        })?;
                        Ok(true)
                    }
                    None => Err(PlanError::TimedOut(format!(
                        "no completion within {duration:?}"
                    ))),
                }
            }
            InstructionKind::Start { template, role } => {
                let child = ctx.plan.add_task(template.clone())?;
                ctx.plan
                    .depends_on(ctx.root, child, DependencyInfo::new().with_role(role.clone()))?;
                ctx.plan.start_task(child)?;
                debug!(root = %ctx.root, %child, %role, "child started");
                Ok(true)
            }
        }
    }

    /// Undo state this instruction holds in the plan.
    pub(crate) fn release(&mut self, plan: &mut Plan, root: TaskId) {
        match &mut self.kind {
            InstructionKind::Wait { held, .. } => release_held(plan, root, held),
            InstructionKind::Timeout { body, .. } => body.release(plan, root),
            _ => {}
        }
    }
}

/// Keep the task owning an awaited event alive while waiting on it.
fn hold_task(ctx: &mut ScriptContext<'_>, event: &EventRef) -> Result<Option<(TaskId, String)>> {
    let EventRef::Task { task, .. } = event else {
        return Ok(None);
    };
    let task = *task;
    if task == ctx.root {
        return Ok(None);
    }
    let role = ctx.plan.hold(ctx.root, task)?;
    debug!(root = %ctx.root, %task, %role, "holding awaited task");
    Ok(Some((task, role)))
}

/// Drop the keep-alive role only; dependencies merged onto the same edge
/// meanwhile stay.
fn release_held(plan: &mut Plan, root: TaskId, held: &mut Option<(TaskId, String)>) {
    if let Some((task, role)) = held.take() {
        if !plan.release_hold(root, task, &role) && plan.is_live(task) {
            warn!(%root, %task, "held dependency already gone");
        }
    }
}

