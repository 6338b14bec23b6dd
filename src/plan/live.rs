// src/plan/live.rs

//! The live plan: task and event arenas, relations, missions, and
//! synchronous event propagation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::errors::{PlanError, PlanException, Result};
use crate::graph::capability::VertexCapability;
use crate::graph::hierarchy::{Relation, RelationSpace};
use crate::plan::event::{ContextValue, Emission, EmissionRecord, EventGenerator};
use crate::plan::gc::GarbageCollector;
use crate::plan::relations::{DependencyInfo, EventRelation, TaskRelation};
use crate::plan::task::{
    Task, TaskState, TaskTemplate, FAILED, INTRINSIC_FORWARDINGS, STANDARD_EVENTS, START, STOP,
    SUCCESS,
};
use crate::plan::{EventId, TaskId};

/// Default bound on the number of emissions a single propagation may cause.
pub const DEFAULT_MAX_PROPAGATION_STEPS: usize = 10_000;

pub struct Plan {
    tasks: BTreeMap<TaskId, Task>,
    events: BTreeMap<EventId, EventGenerator>,
    task_relations: RelationSpace<TaskRelation>,
    event_relations: RelationSpace<EventRelation>,
    missions: BTreeSet<TaskId>,
    permanent: BTreeSet<TaskId>,
    next_task: u64,
    next_event: u64,
    emission_seq: u64,
    /// Counter for the roles of keep-alive dependencies.
    next_hold: u64,
    max_propagation_steps: usize,
    /// Emissions not yet handed to listeners, in emission order.
    emitted: Vec<EmissionRecord>,
    /// Errors raised during propagation, handled at the cycle boundary.
    exceptions: Vec<PlanException>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("tasks", &self.tasks.len())
            .field("events", &self.events.len())
            .field("missions", &self.missions)
            .field("permanent", &self.permanent)
            .field("emission_seq", &self.emission_seq)
            .finish_non_exhaustive()
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Plan {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: BTreeMap::new(),
            events: BTreeMap::new(),
            task_relations: RelationSpace::new(),
            event_relations: RelationSpace::new(),
            missions: BTreeSet::new(),
            permanent: BTreeSet::new(),
            next_task: 0,
            next_event: 0,
            emission_seq: 0,
            next_hold: 0,
            max_propagation_steps: DEFAULT_MAX_PROPAGATION_STEPS,
            emitted: Vec::new(),
            exceptions: Vec::new(),
            clock,
        }
    }

    pub fn set_max_propagation_steps(&mut self, steps: usize) {
        self.max_propagation_steps = steps;
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Sequence number of the latest emission (0 before any emission).
    pub fn emission_seq(&self) -> u64 {
        self.emission_seq
    }

    // ---------------------------------------------------------------------
    // Tasks and events
    // ---------------------------------------------------------------------

    /// Instantiate `template` as a new pending task.
    ///
    /// The task gets the standard events, the template's extra events, and
    /// forwardings between them.
    pub fn add_task(&mut self, template: TaskTemplate) -> Result<TaskId> {
        let id = TaskId(self.next_task);
        self.next_task += 1;

        let mut events = BTreeMap::new();
        let names = STANDARD_EVENTS
            .iter()
            .map(|n| n.to_string())
            .chain(template.events.iter().cloned());
        for name in names {
            if events.contains_key(&name) {
                continue;
            }
            let event = self.allocate_event(&name, Some(id));
            events.insert(name, event);
        }

        let forwardings: Result<Vec<(EventId, EventId)>> = INTRINSIC_FORWARDINGS
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .chain(template.forwardings.iter().cloned())
            .map(|(from, to)| match (events.get(&from), events.get(&to)) {
                (Some(f), Some(t)) => Ok((*f, *t)),
                _ => Err(PlanError::Argument(format!(
                    "forwarding {from} -> {to} of model {} names an unknown event",
                    template.model
                ))),
            })
            .collect::<Result<_>>();
        let forwardings = match forwardings {
            Ok(forwardings) => forwardings,
            Err(err) => {
                for event in events.values() {
                    self.events.remove(event);
                }
                return Err(err);
            }
        };

        let model = template.model.clone();
        self.tasks.insert(
            id,
            Task {
                id,
                template,
                state: TaskState::Pending,
                terminal: None,
                events,
                started_at: None,
                finished_at: None,
            },
        );

        for (from, to) in forwardings {
            if let Err(err) =
                self.event_relations
                    .add_relation(EventRelation::Forwarding, from, to, None)
            {
                self.discard_task(id);
                return Err(err);
            }
        }

        debug!(task = %id, %model, "task added");
        Ok(id)
    }

    /// Add an event that belongs to no task.
    pub fn add_event(&mut self, name: impl Into<String>) -> EventId {
        let name = name.into();
        self.allocate_event(&name, None)
    }

    fn allocate_event(&mut self, name: &str, task: Option<TaskId>) -> EventId {
        let id = EventId(self.next_event);
        self.next_event += 1;
        self.events.insert(id, EventGenerator::new(id, name, task));
        id
    }

    /// Drop a task that failed to be set up.
    fn discard_task(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.remove(&id) {
            for event in task.events.values() {
                self.event_relations.remove_vertex(*event);
                self.events.remove(event);
            }
        }
    }

    /// A task of the live plan. Finalized tasks are gone and give
    /// `UnknownTask`; [`Plan::task_state`] still tells them apart.
    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or_else(|| {
            if self.is_finalized(id) {
                PlanError::UnknownTask(format!("{id} (finalized)"))
            } else {
                PlanError::UnknownTask(id.to_string())
            }
        })
    }

    /// State of `id`, `Finalized` once it has left the plan.
    pub fn task_state(&self, id: TaskId) -> Result<TaskState> {
        if self.is_finalized(id) {
            return Ok(TaskState::Finalized);
        }
        self.task(id).map(Task::state)
    }

    pub fn contains_task(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Handles are never reused, so an allocated handle missing from the
    /// arena belongs to a finalized task.
    pub fn is_finalized(&self, id: TaskId) -> bool {
        id.0 < self.next_task && !self.tasks.contains_key(&id)
    }

    /// Tasks of the live plan.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.values()
    }

    pub fn live_tasks(&self) -> Vec<TaskId> {
        self.tasks.keys().copied().collect()
    }

    pub fn is_live(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of events in the live plan.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn event(&self, id: EventId) -> Result<&EventGenerator> {
        self.events.get(&id).ok_or_else(|| {
            if id.0 < self.next_event {
                PlanError::UnknownEvent(format!("{id} (finalized)"))
            } else {
                PlanError::UnknownEvent(id.to_string())
            }
        })
    }

    /// Event `name` of `task`.
    pub fn task_event(&self, task: TaskId, name: &str) -> Result<EventId> {
        self.task(task)?
            .event(name)
            .ok_or_else(|| PlanError::UnknownEvent(format!("{task}/{name}")))
    }

    /// Human-readable name of an event, for logs and error messages.
    pub fn describe_event(&self, id: EventId) -> String {
        match self.events.get(&id) {
            Some(event) => match event.task() {
                Some(task) => format!("{task}/{}", event.name()),
                None => event.name().to_string(),
            },
            None => id.to_string(),
        }
    }

    // ---------------------------------------------------------------------
    // Missions and permanent tasks
    // ---------------------------------------------------------------------

    pub fn add_mission(&mut self, task: TaskId) -> Result<()> {
        self.task(task)?;
        self.missions.insert(task);
        Ok(())
    }

    pub fn remove_mission(&mut self, task: TaskId) -> bool {
        self.missions.remove(&task)
    }

    pub fn is_mission(&self, task: TaskId) -> bool {
        self.missions.contains(&task)
    }

    pub fn missions(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.missions.iter().copied()
    }

    pub fn add_permanent(&mut self, task: TaskId) -> Result<()> {
        self.task(task)?;
        self.permanent.insert(task);
        Ok(())
    }

    pub fn remove_permanent(&mut self, task: TaskId) -> bool {
        self.permanent.remove(&task)
    }

    pub fn is_permanent(&self, task: TaskId) -> bool {
        self.permanent.contains(&task)
    }

    // ---------------------------------------------------------------------
    // Relations
    // ---------------------------------------------------------------------

    pub fn task_relations(&self) -> &RelationSpace<TaskRelation> {
        &self.task_relations
    }

    pub fn event_relations(&self) -> &RelationSpace<EventRelation> {
        &self.event_relations
    }

    /// Make `parent` depend on `child`.
    pub fn depends_on(&mut self, parent: TaskId, child: TaskId, info: DependencyInfo) -> Result<()> {
        self.task(parent)?;
        self.task(child)?;
        self.task_relations
            .add_relation(TaskRelation::Dependency, parent, child, Some(info))
    }

    pub fn remove_dependency(&mut self, parent: TaskId, child: TaskId) -> bool {
        self.task_relations
            .remove_relation(TaskRelation::Dependency, parent, child)
    }

    pub fn dependency_info(&self, parent: TaskId, child: TaskId) -> Option<&DependencyInfo> {
        self.task_relations
            .graph(TaskRelation::Dependency)
            .edge_info(parent, child)
            .ok()
            .flatten()
    }

    /// Child of `parent` registered under `role`.
    pub fn child_with_role(&self, parent: TaskId, role: &str) -> Option<TaskId> {
        let graph = self.task_relations.graph(TaskRelation::Dependency);
        graph.out_neighbours(parent).find(|child| {
            graph
                .edge_info(parent, *child)
                .ok()
                .flatten()
                .is_some_and(|info| info.roles.contains(role))
        })
    }

    /// Drop `role` from the dependency `parent -> child`. The edge itself is
    /// removed once it has no role left. Returns whether the edge was
    /// removed.
    pub fn remove_role(&mut self, parent: TaskId, child: TaskId, role: &str) -> Result<bool> {
        let Some(info) = self.dependency_info(parent, child).cloned() else {
            return Ok(false);
        };
        let mut info = info;
        info.roles.remove(role);
        if info.roles.is_empty() {
            return Ok(self.remove_dependency(parent, child));
        }
        self.task_relations
            .set_info(TaskRelation::Dependency, parent, child, Some(info))?;
        Ok(false)
    }

    /// Keep `child` alive on behalf of `parent` without making it a real
    /// dependency: no success or failure events, under a fresh role that
    /// [`Plan::release_hold`] removes again. An existing dependency on
    /// `child` is left as it is.
    pub fn hold(&mut self, parent: TaskId, child: TaskId) -> Result<String> {
        let role = format!("keep-alive#{}", self.next_hold);
        self.next_hold += 1;
        let info = DependencyInfo::new()
            .with_role(role.clone())
            .with_success(Vec::<String>::new())
            .with_failure(Vec::<String>::new());
        self.depends_on(parent, child, info)?;
        Ok(role)
    }

    /// Drop a hold taken with [`Plan::hold`]. Returns whether it was still
    /// there.
    pub fn release_hold(&mut self, parent: TaskId, child: TaskId, role: &str) -> bool {
        let held = self
            .dependency_info(parent, child)
            .is_some_and(|info| info.roles.contains(role));
        if held {
            if let Err(err) = self.remove_role(parent, child, role) {
                warn!(%parent, %child, "could not release hold: {err}");
                return false;
            }
        }
        held
    }

    pub fn planned_by(&mut self, task: TaskId, planner: TaskId) -> Result<()> {
        self.task(task)?;
        self.task(planner)?;
        self.task_relations
            .add_relation(TaskRelation::PlannedBy, task, planner, None)
    }

    /// Emitting `source` emits `target` in the same propagation.
    pub fn forward(&mut self, source: EventId, target: EventId) -> Result<()> {
        self.event(source)?;
        self.event(target)?;
        self.event_relations
            .add_relation(EventRelation::Forwarding, source, target, None)
    }

    pub fn remove_forwarding(&mut self, source: EventId, target: EventId) -> bool {
        self.event_relations
            .remove_relation(EventRelation::Forwarding, source, target)
    }

    /// Emitting `source` calls `target` in the same propagation.
    pub fn signal(&mut self, source: EventId, target: EventId) -> Result<()> {
        self.event(source)?;
        self.event(target)?;
        self.event_relations
            .add_relation(EventRelation::Signal, source, target, None)
    }

    /// Move every parent-side relation of `old` (and its mission/permanent
    /// status) onto `new`. Children of `old` stay where they are.
    pub fn replace_task(&mut self, old: TaskId, new: TaskId) -> Result<()> {
        self.task(old)?;
        self.task(new)?;
        if old == new {
            return Ok(());
        }

        for &kind in TaskRelation::all() {
            let parents: Vec<(TaskId, Option<DependencyInfo>)> = self
                .task_relations
                .graph(kind)
                .in_neighbours(old)
                .map(|p| {
                    let info = self
                        .task_relations
                        .graph(kind)
                        .edge_info(p, old)
                        .ok()
                        .flatten()
                        .cloned();
                    (p, info)
                })
                .collect();
            for (parent, info) in parents {
                if parent == new {
                    continue;
                }
                self.task_relations.add_relation(kind, parent, new, info)?;
                self.task_relations.remove_relation(kind, parent, old);
            }
        }

        if self.missions.remove(&old) {
            self.missions.insert(new);
        }
        if self.permanent.remove(&old) {
            self.permanent.insert(new);
        }
        info!(%old, %new, "task replaced");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Emission and propagation
    // ---------------------------------------------------------------------

    /// Whether `event` may be emitted right now.
    pub fn check_emittable(&self, event: EventId) -> Result<()> {
        let Some(generator) = self.events.get(&event) else {
            if event.0 < self.next_event {
                return Err(PlanError::EmissionFailed(format!(
                    "{event} is unreachable: task finalized"
                )));
            }
            return Err(PlanError::UnknownEvent(event.to_string()));
        };
        let name = generator.name();
        if let Some(reason) = generator.unreachability_reason() {
            return Err(PlanError::EmissionFailed(format!(
                "{} is unreachable: {reason}",
                self.describe_event(event)
            )));
        }
        let Some(task_id) = generator.task() else {
            return Ok(());
        };
        let task = self.task(task_id)?;
        let refusal = match (name, task.state) {
            (START, TaskState::Pending) => None,
            (START, _) => Some("task already started"),
            (_, TaskState::Pending) => Some("task not started"),
            (SUCCESS, TaskState::Running) if task.terminal == Some(TaskState::Failed) => {
                Some("task already failing")
            }
            (FAILED, TaskState::Running) if task.terminal == Some(TaskState::Success) => {
                Some("task already succeeding")
            }
            (_, TaskState::Running) => None,
            _ => Some("task finished"),
        };
        match refusal {
            None => Ok(()),
            Some(reason) => Err(PlanError::EmissionFailed(format!(
                "cannot emit {}: {reason}",
                self.describe_event(event)
            ))),
        }
    }

    /// Emit `event` and synchronously propagate along forwardings and
    /// signals until nothing is left to emit.
    ///
    /// Fails without emitting anything if `event` itself cannot be emitted.
    /// Failures further down the propagation are raised as plan exceptions
    /// on the task owning the refused event.
    pub fn emit(&mut self, event: EventId, context: Vec<ContextValue>) -> Result<()> {
        self.check_emittable(event)?;

        let mut queue = VecDeque::from([(event, context)]);
        let mut steps = 0usize;
        while let Some((event, context)) = queue.pop_front() {
            steps += 1;
            if steps > self.max_propagation_steps {
                return Err(PlanError::EmissionFailed(format!(
                    "propagation exceeded {} steps",
                    self.max_propagation_steps
                )));
            }

            if let Err(err) = self.check_emittable(event) {
                self.raise_on_event(event, err);
                continue;
            }
            self.fire(event, context.clone());

            let forwarded = self
                .event_relations
                .children_of(EventRelation::Forwarding, event);
            let signalled = self
                .event_relations
                .children_of(EventRelation::Signal, event);
            for target in forwarded.into_iter().chain(signalled) {
                queue.push_back((target, context.clone()));
            }
        }
        Ok(())
    }

    /// Emit the event `name` of `task`.
    pub fn emit_task_event(&mut self, task: TaskId, name: &str, context: Vec<ContextValue>) -> Result<()> {
        let event = self.task_event(task, name)?;
        self.emit(event, context)
    }

    pub fn start_task(&mut self, task: TaskId) -> Result<()> {
        self.emit_task_event(task, START, Vec::new())
    }

    /// Interrupt `task`.
    ///
    /// A pending task is stopped without ever starting; a running one emits
    /// `stop`. Finished or finishing tasks are left alone.
    pub fn stop_task(&mut self, task: TaskId) -> Result<()> {
        let state = self.task(task)?.state;
        let finishing = self.task(task)?.is_finishing();
        match state {
            TaskState::Pending => {
                let now = self.clock.now();
                if let Some(t) = self.tasks.get_mut(&task) {
                    t.state = TaskState::Stopped;
                    t.finished_at = Some(now);
                }
                self.mark_task_events_unreachable(task, "task stopped before starting");
                info!(%task, "pending task stopped");
                Ok(())
            }
            TaskState::Running if !finishing => self.emit_task_event(task, STOP, Vec::new()),
            _ => Ok(()),
        }
    }

    fn fire(&mut self, event: EventId, context: Vec<ContextValue>) {
        self.emission_seq += 1;
        let emission = Emission {
            seq: self.emission_seq,
            time: self.clock.now(),
            context,
        };

        let Some(generator) = self.events.get_mut(&event) else {
            return;
        };
        generator.record(emission.clone());
        let name = generator.name().to_string();
        let task = generator.task();
        trace!(event = %self.describe_event(event), seq = emission.seq, "emitted");

        if let Some(task) = task {
            self.apply_task_event(task, &name, emission.time);
        }
        self.emitted.push(EmissionRecord {
            event,
            task,
            name: name.clone(),
            emission,
        });
        if let Some(task) = task {
            self.check_dependencies(task, &name);
        }
    }

    fn apply_task_event(&mut self, id: TaskId, name: &str, time: Instant) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        match name {
            START => {
                task.state = TaskState::Running;
                task.started_at = Some(time);
                debug!(task = %id, model = %task.template.model, "task started");
            }
            SUCCESS => {
                task.terminal.get_or_insert(TaskState::Success);
            }
            FAILED => {
                task.terminal.get_or_insert(TaskState::Failed);
            }
            STOP => {
                task.state = task.terminal.unwrap_or(TaskState::Stopped);
                task.finished_at = Some(time);
                debug!(task = %id, state = ?task.state, "task finished");
                self.mark_task_events_unreachable(id, "task finished");
            }
            _ => {}
        }
    }

    fn mark_task_events_unreachable(&mut self, task: TaskId, reason: &str) {
        let Some(task) = self.tasks.get(&task) else {
            return;
        };
        for event in task.events.values() {
            if let Some(generator) = self.events.get_mut(event) {
                if !generator.emitted() {
                    generator.mark_unreachable(reason);
                }
            }
        }
    }

    /// Raise `ChildFailed` if `name` breaks a dependency on `child`.
    fn check_dependencies(&mut self, child: TaskId, name: &str) {
        if self.is_covered_by_fault_handler(child) {
            return;
        }
        let Ok(task) = self.task(child) else {
            return;
        };
        let emitted = |event: &str| {
            task.event(event)
                .and_then(|id| self.events.get(&id))
                .is_some_and(EventGenerator::emitted)
        };

        let mut broken = Vec::new();
        let mut reason = String::new();
        for parent in self
            .task_relations
            .parents_of(TaskRelation::Dependency, child)
        {
            if !self.tasks.get(&parent).is_some_and(Task::is_running) {
                continue;
            }
            let Some(info) = self.dependency_info(parent, child) else {
                continue;
            };
            if info.failure.contains(name) {
                reason = format!("{child} emitted {name}");
            } else if name == STOP
                && !info.success.is_empty()
                && !info.success.iter().any(|e| emitted(e))
                && !info.failure.iter().any(|e| emitted(e))
            {
                reason = format!("{child} finished without reaching any of {:?}", info.success);
            } else {
                continue;
            }
            broken.push(parent);
        }

        if broken.is_empty() {
            return;
        }
        warn!(%child, parents = ?broken, "dependency broken: {reason}");
        let mut exception =
            PlanException::new(PlanError::ChildFailed(reason), child).with_failure_event(name);
        exception.trace.extend(broken);
        self.exceptions.push(exception);
    }

    /// Whether a running fault-handling task has taken charge of `task`.
    pub fn is_covered_by_fault_handler(&self, task: TaskId) -> bool {
        self.task_relations
            .parents_of(TaskRelation::ErrorHandling, task)
            .into_iter()
            .any(|handler| self.tasks.get(&handler).is_some_and(Task::is_running))
    }

    pub(crate) fn raise_on_event(&mut self, event: EventId, error: PlanError) {
        let owner = self.events.get(&event).and_then(EventGenerator::task);
        match owner {
            Some(task) => {
                let name = self
                    .events
                    .get(&event)
                    .map(|e| e.name().to_string())
                    .unwrap_or_default();
                self.raise(PlanException::new(error, task).with_failure_event(name));
            }
            None => warn!(event = %self.describe_event(event), "{error}"),
        }
    }

    /// Queue an exception for the next cycle boundary.
    pub fn raise(&mut self, exception: PlanException) {
        debug!(origin = %exception.origin, "raised {}", exception.error);
        self.exceptions.push(exception);
    }

    /// Drain the emissions not yet handed to listeners.
    pub fn take_emissions(&mut self) -> Vec<EmissionRecord> {
        std::mem::take(&mut self.emitted)
    }

    pub fn has_pending_emissions(&self) -> bool {
        !self.emitted.is_empty()
    }

    pub fn take_exceptions(&mut self) -> Vec<PlanException> {
        std::mem::take(&mut self.exceptions)
    }

    // ---------------------------------------------------------------------
    // Garbage collection
    // ---------------------------------------------------------------------

    /// Tasks reachable from an unfinished mission or permanent task through
    /// any task relation.
    pub fn useful_tasks(&self) -> BTreeSet<TaskId> {
        let mut useful = BTreeSet::new();
        let mut stack: Vec<TaskId> = self
            .missions
            .iter()
            .chain(self.permanent.iter())
            .copied()
            .filter(|t| self.tasks.get(t).is_some_and(|task| !task.is_finished()))
            .collect();
        while let Some(task) = stack.pop() {
            if !useful.insert(task) {
                continue;
            }
            for &kind in TaskRelation::all() {
                stack.extend(
                    self.task_relations
                        .graph(kind)
                        .out_neighbours(task)
                        .filter(|c| !useful.contains(c)),
                );
            }
        }
        useful
    }

    /// Remove a non-running task from the live plan.
    ///
    /// The task, its events and every relation they take part in are
    /// dropped. Finalizing twice is a no-op.
    pub fn finalize_task(&mut self, id: TaskId) -> Result<()> {
        if self.is_finalized(id) {
            return Ok(());
        }
        let task = self.task(id)?;
        if task.is_running() {
            return Err(PlanError::Argument(format!("cannot finalize running task {id}")));
        }

        if let Some(task) = self.tasks.remove(&id) {
            for event in task.events.values() {
                self.event_relations.remove_vertex(*event);
                self.events.remove(event);
            }
        }
        self.task_relations.remove_vertex(id);
        self.missions.remove(&id);
        self.permanent.remove(&id);
        debug!(task = %id, "task finalized");
        Ok(())
    }

    /// Run `collector` over the plan. Returns the finalized tasks.
    pub fn garbage_collect(&mut self, collector: &mut dyn GarbageCollector) -> Vec<TaskId> {
        collector.collect(self)
    }

    /// Check the adjacency of every task and event relation graph.
    pub fn verify_consistency(&self) -> Result<()> {
        self.task_relations.verify_consistency()?;
        self.event_relations.verify_consistency()
    }
}

impl VertexCapability<TaskRelation> for Plan {
    fn relations(&self) -> &RelationSpace<TaskRelation> {
        &self.task_relations
    }

    fn relations_mut(&mut self) -> &mut RelationSpace<TaskRelation> {
        &mut self.task_relations
    }
}

impl VertexCapability<EventRelation> for Plan {
    fn relations(&self) -> &RelationSpace<EventRelation> {
        &self.event_relations
    }

    fn relations_mut(&mut self) -> &mut RelationSpace<EventRelation> {
        &mut self.event_relations
    }
}
