// src/plan/gc.rs

//! Garbage collection of tasks no mission or permanent task needs anymore.

use tracing::{debug, warn};

use crate::plan::live::Plan;
use crate::plan::TaskId;

/// Reclaims tasks from a plan. Called once per cycle when enabled.
pub trait GarbageCollector: Send {
    /// Returns the tasks finalized by this pass.
    fn collect(&mut self, plan: &mut Plan) -> Vec<TaskId>;
}

/// Collector based on reachability from missions and permanent tasks.
///
/// Unreachable finished tasks are finalized. Unreachable running tasks are
/// stopped and finalized on a later pass, once they have finished. Pending
/// tasks are left alone: they may still be picked up by a script.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReachabilityCollector;

impl GarbageCollector for ReachabilityCollector {
    fn collect(&mut self, plan: &mut Plan) -> Vec<TaskId> {
        let useful = plan.useful_tasks();
        let candidates: Vec<TaskId> = plan
            .live_tasks()
            .into_iter()
            .filter(|t| !useful.contains(t))
            .collect();

        let mut finalized = Vec::new();
        for task in candidates {
            let Ok(state) = plan.task(task).map(|t| t.state()) else {
                continue;
            };
            if state.is_finished() {
                match plan.finalize_task(task) {
                    Ok(()) => finalized.push(task),
                    Err(err) => warn!(%task, "could not finalize: {err}"),
                }
            } else if plan.task(task).is_ok_and(|t| t.is_running()) {
                debug!(%task, "stopping task no longer needed");
                if let Err(err) = plan.stop_task(task) {
                    warn!(%task, "could not stop: {err}");
                }
            }
        }
        finalized
    }
}
