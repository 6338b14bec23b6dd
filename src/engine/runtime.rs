// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::errors::Result;

use super::core::ExecutionCore;
use super::ControlRequest;

/// Ticks an [`ExecutionCore`] every `cycle_length` and feeds it control
/// requests.
///
/// This is a pure IO shell: every semantic decision lives in the core. The
/// shell only decides when cycles happen and when to stop.
pub struct Runtime {
    core: ExecutionCore,
    control_rx: mpsc::Receiver<ControlRequest>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(core: ExecutionCore, control_rx: mpsc::Receiver<ControlRequest>) -> Self {
        Self { core, control_rx }
    }

    /// Main loop.
    ///
    /// - Runs one cycle per tick.
    /// - Queues `Emit` requests for the next cycle.
    /// - Stops on `Shutdown` or once every sender is gone, after a last
    ///   cycle flushing what was queued.
    ///
    /// Returns the core so callers can inspect the final plan.
    pub async fn run(mut self) -> Result<ExecutionCore> {
        let cycle_length = self.core.config().cycle_length();
        info!(?cycle_length, "missiongraph runtime started");

        let mut ticker = tokio::time::interval(cycle_length);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.core.process_cycle()?;
                    if !report.unhandled.is_empty() {
                        warn!(cycle = report.cycle, unhandled = report.unhandled.len(), "cycle left unhandled exceptions");
                    }
                }
                request = self.control_rx.recv() => {
                    let Some(request) = request else {
                        info!("control channel closed; exiting");
                        break;
                    };
                    debug!(?request, "runtime received control request");
                    if !self.core.step(request) {
                        info!("shutdown requested; stopping runtime");
                        break;
                    }
                }
            }
        }

        self.core.process_cycle()?;
        info!(cycles = self.core.cycle(), "runtime exiting");
        Ok(self.core)
    }
}
