// src/lib.rs

//! Plan management and execution-coordination engine.
//!
//! A [`plan::Plan`] holds tasks and their events in typed relation graphs.
//! The [`engine::ExecutionCore`] drives it cycle by cycle:
//! - queued emissions propagate through signals and forwardings
//! - scripts and state machines react to what was emitted
//! - failed dependencies and script errors become plan exceptions, handled
//!   by fault-response tables or the default policy
//! - tasks no mission needs anymore are collected
//!
//! [`engine::Runtime`] is the tokio shell ticking the core.

pub mod clock;
pub mod config;
pub mod coordination;
pub mod engine;
pub mod errors;
pub mod fault;
pub mod graph;
pub mod logging;
pub mod plan;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

pub use crate::clock::{Clock, SystemClock};
pub use crate::config::EngineConfig;
pub use crate::engine::{ControlRequest, CycleReport, ExecutionCore, Runtime};
pub use crate::errors::{ErrorKind, PlanError, PlanException, Result};
pub use crate::plan::{EventId, Plan, TaskId};

/// Build an engine from an optional config file.
///
/// Without a path the default configuration is used. Logging is left to
/// the embedding application (see [`logging::init_logging`]).
pub fn engine_from_config(path: Option<&Path>, clock: Arc<dyn Clock>) -> Result<ExecutionCore> {
    let config = match path {
        Some(path) => config::load_and_validate(path)?,
        None => EngineConfig::default(),
    };
    info!(
        cycle_length_ms = config.engine.cycle_length_ms,
        garbage_collect = config.engine.garbage_collect,
        "engine configured"
    );
    Ok(ExecutionCore::new(config, clock))
}

/// Wrap `core` in a [`Runtime`] and hand back the sender feeding it.
pub fn spawn_channel(core: ExecutionCore, capacity: usize) -> (Runtime, mpsc::Sender<ControlRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Runtime::new(core, rx), tx)
}
