// src/config/model.rs

use serde::Deserialize;

use crate::types::{LogLevel, UnhandledExceptionPolicy};

/// Engine configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// cycle_length_ms = 100
/// garbage_collect = true
/// verify_consistency = false
/// max_propagation_steps = 10000
/// unhandled_exceptions = "stop_chain"
///
/// [logging]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEngineConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// Validated engine configuration.
///
/// Only obtainable through `TryFrom<RawEngineConfig>` (see
/// `config::validate`) or [`EngineConfig::default`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub logging: LoggingSection,
}

impl EngineConfig {
    pub(crate) fn new_unchecked(engine: EngineSection, logging: LoggingSection) -> Self {
        Self { engine, logging }
    }

    pub fn cycle_length(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.engine.cycle_length_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new_unchecked(EngineSection::default(), LoggingSection::default())
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Period of the cycle driver in milliseconds.
    #[serde(default = "default_cycle_length_ms")]
    pub cycle_length_ms: u64,

    /// Run the garbage-collection trigger at the end of every cycle.
    #[serde(default = "default_true")]
    pub garbage_collect: bool,

    /// Run the O(V+E) bidirectional-index check after every cycle.
    #[serde(default)]
    pub verify_consistency: bool,

    /// Upper bound on emissions processed by a single propagation pass.
    #[serde(default = "default_max_propagation_steps")]
    pub max_propagation_steps: usize,

    /// What to do with exceptions no fault handler picked up.
    #[serde(default)]
    pub unhandled_exceptions: UnhandledExceptionPolicy,
}

fn default_cycle_length_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_max_propagation_steps() -> usize {
    10_000
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            cycle_length_ms: default_cycle_length_ms(),
            garbage_collect: true,
            verify_consistency: false,
            max_propagation_steps: default_max_propagation_steps(),
            unhandled_exceptions: UnhandledExceptionPolicy::default(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSection {
    /// If `None`, `MISSIONGRAPH_LOG` or `info` is used.
    #[serde(default)]
    pub level: Option<LogLevel>,
}
