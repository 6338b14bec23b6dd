// src/types.rs

use std::str::FromStr;
use serde::Deserialize;

/// Log level accepted by `[logging].level` and [`crate::logging::init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}

/// What the engine does with an exception nobody handled.
///
/// - `StopChain`: stop every running task in the exception's trace
///   (default behaviour).
/// - `Report`: only log and report the exception in the cycle report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledExceptionPolicy {
    StopChain,
    Report,
}

impl Default for UnhandledExceptionPolicy {
    fn default() -> Self {
        UnhandledExceptionPolicy::StopChain
    }
}

impl FromStr for UnhandledExceptionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop_chain" => Ok(UnhandledExceptionPolicy::StopChain),
            "report" => Ok(UnhandledExceptionPolicy::Report),
            other => Err(format!(
                "invalid unhandled_exceptions: {other} (expected \"stop_chain\" or \"report\")"
            )),
        }
    }
}
