// src/fault/mod.rs

//! Fault-response tables and the handlers they spawn.

pub mod handler;
pub mod table;

pub use handler::{
    locate_on_actions, locate_on_missions, locate_on_origin, ActiveFaultHandler, FaultHandler,
    LocatePolicy, FAULT_HANDLING_MODEL,
};
pub use table::{FaultMatcher, FaultResponse, FaultResponseTable};
