// src/clock/mod.rs

use std::fmt::Debug;
use std::time::Instant;

pub mod mock;

pub use mock::MockClock;

/// Abstract time source.
///
/// Every time-dependent instruction reads the time through this trait so that
/// tests can drive time explicitly.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// Implementation that uses `std::time::Instant::now`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
