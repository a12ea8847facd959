use crate::geometry::Interval;
use crate::verification::{OracleError, OracleStatistics, Verdict};
use std::time::Instant;

/// A verifier deciding whether a region of input space is free of counterexamples
/// (sound mode) or large enough to contain every same-class point nearby (complete mode).
pub trait VerificationOracle {
    /// Checks `region` and returns the verdict, with a witness when the verdict is negative.
    fn check(&mut self, region: &Interval) -> Result<Verdict, OracleError>;

    /// Cumulative call count and time spent in `check`.
    fn statistics(&self) -> OracleStatistics;
}

/// A monotonic wall-clock source, in seconds.
/// Searches only compare differences of `now()`, so the origin is arbitrary.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
