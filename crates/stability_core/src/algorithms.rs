pub mod composition;
pub mod coordinate;
pub mod cyclic;
pub mod region;

pub use composition::Composition;
pub use coordinate::{
    BottomUpBfs, BottomUpDichotomicDfs, BottomUpLinearDfs, CompleteBottomUpSearch,
};
pub use cyclic::{BottomUpDichotomicSearch, CompleteBottomUpDichotomicSearch};
pub use region::{BottomUpLinearSearch, TopDownSearch};

use crate::geometry::Interval;
use crate::traits::{Clock, SystemClock, VerificationOracle};
use crate::verification::{OracleError, OracleStatistics, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Loop budget. Per-coordinate searches spend it once per coordinate and bound direction.
    pub max_iterations: usize,
    pub timeout_secs: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            timeout_secs: 60.0,
        }
    }
}

/// Why a search stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Termination {
    /// The oracle confirmed the region, or every coordinate converged.
    Converged,
    /// A refinement operation could not proceed at this precision.
    Exhausted,
    TimedOut,
    IterationLimit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SearchStatistics {
    pub soundness: bool,
    pub completeness: bool,
    /// Oracle calls made by the search.
    pub iterations: usize,
    pub refinement_success: bool,
    pub timed_out: bool,
    /// Wall-clock seconds.
    pub total_time: f64,
    pub termination: Termination,
}

impl Default for SearchStatistics {
    fn default() -> Self {
        Self {
            soundness: false,
            completeness: false,
            iterations: 0,
            refinement_success: true,
            timed_out: false,
            total_time: 0.0,
            termination: Termination::IterationLimit,
        }
    }
}

/// A search over guarantees of type `Input`, producing a refined guarantee of type `Output`.
///
/// Searches never fail on their own account: whether the returned region is sound or complete is
/// reported through [`SearchStatistics`]. The only error is oracle output that cannot be
/// interpreted.
pub trait SearchAlgorithm {
    type Input;
    type Output;

    fn name(&self) -> &str;

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        guarantee: Self::Input,
    ) -> Result<Self::Output, OracleError>;

    /// Statistics of the last call to [`SearchAlgorithm::search`].
    fn statistics(&self) -> &SearchStatistics;
}

impl<S: SearchAlgorithm + ?Sized> SearchAlgorithm for Box<S> {
    type Input = S::Input;
    type Output = S::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        guarantee: Self::Input,
    ) -> Result<Self::Output, OracleError> {
        (**self).search(oracle, guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        (**self).statistics()
    }
}

/// Per-run bookkeeping shared by every search loop: timer, oracle call counting, reporting.
pub(crate) struct SearchRun {
    config: SearchConfig,
    clock: Arc<dyn Clock>,
    start: f64,
    pub(crate) statistics: SearchStatistics,
}

impl SearchRun {
    pub(crate) fn new(config: SearchConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            start: 0.0,
            statistics: SearchStatistics::default(),
        }
    }

    pub(crate) fn system(config: SearchConfig) -> Self {
        Self::new(config, Arc::new(SystemClock::new()))
    }

    pub(crate) fn max_iterations(&self) -> usize {
        self.config.max_iterations
    }

    pub(crate) fn begin(&mut self) {
        self.statistics = SearchStatistics::default();
        self.start = self.clock.now();
    }

    pub(crate) fn query(
        &mut self,
        name: &str,
        oracle: &mut dyn VerificationOracle,
        region: &Interval,
    ) -> Result<Verdict, OracleError> {
        let verdict = oracle.check(region)?;
        self.statistics.iterations += 1;
        if self.statistics.iterations % 10 == 0 {
            debug!(
                algorithm = name,
                iteration = self.statistics.iterations,
                "search progress"
            );
        }
        Ok(verdict)
    }

    /// Marks the run as timed out once the budget is spent.
    pub(crate) fn check_timeout(&mut self) -> bool {
        if self.clock.now() - self.start > self.config.timeout_secs {
            self.statistics.timed_out = true;
            self.statistics.termination = Termination::TimedOut;
        }
        self.statistics.timed_out
    }

    pub(crate) fn timed_out(&self) -> bool {
        self.statistics.timed_out
    }

    pub(crate) fn finish(&mut self, name: &str, oracle: &dyn VerificationOracle) {
        self.statistics.total_time = (self.clock.now() - self.start).max(0.0);
        end_report(name, &self.statistics, &oracle.statistics());
    }
}

pub(crate) fn end_report(name: &str, statistics: &SearchStatistics, oracle: &OracleStatistics) {
    let share = if statistics.total_time > 0.0 {
        100.0 * oracle.total_time / statistics.total_time
    } else {
        0.0
    };
    info!(
        algorithm = name,
        soundness = statistics.soundness,
        completeness = statistics.completeness,
        refinement_success = statistics.refinement_success,
        iterations = statistics.iterations,
        termination = ?statistics.termination,
        total_time = statistics.total_time,
        oracle_calls = oracle.num_calls,
        oracle_time = oracle.total_time,
        oracle_avg_time = oracle.avg_time(),
        oracle_time_pct = share,
        "search finished"
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::geometry::Interval;
    use crate::traits::Clock;
    use crate::verification::{FnOracle, OracleError, Verdict};
    use nalgebra::DMatrix;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Clock that advances by a fixed step on every reading.
    pub(crate) struct StepClock {
        ticks: AtomicU64,
        step: f64,
    }

    impl StepClock {
        pub(crate) fn new(step: f64) -> Arc<Self> {
            Arc::new(Self {
                ticks: AtomicU64::new(0),
                step,
            })
        }

        pub(crate) fn frozen() -> Arc<Self> {
            Self::new(0.0)
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> f64 {
            self.ticks.fetch_add(1, Ordering::SeqCst) as f64 * self.step
        }
    }

    pub(crate) fn row(values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_row_slice(1, values.len(), values)
    }

    pub(crate) fn assert_close(actual: &DMatrix<f64>, expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "expected {expected:?}, got {actual}");
        }
    }

    /// Oracle that is sound exactly on regions accepted by `accept`; otherwise it answers with a
    /// corner of the region as witness.
    pub(crate) fn region_oracle(
        accept: impl Fn(&Interval) -> bool,
    ) -> FnOracle<impl FnMut(&Interval) -> Result<Verdict, OracleError>> {
        FnOracle::with_clock(
            move |region: &Interval| {
                Ok(if accept(region) {
                    Verdict::verified()
                } else {
                    Verdict::counterexample(region.ub().clone())
                })
            },
            StepClock::frozen(),
        )
    }
}
