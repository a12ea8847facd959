use super::{SearchAlgorithm, SearchConfig, SearchRun, SearchStatistics, Termination};
use crate::guarantee::{CyclicGuarantee, Guarantee};
use crate::traits::{Clock, VerificationOracle};
use crate::verification::{OracleError, OracleMode};
use std::sync::Arc;
use tracing::trace;

/// Bisects the radius pivot until it is narrower than `δ`.
///
/// Returns whether the last oracle verdict was positive, or `None` if the oracle was never asked.
/// In sound mode a positive verdict raises the pivot; in complete mode it lowers it.
fn bisect_radius(
    run: &mut SearchRun,
    name: &str,
    oracle: &mut dyn VerificationOracle,
    guarantee: &mut CyclicGuarantee,
    mode: OracleMode,
) -> Result<Option<bool>, OracleError> {
    let mut last = None;
    for _ in 0..run.max_iterations() {
        if !guarantee.dichotomic_invariant() {
            trace!(algorithm = name, radius = guarantee.radius(), "pivot converged");
            run.statistics.termination = Termination::Converged;
            break;
        }
        if !guarantee.expand_dichotomic() {
            trace!(algorithm = name, radius = guarantee.radius(), "refinement failed");
            run.statistics.refinement_success = false;
            run.statistics.termination = Termination::Exhausted;
            break;
        }

        let region = guarantee.region();
        let verdict = run.query(name, oracle, &region)?;
        let positive = match mode {
            OracleMode::Sound => verdict.into_sound_witness(&region)?.is_none(),
            OracleMode::Complete => verdict
                .into_complete_witness(&region, guarantee.domain())?
                .is_none(),
        };
        last = Some(positive);
        trace!(
            algorithm = name,
            radius = guarantee.radius(),
            positive,
            "dichotomic step"
        );

        // A sound region may grow; a complete one may shrink.
        let narrowed = match (mode, positive) {
            (OracleMode::Sound, true) | (OracleMode::Complete, false) => guarantee.up_pivot(),
            (OracleMode::Sound, false) | (OracleMode::Complete, true) => guarantee.down_pivot(),
        };
        if !narrowed {
            break;
        }
        if run.check_timeout() {
            break;
        }
    }
    Ok(last)
}

/// Largest certified radius, found by bisection between `0` and the distance restriction.
pub struct BottomUpDichotomicSearch {
    name: String,
    run: SearchRun,
}

impl BottomUpDichotomicSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self::from_run(SearchRun::system(config))
    }

    pub fn with_clock(config: SearchConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_run(SearchRun::new(config, clock))
    }

    fn from_run(run: SearchRun) -> Self {
        Self {
            name: "cyclic bottom-up dichotomic".to_string(),
            run,
        }
    }
}

impl SearchAlgorithm for BottomUpDichotomicSearch {
    type Input = CyclicGuarantee;
    type Output = CyclicGuarantee;

    fn name(&self) -> &str {
        &self.name
    }

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        mut guarantee: CyclicGuarantee,
    ) -> Result<CyclicGuarantee, OracleError> {
        self.run.begin();
        let last = bisect_radius(
            &mut self.run,
            &self.name,
            oracle,
            &mut guarantee,
            OracleMode::Sound,
        )?;
        self.run.statistics.soundness = last.unwrap_or(false);

        if !self.run.statistics.soundness {
            guarantee.make_sound();
            self.run.statistics.soundness = !self.run.timed_out();
        }
        self.run.finish(&self.name, oracle);
        Ok(guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.run.statistics
    }
}

/// Smallest radius the oracle deems complete, found by bisection.
pub struct CompleteBottomUpDichotomicSearch {
    name: String,
    run: SearchRun,
}

impl CompleteBottomUpDichotomicSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self::from_run(SearchRun::system(config))
    }

    pub fn with_clock(config: SearchConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_run(SearchRun::new(config, clock))
    }

    fn from_run(run: SearchRun) -> Self {
        Self {
            name: "complete cyclic bottom-up dichotomic".to_string(),
            run,
        }
    }
}

impl SearchAlgorithm for CompleteBottomUpDichotomicSearch {
    type Input = CyclicGuarantee;
    type Output = CyclicGuarantee;

    fn name(&self) -> &str {
        &self.name
    }

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        mut guarantee: CyclicGuarantee,
    ) -> Result<CyclicGuarantee, OracleError> {
        self.run.begin();
        let last = bisect_radius(
            &mut self.run,
            &self.name,
            oracle,
            &mut guarantee,
            OracleMode::Complete,
        )?;
        self.run.statistics.completeness = last.unwrap_or(false);

        if !self.run.statistics.completeness {
            guarantee.make_complete();
            self.run.statistics.completeness = !self.run.timed_out();
        }
        self.run.finish(&self.name, oracle);
        Ok(guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.run.statistics
    }
}
