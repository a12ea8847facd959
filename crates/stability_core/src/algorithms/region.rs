use super::{SearchAlgorithm, SearchConfig, SearchRun, SearchStatistics, Termination};
use crate::guarantee::RegionRefinement;
use crate::traits::{Clock, VerificationOracle};
use crate::verification::OracleError;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// Contracts the region from the top until the oracle finds no counterexample.
pub struct TopDownSearch<G> {
    name: String,
    run: SearchRun,
    _guarantee: PhantomData<fn(G) -> G>,
}

impl<G: RegionRefinement> TopDownSearch<G> {
    pub fn new(config: SearchConfig) -> Self {
        Self::from_run(SearchRun::system(config))
    }

    pub fn with_clock(config: SearchConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_run(SearchRun::new(config, clock))
    }

    fn from_run(run: SearchRun) -> Self {
        Self {
            name: "top-down".to_string(),
            run,
            _guarantee: PhantomData,
        }
    }

    /// Renames the search in progress and end reports.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<G: RegionRefinement> SearchAlgorithm for TopDownSearch<G> {
    type Input = G;
    type Output = G;

    fn name(&self) -> &str {
        &self.name
    }

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        mut guarantee: G,
    ) -> Result<G, OracleError> {
        self.run.begin();
        for _ in 0..self.run.max_iterations() {
            let region = guarantee.region();
            let verdict = self.run.query(&self.name, oracle, &region)?;
            let Some(witness) = verdict.into_sound_witness(&region)? else {
                self.run.statistics.soundness = true;
                self.run.statistics.termination = Termination::Converged;
                break;
            };

            if !guarantee.constrain(&witness) {
                trace!(algorithm = %self.name, "constrain exhausted");
                self.run.statistics.refinement_success = false;
                self.run.statistics.termination = Termination::Exhausted;
                break;
            }

            if self.run.check_timeout() {
                break;
            }
        }
        self.run.finish(&self.name, oracle);
        Ok(guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.run.statistics
    }
}

/// Grows the region by `δ` from the bottom until the oracle first rejects it, then steps back.
pub struct BottomUpLinearSearch<G> {
    name: String,
    run: SearchRun,
    _guarantee: PhantomData<fn(G) -> G>,
}

impl<G: RegionRefinement> BottomUpLinearSearch<G> {
    pub fn new(config: SearchConfig) -> Self {
        Self::from_run(SearchRun::system(config))
    }

    pub fn with_clock(config: SearchConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_run(SearchRun::new(config, clock))
    }

    fn from_run(run: SearchRun) -> Self {
        Self {
            name: "bottom-up linear".to_string(),
            run,
            _guarantee: PhantomData,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<G: RegionRefinement> SearchAlgorithm for BottomUpLinearSearch<G> {
    type Input = G;
    type Output = G;

    fn name(&self) -> &str {
        &self.name
    }

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        mut guarantee: G,
    ) -> Result<G, OracleError> {
        self.run.begin();
        for _ in 0..self.run.max_iterations() {
            if !guarantee.expand() {
                self.run.statistics.refinement_success = false;
                self.run.statistics.termination = Termination::Exhausted;
                break;
            }

            let region = guarantee.region();
            let verdict = self.run.query(&self.name, oracle, &region)?;
            if verdict.into_sound_witness(&region)?.is_some() {
                // Every region before this one was confirmed.
                guarantee.revert_expand();
                self.run.statistics.soundness = true;
                self.run.statistics.termination = Termination::Converged;
                break;
            }
            self.run.statistics.soundness = true;

            if self.run.check_timeout() {
                break;
            }
        }
        self.run.finish(&self.name, oracle);
        Ok(guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.run.statistics
    }
}
