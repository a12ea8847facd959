//! Bottom-up searches that move one bound coordinate at a time.
//!
//! Each search makes two passes, first over the upper bounds and then over the lower bounds,
//! visiting coordinates in row-major order. A timeout at any depth ends both passes.

use super::{SearchAlgorithm, SearchConfig, SearchRun, SearchStatistics, Termination};
use crate::geometry::{row_major_indices, Index};
use crate::guarantee::{CoordinateRefinement, Guarantee, ParallelepipedalGuarantee};
use crate::traits::{Clock, VerificationOracle};
use crate::verification::OracleError;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Upper,
    Lower,
}

const PASSES: [Bound; 2] = [Bound::Upper, Bound::Lower];

impl Bound {
    fn expand<G: CoordinateRefinement>(self, guarantee: &mut G, index: Index) -> bool {
        match self {
            Bound::Upper => guarantee.expand_ub(index),
            Bound::Lower => guarantee.expand_lb(index),
        }
    }

    fn revert<G: CoordinateRefinement>(self, guarantee: &mut G, index: Index) {
        match self {
            Bound::Upper => guarantee.revert_expand_ub(index),
            Bound::Lower => guarantee.revert_expand_lb(index),
        }
    }

    fn dichotomic_invariant<G: CoordinateRefinement>(self, guarantee: &G, index: Index) -> bool {
        match self {
            Bound::Upper => guarantee.high_dichotomic_invariant(index),
            Bound::Lower => guarantee.low_dichotomic_invariant(index),
        }
    }

    fn expand_dichotomic<G: CoordinateRefinement>(self, guarantee: &mut G, index: Index) -> bool {
        match self {
            Bound::Upper => guarantee.expand_dichotomic_ub(index),
            Bound::Lower => guarantee.expand_dichotomic_lb(index),
        }
    }

    /// Closes the pivot on the side the verdict rules out.
    fn narrow<G: CoordinateRefinement>(self, guarantee: &mut G, index: Index, sound: bool) -> bool {
        match (self, sound) {
            (Bound::Upper, true) => guarantee.up_high_pivot(index),
            (Bound::Upper, false) => guarantee.down_high_pivot(index),
            (Bound::Lower, true) => guarantee.down_low_pivot(index),
            (Bound::Lower, false) => guarantee.up_low_pivot(index),
        }
    }

    fn settle<G: CoordinateRefinement>(self, guarantee: &mut G, index: Index) {
        match self {
            Bound::Upper => guarantee.make_sound_ub(index),
            Bound::Lower => guarantee.make_sound_lb(index),
        }
    }
}

macro_rules! coordinate_search_constructors {
    ($search:ident, $name:expr) => {
        impl<G: CoordinateRefinement> $search<G> {
            pub fn new(config: SearchConfig) -> Self {
                Self::from_run(SearchRun::system(config))
            }

            pub fn with_clock(config: SearchConfig, clock: Arc<dyn Clock>) -> Self {
                Self::from_run(SearchRun::new(config, clock))
            }

            fn from_run(run: SearchRun) -> Self {
                Self {
                    name: $name.to_string(),
                    run,
                    _guarantee: PhantomData,
                }
            }

            pub fn named(mut self, name: impl Into<String>) -> Self {
                self.name = name.into();
                self
            }
        }
    };
}

/// Greedy per-coordinate expansion: each bound grows by `δ` until the oracle rejects it, which
/// undoes the last step and moves on to the next coordinate.
pub struct BottomUpLinearDfs<G> {
    name: String,
    run: SearchRun,
    _guarantee: PhantomData<fn(G) -> G>,
}

coordinate_search_constructors!(BottomUpLinearDfs, "bottom-up linear DFS");

impl<G: CoordinateRefinement> SearchAlgorithm for BottomUpLinearDfs<G> {
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
        let (rows, cols) = guarantee.shape();
        'passes: for bound in PASSES {
            for index in row_major_indices(rows, cols) {
                for _ in 0..self.run.max_iterations() {
                    let expanded = bound.expand(&mut guarantee, index);
                    self.run.statistics.refinement_success = expanded;
                    if !expanded {
                        break;
                    }

                    let region = guarantee.region();
                    let verdict = self.run.query(&self.name, oracle, &region)?;
                    let rejected = verdict.into_sound_witness(&region)?.is_some();
                    if rejected {
                        bound.revert(&mut guarantee, index);
                    }
                    self.run.statistics.soundness = true;

                    if self.run.check_timeout() || rejected {
                        break;
                    }
                }
                if self.run.timed_out() {
                    break 'passes;
                }
            }
        }
        if !self.run.timed_out() {
            self.run.statistics.termination = Termination::Converged;
        }
        self.run.finish(&self.name, oracle);
        Ok(guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.run.statistics
    }
}

/// Breadth-first per-coordinate expansion.
///
/// Every coordinate is queued once; a confirmed expansion re-queues it at the back, a rejected or
/// impossible one drops it. The iteration budget bounds the number of dequeues per pass.
pub struct BottomUpBfs<G> {
    name: String,
    run: SearchRun,
    _guarantee: PhantomData<fn(G) -> G>,
}

coordinate_search_constructors!(BottomUpBfs, "bottom-up BFS");

impl<G: CoordinateRefinement> SearchAlgorithm for BottomUpBfs<G> {
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
        let (rows, cols) = guarantee.shape();
        for bound in PASSES {
            if self.run.timed_out() {
                break;
            }
            let mut queue: VecDeque<Index> = row_major_indices(rows, cols).collect();
            for _ in 0..self.run.max_iterations() {
                let Some(index) = queue.pop_front() else {
                    break;
                };
                let expanded = bound.expand(&mut guarantee, index);
                self.run.statistics.refinement_success = expanded;
                if !expanded {
                    continue;
                }

                let region = guarantee.region();
                let verdict = self.run.query(&self.name, oracle, &region)?;
                if verdict.into_sound_witness(&region)?.is_some() {
                    bound.revert(&mut guarantee, index);
                } else {
                    queue.push_back(index);
                }
                self.run.statistics.soundness = true;

                if self.run.check_timeout() {
                    break;
                }
            }
        }
        if !self.run.timed_out() {
            self.run.statistics.termination = Termination::Converged;
        }
        self.run.finish(&self.name, oracle);
        Ok(guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.run.statistics
    }
}

/// Binary search for each bound's `δ`-boundary, driven by the dichotomic pivots.
///
/// Once a coordinate converges its bound falls back to the last certified value, so later
/// coordinates are checked against a sound region. If the final verdict was negative the whole
/// region snaps to the certified bracket; after a timeout the result is then reported unsound
/// even though the bracket itself was certified.
pub struct BottomUpDichotomicDfs<G> {
    name: String,
    run: SearchRun,
    _guarantee: PhantomData<fn(G) -> G>,
}

coordinate_search_constructors!(BottomUpDichotomicDfs, "bottom-up dichotomic DFS");

impl<G: CoordinateRefinement> SearchAlgorithm for BottomUpDichotomicDfs<G> {
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
        let (rows, cols) = guarantee.shape();
        'passes: for bound in PASSES {
            for index in row_major_indices(rows, cols) {
                for _ in 0..self.run.max_iterations() {
                    if !bound.dichotomic_invariant(&guarantee, index) {
                        trace!(algorithm = %self.name, ?bound, ?index, "pivot converged");
                        break;
                    }
                    let expanded = bound.expand_dichotomic(&mut guarantee, index);
                    self.run.statistics.refinement_success = expanded;
                    if !expanded {
                        trace!(algorithm = %self.name, ?bound, ?index, "refinement failed");
                        break;
                    }

                    let region = guarantee.region();
                    let verdict = self.run.query(&self.name, oracle, &region)?;
                    let sound = verdict.into_sound_witness(&region)?.is_none();
                    self.run.statistics.soundness = sound;
                    trace!(algorithm = %self.name, ?bound, ?index, sound, "dichotomic step");

                    if !bound.narrow(&mut guarantee, index, sound) {
                        break;
                    }
                    if self.run.check_timeout() {
                        break;
                    }
                }
                if self.run.timed_out() {
                    break 'passes;
                }
                bound.settle(&mut guarantee, index);
            }
        }

        if !self.run.statistics.soundness {
            guarantee.make_sound();
            self.run.statistics.soundness = !self.run.timed_out();
        }
        if !self.run.timed_out() {
            self.run.statistics.termination = Termination::Converged;
        }
        self.run.finish(&self.name, oracle);
        Ok(guarantee)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.run.statistics
    }
}

/// Grows a box from `{x*}` around the oracle's same-class witnesses until the oracle deems it
/// complete.
pub struct CompleteBottomUpSearch {
    name: String,
    run: SearchRun,
}

impl CompleteBottomUpSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self::from_run(SearchRun::system(config))
    }

    pub fn with_clock(config: SearchConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_run(SearchRun::new(config, clock))
    }

    fn from_run(run: SearchRun) -> Self {
        Self {
            name: "complete bottom-up".to_string(),
            run,
        }
    }
}

impl SearchAlgorithm for CompleteBottomUpSearch {
    type Input = ParallelepipedalGuarantee;
    type Output = ParallelepipedalGuarantee;

    fn name(&self) -> &str {
        &self.name
    }

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        mut guarantee: ParallelepipedalGuarantee,
    ) -> Result<ParallelepipedalGuarantee, OracleError> {
        self.run.begin();
        for _ in 0..self.run.max_iterations() {
            let region = guarantee.region();
            let verdict = self.run.query(&self.name, oracle, &region)?;
            let Some(witness) = verdict.into_complete_witness(&region, guarantee.domain())? else {
                self.run.statistics.completeness = true;
                self.run.statistics.termination = Termination::Converged;
                break;
            };

            if !guarantee.generalize(&witness) {
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
