//! Two searches run back to back, the first one's result seeding the second.
//!
//! Composing two bottom-up searches is redundant, and running bottom-up before top-down is not
//! meaningful; neither is prevented.

use super::{end_report, SearchAlgorithm, SearchStatistics};
use crate::guarantee::{
    cyclic_to_parallelepipedal, CoordinateRefinement, CyclicGuarantee, ParallelepipedalGuarantee,
};
use crate::traits::VerificationOracle;
use crate::verification::OracleError;

pub struct Composition<A: SearchAlgorithm, B: SearchAlgorithm> {
    name: String,
    first: A,
    second: B,
    handoff: fn(A::Output) -> B::Input,
    statistics: SearchStatistics,
}

impl<A: SearchAlgorithm, B: SearchAlgorithm> Composition<A, B> {
    /// Chains `first` and `second`, passing the intermediate guarantee through `handoff`.
    pub fn new(first: A, second: B, handoff: fn(A::Output) -> B::Input) -> Self {
        Self {
            name: format!("{} + {}", first.name(), second.name()),
            first,
            second,
            handoff,
            statistics: SearchStatistics::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }
}

fn resync_pivots(mut guarantee: ParallelepipedalGuarantee) -> ParallelepipedalGuarantee {
    guarantee.update_pivots();
    guarantee
}

fn convert_and_resync(guarantee: CyclicGuarantee) -> ParallelepipedalGuarantee {
    resync_pivots(cyclic_to_parallelepipedal(&guarantee))
}

impl<A, B> Composition<A, B>
where
    A: SearchAlgorithm<Output = ParallelepipedalGuarantee>,
    B: SearchAlgorithm<Input = ParallelepipedalGuarantee>,
{
    /// Parallelepiped to parallelepiped. The dichotomic pivots are rebuilt around the bounds the
    /// first phase left behind.
    pub fn parallel(first: A, second: B) -> Self {
        Self::new(first, second, resync_pivots)
    }
}

impl<A, B> Composition<A, B>
where
    A: SearchAlgorithm<Output = CyclicGuarantee>,
    B: SearchAlgorithm<Input = CyclicGuarantee>,
{
    pub fn cyclic(first: A, second: B) -> Self {
        Self::new(first, second, std::convert::identity)
    }
}

impl<A, B> Composition<A, B>
where
    A: SearchAlgorithm<Output = CyclicGuarantee>,
    B: SearchAlgorithm<Input = ParallelepipedalGuarantee>,
{
    /// Ball to box: the second phase starts from the materialized cyclic region.
    pub fn cyclic_parallel(first: A, second: B) -> Self {
        Self::new(first, second, convert_and_resync)
    }
}

impl<A: SearchAlgorithm, B: SearchAlgorithm> SearchAlgorithm for Composition<A, B> {
    type Input = A::Input;
    type Output = B::Output;

    fn name(&self) -> &str {
        &self.name
    }

    fn search(
        &mut self,
        oracle: &mut dyn VerificationOracle,
        guarantee: A::Input,
    ) -> Result<B::Output, OracleError> {
        self.statistics = SearchStatistics::default();
        let intermediate = self.first.search(oracle, guarantee)?;
        let result = self.second.search(oracle, (self.handoff)(intermediate))?;

        let first = self.first.statistics();
        let second = self.second.statistics();
        self.statistics = SearchStatistics {
            soundness: first.soundness && second.soundness,
            completeness: first.completeness && second.completeness,
            iterations: first.iterations + second.iterations,
            refinement_success: second.refinement_success,
            timed_out: first.timed_out || second.timed_out,
            total_time: first.total_time + second.total_time,
            termination: second.termination,
        };
        end_report(&self.name, &self.statistics, &oracle.statistics());
        Ok(result)
    }

    fn statistics(&self) -> &SearchStatistics {
        &self.statistics
    }
}
