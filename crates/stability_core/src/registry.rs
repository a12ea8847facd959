use crate::algorithms::{
    BottomUpBfs, BottomUpDichotomicDfs, BottomUpDichotomicSearch, BottomUpLinearDfs,
    BottomUpLinearSearch, CompleteBottomUpDichotomicSearch, CompleteBottomUpSearch, Composition,
    SearchAlgorithm, SearchConfig, SearchStatistics, TopDownSearch,
};
use crate::geometry::row_major_indices;
use crate::guarantee::{
    AnyGuarantee, CyclicGuarantee, Guarantee, GuaranteeError, GuaranteeParams,
    ParallelepipedalGuarantee,
};
use crate::traits::{Clock, VerificationOracle};
use crate::verification::{OracleError, OracleStatistics};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Every supported search, numbered as in result files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    BottomUpLinearDfs,
    BottomUpDichotomicDfs,
    BottomUpBfs,
    TopDown,
    CyclicBottomUpLinear,
    CyclicBottomUpDichotomic,
    CyclicTopDown,
    TopDownThenLinearDfs,
    TopDownThenDichotomicDfs,
    TopDownThenBfs,
    CyclicLinearThenLinearDfs,
    CyclicLinearThenDichotomicDfs,
    CyclicLinearThenBfs,
    CyclicDichotomicThenLinearDfs,
    CyclicDichotomicThenDichotomicDfs,
    CyclicDichotomicThenBfs,
    CyclicTopDownThenLinearDfs,
    CyclicTopDownThenDichotomicDfs,
    CyclicTopDownThenBfs,
    CompleteBottomUp,
    CompleteCyclicBottomUpDichotomic,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown strategy `{0}`")]
pub struct UnknownStrategy(pub String);

/// Builds a ready-to-run search for one strategy.
pub type Factory = fn(
    &GuaranteeParams,
    &SearchConfig,
    Arc<dyn Clock>,
) -> Result<PreparedSearch, GuaranteeError>;

#[derive(Debug, Clone, Copy)]
enum CoordinatePhase {
    LinearDfs,
    DichotomicDfs,
    Bfs,
}

#[derive(Debug, Clone, Copy)]
enum RadiusPhase {
    Linear,
    Dichotomic,
    TopDown,
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    Coordinate(CoordinatePhase),
    TopDown,
    Radius(RadiusPhase),
    TopDownThen(CoordinatePhase),
    RadiusThen(RadiusPhase, CoordinatePhase),
    Complete,
    CompleteRadius,
}

impl Strategy {
    /// All strategies, indexed by id.
    pub const ALL: [Strategy; 21] = [
        Strategy::BottomUpLinearDfs,
        Strategy::BottomUpDichotomicDfs,
        Strategy::BottomUpBfs,
        Strategy::TopDown,
        Strategy::CyclicBottomUpLinear,
        Strategy::CyclicBottomUpDichotomic,
        Strategy::CyclicTopDown,
        Strategy::TopDownThenLinearDfs,
        Strategy::TopDownThenDichotomicDfs,
        Strategy::TopDownThenBfs,
        Strategy::CyclicLinearThenLinearDfs,
        Strategy::CyclicLinearThenDichotomicDfs,
        Strategy::CyclicLinearThenBfs,
        Strategy::CyclicDichotomicThenLinearDfs,
        Strategy::CyclicDichotomicThenDichotomicDfs,
        Strategy::CyclicDichotomicThenBfs,
        Strategy::CyclicTopDownThenLinearDfs,
        Strategy::CyclicTopDownThenDichotomicDfs,
        Strategy::CyclicTopDownThenBfs,
        Strategy::CompleteBottomUp,
        Strategy::CompleteCyclicBottomUpDichotomic,
    ];

    pub fn id(self) -> usize {
        self as usize
    }

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Strategy::BottomUpLinearDfs => "bu-l-dfs",
            Strategy::BottomUpDichotomicDfs => "bu-d-dfs",
            Strategy::BottomUpBfs => "bu-bfs",
            Strategy::TopDown => "td",
            Strategy::CyclicBottomUpLinear => "cbu-l",
            Strategy::CyclicBottomUpDichotomic => "cbu-d",
            Strategy::CyclicTopDown => "ctd",
            Strategy::TopDownThenLinearDfs => "td+bu-l-dfs",
            Strategy::TopDownThenDichotomicDfs => "td+bu-d-dfs",
            Strategy::TopDownThenBfs => "td+bu-bfs",
            Strategy::CyclicLinearThenLinearDfs => "cbu-l+bu-l-dfs",
            Strategy::CyclicLinearThenDichotomicDfs => "cbu-l+bu-d-dfs",
            Strategy::CyclicLinearThenBfs => "cbu-l+bu-bfs",
            Strategy::CyclicDichotomicThenLinearDfs => "cbu-d+bu-l-dfs",
            Strategy::CyclicDichotomicThenDichotomicDfs => "cbu-d+bu-d-dfs",
            Strategy::CyclicDichotomicThenBfs => "cbu-d+bu-bfs",
            Strategy::CyclicTopDownThenLinearDfs => "ctd+bu-l-dfs",
            Strategy::CyclicTopDownThenDichotomicDfs => "ctd+bu-d-dfs",
            Strategy::CyclicTopDownThenBfs => "ctd+bu-bfs",
            Strategy::CompleteBottomUp => "complete-bu",
            Strategy::CompleteCyclicBottomUpDichotomic => "complete-cbu-d",
        }
    }

    /// Complete strategies over-approximate instead of under-approximating.
    pub fn is_complete(self) -> bool {
        matches!(self.layout(), Layout::Complete | Layout::CompleteRadius)
    }

    /// Whether the strategy starts from a cyclic guarantee and thus needs a distance restriction.
    pub fn is_cyclic(self) -> bool {
        matches!(
            self.layout(),
            Layout::Radius(_) | Layout::RadiusThen(..) | Layout::CompleteRadius
        )
    }

    fn layout(self) -> Layout {
        use CoordinatePhase::{Bfs, DichotomicDfs, LinearDfs};
        use RadiusPhase::{Dichotomic, Linear, TopDown};
        match self {
            Strategy::BottomUpLinearDfs => Layout::Coordinate(LinearDfs),
            Strategy::BottomUpDichotomicDfs => Layout::Coordinate(DichotomicDfs),
            Strategy::BottomUpBfs => Layout::Coordinate(Bfs),
            Strategy::TopDown => Layout::TopDown,
            Strategy::CyclicBottomUpLinear => Layout::Radius(Linear),
            Strategy::CyclicBottomUpDichotomic => Layout::Radius(Dichotomic),
            Strategy::CyclicTopDown => Layout::Radius(TopDown),
            Strategy::TopDownThenLinearDfs => Layout::TopDownThen(LinearDfs),
            Strategy::TopDownThenDichotomicDfs => Layout::TopDownThen(DichotomicDfs),
            Strategy::TopDownThenBfs => Layout::TopDownThen(Bfs),
            Strategy::CyclicLinearThenLinearDfs => Layout::RadiusThen(Linear, LinearDfs),
            Strategy::CyclicLinearThenDichotomicDfs => Layout::RadiusThen(Linear, DichotomicDfs),
            Strategy::CyclicLinearThenBfs => Layout::RadiusThen(Linear, Bfs),
            Strategy::CyclicDichotomicThenLinearDfs => Layout::RadiusThen(Dichotomic, LinearDfs),
            Strategy::CyclicDichotomicThenDichotomicDfs => {
                Layout::RadiusThen(Dichotomic, DichotomicDfs)
            }
            Strategy::CyclicDichotomicThenBfs => Layout::RadiusThen(Dichotomic, Bfs),
            Strategy::CyclicTopDownThenLinearDfs => Layout::RadiusThen(TopDown, LinearDfs),
            Strategy::CyclicTopDownThenDichotomicDfs => Layout::RadiusThen(TopDown, DichotomicDfs),
            Strategy::CyclicTopDownThenBfs => Layout::RadiusThen(TopDown, Bfs),
            Strategy::CompleteBottomUp => Layout::Complete,
            Strategy::CompleteCyclicBottomUpDichotomic => Layout::CompleteRadius,
        }
    }

    /// Builds the starting guarantee and its search.
    pub fn prepare(
        self,
        params: &GuaranteeParams,
        config: &SearchConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<PreparedSearch, GuaranteeError> {
        let config = *config;
        let plan = match self.layout() {
            Layout::Coordinate(phase) => Plan::Parallel {
                guarantee: ParallelepipedalGuarantee::bottom(params)?,
                search: coordinate_search(phase, config, clock),
            },
            Layout::TopDown => Plan::Parallel {
                guarantee: ParallelepipedalGuarantee::top(params)?,
                search: Box::new(TopDownSearch::<ParallelepipedalGuarantee>::with_clock(
                    config, clock,
                )),
            },
            Layout::Radius(phase) => Plan::Cyclic {
                guarantee: radius_start(phase, params)?,
                search: radius_search(phase, config, clock),
            },
            Layout::TopDownThen(phase) => Plan::Parallel {
                guarantee: ParallelepipedalGuarantee::top(params)?,
                search: Box::new(Composition::parallel(
                    Box::new(TopDownSearch::<ParallelepipedalGuarantee>::with_clock(
                        config,
                        clock.clone(),
                    )) as ParallelSearch,
                    coordinate_search(phase, second_phase_config(params, &config), clock),
                )),
            },
            Layout::RadiusThen(first, second) => Plan::Converting {
                guarantee: radius_start(first, params)?,
                search: Box::new(Composition::cyclic_parallel(
                    radius_search(first, config, clock.clone()),
                    coordinate_search(second, second_phase_config(params, &config), clock),
                )),
            },
            Layout::Complete => Plan::Parallel {
                guarantee: ParallelepipedalGuarantee::bottom(params)?,
                search: Box::new(CompleteBottomUpSearch::with_clock(config, clock)),
            },
            Layout::CompleteRadius => Plan::Cyclic {
                guarantee: CyclicGuarantee::bottom(params)?,
                search: Box::new(CompleteBottomUpDichotomicSearch::with_clock(config, clock)),
            },
        };
        Ok(PreparedSearch {
            strategy: self,
            plan,
        })
    }
}

macro_rules! strategy_factories {
    ($($variant:ident),* $(,)?) => {
        impl Strategy {
            /// The strategy's constructor as a plain function pointer.
            pub fn factory(self) -> Factory {
                match self {
                    $(Strategy::$variant => |params, config, clock| {
                        Strategy::$variant.prepare(params, config, clock)
                    },)*
                }
            }
        }
    };
}

strategy_factories!(
    BottomUpLinearDfs,
    BottomUpDichotomicDfs,
    BottomUpBfs,
    TopDown,
    CyclicBottomUpLinear,
    CyclicBottomUpDichotomic,
    CyclicTopDown,
    TopDownThenLinearDfs,
    TopDownThenDichotomicDfs,
    TopDownThenBfs,
    CyclicLinearThenLinearDfs,
    CyclicLinearThenDichotomicDfs,
    CyclicLinearThenBfs,
    CyclicDichotomicThenLinearDfs,
    CyclicDichotomicThenDichotomicDfs,
    CyclicDichotomicThenBfs,
    CyclicTopDownThenLinearDfs,
    CyclicTopDownThenDichotomicDfs,
    CyclicTopDownThenBfs,
    CompleteBottomUp,
    CompleteCyclicBottomUpDichotomic,
);

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    /// Accepts a short name or a numeric id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<usize>() {
            return Strategy::from_id(id).ok_or_else(|| UnknownStrategy(s.to_string()));
        }
        Strategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.short_name() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

type ParallelSearch =
    Box<dyn SearchAlgorithm<Input = ParallelepipedalGuarantee, Output = ParallelepipedalGuarantee>>;
type CyclicSearch = Box<dyn SearchAlgorithm<Input = CyclicGuarantee, Output = CyclicGuarantee>>;
type ConvertingSearch =
    Box<dyn SearchAlgorithm<Input = CyclicGuarantee, Output = ParallelepipedalGuarantee>>;

fn coordinate_search(
    phase: CoordinatePhase,
    config: SearchConfig,
    clock: Arc<dyn Clock>,
) -> ParallelSearch {
    match phase {
        CoordinatePhase::LinearDfs => {
            Box::new(BottomUpLinearDfs::<ParallelepipedalGuarantee>::with_clock(config, clock))
        }
        CoordinatePhase::DichotomicDfs => {
            Box::new(BottomUpDichotomicDfs::<ParallelepipedalGuarantee>::with_clock(config, clock))
        }
        CoordinatePhase::Bfs => {
            Box::new(BottomUpBfs::<ParallelepipedalGuarantee>::with_clock(config, clock))
        }
    }
}

fn radius_start(
    phase: RadiusPhase,
    params: &GuaranteeParams,
) -> Result<CyclicGuarantee, GuaranteeError> {
    match phase {
        RadiusPhase::TopDown => CyclicGuarantee::top(params),
        RadiusPhase::Linear | RadiusPhase::Dichotomic => CyclicGuarantee::bottom(params),
    }
}

fn radius_search(phase: RadiusPhase, config: SearchConfig, clock: Arc<dyn Clock>) -> CyclicSearch {
    match phase {
        RadiusPhase::Linear => {
            Box::new(BottomUpLinearSearch::<CyclicGuarantee>::with_clock(config, clock))
        }
        RadiusPhase::Dichotomic => Box::new(BottomUpDichotomicSearch::with_clock(config, clock)),
        RadiusPhase::TopDown => {
            Box::new(TopDownSearch::<CyclicGuarantee>::with_clock(config, clock))
        }
    }
}

/// Per-coordinate follow-up phases get one step of `δ` per unit of reach.
pub(crate) fn second_phase_config(params: &GuaranteeParams, config: &SearchConfig) -> SearchConfig {
    SearchConfig {
        max_iterations: (params.reach() / params.delta).floor() as usize,
        ..*config
    }
}

enum Plan {
    Parallel {
        guarantee: ParallelepipedalGuarantee,
        search: ParallelSearch,
    },
    Cyclic {
        guarantee: CyclicGuarantee,
        search: CyclicSearch,
    },
    Converting {
        guarantee: CyclicGuarantee,
        search: ConvertingSearch,
    },
}

/// A strategy bound to its starting guarantee.
pub struct PreparedSearch {
    strategy: Strategy,
    plan: Plan,
}

impl PreparedSearch {
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The guarantee the search will start from.
    pub fn initial_guarantee(&self) -> AnyGuarantee {
        match &self.plan {
            Plan::Parallel { guarantee, .. } => guarantee.clone().into(),
            Plan::Cyclic { guarantee, .. } | Plan::Converting { guarantee, .. } => {
                guarantee.clone().into()
            }
        }
    }

    /// Overrides the starting bounds. Only strategies starting from a parallelepiped accept this.
    pub fn set_bounds(
        &mut self,
        lb: Option<DMatrix<f64>>,
        ub: Option<DMatrix<f64>>,
    ) -> Result<(), GuaranteeError> {
        match &mut self.plan {
            Plan::Parallel { guarantee, .. } => guarantee.set_bounds(lb, ub),
            Plan::Cyclic { .. } | Plan::Converting { .. } => {
                Err(GuaranteeError::NotParallelepipedal)
            }
        }
    }

    /// Runs the search from the starting guarantee. Running again starts over.
    pub fn run(
        &mut self,
        oracle: &mut dyn VerificationOracle,
    ) -> Result<SearchReport, OracleError> {
        info!(strategy = %self.strategy, "starting search");
        let (guarantee, statistics) = match &mut self.plan {
            Plan::Parallel { guarantee, search } => {
                let result = search.search(oracle, guarantee.clone())?;
                (AnyGuarantee::from(result), *search.statistics())
            }
            Plan::Cyclic { guarantee, search } => {
                let result = search.search(oracle, guarantee.clone())?;
                (AnyGuarantee::from(result), *search.statistics())
            }
            Plan::Converting { guarantee, search } => {
                let result = search.search(oracle, guarantee.clone())?;
                (AnyGuarantee::from(result), *search.statistics())
            }
        };
        Ok(SearchReport {
            strategy: self.strategy,
            guarantee,
            statistics,
            oracle: oracle.statistics(),
        })
    }
}

/// Outcome of one [`PreparedSearch::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub strategy: Strategy,
    pub guarantee: AnyGuarantee,
    pub statistics: SearchStatistics,
    pub oracle: OracleStatistics,
}

/// Flat, serializable digest of a [`SearchReport`]. Bounds are row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub strategy: String,
    pub rows: usize,
    pub cols: usize,
    pub lb: Vec<f64>,
    pub ub: Vec<f64>,
    pub soundness: bool,
    pub completeness: bool,
    pub timed_out: bool,
    pub iterations: usize,
    pub total_time: f64,
    pub complexity: usize,
    pub min_edge_length: f64,
    pub oracle_calls: usize,
    pub oracle_time: f64,
}

impl SearchReport {
    pub fn summary(&self) -> SearchSummary {
        let region = self.guarantee.region();
        let (rows, cols) = region.shape();
        let flatten = |m: &DMatrix<f64>| -> Vec<f64> {
            row_major_indices(rows, cols).map(|index| m[index]).collect()
        };
        SearchSummary {
            strategy: self.strategy.to_string(),
            rows,
            cols,
            lb: flatten(region.lb()),
            ub: flatten(region.ub()),
            soundness: self.statistics.soundness,
            completeness: self.statistics.completeness,
            timed_out: self.statistics.timed_out,
            iterations: self.statistics.iterations,
            total_time: self.statistics.total_time,
            complexity: self.guarantee.complexity(),
            min_edge_length: self.guarantee.min_edge_length(),
            oracle_calls: self.oracle.num_calls,
            oracle_time: self.oracle.total_time,
        }
    }
}
