mod conversion;
mod cyclic;
mod parallelepipedal;

pub use conversion::cyclic_to_parallelepipedal;
pub use cyclic::{CyclicGuarantee, RadiusPivot};
pub use parallelepipedal::ParallelepipedalGuarantee;

use crate::geometry::{check_shape, GeometryError, Index, InfCircle, Interval};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed guarantee parameters or externally imposed bounds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuaranteeError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("delta must be positive, got {0}")]
    NonPositiveDelta(f64),
    #[error("distance restriction {restriction} is smaller than delta {delta}")]
    RestrictionBelowDelta { restriction: f64, delta: f64 },
    #[error("cyclic guarantees require a distance restriction")]
    MissingDistanceRestriction,
    #[error("x* lies outside the domain")]
    AnchorOutsideDomain,
    #[error("lower bound exceeds x* at {index:?}")]
    LowerBoundAboveAnchor { index: Index },
    #[error("upper bound is below x* at {index:?}")]
    UpperBoundBelowAnchor { index: Index },
    #[error("bound leaves the domain at {index:?}")]
    BoundOutsideDomain { index: Index },
    #[error("explicit bounds are only supported for parallelepipedal guarantees")]
    NotParallelepipedal,
}

/// Everything needed to construct a guarantee around `x*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuaranteeParams {
    pub x_star: DMatrix<f64>,
    pub c_star: usize,
    pub delta: f64,
    /// Valid input range of the classifier.
    pub domain: Interval,
    /// Upper bound on how far the region may extend from `x*` (L∞).
    #[serde(default)]
    pub distance_restriction: Option<f64>,
}

impl GuaranteeParams {
    pub fn new(x_star: DMatrix<f64>, c_star: usize, delta: f64, domain: Interval) -> Self {
        Self {
            x_star,
            c_star,
            delta,
            domain,
            distance_restriction: None,
        }
    }

    pub fn with_distance_restriction(mut self, radius: f64) -> Self {
        self.distance_restriction = Some(radius);
        self
    }

    pub fn validate(&self) -> Result<(), GuaranteeError> {
        check_shape(self.domain.shape(), &self.x_star)?;
        if !(self.delta > 0.0) {
            return Err(GuaranteeError::NonPositiveDelta(self.delta));
        }
        if let Some(restriction) = self.distance_restriction {
            if !restriction.is_finite() || restriction < 0.0 {
                return Err(GeometryError::InvalidRadius(restriction).into());
            }
            if restriction < self.delta {
                return Err(GuaranteeError::RestrictionBelowDelta {
                    restriction,
                    delta: self.delta,
                });
            }
        }
        let inside = self
            .x_star
            .iter()
            .zip(self.domain.lb().iter().zip(self.domain.ub().iter()))
            .all(|(x, (l, u))| l <= x && x <= u);
        if !inside {
            return Err(GuaranteeError::AnchorOutsideDomain);
        }
        Ok(())
    }

    /// The domain intersected with the distance restriction around `x*`, if any.
    pub(crate) fn bounding_domain(&self) -> Interval {
        let mut domain = self.domain.clone();
        if let Some(restriction) = self.distance_restriction {
            let ball = InfCircle::new(self.x_star.clone(), restriction)
                .map(|circle| circle.to_interval())
                .unwrap_or_else(|_| Interval::from_point(&self.x_star));
            domain.intersect(&ball);
        }
        domain
    }

    /// Widest radius the region can reach: the distance restriction, or the domain's diameter.
    pub fn reach(&self) -> f64 {
        self.distance_restriction
            .unwrap_or_else(|| self.domain.diameter())
    }
}

/// Shared view of a guarantee.
pub trait Guarantee {
    fn x_star(&self) -> &DMatrix<f64>;

    fn c_star(&self) -> usize;

    fn delta(&self) -> f64;

    /// The bounding domain, fixed for the guarantee's lifetime.
    fn domain(&self) -> &Interval;

    /// The region handed to the oracle.
    fn region(&self) -> Interval;

    /// Number of bound coordinates that moved away from `x*`.
    fn complexity(&self) -> usize {
        let region = self.region();
        let x_star = self.x_star();
        let below = region.lb().iter().zip(x_star.iter()).filter(|(l, x)| l < x).count();
        let above = region.ub().iter().zip(x_star.iter()).filter(|(u, x)| u > x).count();
        below + above
    }

    fn min_edge_length(&self) -> f64 {
        self.region().min_edge_length()
    }
}

/// Refinement of the region as a whole.
pub trait RegionRefinement: Guarantee {
    /// Excludes a counterexample lying inside the region. `false` once no further
    /// contraction is possible at this precision.
    fn constrain(&mut self, witness: &DMatrix<f64>) -> bool;

    /// Grows the region by `δ`. `false`, without mutating, if the domain would be exceeded.
    fn expand(&mut self) -> bool;

    /// Undoes the last successful `expand`. Rounding in the inverse step never carries the
    /// region past the one the expansion started from.
    fn revert_expand(&mut self);
}

/// Refinement of one bound coordinate at a time. Only parallelepipedal guarantees have
/// per-coordinate bounds.
pub trait CoordinateRefinement: Guarantee {
    fn shape(&self) -> (usize, usize) {
        self.x_star().shape()
    }

    fn expand_ub(&mut self, index: Index) -> bool;
    fn expand_lb(&mut self, index: Index) -> bool;
    fn revert_expand_ub(&mut self, index: Index);
    fn revert_expand_lb(&mut self, index: Index);

    fn expand_dichotomic_ub(&mut self, index: Index) -> bool;
    fn expand_dichotomic_lb(&mut self, index: Index) -> bool;
    fn up_high_pivot(&mut self, index: Index) -> bool;
    fn down_high_pivot(&mut self, index: Index) -> bool;
    fn up_low_pivot(&mut self, index: Index) -> bool;
    fn down_low_pivot(&mut self, index: Index) -> bool;
    fn high_dichotomic_invariant(&self, index: Index) -> bool;
    fn low_dichotomic_invariant(&self, index: Index) -> bool;

    /// Snaps one upper bound back to its last certified value.
    fn make_sound_ub(&mut self, index: Index);
    /// Snaps one lower bound back to its last certified value.
    fn make_sound_lb(&mut self, index: Index);
    /// Snaps the whole region back to the last certified bracket.
    fn make_sound(&mut self);
    /// Resynchronizes the dichotomic pivots with the current bounds.
    fn update_pivots(&mut self);
}

/// Either guarantee representation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyGuarantee {
    Parallelepipedal(ParallelepipedalGuarantee),
    Cyclic(CyclicGuarantee),
}

impl From<ParallelepipedalGuarantee> for AnyGuarantee {
    fn from(value: ParallelepipedalGuarantee) -> Self {
        AnyGuarantee::Parallelepipedal(value)
    }
}

impl From<CyclicGuarantee> for AnyGuarantee {
    fn from(value: CyclicGuarantee) -> Self {
        AnyGuarantee::Cyclic(value)
    }
}

impl AnyGuarantee {
    fn inner(&self) -> &dyn Guarantee {
        match self {
            AnyGuarantee::Parallelepipedal(g) => g,
            AnyGuarantee::Cyclic(g) => g,
        }
    }
}

impl Guarantee for AnyGuarantee {
    fn x_star(&self) -> &DMatrix<f64> {
        self.inner().x_star()
    }

    fn c_star(&self) -> usize {
        self.inner().c_star()
    }

    fn delta(&self) -> f64 {
        self.inner().delta()
    }

    fn domain(&self) -> &Interval {
        self.inner().domain()
    }

    fn region(&self) -> Interval {
        self.inner().region()
    }
}
