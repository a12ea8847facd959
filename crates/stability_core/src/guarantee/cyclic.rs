use super::{Guarantee, GuaranteeError, GuaranteeParams, RegionRefinement};
use crate::geometry::{inf_norm, InfCircle, Interval};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Binary-search bracket on the radius. `lb` is the last radius certified by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusPivot {
    pub lb: f64,
    pub ub: f64,
}

impl RadiusPivot {
    pub fn width(&self) -> f64 {
        self.ub - self.lb
    }

    pub fn midpoint(&self) -> f64 {
        self.lb + 0.5 * self.width()
    }
}

/// The L∞ ball `[x* − r, x* + r] ∩ domain`, refined through its radius alone.
///
/// Invariant: `0 <= r <= distance_restriction` and `0 <= pivot.lb <= pivot.ub <= distance_restriction`.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicGuarantee {
    circle: InfCircle,
    c_star: usize,
    delta: f64,
    distance_restriction: f64,
    domain: Interval,
    pivot: RadiusPivot,
    /// Radius the last successful `expand` started from.
    expansion_origin: f64,
}

impl CyclicGuarantee {
    /// Radius at the distance restriction.
    pub fn top(params: &GuaranteeParams) -> Result<Self, GuaranteeError> {
        let restriction = params
            .distance_restriction
            .ok_or(GuaranteeError::MissingDistanceRestriction)?;
        Self::with_radius(params, restriction)
    }

    /// Radius zero.
    pub fn bottom(params: &GuaranteeParams) -> Result<Self, GuaranteeError> {
        Self::with_radius(params, 0.0)
    }

    fn with_radius(params: &GuaranteeParams, radius: f64) -> Result<Self, GuaranteeError> {
        params.validate()?;
        let restriction = params
            .distance_restriction
            .ok_or(GuaranteeError::MissingDistanceRestriction)?;
        Ok(Self {
            circle: InfCircle::new(params.x_star.clone(), radius)?,
            c_star: params.c_star,
            delta: params.delta,
            distance_restriction: restriction,
            domain: params.bounding_domain(),
            pivot: RadiusPivot {
                lb: 0.0,
                ub: restriction,
            },
            expansion_origin: radius,
        })
    }

    pub fn radius(&self) -> f64 {
        self.circle.radius()
    }

    pub fn circle(&self) -> &InfCircle {
        &self.circle
    }

    pub fn distance_restriction(&self) -> f64 {
        self.distance_restriction
    }

    pub fn pivot(&self) -> RadiusPivot {
        self.pivot
    }

    /// Moves the radius to the middle of the pivot.
    ///
    /// Fails while the current radius is within `δ` of the distance restriction.
    pub fn expand_dichotomic(&mut self) -> bool {
        if self.radius() + self.delta >= self.distance_restriction {
            return false;
        }
        self.circle.set_radius(self.pivot.midpoint());
        true
    }

    /// Raises the pivot's lower end to the radius (last verdict: sound).
    pub fn up_pivot(&mut self) -> bool {
        let radius = self.radius();
        if radius > self.pivot.ub {
            return false;
        }
        self.pivot.lb = radius;
        true
    }

    /// Lowers the pivot's upper end to the radius (last verdict: unsound).
    pub fn down_pivot(&mut self) -> bool {
        let radius = self.radius();
        if radius < self.pivot.lb {
            return false;
        }
        self.pivot.ub = radius;
        true
    }

    pub fn dichotomic_invariant(&self) -> bool {
        self.pivot.width() >= self.delta
    }

    pub fn make_sound(&mut self) {
        self.circle.set_radius(self.pivot.lb);
    }

    pub fn make_complete(&mut self) {
        self.circle.set_radius(self.pivot.ub);
    }

    /// Shortest edge of the materialized box.
    pub fn max_inf_radius(&self) -> f64 {
        self.region().min_edge_length()
    }
}

impl Guarantee for CyclicGuarantee {
    fn x_star(&self) -> &DMatrix<f64> {
        self.circle.center()
    }

    fn c_star(&self) -> usize {
        self.c_star
    }

    fn delta(&self) -> f64 {
        self.delta
    }

    fn domain(&self) -> &Interval {
        &self.domain
    }

    fn region(&self) -> Interval {
        self.circle.to_interval_within(&self.domain)
    }
}

impl RegionRefinement for CyclicGuarantee {
    fn constrain(&mut self, witness: &DMatrix<f64>) -> bool {
        let radius = inf_norm(&(witness - self.circle.center())) - self.delta;
        if radius <= 0.0 {
            return false;
        }
        assert!(
            radius < self.radius(),
            "constrain did not shrink the guarantee"
        );
        self.circle.set_radius(radius);
        true
    }

    fn expand(&mut self) -> bool {
        let current = self.radius();
        let radius = current + self.delta;
        if radius >= self.distance_restriction {
            return false;
        }
        self.expansion_origin = current;
        self.circle.set_radius(radius);
        true
    }

    fn revert_expand(&mut self) {
        let radius = (self.radius() - self.delta)
            .min(self.expansion_origin)
            .max(0.0);
        self.circle.set_radius(radius);
    }
}

#[cfg(test)]
mod tests {
    use super::CyclicGuarantee;
    use crate::geometry::Interval;
    use crate::guarantee::{Guarantee, GuaranteeError, GuaranteeParams, RegionRefinement};
    use nalgebra::DMatrix;
    use proptest::prelude::*;

    fn row(values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_row_slice(1, values.len(), values)
    }

    fn params(restriction: f64) -> GuaranteeParams {
        GuaranteeParams::new(
            row(&[0.2, 0.5]),
            1,
            0.1,
            Interval::uniform(1, 2, 0.0, 1.0).unwrap(),
        )
        .with_distance_restriction(restriction)
    }

    #[test]
    fn construction_requires_a_distance_restriction() {
        let mut unrestricted = params(0.5);
        unrestricted.distance_restriction = None;
        assert_eq!(
            CyclicGuarantee::top(&unrestricted),
            Err(GuaranteeError::MissingDistanceRestriction)
        );
        assert_eq!(
            CyclicGuarantee::bottom(&unrestricted),
            Err(GuaranteeError::MissingDistanceRestriction)
        );
    }

    #[test]
    fn region_is_clipped_to_the_domain() {
        let top = CyclicGuarantee::top(&params(0.4)).unwrap();
        assert_eq!(top.radius(), 0.4);
        let region = top.region();
        assert!((region.lb()[(0, 0)] - 0.0).abs() < 1e-12);
        assert!((region.ub()[(0, 0)] - 0.6).abs() < 1e-12);
        assert!((region.lb()[(0, 1)] - 0.1).abs() < 1e-12);
        assert!((region.ub()[(0, 1)] - 0.9).abs() < 1e-12);
        assert!((top.max_inf_radius() - 0.6).abs() < 1e-12);
        assert_eq!(top.complexity(), 4);

        let bottom = CyclicGuarantee::bottom(&params(0.4)).unwrap();
        assert_eq!(bottom.complexity(), 0);
        assert_eq!(bottom.max_inf_radius(), 0.0);
    }

    #[test]
    fn constrain_shrinks_below_the_witness() {
        let mut guarantee = CyclicGuarantee::top(&params(0.4)).unwrap();
        assert!(guarantee.constrain(&row(&[0.2, 0.8])));
        assert!((guarantee.radius() - 0.2).abs() < 1e-12);
        assert!(!guarantee.constrain(&row(&[0.25, 0.5])));
        assert!((guarantee.radius() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn expand_stays_strictly_below_the_restriction() {
        let mut guarantee = CyclicGuarantee::bottom(&params(0.25)).unwrap();
        assert!(guarantee.expand());
        assert!(guarantee.expand());
        assert!(!guarantee.expand());
        assert!((guarantee.radius() - 0.2).abs() < 1e-12);
        guarantee.revert_expand();
        assert!((guarantee.radius() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn revert_returns_to_the_radius_before_expansion() {
        let mut guarantee = CyclicGuarantee::bottom(&params(0.5)).unwrap();
        assert!(guarantee.expand());
        assert!(guarantee.expand());
        let verified = guarantee.radius();
        assert!(guarantee.expand());
        guarantee.revert_expand();
        assert_eq!(guarantee.radius(), verified);
    }

    #[test]
    fn dichotomic_protocol() {
        let mut guarantee = CyclicGuarantee::bottom(&params(0.4)).unwrap();
        assert!(guarantee.dichotomic_invariant());
        assert!(guarantee.expand_dichotomic());
        assert!((guarantee.radius() - 0.2).abs() < 1e-12);
        assert!(guarantee.up_pivot());
        assert!(guarantee.expand_dichotomic());
        assert!((guarantee.radius() - 0.3).abs() < 1e-12);
        assert!(guarantee.down_pivot());
        assert!(guarantee.dichotomic_invariant());

        // The current radius plus δ reaches the restriction.
        assert!(!guarantee.expand_dichotomic());
        assert!((guarantee.radius() - 0.3).abs() < 1e-12);

        guarantee.make_complete();
        assert!((guarantee.radius() - 0.3).abs() < 1e-12);
        guarantee.make_sound();
        assert!((guarantee.radius() - 0.2).abs() < 1e-12);
        guarantee.make_sound();
        assert!((guarantee.radius() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn pivot_narrowing_refuses_to_invert() {
        let mut guarantee = CyclicGuarantee::bottom(&params(0.4)).unwrap();
        assert!(guarantee.expand_dichotomic());
        assert!(guarantee.up_pivot());
        guarantee.revert_expand();
        assert!(!guarantee.down_pivot());
        assert_eq!(guarantee.pivot().ub, 0.4);
    }

    proptest! {
        #[test]
        fn radius_stays_within_restriction(
            verdicts in prop::collection::vec(any::<bool>(), 0..30),
            witnesses in prop::collection::vec((0.0f64..=0.4, 0.1f64..=0.9), 0..10),
        ) {
            let mut guarantee = CyclicGuarantee::bottom(&params(0.4)).unwrap();
            for sound in verdicts {
                if !guarantee.dichotomic_invariant() || !guarantee.expand_dichotomic() {
                    break;
                }
                let pivot = guarantee.pivot();
                prop_assert!(pivot.lb <= guarantee.radius() && guarantee.radius() <= pivot.ub);
                let narrowed = if sound { guarantee.up_pivot() } else { guarantee.down_pivot() };
                prop_assert!(narrowed);
            }
            guarantee.make_sound();
            for (a, b) in witnesses {
                let witness = row(&[a, b]);
                if guarantee.region().contains(&witness) {
                    guarantee.constrain(&witness);
                }
                prop_assert!(guarantee.radius() >= 0.0);
                prop_assert!(guarantee.radius() <= guarantee.distance_restriction());
            }
        }
    }
}
