use super::{CoordinateRefinement, Guarantee, GuaranteeError, GuaranteeParams, RegionRefinement};
use crate::geometry::{check_shape, row_major_indices, Index, Interval};
use nalgebra::DMatrix;

/// An axis-aligned box `[lb, ub]` around `x*`, refined one bound coordinate at a time.
///
/// Invariant: `domain.lb <= lb <= x* <= ub <= domain.ub`, and the dichotomic pivots bracket the
/// bounds: `high_pivot.lb <= ub <= high_pivot.ub`, `low_pivot.lb <= lb <= low_pivot.ub`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelepipedalGuarantee {
    bounds: Interval,
    x_star: DMatrix<f64>,
    c_star: usize,
    delta: f64,
    domain: Interval,
    distance_restriction: Option<f64>,
    /// Binary-search bracket for `ub`; its lower end is the last certified upper bound.
    high_pivot: Interval,
    /// Binary-search bracket for `lb`; its upper end is the last certified lower bound.
    low_pivot: Interval,
    /// Bounds the last successful expansions started from. Reverts never move past them.
    expansion_origin: Interval,
}

impl ParallelepipedalGuarantee {
    /// The whole bounding domain, the starting point of top-down search.
    pub fn top(params: &GuaranteeParams) -> Result<Self, GuaranteeError> {
        params.validate()?;
        let domain = params.bounding_domain();
        Ok(Self::assemble(params, domain.clone(), domain))
    }

    /// The degenerate box `{x*}`, the starting point of bottom-up search.
    pub fn bottom(params: &GuaranteeParams) -> Result<Self, GuaranteeError> {
        params.validate()?;
        let domain = params.bounding_domain();
        Ok(Self::assemble(
            params,
            Interval::from_point(&params.x_star),
            domain,
        ))
    }

    pub(super) fn assemble(
        params: &GuaranteeParams,
        bounds: Interval,
        domain: Interval,
    ) -> Self {
        let mut guarantee = Self {
            high_pivot: bounds.clone(),
            low_pivot: bounds.clone(),
            expansion_origin: bounds.clone(),
            bounds,
            x_star: params.x_star.clone(),
            c_star: params.c_star,
            delta: params.delta,
            domain,
            distance_restriction: params.distance_restriction,
        };
        guarantee.update_pivots();
        guarantee
    }

    pub fn bounds(&self) -> &Interval {
        &self.bounds
    }

    pub fn lb(&self) -> &DMatrix<f64> {
        self.bounds.lb()
    }

    pub fn ub(&self) -> &DMatrix<f64> {
        self.bounds.ub()
    }

    pub fn high_pivot(&self) -> &Interval {
        &self.high_pivot
    }

    pub fn low_pivot(&self) -> &Interval {
        &self.low_pivot
    }

    pub fn distance_restriction(&self) -> Option<f64> {
        self.distance_restriction
    }

    /// Imposes starting bounds from outside, e.g. bounds persisted by an earlier run.
    ///
    /// Every provided bound must stay in the domain and keep `lb <= x* <= ub`. Nothing is changed
    /// unless both bounds pass. Pivots are resynchronized afterwards.
    pub fn set_bounds(
        &mut self,
        lb: Option<DMatrix<f64>>,
        ub: Option<DMatrix<f64>>,
    ) -> Result<(), GuaranteeError> {
        let shape = self.x_star.shape();
        if let Some(lb) = &lb {
            check_shape(shape, lb)?;
            for index in row_major_indices(shape.0, shape.1) {
                if lb[index] > self.x_star[index] {
                    return Err(GuaranteeError::LowerBoundAboveAnchor { index });
                }
                if lb[index] < self.domain.lb()[index] {
                    return Err(GuaranteeError::BoundOutsideDomain { index });
                }
            }
        }
        if let Some(ub) = &ub {
            check_shape(shape, ub)?;
            for index in row_major_indices(shape.0, shape.1) {
                if ub[index] < self.x_star[index] {
                    return Err(GuaranteeError::UpperBoundBelowAnchor { index });
                }
                if ub[index] > self.domain.ub()[index] {
                    return Err(GuaranteeError::BoundOutsideDomain { index });
                }
            }
        }
        if let Some(lb) = lb {
            self.bounds.replace_lb(lb);
        }
        if let Some(ub) = ub {
            self.bounds.replace_ub(ub);
        }
        self.update_pivots();
        Ok(())
    }

    /// The coordinate with maximal `|witness − x*|`, first maximal index in row-major order,
    /// and the signed difference there.
    fn select_inequality(&self, witness: &DMatrix<f64>) -> (Index, f64) {
        let (rows, cols) = self.x_star.shape();
        let mut best = ((0, 0), witness[(0, 0)] - self.x_star[(0, 0)]);
        for index in row_major_indices(rows, cols) {
            let diff = witness[index] - self.x_star[index];
            if diff.abs() > best.1.abs() {
                best = (index, diff);
            }
        }
        best
    }

    /// Grows the box to cover a `δ`-box around `witness`, clipped to the domain.
    ///
    /// Returns `false` once the box covers the whole domain.
    pub fn generalize(&mut self, witness: &DMatrix<f64>) -> bool {
        assert!(
            !self.bounds.contains(witness),
            "generalizing with a witness already inside the guarantee"
        );
        let before = self.bounds.potential();

        let mut patch = Interval::from_parts(
            witness.add_scalar(-self.delta),
            witness.add_scalar(self.delta),
        );
        patch.intersect(&self.domain);
        self.bounds.concatenate(&patch);

        assert!(
            self.bounds.potential() > before,
            "generalize did not grow the guarantee"
        );
        !self.bounds.includes(&self.domain)
    }
}

impl Guarantee for ParallelepipedalGuarantee {
    fn x_star(&self) -> &DMatrix<f64> {
        &self.x_star
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
        self.bounds.clone()
    }

    fn complexity(&self) -> usize {
        let below = self
            .lb()
            .iter()
            .zip(self.x_star.iter())
            .filter(|(l, x)| l < x)
            .count();
        let above = self
            .ub()
            .iter()
            .zip(self.x_star.iter())
            .filter(|(u, x)| u > x)
            .count();
        below + above
    }

    fn min_edge_length(&self) -> f64 {
        self.bounds.min_edge_length()
    }
}

impl RegionRefinement for ParallelepipedalGuarantee {
    fn constrain(&mut self, witness: &DMatrix<f64>) -> bool {
        assert!(
            self.bounds.contains(witness),
            "constraining with a witness outside the guarantee"
        );
        let before = self.bounds.potential();
        let (index, diff) = self.select_inequality(witness);

        if diff > 0.0 {
            let value = witness[index] - self.delta;
            if value < self.x_star[index] {
                return false;
            }
            self.bounds.update_ub(index, value);
        } else {
            let value = witness[index] + self.delta;
            if value > self.x_star[index] {
                return false;
            }
            self.bounds.update_lb(index, value);
        }

        assert!(
            self.bounds.potential() < before,
            "constrain did not shrink the guarantee"
        );
        true
    }

    fn expand(&mut self) -> bool {
        let ub = self.bounds.ub().add_scalar(self.delta);
        let lb = self.bounds.lb().add_scalar(-self.delta);
        let exceeds_ub = ub.iter().zip(self.domain.ub().iter()).any(|(u, d)| u > d);
        let exceeds_lb = lb.iter().zip(self.domain.lb().iter()).any(|(l, d)| l < d);
        if exceeds_ub || exceeds_lb {
            return false;
        }
        self.expansion_origin = std::mem::replace(&mut self.bounds, Interval::from_parts(lb, ub));
        true
    }

    fn revert_expand(&mut self) {
        let lb = self
            .bounds
            .lb()
            .add_scalar(self.delta)
            .zip_map(self.expansion_origin.lb(), f64::max)
            .zip_map(&self.x_star, f64::min);
        let ub = self
            .bounds
            .ub()
            .add_scalar(-self.delta)
            .zip_map(self.expansion_origin.ub(), f64::min)
            .zip_map(&self.x_star, f64::max);
        self.bounds = Interval::from_parts(lb, ub);
    }
}

impl CoordinateRefinement for ParallelepipedalGuarantee {
    fn expand_ub(&mut self, index: Index) -> bool {
        let current = self.bounds.ub()[index];
        let value = current + self.delta;
        if value > self.domain.ub()[index] {
            return false;
        }
        self.expansion_origin.update_ub(index, current);
        self.bounds.update_ub(index, value);
        true
    }

    fn expand_lb(&mut self, index: Index) -> bool {
        let current = self.bounds.lb()[index];
        let value = current - self.delta;
        if value < self.domain.lb()[index] {
            return false;
        }
        self.expansion_origin.update_lb(index, current);
        self.bounds.update_lb(index, value);
        true
    }

    fn revert_expand_ub(&mut self, index: Index) {
        let value = (self.bounds.ub()[index] - self.delta)
            .min(self.expansion_origin.ub()[index])
            .max(self.x_star[index]);
        self.bounds.update_ub(index, value);
    }

    fn revert_expand_lb(&mut self, index: Index) {
        let value = (self.bounds.lb()[index] + self.delta)
            .max(self.expansion_origin.lb()[index])
            .min(self.x_star[index]);
        self.bounds.update_lb(index, value);
    }

    fn expand_dichotomic_ub(&mut self, index: Index) -> bool {
        let value = 0.5 * (self.high_pivot.lb()[index] + self.high_pivot.ub()[index]);
        if value > self.domain.ub()[index] {
            return false;
        }
        self.bounds.update_ub(index, value);
        true
    }

    fn expand_dichotomic_lb(&mut self, index: Index) -> bool {
        let value = 0.5 * (self.low_pivot.lb()[index] + self.low_pivot.ub()[index]);
        if value < self.domain.lb()[index] {
            return false;
        }
        self.bounds.update_lb(index, value);
        true
    }

    fn up_high_pivot(&mut self, index: Index) -> bool {
        let value = self.bounds.ub()[index];
        self.high_pivot.try_update_lb(index, value)
    }

    fn down_high_pivot(&mut self, index: Index) -> bool {
        let value = self.bounds.ub()[index];
        self.high_pivot.try_update_ub(index, value)
    }

    fn up_low_pivot(&mut self, index: Index) -> bool {
        let value = self.bounds.lb()[index];
        self.low_pivot.try_update_lb(index, value)
    }

    fn down_low_pivot(&mut self, index: Index) -> bool {
        let value = self.bounds.lb()[index];
        self.low_pivot.try_update_ub(index, value)
    }

    fn high_dichotomic_invariant(&self, index: Index) -> bool {
        self.high_pivot.ub()[index] - self.high_pivot.lb()[index] >= self.delta
    }

    fn low_dichotomic_invariant(&self, index: Index) -> bool {
        self.low_pivot.ub()[index] - self.low_pivot.lb()[index] >= self.delta
    }

    fn make_sound_ub(&mut self, index: Index) {
        let value = self.high_pivot.lb()[index];
        self.bounds.update_ub(index, value);
    }

    fn make_sound_lb(&mut self, index: Index) {
        let value = self.low_pivot.ub()[index];
        self.bounds.update_lb(index, value);
    }

    fn make_sound(&mut self) {
        self.bounds = Interval::from_parts(
            self.low_pivot.ub().clone(),
            self.high_pivot.lb().clone(),
        );
    }

    fn update_pivots(&mut self) {
        self.high_pivot =
            Interval::from_parts(self.bounds.ub().clone(), self.domain.ub().clone());
        self.low_pivot =
            Interval::from_parts(self.domain.lb().clone(), self.bounds.lb().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::ParallelepipedalGuarantee;
    use crate::geometry::Interval;
    use crate::guarantee::{
        CoordinateRefinement, Guarantee, GuaranteeError, GuaranteeParams, RegionRefinement,
    };
    use nalgebra::DMatrix;
    use proptest::prelude::*;

    fn row(values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_row_slice(1, values.len(), values)
    }

    fn params() -> GuaranteeParams {
        GuaranteeParams::new(
            row(&[0.5, 0.5]),
            0,
            0.1,
            Interval::uniform(1, 2, 0.0, 1.0).unwrap(),
        )
    }

    fn assert_close(actual: &DMatrix<f64>, expected: &[f64]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "expected {expected:?}, got {actual}");
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T, GuaranteeError>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn top_and_bottom_starting_regions() {
        let top = ParallelepipedalGuarantee::top(&params()).unwrap();
        assert_eq!(top.bounds(), &Interval::uniform(1, 2, 0.0, 1.0).unwrap());
        assert_eq!(top.complexity(), 4);

        let bottom = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        assert_eq!(bottom.lb(), &row(&[0.5, 0.5]));
        assert_eq!(bottom.ub(), &row(&[0.5, 0.5]));
        assert_eq!(bottom.complexity(), 0);
        assert_eq!(bottom.high_pivot().ub(), &row(&[1.0, 1.0]));
        assert_eq!(bottom.low_pivot().lb(), &row(&[0.0, 0.0]));
    }

    #[test]
    fn distance_restriction_shrinks_the_domain() {
        let restricted = params().with_distance_restriction(0.2);
        let top = ParallelepipedalGuarantee::top(&restricted).unwrap();
        assert_close(top.lb(), &[0.3, 0.3]);
        assert_close(top.ub(), &[0.7, 0.7]);
        assert_eq!(top.distance_restriction(), Some(0.2));
    }

    #[test]
    fn constrain_tightens_the_farthest_coordinate() {
        let mut guarantee = ParallelepipedalGuarantee::top(&params()).unwrap();
        assert!(guarantee.constrain(&row(&[0.9, 0.5])));
        assert_close(guarantee.ub(), &[0.8, 1.0]);

        assert!(guarantee.constrain(&row(&[0.5, 0.1])));
        assert_close(guarantee.lb(), &[0.0, 0.2]);
    }

    #[test]
    fn constrain_breaks_ties_at_the_first_index() {
        let mut guarantee = ParallelepipedalGuarantee::top(&params()).unwrap();
        assert!(guarantee.constrain(&row(&[0.8, 0.2])));
        assert_close(guarantee.ub(), &[0.7, 1.0]);
        assert_close(guarantee.lb(), &[0.0, 0.0]);
    }

    #[test]
    fn constrain_fails_when_crossing_x_star() {
        let mut guarantee = ParallelepipedalGuarantee::top(&params()).unwrap();
        let before = guarantee.clone();
        assert!(!guarantee.constrain(&row(&[0.55, 0.5])));
        assert_eq!(guarantee, before);
    }

    #[test]
    fn whole_expand_stops_at_the_domain_and_reverts() {
        let mut guarantee = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        assert!(guarantee.expand());
        assert!(guarantee.expand());
        assert_close(guarantee.lb(), &[0.3, 0.3]);
        assert_close(guarantee.ub(), &[0.7, 0.7]);
        guarantee.revert_expand();
        assert_close(guarantee.ub(), &[0.6, 0.6]);

        let mut wide = ParallelepipedalGuarantee::top(&params()).unwrap();
        let before = wide.clone();
        assert!(!wide.expand());
        assert_eq!(wide, before);
    }

    #[test]
    fn coordinate_expand_and_revert() {
        let mut guarantee = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        assert!(guarantee.expand_ub((0, 1)));
        assert!(guarantee.expand_lb((0, 0)));
        assert_close(guarantee.ub(), &[0.5, 0.6]);
        assert_close(guarantee.lb(), &[0.4, 0.5]);
        guarantee.revert_expand_ub((0, 1));
        guarantee.revert_expand_lb((0, 0));
        assert_close(guarantee.ub(), &[0.5, 0.5]);
        assert_close(guarantee.lb(), &[0.5, 0.5]);
    }

    #[test]
    fn reverts_never_pass_the_bound_before_expansion() {
        let centred = GuaranteeParams::new(
            row(&[0.0, 0.0]),
            0,
            0.1,
            Interval::uniform(1, 2, -1.0, 1.0).unwrap(),
        );
        // The plain inverse step drifts outward here: (0.2 + 0.1) - 0.1 > 0.2.
        assert!(0.1 + 0.1 + 0.1 - 0.1 > 0.2);

        let mut guarantee = ParallelepipedalGuarantee::bottom(&centred).unwrap();
        assert!(guarantee.expand_ub((0, 0)));
        assert!(guarantee.expand_ub((0, 0)));
        assert!(guarantee.expand_lb((0, 1)));
        assert!(guarantee.expand_lb((0, 1)));
        let verified = guarantee.bounds().clone();
        assert!(guarantee.expand_ub((0, 0)));
        assert!(guarantee.expand_lb((0, 1)));
        guarantee.revert_expand_ub((0, 0));
        guarantee.revert_expand_lb((0, 1));
        assert_eq!(guarantee.bounds(), &verified);

        let mut whole = ParallelepipedalGuarantee::bottom(&centred).unwrap();
        assert!(whole.expand());
        assert!(whole.expand());
        let verified = whole.bounds().clone();
        assert!(whole.expand());
        whole.revert_expand();
        assert_eq!(whole.bounds(), &verified);
    }

    #[test]
    fn dichotomic_pivots_bracket_the_bound() {
        let mut guarantee = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        let index = (0, 0);
        assert!(guarantee.high_dichotomic_invariant(index));
        assert!(guarantee.expand_dichotomic_ub(index));
        assert_close(guarantee.ub(), &[0.75, 0.5]);

        // Verdict unsound: the bracket closes from above.
        assert!(guarantee.down_high_pivot(index));
        assert!((guarantee.high_pivot().ub()[index] - 0.75).abs() < 1e-12);
        assert!(guarantee.expand_dichotomic_ub(index));
        assert!((guarantee.ub()[index] - 0.625).abs() < 1e-12);

        // Verdict sound: the bracket closes from below.
        assert!(guarantee.up_high_pivot(index));
        assert!((guarantee.high_pivot().lb()[index] - 0.625).abs() < 1e-12);
        assert!(guarantee.high_dichotomic_invariant(index));

        guarantee.make_sound_ub(index);
        assert!((guarantee.ub()[index] - 0.625).abs() < 1e-12);
    }

    #[test]
    fn pivot_narrowing_refuses_to_invert() {
        let mut guarantee = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        let index = (0, 1);
        assert!(guarantee.expand_dichotomic_lb(index));
        assert!(guarantee.up_low_pivot(index));
        assert!((guarantee.low_pivot().lb()[index] - 0.25).abs() < 1e-12);

        // A bound below the bracket cannot close it from above.
        assert!(guarantee.expand_lb(index));
        let pivot = guarantee.low_pivot().clone();
        assert!(!guarantee.down_low_pivot(index));
        assert_eq!(guarantee.low_pivot(), &pivot);

        assert!(guarantee.expand_dichotomic_ub((0, 0)));
        assert!(guarantee.down_high_pivot((0, 0)));
        assert!(guarantee.expand_ub((0, 0)));
        assert!(!guarantee.up_high_pivot((0, 0)));
        assert!((guarantee.high_pivot().lb()[(0, 0)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn make_sound_snaps_to_certified_bracket_and_is_idempotent() {
        let mut guarantee = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        assert!(guarantee.expand_dichotomic_ub((0, 0)));
        assert!(guarantee.up_high_pivot((0, 0)));
        assert!(guarantee.expand_dichotomic_ub((0, 0)));
        assert!(guarantee.expand_dichotomic_lb((0, 1)));

        guarantee.make_sound();
        let once = guarantee.clone();
        guarantee.make_sound();
        assert_eq!(guarantee, once);
        assert_close(guarantee.ub(), &[0.75, 0.5]);
        assert_close(guarantee.lb(), &[0.5, 0.5]);
    }

    #[test]
    fn generalize_grows_around_the_witness() {
        let mut guarantee = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        assert!(guarantee.generalize(&row(&[0.8, 0.5])));
        assert_close(guarantee.ub(), &[0.9, 0.6]);
        assert_close(guarantee.lb(), &[0.5, 0.4]);

        assert!(guarantee.generalize(&row(&[0.05, 0.95])));
        assert_close(guarantee.lb(), &[0.0, 0.4]);
        assert_close(guarantee.ub(), &[0.9, 1.0]);

        assert!(!guarantee.generalize(&row(&[0.95, 0.05])));
        assert_eq!(guarantee.bounds(), guarantee.domain());
    }

    #[test]
    #[should_panic(expected = "already inside")]
    fn generalize_rejects_witness_inside() {
        let mut guarantee = ParallelepipedalGuarantee::top(&params()).unwrap();
        guarantee.generalize(&row(&[0.5, 0.5]));
    }

    #[test]
    fn set_bounds_validates_and_resynchronizes_pivots() {
        let mut guarantee = ParallelepipedalGuarantee::bottom(&params()).unwrap();
        assert_err_contains(
            guarantee.set_bounds(Some(row(&[0.6, 0.5])), None),
            "lower bound exceeds x*",
        );
        assert_err_contains(
            guarantee.set_bounds(None, Some(row(&[0.5, 1.5]))),
            "leaves the domain",
        );
        assert_err_contains(
            guarantee.set_bounds(None, Some(row(&[0.5]))),
            "shape mismatch",
        );
        assert_eq!(guarantee.ub(), &row(&[0.5, 0.5]));

        guarantee
            .set_bounds(Some(row(&[0.2, 0.4])), Some(row(&[0.9, 0.5])))
            .unwrap();
        assert_eq!(guarantee.lb(), &row(&[0.2, 0.4]));
        assert_eq!(guarantee.high_pivot().lb(), &row(&[0.9, 0.5]));
        assert_eq!(guarantee.low_pivot().ub(), &row(&[0.2, 0.4]));
        assert_eq!(guarantee.complexity(), 3);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Constrain(f64, f64),
        Expand,
        ExpandUb(usize),
        ExpandLb(usize),
        RevertUb(usize),
        RevertLb(usize),
        DichotomicUb(usize, bool),
        DichotomicLb(usize, bool),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(a, b)| Step::Constrain(a, b)),
            Just(Step::Expand),
            (0usize..2).prop_map(Step::ExpandUb),
            (0usize..2).prop_map(Step::ExpandLb),
            (0usize..2).prop_map(Step::RevertUb),
            (0usize..2).prop_map(Step::RevertLb),
            (0usize..2, any::<bool>()).prop_map(|(j, s)| Step::DichotomicUb(j, s)),
            (0usize..2, any::<bool>()).prop_map(|(j, s)| Step::DichotomicLb(j, s)),
        ]
    }

    fn check_invariants(guarantee: &ParallelepipedalGuarantee) {
        let x_star = guarantee.x_star();
        let domain = guarantee.domain();
        for index in [(0, 0), (0, 1)] {
            assert!(domain.lb()[index] <= guarantee.lb()[index]);
            assert!(guarantee.lb()[index] <= x_star[index]);
            assert!(x_star[index] <= guarantee.ub()[index]);
            assert!(guarantee.ub()[index] <= domain.ub()[index]);
        }
    }

    proptest! {
        #[test]
        fn refinement_sequences_preserve_invariants(
            top in any::<bool>(),
            steps in prop::collection::vec(step(), 0..40),
        ) {
            let mut guarantee = if top {
                ParallelepipedalGuarantee::top(&params()).unwrap()
            } else {
                ParallelepipedalGuarantee::bottom(&params()).unwrap()
            };
            for step in steps {
                match step {
                    Step::Constrain(a, b) => {
                        let witness = row(&[a, b]);
                        if guarantee.bounds().contains(&witness) {
                            let before = guarantee.bounds().potential();
                            if guarantee.constrain(&witness) {
                                prop_assert!(guarantee.bounds().potential() < before);
                            }
                        }
                        guarantee.update_pivots();
                    }
                    Step::Expand => {
                        guarantee.expand();
                        guarantee.update_pivots();
                    }
                    Step::ExpandUb(j) => {
                        guarantee.expand_ub((0, j));
                        guarantee.update_pivots();
                    }
                    Step::ExpandLb(j) => {
                        guarantee.expand_lb((0, j));
                        guarantee.update_pivots();
                    }
                    Step::RevertUb(j) => {
                        guarantee.revert_expand_ub((0, j));
                        guarantee.update_pivots();
                    }
                    Step::RevertLb(j) => {
                        guarantee.revert_expand_lb((0, j));
                        guarantee.update_pivots();
                    }
                    Step::DichotomicUb(j, sound) => {
                        let index = (0, j);
                        if guarantee.expand_dichotomic_ub(index) {
                            if sound {
                                guarantee.up_high_pivot(index);
                            } else {
                                guarantee.down_high_pivot(index);
                            }
                            let pivot = guarantee.high_pivot();
                            prop_assert!(pivot.lb()[index] <= guarantee.ub()[index]);
                            prop_assert!(guarantee.ub()[index] <= pivot.ub()[index]);
                        }
                    }
                    Step::DichotomicLb(j, sound) => {
                        let index = (0, j);
                        if guarantee.expand_dichotomic_lb(index) {
                            if sound {
                                guarantee.down_low_pivot(index);
                            } else {
                                guarantee.up_low_pivot(index);
                            }
                            let pivot = guarantee.low_pivot();
                            prop_assert!(pivot.lb()[index] <= guarantee.lb()[index]);
                            prop_assert!(guarantee.lb()[index] <= pivot.ub()[index]);
                        }
                    }
                }
                check_invariants(&guarantee);
            }
            guarantee.make_sound();
            check_invariants(&guarantee);
            let once = guarantee.clone();
            guarantee.make_sound();
            prop_assert_eq!(guarantee, once);
        }
    }
}
