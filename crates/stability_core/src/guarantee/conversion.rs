use super::{CyclicGuarantee, Guarantee, GuaranteeParams, ParallelepipedalGuarantee};
use crate::geometry::Interval;

/// Re-expresses a cyclic guarantee as a box with the same materialized region.
///
/// The result is distance-restricted by the cyclic guarantee's restriction, so its domain matches.
/// Panics if the box does not reproduce the cyclic region exactly.
pub fn cyclic_to_parallelepipedal(cyclic: &CyclicGuarantee) -> ParallelepipedalGuarantee {
    let params = GuaranteeParams {
        x_star: cyclic.x_star().clone(),
        c_star: cyclic.c_star(),
        delta: cyclic.delta(),
        domain: cyclic.domain().clone(),
        distance_restriction: Some(cyclic.distance_restriction()),
    };
    let mut parallel = ParallelepipedalGuarantee::assemble(
        &params,
        Interval::from_point(&params.x_star),
        params.bounding_domain(),
    );

    let region = cyclic.region();
    if let Err(err) = parallel.set_bounds(Some(region.lb().clone()), Some(region.ub().clone())) {
        panic!("cyclic region does not fit the parallelepipedal domain: {err}");
    }
    assert_eq!(
        parallel.bounds(),
        &region,
        "conversion did not reproduce the cyclic region"
    );
    parallel
}

#[cfg(test)]
mod tests {
    use super::cyclic_to_parallelepipedal;
    use crate::geometry::{Interval, EPSILON};
    use crate::guarantee::{
        CoordinateRefinement, CyclicGuarantee, Guarantee, GuaranteeParams, RegionRefinement,
    };
    use nalgebra::DMatrix;
    use proptest::prelude::*;

    fn params(x: f64, y: f64, restriction: f64) -> GuaranteeParams {
        GuaranteeParams::new(
            DMatrix::from_row_slice(1, 2, &[x, y]),
            3,
            0.05,
            Interval::uniform(1, 2, 0.0, 1.0).unwrap(),
        )
        .with_distance_restriction(restriction)
    }

    #[test]
    fn converted_guarantee_keeps_parameters_and_syncs_pivots() {
        let mut cyclic = CyclicGuarantee::bottom(&params(0.9, 0.5, 0.3)).unwrap();
        assert!(cyclic.expand());
        assert!(cyclic.expand());

        let parallel = cyclic_to_parallelepipedal(&cyclic);
        assert_eq!(parallel.c_star(), 3);
        assert_eq!(parallel.delta(), 0.05);
        assert_eq!(parallel.distance_restriction(), Some(0.3));
        assert_eq!(parallel.high_pivot().lb(), parallel.ub());
        assert_eq!(parallel.low_pivot().ub(), parallel.lb());
        assert!((parallel.domain().ub()[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((parallel.domain().lb()[(0, 0)] - 0.6).abs() < 1e-12);
        assert!((parallel.ub()[(0, 1)] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn converted_guarantee_refines_further() {
        let mut cyclic = CyclicGuarantee::bottom(&params(0.5, 0.5, 0.4)).unwrap();
        assert!(cyclic.expand());
        let mut parallel = cyclic_to_parallelepipedal(&cyclic);
        assert!(parallel.expand_ub((0, 0)));
        assert!((parallel.ub()[(0, 0)] - 0.6).abs() < 1e-12);
        assert_eq!(parallel.complexity(), 4);
    }

    proptest! {
        #[test]
        fn conversion_reproduces_the_cyclic_region(
            x in 0.0f64..=1.0,
            y in 0.0f64..=1.0,
            restriction in 0.05f64..=1.5,
            steps in 0usize..30,
        ) {
            let mut cyclic = CyclicGuarantee::bottom(&params(x, y, restriction)).unwrap();
            for _ in 0..steps {
                if !cyclic.expand() {
                    break;
                }
            }
            let region = cyclic.region();
            let parallel = cyclic_to_parallelepipedal(&cyclic);
            for (a, b) in parallel.lb().iter().zip(region.lb().iter()) {
                prop_assert!((a - b).abs() <= EPSILON);
            }
            for (a, b) in parallel.ub().iter().zip(region.ub().iter()) {
                prop_assert!((a - b).abs() <= EPSILON);
            }
        }
    }
}
