use super::{inf_norm, GeometryError, Interval};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// An L∞ ball `{x : ‖x − center‖∞ <= radius}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfCircle {
    center: DMatrix<f64>,
    radius: f64,
}

impl InfCircle {
    pub fn new(center: DMatrix<f64>, radius: f64) -> Result<Self, GeometryError> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(GeometryError::InvalidRadius(radius));
        }
        Ok(Self { center, radius })
    }

    /// Smallest ball containing `interval`: centered at its midpoint, radius half the diameter.
    pub fn enclosing(interval: &Interval) -> Self {
        let center = (interval.lb() + interval.ub()) * 0.5;
        let radius = inf_norm(&interval.edge_lengths()) * 0.5;
        Self { center, radius }
    }

    pub fn center(&self) -> &DMatrix<f64> {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub(crate) fn set_radius(&mut self, radius: f64) {
        assert!(radius >= 0.0, "negative radius {radius}");
        self.radius = radius;
    }

    pub fn contains(&self, x: &DMatrix<f64>) -> bool {
        self.to_interval().contains(x)
    }

    /// The box `[center − r, center + r]`.
    pub fn to_interval(&self) -> Interval {
        Interval::from_parts(
            self.center.add_scalar(-self.radius),
            self.center.add_scalar(self.radius),
        )
    }

    /// The box `[center − r, center + r] ∩ domain`.
    pub fn to_interval_within(&self, domain: &Interval) -> Interval {
        let mut interval = self.to_interval();
        interval.intersect(domain);
        interval
    }
}

#[cfg(test)]
mod tests {
    use super::InfCircle;
    use crate::geometry::{GeometryError, Interval};
    use nalgebra::DMatrix;

    #[test]
    fn new_rejects_negative_radius() {
        let center = DMatrix::from_element(1, 1, 0.0);
        assert_eq!(
            InfCircle::new(center, -0.1),
            Err(GeometryError::InvalidRadius(-0.1))
        );
    }

    #[test]
    fn to_interval_within_clips_to_domain() {
        let center = DMatrix::from_row_slice(1, 2, &[0.1, 0.5]);
        let circle = InfCircle::new(center, 0.2).unwrap();
        let domain = Interval::uniform(1, 2, 0.0, 1.0).unwrap();

        let boxed = circle.to_interval_within(&domain);
        assert!((boxed.lb()[(0, 0)] - 0.0).abs() < 1e-12);
        assert!((boxed.ub()[(0, 0)] - 0.3).abs() < 1e-12);
        assert!((boxed.lb()[(0, 1)] - 0.3).abs() < 1e-12);
        assert!((boxed.ub()[(0, 1)] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn enclosing_round_trips_a_cube() {
        let cube = Interval::uniform(2, 2, 0.25, 0.75).unwrap();
        let circle = InfCircle::enclosing(&cube);
        assert!((circle.radius() - 0.25).abs() < 1e-12);
        let back = circle.to_interval();
        assert!(back.includes(&cube) && cube.includes(&back));
    }
}
