use super::{check_shape, inf_norm, GeometryError, Index, EPSILON};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// An axis-aligned box `[lb, ub]` in `R^(rows × cols)`.
///
/// Invariant: `lb <= ub` in every coordinate. Operations that would break it are programming
/// errors and panic; malformed external input is rejected by [`Interval::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    lb: DMatrix<f64>,
    ub: DMatrix<f64>,
}

#[derive(Deserialize)]
struct RawInterval {
    lb: DMatrix<f64>,
    ub: DMatrix<f64>,
}

impl TryFrom<RawInterval> for Interval {
    type Error = GeometryError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Interval::new(raw.lb, raw.ub)
    }
}

impl Interval {
    pub fn new(lb: DMatrix<f64>, ub: DMatrix<f64>) -> Result<Self, GeometryError> {
        check_shape(lb.shape(), &ub)?;
        if lb.is_empty() {
            return Err(GeometryError::Empty);
        }
        let (rows, cols) = lb.shape();
        for i in 0..rows {
            for j in 0..cols {
                let (l, u) = (lb[(i, j)], ub[(i, j)]);
                if !l.is_finite() || !u.is_finite() {
                    return Err(GeometryError::NonFinite { index: (i, j) });
                }
                if l > u {
                    return Err(GeometryError::Inverted {
                        index: (i, j),
                        lb: l,
                        ub: u,
                    });
                }
            }
        }
        Ok(Self { lb, ub })
    }

    /// Builds an interval from bounds already known to be consistent.
    pub(crate) fn from_parts(lb: DMatrix<f64>, ub: DMatrix<f64>) -> Self {
        assert_eq!(lb.shape(), ub.shape(), "interval bounds differ in shape");
        let interval = Self { lb, ub };
        assert!(
            interval.inequalities_consistency(),
            "interval constructed with lb > ub"
        );
        interval
    }

    /// The degenerate box `{point}`.
    pub fn from_point(point: &DMatrix<f64>) -> Self {
        Self {
            lb: point.clone(),
            ub: point.clone(),
        }
    }

    /// The box `[lower, upper]^(rows × cols)`.
    pub fn uniform(
        rows: usize,
        cols: usize,
        lower: f64,
        upper: f64,
    ) -> Result<Self, GeometryError> {
        Self::new(
            DMatrix::from_element(rows, cols, lower),
            DMatrix::from_element(rows, cols, upper),
        )
    }

    pub fn lb(&self) -> &DMatrix<f64> {
        &self.lb
    }

    pub fn ub(&self) -> &DMatrix<f64> {
        &self.ub
    }

    pub fn shape(&self) -> (usize, usize) {
        self.lb.shape()
    }

    pub fn rows(&self) -> usize {
        self.lb.nrows()
    }

    pub fn cols(&self) -> usize {
        self.lb.ncols()
    }

    /// Number of coordinates.
    pub fn dim(&self) -> usize {
        self.lb.len()
    }

    pub fn inequality_consistency(&self, index: Index) -> bool {
        self.ub[index] >= self.lb[index]
    }

    pub fn inequalities_consistency(&self) -> bool {
        self.lb.iter().zip(self.ub.iter()).all(|(l, u)| u >= l)
    }

    /// `lb - ε <= x <= ub + ε` in every coordinate.
    pub fn contains(&self, x: &DMatrix<f64>) -> bool {
        assert_eq!(x.shape(), self.shape(), "point and interval differ in shape");
        self.lb
            .iter()
            .zip(self.ub.iter())
            .zip(x.iter())
            .all(|((l, u), v)| v - l >= -EPSILON && u - v >= -EPSILON)
    }

    /// True when both corners of `other` lie in `self`.
    pub fn includes(&self, other: &Interval) -> bool {
        self.contains(&other.lb) && self.contains(&other.ub)
    }

    /// `self <- self ∩ other`.
    ///
    /// Panics if the intersection is empty: callers only intersect compatible regions.
    pub fn intersect(&mut self, other: &Interval) {
        assert_eq!(self.shape(), other.shape(), "intersecting intervals of different shape");
        self.lb = self.lb.zip_map(&other.lb, f64::max);
        self.ub = self.ub.zip_map(&other.ub, f64::min);
        assert!(
            self.inequalities_consistency(),
            "interval intersection is empty"
        );
    }

    /// `self <- self ⊔ other`, the smallest box containing both.
    pub fn concatenate(&mut self, other: &Interval) {
        assert_eq!(self.shape(), other.shape(), "concatenating intervals of different shape");
        self.lb = self.lb.zip_map(&other.lb, f64::min);
        self.ub = self.ub.zip_map(&other.ub, f64::max);
    }

    pub fn update_lb(&mut self, index: Index, value: f64) {
        self.check_index(index);
        self.lb[index] = value;
        assert!(
            self.inequality_consistency(index),
            "lower bound {value} exceeds upper bound {} at {index:?}",
            self.ub[index]
        );
    }

    pub fn update_ub(&mut self, index: Index, value: f64) {
        self.check_index(index);
        self.ub[index] = value;
        assert!(
            self.inequality_consistency(index),
            "upper bound {value} is below lower bound {} at {index:?}",
            self.lb[index]
        );
    }

    /// Sets `lb[index]` only if the coordinate stays consistent.
    pub(crate) fn try_update_lb(&mut self, index: Index, value: f64) -> bool {
        self.check_index(index);
        if value > self.ub[index] {
            return false;
        }
        self.lb[index] = value;
        true
    }

    /// Sets `ub[index]` only if the coordinate stays consistent.
    pub(crate) fn try_update_ub(&mut self, index: Index, value: f64) -> bool {
        self.check_index(index);
        if value < self.lb[index] {
            return false;
        }
        self.ub[index] = value;
        true
    }

    pub(crate) fn replace_lb(&mut self, lb: DMatrix<f64>) {
        assert_eq!(lb.shape(), self.shape(), "replacement bound differs in shape");
        self.lb = lb;
        assert!(self.inequalities_consistency(), "replacement lower bound exceeds ub");
    }

    pub(crate) fn replace_ub(&mut self, ub: DMatrix<f64>) {
        assert_eq!(ub.shape(), self.shape(), "replacement bound differs in shape");
        self.ub = ub;
        assert!(self.inequalities_consistency(), "replacement upper bound is below lb");
    }

    fn check_index(&self, (i, j): Index) {
        assert!(
            i < self.rows() && j < self.cols(),
            "index ({i}, {j}) outside {}x{} interval",
            self.rows(),
            self.cols()
        );
    }

    pub fn edge_lengths(&self) -> DMatrix<f64> {
        &self.ub - &self.lb
    }

    /// Mean edge length. Strictly decreases under a successful `constrain`.
    pub fn potential(&self) -> f64 {
        self.edge_lengths().sum() / self.dim() as f64
    }

    /// Longest edge, the L∞ diameter.
    pub fn diameter(&self) -> f64 {
        inf_norm(&self.edge_lengths())
    }

    /// Product of edge lengths. Underflows quickly in high dimension; diagnostic only.
    pub fn volume(&self) -> f64 {
        self.edge_lengths().iter().map(|e| e.abs()).product()
    }

    pub fn min_edge_length(&self) -> f64 {
        self.edge_lengths()
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}
