mod circle;
mod interval;

pub use circle::InfCircle;
pub use interval::Interval;

use nalgebra::DMatrix;
use thiserror::Error;

/// Tolerance guarding membership tests against floating-point error at the boundaries.
pub const EPSILON: f64 = 1e-8;

/// Coordinate of a matrix-shaped point, `(row, col)`.
pub type Index = (usize, usize);

/// Malformed geometric input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("interval must have at least one coordinate")]
    Empty,
    #[error("non-finite bound at {index:?}")]
    NonFinite { index: Index },
    #[error("lower bound {lb} exceeds upper bound {ub} at {index:?}")]
    Inverted { index: Index, lb: f64, ub: f64 },
    #[error("radius must be finite and non-negative, got {0}")]
    InvalidRadius(f64),
}

/// L∞ norm of a matrix, `max |m_ij|`.
pub fn inf_norm(m: &DMatrix<f64>) -> f64 {
    m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Row-major coordinates of a `rows × cols` matrix.
pub fn row_major_indices(rows: usize, cols: usize) -> impl Iterator<Item = Index> {
    (0..rows).flat_map(move |i| (0..cols).map(move |j| (i, j)))
}

pub(crate) fn check_shape(
    expected: (usize, usize),
    m: &DMatrix<f64>,
) -> Result<(), GeometryError> {
    if m.shape() != expected {
        return Err(GeometryError::ShapeMismatch {
            expected,
            actual: m.shape(),
        });
    }
    Ok(())
}
