//! Plain request payloads coming from JavaScript and their translation into core types.

use anyhow::{bail, Context};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use stability_core::geometry::Interval;
use stability_core::guarantee::GuaranteeParams;
use stability_core::verification::LabelledPoint;

/// Guarantee parameters as sent by the UI. Points are row-major; the domain is the same scalar
/// range on every coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuaranteeRequest {
    pub x_star: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
    pub c_star: usize,
    pub delta: f64,
    /// Distance restriction around `x_star`. Required by cyclic strategies.
    #[serde(default)]
    pub radius: Option<f64>,
    pub domain_lb: f64,
    pub domain_ub: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    pub class: usize,
    pub point: Vec<f64>,
}

impl GuaranteeRequest {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn to_params(&self) -> anyhow::Result<GuaranteeParams> {
        let x_star = matrix(&self.x_star, self.shape()).context("Invalid x_star")?;
        let domain = Interval::uniform(self.rows, self.cols, self.domain_lb, self.domain_ub)
            .context("Invalid domain")?;
        let mut params = GuaranteeParams::new(x_star, self.c_star, self.delta, domain);
        params.distance_restriction = self.radius;
        params.validate().context("Invalid guarantee parameters")?;
        Ok(params)
    }
}

/// Row-major values to a matrix of the given shape.
pub(crate) fn matrix(values: &[f64], (rows, cols): (usize, usize)) -> anyhow::Result<DMatrix<f64>> {
    if rows == 0 || cols == 0 {
        bail!("Shape must be non-empty, got {}x{}", rows, cols);
    }
    if values.len() != rows * cols {
        bail!(
            "Expected {} values for a {}x{} point, got {}",
            rows * cols,
            rows,
            cols,
            values.len()
        );
    }
    if values.iter().any(|v| !v.is_finite()) {
        bail!("Point contains non-finite values");
    }
    Ok(DMatrix::from_row_slice(rows, cols, values))
}

pub(crate) fn labelled_points(
    samples: Vec<SampleRequest>,
    shape: (usize, usize),
) -> anyhow::Result<Vec<LabelledPoint>> {
    samples
        .into_iter()
        .enumerate()
        .map(|(index, sample)| {
            let point = matrix(&sample.point, shape)
                .with_context(|| format!("Invalid sample {}", index))?;
            Ok(LabelledPoint {
                class: sample.class,
                point,
            })
        })
        .collect()
}
