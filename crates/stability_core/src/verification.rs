use crate::geometry::{check_shape, Interval};
use crate::traits::{Clock, SystemClock, VerificationOracle};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

/// Outcome of one oracle call.
///
/// `verified` means the region is sound (sound mode) or complete (complete mode). A negative
/// verdict must carry a witness. A call that timed out is reported as verified.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub verified: bool,
    pub witness: Option<DMatrix<f64>>,
    pub timed_out: bool,
}

impl Verdict {
    pub fn verified() -> Self {
        Self {
            verified: true,
            witness: None,
            timed_out: false,
        }
    }

    pub fn counterexample(witness: DMatrix<f64>) -> Self {
        Self {
            verified: false,
            witness: Some(witness),
            timed_out: false,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            verified: true,
            witness: None,
            timed_out: true,
        }
    }

    /// For a sound-mode verdict on `region`: `None` if verified, otherwise the witness, which
    /// must lie inside `region`.
    pub fn into_sound_witness(
        self,
        region: &Interval,
    ) -> Result<Option<DMatrix<f64>>, OracleError> {
        let Some(witness) = self.checked_witness(region)? else {
            return Ok(None);
        };
        if !region.contains(&witness) {
            return Err(OracleError::WitnessOutsideRegion);
        }
        Ok(Some(witness))
    }

    /// For a complete-mode verdict on `region`: `None` if verified, otherwise the witness, which
    /// must lie outside `region` and inside `domain`.
    pub fn into_complete_witness(
        self,
        region: &Interval,
        domain: &Interval,
    ) -> Result<Option<DMatrix<f64>>, OracleError> {
        let Some(witness) = self.checked_witness(region)? else {
            return Ok(None);
        };
        if region.contains(&witness) {
            return Err(OracleError::WitnessInsideRegion);
        }
        if !domain.contains(&witness) {
            return Err(OracleError::WitnessOutsideDomain);
        }
        Ok(Some(witness))
    }

    fn checked_witness(self, region: &Interval) -> Result<Option<DMatrix<f64>>, OracleError> {
        if self.verified {
            return Ok(None);
        }
        let witness = self.witness.ok_or(OracleError::MissingWitness)?;
        check_shape(region.shape(), &witness).map_err(|_| OracleError::WitnessShape {
            expected: region.shape(),
            actual: witness.shape(),
        })?;
        Ok(Some(witness))
    }
}

/// Cumulative oracle cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleStatistics {
    pub num_calls: usize,
    /// Seconds.
    pub total_time: f64,
    pub num_timeouts: usize,
}

impl OracleStatistics {
    pub fn record(&mut self, call_time: f64, timed_out: bool) {
        assert!(call_time >= 0.0, "negative oracle call time {call_time}");
        self.num_calls += 1;
        self.total_time += call_time;
        if timed_out {
            self.num_timeouts += 1;
        }
    }

    pub fn avg_time(&self) -> f64 {
        if self.num_calls == 0 {
            0.0
        } else {
            self.total_time / self.num_calls as f64
        }
    }
}

/// Oracle output the search loops cannot interpret.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle returned a negative verdict without a witness")]
    MissingWitness,
    #[error("witness shape mismatch: expected {expected:?}, got {actual:?}")]
    WitnessShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("witness lies outside the queried region")]
    WitnessOutsideRegion,
    #[error("witness lies inside the queried region")]
    WitnessInsideRegion,
    #[error("witness lies outside the domain")]
    WitnessOutsideDomain,
    #[error("verifier backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleMode {
    /// Looks for a point of another class inside the region.
    Sound,
    /// Looks for a point of the same class outside the region.
    Complete,
}

/// A point with its classifier label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledPoint {
    pub class: usize,
    pub point: DMatrix<f64>,
}

/// Decides regions against a finite sample of labelled points.
///
/// Not a proof: a region is only as sound as the sample is dense.
pub struct SamplingOracle {
    c_star: usize,
    mode: OracleMode,
    samples: Vec<LabelledPoint>,
    domain: Option<Interval>,
    call_timeout: Option<f64>,
    clock: Arc<dyn Clock>,
    statistics: OracleStatistics,
}

impl SamplingOracle {
    pub fn sound(c_star: usize, samples: Vec<LabelledPoint>, clock: Arc<dyn Clock>) -> Self {
        Self {
            c_star,
            mode: OracleMode::Sound,
            samples,
            domain: None,
            call_timeout: None,
            clock,
            statistics: OracleStatistics::default(),
        }
    }

    /// Same-class points outside `domain` are ignored.
    pub fn complete(
        c_star: usize,
        samples: Vec<LabelledPoint>,
        domain: Interval,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            c_star,
            mode: OracleMode::Complete,
            samples,
            domain: Some(domain),
            call_timeout: None,
            clock,
            statistics: OracleStatistics::default(),
        }
    }

    /// Gives up on a call after `seconds`, answering affirmatively.
    pub fn with_call_timeout(mut self, seconds: f64) -> Self {
        self.call_timeout = Some(seconds);
        self
    }

    pub fn mode(&self) -> OracleMode {
        self.mode
    }

    fn is_witness(&self, sample: &LabelledPoint, region: &Interval) -> bool {
        if sample.point.shape() != region.shape() {
            return false;
        }
        match self.mode {
            OracleMode::Sound => sample.class != self.c_star && region.contains(&sample.point),
            OracleMode::Complete => {
                sample.class == self.c_star
                    && !region.contains(&sample.point)
                    && self
                        .domain
                        .as_ref()
                        .map_or(true, |domain| domain.contains(&sample.point))
            }
        }
    }

    fn scan(&self, region: &Interval, start: f64) -> Verdict {
        for sample in &self.samples {
            if let Some(limit) = self.call_timeout {
                if self.clock.now() - start > limit {
                    return Verdict::timed_out();
                }
            }
            if self.is_witness(sample, region) {
                return Verdict::counterexample(sample.point.clone());
            }
        }
        Verdict::verified()
    }
}

impl VerificationOracle for SamplingOracle {
    fn check(&mut self, region: &Interval) -> Result<Verdict, OracleError> {
        let start = self.clock.now();
        let verdict = self.scan(region, start);
        let elapsed = (self.clock.now() - start).max(0.0);
        self.statistics.record(elapsed, verdict.timed_out);

        if verdict.timed_out {
            warn!(
                "Sampling oracle timed out after {:.3}s; treating the region as verified",
                elapsed
            );
        } else {
            trace!(
                verified = verdict.verified,
                samples = self.samples.len(),
                "sampling oracle call"
            );
        }
        Ok(verdict)
    }

    fn statistics(&self) -> OracleStatistics {
        self.statistics
    }
}

/// Wraps a closure as an oracle, adding call and time accounting.
pub struct FnOracle<F> {
    check: F,
    clock: Arc<dyn Clock>,
    statistics: OracleStatistics,
}

impl<F> FnOracle<F>
where
    F: FnMut(&Interval) -> Result<Verdict, OracleError>,
{
    pub fn new(check: F) -> Self {
        Self::with_clock(check, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(check: F, clock: Arc<dyn Clock>) -> Self {
        Self {
            check,
            clock,
            statistics: OracleStatistics::default(),
        }
    }
}

impl<F> VerificationOracle for FnOracle<F>
where
    F: FnMut(&Interval) -> Result<Verdict, OracleError>,
{
    fn check(&mut self, region: &Interval) -> Result<Verdict, OracleError> {
        let start = self.clock.now();
        let verdict = (self.check)(region)?;
        let elapsed = (self.clock.now() - start).max(0.0);
        self.statistics.record(elapsed, verdict.timed_out);
        if verdict.timed_out {
            warn!("Oracle call timed out; treating the region as verified");
        }
        Ok(verdict)
    }

    fn statistics(&self) -> OracleStatistics {
        self.statistics
    }
}
