//! Fine alignment by linear regression of matched pulse times.

use contracts::{RegressionConfig, SyncError, ViewStream};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, instrument};

use crate::mapping::{default_tolerance, match_pulses, rmse, ClockMapping, PulsePair};

/// Singular values below this are treated as zero
const SVD_EPS: f64 = 1e-12;

/// Accepted regression fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionFit {
    pub mapping: ClockMapping,
    /// Residual RMSE (seconds)
    pub rmse: f64,
    /// Pulse pairs the fit used
    pub pairs: usize,
}

/// Regression aligner
#[derive(Debug, Clone, Default)]
pub struct RegressionAligner {
    config: RegressionConfig,
}

impl RegressionAligner {
    pub fn new(config: RegressionConfig) -> Self {
        Self { config }
    }

    /// Pairing tolerance in seconds for a reference onset train
    pub fn tolerance(&self, reference: &[f64]) -> f64 {
        self.config
            .match_tolerance_ms
            .map(|ms| ms / 1000.0)
            .unwrap_or_else(|| default_tolerance(reference))
    }

    /// Residual ceiling (seconds)
    pub fn max_rmse(&self) -> f64 {
        self.config.max_rmse
    }

    /// Fit `t_ref = slope * t_view + intercept` over pulses paired under
    /// `initial`
    #[instrument(
        level = "debug",
        name = "regression_align",
        skip_all,
        fields(view = %target.view, initial_offset = initial.intercept)
    )]
    pub fn align(
        &self,
        reference: &ViewStream,
        target: &ViewStream,
        initial: &ClockMapping,
    ) -> Result<RegressionFit, SyncError> {
        let ref_times = reference.timestamps();
        let tolerance = self.tolerance(&ref_times);
        let pairs = match_pulses(&ref_times, &target.timestamps(), initial, tolerance);

        let mapping = fit_line(&pairs).ok_or_else(|| SyncError::InsufficientSyncSignal {
            view: target.view.clone(),
            detected: pairs.len(),
        })?;
        let rmse = rmse(&pairs, &mapping);

        debug!(
            pairs = pairs.len(),
            tolerance,
            slope = mapping.slope,
            intercept = mapping.intercept,
            rmse,
            "regression fit"
        );

        self.check_rmse(target, rmse)?;
        Ok(RegressionFit {
            mapping,
            rmse,
            pairs: pairs.len(),
        })
    }

    /// Reject residuals above the ceiling
    pub fn check_rmse(&self, target: &ViewStream, rmse: f64) -> Result<(), SyncError> {
        if rmse > self.config.max_rmse {
            return Err(SyncError::RegressionFitRejected {
                view: target.view.clone(),
                rmse,
                max_rmse: self.config.max_rmse,
            });
        }
        Ok(())
    }
}

/// Ordinary least squares line through `pairs`
///
/// `None` with fewer than two pairs or when every target time is equal.
pub fn fit_line(pairs: &[PulsePair]) -> Option<ClockMapping> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len();
    let mean_view = pairs.iter().map(|p| p.view).sum::<f64>() / n as f64;
    if pairs.iter().all(|p| (p.view - mean_view).abs() <= f64::EPSILON) {
        return None;
    }

    // centered abscissa keeps the system well conditioned for long recordings
    let design = DMatrix::from_fn(n, 2, |row, col| {
        if col == 0 {
            pairs[row].view - mean_view
        } else {
            1.0
        }
    });
    let observed = DVector::from_iterator(n, pairs.iter().map(|p| p.reference));
    let solution = design.svd(true, true).solve(&observed, SVD_EPS).ok()?;

    let slope = solution[0];
    let intercept = solution[1] - slope * mean_view;
    (slope.is_finite() && intercept.is_finite()).then(|| ClockMapping::new(slope, intercept))
}
