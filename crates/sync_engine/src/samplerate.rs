//! Sample-rate correction.
//!
//! Re-estimates the clock-rate ratio from matched inter-pulse intervals
//! and maps a view's frame timeline into the reference clock.

use contracts::ViewStream;
use tracing::{debug, instrument, warn};

use crate::mapping::{default_tolerance, match_pulses, median, rmse, ClockMapping};

/// Map view timestamps into the reference clock
pub fn correct(timestamps: &[f64], mapping: &ClockMapping) -> Vec<f64> {
    timestamps.iter().map(|&t| mapping.apply(t)).collect()
}

/// Reference-clock timestamp of every frame of a view
pub fn correct_timeline(frame_count: u64, frame_rate: f64, mapping: &ClockMapping) -> Vec<f64> {
    (0..frame_count)
        .map(|frame| mapping.apply(frame as f64 / frame_rate))
        .collect()
}

/// Outcome of the rate stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateCorrection {
    pub mapping: ClockMapping,
    /// Applied rate ratio; `None` when the mapping was left unchanged
    pub ratio: Option<f64>,
    /// Pulse pairs used
    pub pairs: usize,
    /// Residual RMSE under the corrected mapping (seconds)
    pub rmse: Option<f64>,
}

/// Sample-rate corrector
#[derive(Debug, Clone, Default)]
pub struct SampleRateCorrector {
    match_tolerance_ms: Option<f64>,
}

impl SampleRateCorrector {
    pub fn new(match_tolerance_ms: Option<f64>) -> Self {
        Self { match_tolerance_ms }
    }

    /// Correct the rate of `mapping` from matched pulse intervals
    ///
    /// Intervals span half the matched pairs, so frame quantization stays
    /// small against the baseline. Never fails: with fewer than two pairs
    /// the mapping is returned unchanged.
    #[instrument(
        level = "debug",
        name = "samplerate_refine",
        skip_all,
        fields(view = %target.view, slope = mapping.slope)
    )]
    pub fn refine(
        &self,
        reference: &ViewStream,
        target: &ViewStream,
        mapping: &ClockMapping,
    ) -> RateCorrection {
        let ref_times = reference.timestamps();
        let tolerance = self
            .match_tolerance_ms
            .map(|ms| ms / 1000.0)
            .unwrap_or_else(|| default_tolerance(&ref_times));
        let pairs = match_pulses(&ref_times, &target.timestamps(), mapping, tolerance);

        let unchanged = RateCorrection {
            mapping: *mapping,
            ratio: None,
            pairs: pairs.len(),
            rmse: None,
        };
        if pairs.len() < 2 {
            warn!(pairs = pairs.len(), "too few matched pulses, rate left unchanged");
            return unchanged;
        }

        let span = (pairs.len() / 2).max(1);
        let ratios: Vec<f64> = pairs
            .iter()
            .zip(pairs.iter().skip(span))
            .filter_map(|(a, b)| {
                let reference_gap = b.reference - a.reference;
                let view_gap = mapping.apply(b.view) - mapping.apply(a.view);
                (view_gap > 0.0).then(|| reference_gap / view_gap)
            })
            .collect();
        let Some(ratio) = median(&ratios).filter(|r| r.is_finite() && *r > 0.0) else {
            warn!(pairs = pairs.len(), "no usable intervals, rate left unchanged");
            return unchanged;
        };

        let slope = mapping.slope * ratio;
        let residuals: Vec<f64> = pairs.iter().map(|p| p.reference - slope * p.view).collect();
        let Some(intercept) = median(&residuals) else {
            return unchanged;
        };
        let corrected = ClockMapping::new(slope, intercept);
        let rmse = rmse(&pairs, &corrected);

        debug!(ratio, slope, intercept, rmse, pairs = pairs.len(), "rate corrected");
        RateCorrection {
            mapping: corrected,
            ratio: Some(ratio),
            pairs: pairs.len(),
            rmse: Some(rmse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PulseEvent;

    fn stream(view: &str, times: &[f64]) -> ViewStream {
        ViewStream {
            view: view.into(),
            events: times
                .iter()
                .map(|&t| PulseEvent {
                    view: view.into(),
                    frame_index: (t * 1000.0).round() as u64,
                    timestamp: t,
                })
                .collect(),
            frame_rate: 1000.0,
            frame_count: 100_000,
        }
    }

    fn reference_times() -> Vec<f64> {
        (0..30).map(|i| 1.0 + i as f64 * 0.9 + (i % 4) as f64 * 0.15).collect()
    }

    #[test]
    fn test_identity_mapping_is_identity() {
        let timestamps = [0.0, 0.01, 1.5, 3600.25];
        assert_eq!(correct(&timestamps, &ClockMapping::IDENTITY), timestamps);
    }

    #[test]
    fn test_timeline() {
        let timeline = correct_timeline(3, 100.0, &ClockMapping::new(2.0, 1.0));
        assert_eq!(timeline.len(), 3);
        assert!((timeline[0] - 1.0).abs() < 1e-12);
        assert!((timeline[2] - 1.04).abs() < 1e-12);
    }

    #[test]
    fn test_refine_recovers_rate() {
        let reference = reference_times();
        let target: Vec<f64> = reference.iter().map(|t| (t - 0.25) / 1.0002).collect();

        let correction = SampleRateCorrector::default().refine(
            &stream("BC", &reference),
            &stream("TL", &target),
            &ClockMapping::offset(0.25),
        );

        assert_eq!(correction.pairs, 30);
        assert!((correction.mapping.slope - 1.0002).abs() < 1e-9);
        assert!((correction.mapping.intercept - 0.25).abs() < 1e-9);
        assert!(correction.rmse.unwrap() < 1e-9);
    }

    #[test]
    fn test_refine_without_pairs_keeps_mapping() {
        let initial = ClockMapping::new(1.001, 0.5);
        let correction = SampleRateCorrector::default().refine(
            &stream("BC", &reference_times()),
            &stream("TL", &[100.0]),
            &initial,
        );
        assert_eq!(correction.mapping, initial);
        assert_eq!(correction.ratio, None);
    }
}
