//! Coarse alignment by cross-correlating onset indicator trains.
//!
//! Both onset trains are projected onto the coarser of the two frame grids.
//! The correlation of two indicator trains at lag `d` is the number of
//! onset pairs `(r, t)` with `r - t = d`, so the lag histogram of all pairs
//! is the full cross-correlation without materializing the signals.
//!
//! The histogram is a dense vector over the reachable lag span, so memory is
//! linear in recording length (grid frames) and time is linear in the number
//! of onset pairs.

use std::ops::RangeInclusive;

use contracts::{CrossCorrConfig, SyncError, ViewStream};
use tracing::{debug, instrument};

use crate::mapping::ClockMapping;

/// Result of the coarse stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoarseAlignment {
    /// Best lag in frames of the projection grid
    pub lag_frames: i64,
    /// Rate of the projection grid (Hz)
    pub grid_rate: f64,
    /// Onset pairs supporting the peak (within one grid frame)
    pub peak: usize,
    /// `t_ref = t_view + lag / grid_rate`
    pub mapping: ClockMapping,
}

/// Cross-correlation aligner
#[derive(Debug, Clone, Default)]
pub struct CrossCorrAligner {
    config: CrossCorrConfig,
}

impl CrossCorrAligner {
    pub fn new(config: CrossCorrConfig) -> Self {
        Self { config }
    }

    /// Find the frame lag that best lines `target` up with `reference`
    ///
    /// Equal peaks resolve to the smallest absolute lag, then to the
    /// negative one.
    #[instrument(
        level = "debug",
        name = "crosscorr_align",
        skip_all,
        fields(view = %target.view, reference = reference.len(), target = target.len())
    )]
    pub fn align(
        &self,
        reference: &ViewStream,
        target: &ViewStream,
    ) -> Result<CoarseAlignment, SyncError> {
        let grid_rate = reference.frame_rate.min(target.frame_rate);
        let project = |stream: &ViewStream| -> Vec<i64> {
            stream
                .events
                .iter()
                .map(|e| (e.timestamp * grid_rate).round() as i64)
                .collect()
        };
        let ref_idx = project(reference);
        let target_idx = project(target);

        let max_lag = self
            .config
            .max_lag_frames
            .map(|frames| (frames as f64 * grid_rate / reference.frame_rate).ceil() as i64);

        let pulses = ref_idx.len().min(target_idx.len());
        let floor = (self.config.min_correlation_ratio * pulses as f64).max(2.0);
        let no_peak = |peak: usize| SyncError::NoCorrelationPeak {
            view: target.view.clone(),
            peak,
            floor,
        };

        let span = lag_span(&ref_idx, &target_idx, max_lag).ok_or_else(|| no_peak(0))?;
        let lo = *span.start();
        let mut counts = vec![0usize; (span.end() - lo + 1) as usize];
        for &r in &ref_idx {
            for &t in &target_idx {
                let lag = r - t;
                if span.contains(&lag) {
                    counts[(lag - lo) as usize] += 1;
                }
            }
        }
        let count_at = |d: i64| {
            if span.contains(&d) {
                counts[(d - lo) as usize]
            } else {
                0
            }
        };

        let lag = span
            .clone()
            .filter(|&d| count_at(d) > 0)
            .max_by(|&a, &b| {
                count_at(a)
                    .cmp(&count_at(b))
                    .then_with(|| b.abs().cmp(&a.abs()))
                    .then_with(|| b.cmp(&a))
            })
            .ok_or_else(|| no_peak(0))?;

        // sub-frame offsets and drift split a true peak across neighbours
        let peak = ((lag - 1)..=(lag + 1))
            .map(count_at)
            .sum::<usize>()
            .min(pulses);

        debug!(lag, grid_rate, peak, floor, "correlation peak");

        if (peak as f64) < floor {
            return Err(no_peak(peak));
        }

        Ok(CoarseAlignment {
            lag_frames: lag,
            grid_rate,
            peak,
            mapping: ClockMapping::offset(lag as f64 / grid_rate),
        })
    }
}

/// Lags reachable by some onset pair, clipped to `±max_lag`
fn lag_span(
    reference: &[i64],
    target: &[i64],
    max_lag: Option<i64>,
) -> Option<RangeInclusive<i64>> {
    let (r_min, r_max) = (reference.iter().min()?, reference.iter().max()?);
    let (t_min, t_max) = (target.iter().min()?, target.iter().max()?);
    let mut lo = r_min - t_max;
    let mut hi = r_max - t_min;
    if let Some(max) = max_lag {
        lo = lo.max(-max);
        hi = hi.min(max);
    }
    (lo <= hi).then_some(lo..=hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PulseEvent;

    fn stream(view: &str, frames: &[u64], rate: f64) -> ViewStream {
        ViewStream {
            view: view.into(),
            events: frames
                .iter()
                .map(|&f| PulseEvent::new(view.into(), f, rate))
                .collect(),
            frame_rate: rate,
            frame_count: frames.last().copied().unwrap_or(0) + 100,
        }
    }

    /// Irregular onset frames, as produced by a jittered LED
    const ONSETS: [u64; 10] = [87, 201, 268, 390, 455, 589, 640, 777, 845, 981];

    #[test]
    fn test_recovers_integer_offset() {
        let reference = stream("BC", &ONSETS, 100.0);
        let shifted: Vec<u64> = ONSETS.iter().filter(|&&f| f >= 25).map(|f| f - 25).collect();
        let target = stream("TL", &shifted, 100.0);

        let coarse = CrossCorrAligner::default().align(&reference, &target).unwrap();
        assert_eq!(coarse.lag_frames, 25);
        assert_eq!(coarse.peak, 10);
        assert!((coarse.mapping.intercept - 0.25).abs() < 1e-12);
        assert_eq!(coarse.mapping.slope, 1.0);
    }

    #[test]
    fn test_negative_offset() {
        let reference = stream("BC", &ONSETS, 100.0);
        let shifted: Vec<u64> = ONSETS.iter().map(|f| f + 40).collect();
        let target = stream("TL", &shifted, 100.0);

        let coarse = CrossCorrAligner::default().align(&reference, &target).unwrap();
        assert_eq!(coarse.lag_frames, -40);
    }

    #[test]
    fn test_tie_prefers_smaller_then_negative_lag() {
        let reference = stream("BC", &[100, 200, 300, 400], 100.0);
        let target = stream("TL", &[150, 250, 350], 100.0);

        let coarse = CrossCorrAligner::default().align(&reference, &target).unwrap();
        assert_eq!(coarse.lag_frames, -50);
    }

    #[test]
    fn test_no_peak_above_floor() {
        let reference = stream("BC", &[10, 500, 1300], 100.0);
        let target = stream("TL", &[77, 900], 100.0);

        let err = CrossCorrAligner::default().align(&reference, &target).unwrap_err();
        assert!(matches!(err, SyncError::NoCorrelationPeak { peak: 1, .. }));
    }

    #[test]
    fn test_max_lag_bounds_search() {
        let reference = stream("BC", &ONSETS, 100.0);
        let shifted: Vec<u64> = ONSETS.iter().map(|f| f + 40).collect();
        let target = stream("TL", &shifted, 100.0);

        let aligner = CrossCorrAligner::new(CrossCorrConfig {
            max_lag_frames: Some(20),
            ..Default::default()
        });
        assert!(matches!(
            aligner.align(&reference, &target),
            Err(SyncError::NoCorrelationPeak { .. })
        ));
    }

    #[test]
    fn test_mixed_rates_use_coarser_grid() {
        let reference = stream("BC", &ONSETS, 100.0);
        // 1 kHz channel lagging the reference by 253 ms
        let analog: Vec<u64> = ONSETS.iter().map(|f| f * 10 - 253).collect();
        let target = stream("ephys", &analog, 1000.0);

        let coarse = CrossCorrAligner::default().align(&reference, &target).unwrap();
        assert_eq!(coarse.grid_rate, 100.0);
        assert!((coarse.mapping.intercept - 0.25).abs() <= 0.01);
    }

    #[test]
    fn test_lag_span_bounds_histogram() {
        // one hour at 100 Hz, one pulse per second
        let reference: Vec<i64> = (0..3600).map(|i| i * 100).collect();
        let target: Vec<i64> = reference.iter().map(|r| r + 7).collect();

        let span = lag_span(&reference, &target, None).unwrap();
        assert_eq!(span, -359_907..=359_893);
        assert_eq!(lag_span(&reference, &target, Some(50)), Some(-50..=50));
        assert_eq!(lag_span(&[0, 10], &[500], Some(20)), None);
        assert_eq!(lag_span(&[], &target, None), None);
    }
}
