//! LED pulse onset detection.
//!
//! Brightness signals are normalized to [0, 1] against a robust baseline
//! and peak before thresholding; analog channels are thresholded raw.

use contracts::{DetectorConfig, PulseEvent, SignalKind, SyncError, SyncSignal, ViewId, ViewStream};
use tracing::{debug, instrument};

/// Histogram resolution used to find the dark baseline
const BASELINE_BINS: usize = 100;

/// Intensity units above baseline before a sample counts as lit
const LIT_MARGIN: f64 = 2.0;

/// Pulse detector
#[derive(Debug, Clone, Default)]
pub struct PulseDetector {
    config: DetectorConfig,
}

impl PulseDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Threshold used for `kind` when no per-view override exists
    pub fn default_threshold(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Brightness => self.config.led_threshold,
            SignalKind::Analog => self.config.analog_threshold,
        }
    }

    /// Detect pulse onsets in `signal`
    ///
    /// Fails with `InsufficientSyncSignal` when fewer than two onsets are
    /// found.
    #[instrument(
        level = "debug",
        name = "pulse_detect",
        skip(self, signal),
        fields(view = %view, samples = signal.samples.len(), kind = ?signal.kind)
    )]
    pub fn detect(
        &self,
        view: &ViewId,
        signal: &SyncSignal,
        threshold: Option<f64>,
    ) -> Result<ViewStream, SyncError> {
        let threshold = threshold.unwrap_or_else(|| self.default_threshold(signal.kind));
        let min_off = min_off_samples(self.config.min_off_ms, signal.sample_rate);

        let onsets = match signal.kind {
            SignalKind::Brightness => {
                detect_onsets(&normalize_brightness(&signal.samples), threshold, min_off)
            }
            SignalKind::Analog => detect_onsets(&signal.samples, threshold, min_off),
        };

        debug!(threshold, min_off, pulses = onsets.len(), "onsets detected");
        observability::record_pulses_detected(view, onsets.len());

        if onsets.len() < 2 {
            return Err(SyncError::InsufficientSyncSignal {
                view: view.clone(),
                detected: onsets.len(),
            });
        }

        Ok(ViewStream {
            view: view.clone(),
            events: onsets
                .into_iter()
                .map(|idx| PulseEvent::new(view.clone(), idx, signal.sample_rate))
                .collect(),
            frame_rate: signal.sample_rate,
            frame_count: signal.samples.len() as u64,
        })
    }
}

/// LED-off period in samples, never below one
pub fn min_off_samples(min_off_ms: f64, sample_rate: f64) -> usize {
    let samples = (min_off_ms * sample_rate / 1000.0).ceil();
    if samples.is_finite() && samples > 1.0 {
        samples as usize
    } else {
        1
    }
}

/// Indices where `values` rise above `threshold` after at least `min_off`
/// samples at or below it
///
/// A signal that starts above threshold yields no onset at index 0.
pub fn detect_onsets(values: &[f64], threshold: f64, min_off: usize) -> Vec<u64> {
    let mut onsets = Vec::new();
    let mut off_run = 0usize;

    for (idx, &value) in values.iter().enumerate() {
        if value > threshold {
            if off_run >= min_off {
                onsets.push(idx as u64);
            }
            off_run = 0;
        } else {
            off_run += 1;
        }
    }
    onsets
}

/// Normalize a brightness trace to [0, 1]
///
/// Baseline is the upper edge of the modal histogram bin (the LED is dark
/// most of the time). Peak is the 90th percentile of the brightest quarter
/// of lit samples, so a few saturated frames do not compress the rest.
pub fn normalize_brightness(samples: &[f64]) -> Vec<f64> {
    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if samples.is_empty() || !(max - min > f64::EPSILON) {
        return vec![0.0; samples.len()];
    }

    let width = (max - min) / BASELINE_BINS as f64;
    let mut counts = [0usize; BASELINE_BINS];
    for &v in samples {
        let bin = (((v - min) / width) as usize).min(BASELINE_BINS - 1);
        counts[bin] += 1;
    }
    let mode = counts
        .iter()
        .enumerate()
        .fold(0, |best, (bin, &count)| if count > counts[best] { bin } else { best });
    let baseline = min + (mode + 1) as f64 * width;

    let shifted: Vec<f64> = samples.iter().map(|&v| v - baseline).collect();
    let mut lit: Vec<f64> = shifted.iter().copied().filter(|&v| v > LIT_MARGIN).collect();

    let peak = if lit.is_empty() {
        shifted.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    } else {
        lit.sort_by(f64::total_cmp);
        let q75 = percentile(&lit, 75.0);
        let upper: Vec<f64> = lit.into_iter().filter(|&v| v >= q75).collect();
        percentile(&upper, 90.0)
    };

    if !(peak > 0.0) {
        return vec![0.0; samples.len()];
    }
    shifted.iter().map(|&v| (v / peak).clamp(0.0, 1.0)).collect()
}

/// Linear-interpolated percentile of an ascending, non-empty slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let pos = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark at 30, lit at 230 for `width` samples from each onset
    fn led_trace(len: usize, onsets: &[usize], width: usize) -> Vec<f64> {
        let mut samples = vec![30.0; len];
        for &start in onsets {
            for v in samples.iter_mut().skip(start).take(width) {
                *v = 230.0;
            }
        }
        samples
    }

    fn signal(samples: Vec<f64>, kind: SignalKind) -> SyncSignal {
        SyncSignal {
            samples,
            sample_rate: 100.0,
            kind,
        }
    }

    #[test]
    fn test_normalize_dark_and_lit() {
        let normalized = normalize_brightness(&led_trace(200, &[50, 150], 5));
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[52], 1.0);
        assert!(normalized.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_normalize_flat_signal_is_zero() {
        assert!(normalize_brightness(&[42.0; 10]).iter().all(|&v| v == 0.0));
        assert!(normalize_brightness(&[]).is_empty());
    }

    #[test]
    fn test_normalize_ignores_saturated_outlier() {
        let mut samples = led_trace(400, &[50, 150, 250, 350], 10);
        samples[55] = 2000.0;
        let normalized = normalize_brightness(&samples);
        // regular lit frames still reach full scale
        assert_eq!(normalized[155], 1.0);
    }

    #[test]
    fn test_onsets_need_off_period() {
        let values = [0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        assert_eq!(detect_onsets(&values, 0.5, 1), vec![1, 4, 8]);
        assert_eq!(detect_onsets(&values, 0.5, 2), vec![8]);
    }

    #[test]
    fn test_no_onset_at_first_sample() {
        let values = [1.0, 1.0, 0.0, 1.0];
        assert_eq!(detect_onsets(&values, 0.5, 1), vec![3]);
    }

    #[test]
    fn test_min_off_samples() {
        assert_eq!(min_off_samples(0.0, 100.0), 1);
        assert_eq!(min_off_samples(50.0, 100.0), 5);
        assert_eq!(min_off_samples(25.0, 100.0), 3);
    }

    #[test]
    fn test_detect_brightness_stream() {
        let detector = PulseDetector::default();
        let stream = detector
            .detect(
                &"BC".into(),
                &signal(led_trace(300, &[20, 120, 220], 4), SignalKind::Brightness),
                None,
            )
            .unwrap();

        let frames: Vec<u64> = stream.events.iter().map(|e| e.frame_index).collect();
        assert_eq!(frames, vec![20, 120, 220]);
        assert_eq!(stream.frame_count, 300);
        assert!((stream.events[1].timestamp - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_default_off_period_ignores_edge_chatter() {
        // 20 ms pulses at 1 kHz whose rising edge dips for one sample
        let mut samples = vec![0.0; 1000];
        for start in [100, 600] {
            for v in samples.iter_mut().skip(start).take(20) {
                *v = 1.0;
            }
            samples[start + 1] = 0.0;
        }
        let signal = SyncSignal {
            samples,
            sample_rate: 1000.0,
            kind: SignalKind::Analog,
        };

        let stream = PulseDetector::default()
            .detect(&"ephys".into(), &signal, None)
            .unwrap();
        let frames: Vec<u64> = stream.events.iter().map(|e| e.frame_index).collect();
        assert_eq!(frames, vec![100, 600]);

        let chattering = PulseDetector::new(DetectorConfig {
            min_off_ms: 0.0,
            ..DetectorConfig::default()
        })
        .detect(&"ephys".into(), &signal, None)
        .unwrap();
        assert_eq!(chattering.len(), 4);
    }

    #[test]
    fn test_detect_analog_uses_absolute_threshold() {
        let mut samples = vec![0.0; 100];
        samples[10] = 0.2;
        samples[40] = 0.05;
        samples[70] = 3.0;
        let detector = PulseDetector::default();
        let stream = detector
            .detect(&"ephys".into(), &signal(samples, SignalKind::Analog), None)
            .unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream.events[1].frame_index, 70);
    }

    #[test]
    fn test_threshold_override() {
        let mut samples = vec![0.0; 100];
        samples[10] = 0.2;
        samples[70] = 3.0;
        let detector = PulseDetector::default();
        let err = detector
            .detect(&"ephys".into(), &signal(samples, SignalKind::Analog), Some(1.0))
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::InsufficientSyncSignal {
                view: "ephys".into(),
                detected: 1
            }
        );
    }

    #[test]
    fn test_dark_view_is_insufficient() {
        let detector = PulseDetector::default();
        let err = detector
            .detect(&"TL".into(), &signal(vec![30.0; 500], SignalKind::Brightness), None)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::InsufficientSyncSignal { detected: 0, .. }
        ));
    }
}
