//! Synthetic LED pulse trains
//!
//! Used for tests, demos and dry runs without recorded data.

use std::sync::Arc;
use std::time::Instant;

use contracts::{ContractError, SignalKind, SignalSource, SyncSignal, SyntheticParams, ViewId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

const DARK_LEVEL: f64 = 30.0;
const LIT_LEVEL: f64 = 230.0;

/// Pulse onsets in the reference clock, up to `horizon` seconds
///
/// Depends only on the seed and interval parameters, so every view that
/// shares them sees the same prefix.
pub fn pulse_onsets(params: &SyntheticParams, horizon: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut onsets = Vec::new();
    let mut t = params.mean_interval_s;
    while t < horizon {
        onsets.push(t);
        let jitter = if params.jitter_s > 0.0 {
            rng.random_range(-params.jitter_s..params.jitter_s)
        } else {
            0.0
        };
        t += params.mean_interval_s + jitter;
    }
    onsets
}

/// Generate one view's samples for `params` at `sample_rate`
pub fn generate(
    view: &ViewId,
    params: &SyntheticParams,
    sample_rate: f64,
    kind: SignalKind,
) -> Result<Vec<f64>> {
    check_params(view, params, sample_rate)?;

    let scale = 1.0 + params.drift_ppm * 1e-6;
    let horizon = scale * params.duration_s + params.offset_s.max(0.0) + params.mean_interval_s;
    let onsets: Vec<f64> = pulse_onsets(params, horizon)
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !params.dropped_pulses.contains(idx))
        .map(|(_, t)| t)
        .collect();

    let (dark, lit) = match kind {
        SignalKind::Brightness => (DARK_LEVEL, LIT_LEVEL),
        SignalKind::Analog => (0.0, 1.0),
    };

    let noise_seed = params.noise_seed.unwrap_or(params.seed.wrapping_add(1));
    let mut noise_rng = StdRng::seed_from_u64(noise_seed);
    let count = (params.duration_s * sample_rate).round() as usize;
    let mut samples = Vec::with_capacity(count);
    let mut next = 0;

    for i in 0..count {
        let t_ref = scale * (i as f64 / sample_rate) + params.offset_s;
        while next < onsets.len() && onsets[next] + params.pulse_width_s <= t_ref {
            next += 1;
        }
        let on = next < onsets.len() && onsets[next] <= t_ref;
        let mut value = if on { lit } else { dark };
        if params.noise > 0.0 {
            value += noise_rng.random_range(-params.noise..params.noise);
        }
        samples.push(value);
    }
    Ok(samples)
}

fn check_params(view: &ViewId, params: &SyntheticParams, sample_rate: f64) -> Result<()> {
    let invalid = |message: &str| {
        Err(IngestionError::InvalidParams {
            view: view.clone(),
            message: message.to_string(),
        })
    };

    if !(sample_rate > 0.0) {
        return invalid("sample rate must be > 0");
    }
    if !(params.duration_s > 0.0) {
        return invalid("duration_s must be > 0");
    }
    if !(params.pulse_width_s > 0.0) {
        return invalid("pulse_width_s must be > 0");
    }
    if params.jitter_s < 0.0 || params.noise < 0.0 {
        return invalid("jitter_s and noise must be >= 0");
    }
    // consecutive pulses must never overlap
    if params.mean_interval_s - params.jitter_s <= params.pulse_width_s {
        return invalid("mean_interval_s - jitter_s must exceed pulse_width_s");
    }
    Ok(())
}

/// Source generating a synthetic LED train for one view
pub struct SyntheticLedSource {
    view: ViewId,
    params: SyntheticParams,
    sample_rate: f64,
    kind: SignalKind,
    metrics: Arc<IngestionMetrics>,
}

impl SyntheticLedSource {
    pub fn new(
        view: ViewId,
        params: SyntheticParams,
        sample_rate: f64,
        kind: SignalKind,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            view,
            params,
            sample_rate,
            kind,
            metrics,
        }
    }

    /// Parameters of the train
    pub fn params(&self) -> &SyntheticParams {
        &self.params
    }
}

impl SignalSource for SyntheticLedSource {
    fn view_id(&self) -> &ViewId {
        &self.view
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn signal_kind(&self) -> SignalKind {
        self.kind
    }

    #[instrument(name = "synthetic_load", skip(self), fields(view = %self.view, seed = self.params.seed))]
    fn load_signal(&self) -> std::result::Result<SyncSignal, ContractError> {
        let started = Instant::now();
        let samples = generate(&self.view, &self.params, self.sample_rate, self.kind)
            .inspect_err(|_| self.metrics.record_error(&self.view))?;

        debug!(
            samples = samples.len(),
            offset_s = self.params.offset_s,
            drift_ppm = self.params.drift_ppm,
            "synthetic LED train generated"
        );
        self.metrics
            .record_loaded(&self.view, self.kind, samples.len(), started.elapsed());
        Ok(SyncSignal {
            samples,
            sample_rate: self.sample_rate,
            kind: self.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SyntheticParams {
        SyntheticParams {
            duration_s: 10.0,
            mean_interval_s: 1.0,
            jitter_s: 0.2,
            pulse_width_s: 0.05,
            seed: 11,
            ..Default::default()
        }
    }

    fn rising_edges(samples: &[f64], threshold: f64) -> Vec<usize> {
        (1..samples.len())
            .filter(|&i| samples[i] > threshold && samples[i - 1] <= threshold)
            .collect()
    }

    #[test]
    fn test_same_seed_same_train() {
        let a = pulse_onsets(&params(), 20.0);
        let b = pulse_onsets(&params(), 30.0);
        assert_eq!(a[..], b[..a.len()]);
        assert!(b.len() > a.len());
    }

    #[test]
    fn test_levels_and_pulse_count() {
        let samples = generate(&"BC".into(), &params(), 100.0, SignalKind::Brightness).unwrap();
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().all(|&v| v == DARK_LEVEL || v == LIT_LEVEL));

        // last sample sits at 9.99s
        let expected = pulse_onsets(&params(), 10.0)
            .into_iter()
            .filter(|&t| t <= 9.99)
            .count();
        assert_eq!(rising_edges(&samples, 100.0).len(), expected);
    }

    #[test]
    fn test_offset_shifts_onsets() {
        let base = generate(&"BC".into(), &params(), 100.0, SignalKind::Analog).unwrap();
        let shifted_params = SyntheticParams {
            offset_s: 0.3,
            ..params()
        };
        let shifted = generate(&"TL".into(), &shifted_params, 100.0, SignalKind::Analog).unwrap();

        // t_ref = t_view + 0.3: the view sees every pulse 30 frames earlier
        let a = rising_edges(&base, 0.5);
        let b = rising_edges(&shifted, 0.5);
        assert_eq!(a[1] - 30, b[1]);
    }

    #[test]
    fn test_dropped_pulses() {
        let dropped = SyntheticParams {
            dropped_pulses: vec![0, 1],
            ..params()
        };
        let full = generate(&"BC".into(), &params(), 100.0, SignalKind::Analog).unwrap();
        let partial = generate(&"BC".into(), &dropped, 100.0, SignalKind::Analog).unwrap();
        assert_eq!(
            rising_edges(&full, 0.5).len(),
            rising_edges(&partial, 0.5).len() + 2
        );
    }

    #[test]
    fn test_max_seed_noise_wraps() {
        let noisy = SyntheticParams {
            noise: 5.0,
            seed: u64::MAX,
            ..params()
        };
        let wrapped = generate(&"BC".into(), &noisy, 100.0, SignalKind::Brightness).unwrap();
        let explicit = SyntheticParams {
            noise_seed: Some(0),
            ..noisy.clone()
        };
        let expected = generate(&"BC".into(), &explicit, 100.0, SignalKind::Brightness).unwrap();
        assert_eq!(wrapped, expected);
    }

    #[test]
    fn test_overlapping_pulses_rejected() {
        let bad = SyntheticParams {
            mean_interval_s: 0.1,
            jitter_s: 0.08,
            ..params()
        };
        assert!(matches!(
            generate(&"BC".into(), &bad, 100.0, SignalKind::Analog),
            Err(IngestionError::InvalidParams { .. })
        ));
    }
}
