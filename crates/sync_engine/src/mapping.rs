//! Linear clock mapping and pulse pairing shared by the aligners.

use tracing::trace;

/// `t_ref = slope * t_view + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockMapping {
    pub slope: f64,
    pub intercept: f64,
}

impl ClockMapping {
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        intercept: 0.0,
    };

    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Pure offset, no rate change
    pub fn offset(intercept: f64) -> Self {
        Self {
            slope: 1.0,
            intercept,
        }
    }

    /// Map a view timestamp into the reference clock
    #[inline]
    pub fn apply(&self, t_view: f64) -> f64 {
        self.slope * t_view + self.intercept
    }
}

impl Default for ClockMapping {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A target pulse matched to a reference pulse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulsePair {
    /// Onset in the target view's own clock
    pub view: f64,
    /// Onset in the reference clock
    pub reference: f64,
}

/// Match every target pulse to the nearest unused reference pulse
///
/// Target times are mapped with `mapping` first; a pair is kept only when
/// the mapped time lies within `tolerance` seconds of the reference pulse.
/// Both slices must be sorted ascending.
pub fn match_pulses(
    reference: &[f64],
    target: &[f64],
    mapping: &ClockMapping,
    tolerance: f64,
) -> Vec<PulsePair> {
    let mut used = vec![false; reference.len()];
    let mut pairs = Vec::with_capacity(target.len().min(reference.len()));

    for &t_view in target {
        let mapped = mapping.apply(t_view);
        let idx = reference.partition_point(|&r| r < mapped);

        let best = [idx.checked_sub(1), Some(idx)]
            .into_iter()
            .flatten()
            .filter(|&i| i < reference.len() && !used[i])
            .map(|i| (i, (reference[i] - mapped).abs()))
            .filter(|&(_, distance)| distance <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((i, _)) = best {
            used[i] = true;
            pairs.push(PulsePair {
                view: t_view,
                reference: reference[i],
            });
        }
    }

    trace!(
        reference = reference.len(),
        target = target.len(),
        matched = pairs.len(),
        "pulses matched"
    );
    pairs
}

/// Default pairing tolerance: half the median reference inter-pulse interval
pub fn default_tolerance(reference: &[f64]) -> f64 {
    let gaps: Vec<f64> = reference.windows(2).map(|w| w[1] - w[0]).collect();
    median(&gaps).map(|gap| gap / 2.0).unwrap_or(0.0)
}

/// Residual RMSE of `pairs` under `mapping` (seconds)
pub fn rmse(pairs: &[PulsePair], mapping: &ClockMapping) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let sum: f64 = pairs
        .iter()
        .map(|p| (p.reference - mapping.apply(p.view)).powi(2))
        .sum();
    (sum / pairs.len() as f64).sqrt()
}

/// Median of `values`; `None` when empty
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
