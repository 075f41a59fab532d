//! Synthetic two-channel calcium recordings.
//!
//! Each cycle is a linear rise over `rise_samples` ratio points followed by a
//! first-order decay back toward `baseline` with rate `k`:
//!
//! ```text
//! r(t) = baseline + (peak - baseline) · exp(-k · (t - t_peak))
//! ```
//!
//! The ratio is encoded into two interleaved channels (`A = r · scale`,
//! `B = scale`) plus a constant background and optional Gaussian noise, so the
//! full pipeline, including background subtraction and channel-swap detection,
//! can be exercised against known parameters.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::TraceInput;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub label: String,
    pub cycles: usize,
    /// Ratio points per rise/decay cycle.
    pub period: usize,
    pub rise_samples: usize,
    pub baseline: f64,
    pub peak: f64,
    /// Decay rate constant (per time unit).
    pub k: f64,
    /// Time between consecutive ratio points.
    pub sample_interval: f64,
    /// Channel B level; channel A is `ratio · channel_scale`.
    pub channel_scale: f64,
    /// Constant background added to both channels.
    pub background: f64,
    /// Standard deviation of Gaussian noise added to every channel reading.
    pub noise_sd: f64,
    pub seed: u64,
    /// Record channel B before channel A (inverts the raw ratio).
    pub swapped: bool,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            label: "synthetic".to_string(),
            cycles: 6,
            period: 60,
            rise_samples: 4,
            baseline: 1.0,
            peak: 2.0,
            k: 0.1,
            sample_interval: 1.0,
            channel_scale: 100.0,
            background: 0.0,
            noise_sd: 0.0,
            seed: 42,
            swapped: false,
        }
    }
}

/// The noise-free, correctly oriented ratio for `spec`.
pub fn ideal_ratio(spec: &SyntheticSpec) -> Vec<f64> {
    let amplitude = spec.peak - spec.baseline;
    let mut out = Vec::with_capacity(spec.cycles * spec.period);
    for _ in 0..spec.cycles {
        for j in 0..spec.period {
            let value = if j < spec.rise_samples {
                spec.baseline + amplitude * j as f64 / spec.rise_samples as f64
            } else {
                let dt = (j - spec.rise_samples) as f64 * spec.sample_interval;
                spec.baseline + amplitude * (-spec.k * dt).exp()
            };
            out.push(value);
        }
    }
    out
}

/// Generate an interleaved recording for `spec`.
pub fn generate_trace(spec: &SyntheticSpec) -> Result<TraceInput, AppError> {
    if spec.cycles == 0 || spec.rise_samples == 0 || spec.period <= spec.rise_samples {
        return Err(AppError::contract(
            "Synthetic trace needs at least one cycle and period > rise_samples > 0.",
        ));
    }
    if !(spec.sample_interval.is_finite() && spec.sample_interval > 0.0) {
        return Err(AppError::contract("Synthetic sample interval must be finite and > 0."));
    }
    if !(spec.channel_scale.is_finite() && spec.channel_scale > 0.0) {
        return Err(AppError::contract("Synthetic channel scale must be finite and > 0."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| AppError::contract(format!("Noise distribution error: {e}")))?;

    let ratio = ideal_ratio(spec);
    let n = ratio.len();
    let mut time = Vec::with_capacity(2 * n);
    let mut raw = Vec::with_capacity(2 * n);
    let mut background = Vec::with_capacity(2 * n);

    for (i, r) in ratio.iter().enumerate() {
        let t = i as f64 * spec.sample_interval;
        time.push(t);
        time.push(t + spec.sample_interval / 2.0);

        let a = r * spec.channel_scale + spec.background + normal.sample(&mut rng);
        let b = spec.channel_scale + spec.background + normal.sample(&mut rng);
        if spec.swapped {
            raw.extend([b, a]);
        } else {
            raw.extend([a, b]);
        }
        background.extend([spec.background, spec.background]);
    }

    Ok(TraceInput {
        label: spec.label.clone(),
        time,
        raw,
        background,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideal_ratio_shape() {
        let spec = SyntheticSpec::default();
        let r = ideal_ratio(&spec);
        assert_eq!(r.len(), 360);
        assert_eq!(r[0], 1.0);
        assert_eq!(r[4], 2.0);
        assert!(r[59] < 1.01);
        assert_eq!(r[60], 1.0);
    }

    #[test]
    fn generated_channels_are_interleaved() {
        let spec = SyntheticSpec {
            background: 5.0,
            ..SyntheticSpec::default()
        };
        let input = generate_trace(&spec).unwrap();
        assert_eq!(input.raw.len(), 720);
        assert_eq!(input.time.len(), 720);
        assert_eq!(input.raw[8], 205.0);
        assert_eq!(input.raw[9], 105.0);
        assert_eq!(input.time[1], 0.5);

        let swapped = generate_trace(&SyntheticSpec {
            swapped: true,
            ..spec
        })
        .unwrap();
        assert_eq!(swapped.raw[8], 105.0);
        assert_eq!(swapped.raw[9], 205.0);
    }

    #[test]
    fn same_seed_same_noise() {
        let spec = SyntheticSpec {
            noise_sd: 0.5,
            ..SyntheticSpec::default()
        };
        let a = generate_trace(&spec).unwrap();
        let b = generate_trace(&spec).unwrap();
        assert_eq!(a.raw, b.raw);
    }

    #[test]
    fn rejects_bad_shape() {
        let spec = SyntheticSpec {
            period: 4,
            ..SyntheticSpec::default()
        };
        assert!(generate_trace(&spec).is_err());
    }
}
