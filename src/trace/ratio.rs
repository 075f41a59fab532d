//! Ratio building.
//!
//! The recorder alternates between two excitation wavelengths, so `raw` holds
//! channel A and channel B readings interleaved. We optionally subtract a
//! (smoothed) background, divide each A reading by the B reading right after
//! it, and take the midpoint of the two acquisition times as the ratio's time.

use serde::{Deserialize, Serialize};

use crate::domain::Trace;
use crate::error::AppError;
use crate::filter::SavitzkyGolay;

/// Background treatment applied before the ratio is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackgroundCorrection {
    /// Use `raw` as recorded.
    None,
    /// Subtract `background` element-wise.
    Subtract,
    /// Smooth each background channel separately, then subtract.
    SubtractSmoothed { window: usize, order: usize },
}

impl BackgroundCorrection {
    /// Map the `subtract_background` / `smooth_background` flag pair.
    pub fn from_flags(subtract: bool, smooth: bool, window: usize, order: usize) -> Self {
        match (subtract, smooth) {
            (false, _) => BackgroundCorrection::None,
            (true, false) => BackgroundCorrection::Subtract,
            (true, true) => BackgroundCorrection::SubtractSmoothed { window, order },
        }
    }
}

/// Compute `ratio` and `median_time` for a trace.
///
/// Any previously derived smoothing/orientation state is discarded.
pub fn build_ratio(trace: Trace, correction: BackgroundCorrection) -> Result<Trace, AppError> {
    let signal = corrected_signal(&trace, correction)?;

    let mut ratio = Vec::with_capacity(signal.len() / 2);
    for (i, pair) in signal.chunks_exact(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        if b == 0.0 {
            return Err(AppError::numeric(format!(
                "Division by zero building ratio for '{}' at row {}.",
                trace.label,
                2 * i + 1
            )));
        }
        let r = a / b;
        if !r.is_finite() {
            return Err(AppError::numeric(format!(
                "Non-finite ratio for '{}' at row {}.",
                trace.label,
                2 * i
            )));
        }
        ratio.push(r);
    }

    let median_time = trace
        .time
        .chunks_exact(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0)
        .collect();

    Ok(Trace {
        ratio,
        median_time,
        smoothed: Vec::new(),
        derivative: Vec::new(),
        orientation_verified: false,
        was_flipped: false,
        ..trace
    })
}

fn corrected_signal(trace: &Trace, correction: BackgroundCorrection) -> Result<Vec<f64>, AppError> {
    match correction {
        BackgroundCorrection::None => Ok(trace.raw.clone()),
        BackgroundCorrection::Subtract => Ok(subtract(&trace.raw, &trace.background)),
        BackgroundCorrection::SubtractSmoothed { window, order } => {
            let filter = SavitzkyGolay::new(window, order)?;
            let (bg_a, bg_b) = deinterleave(&trace.background);
            let smooth_a = filter.apply(&bg_a)?;
            let smooth_b = filter.apply(&bg_b)?;
            let background = interleave(&smooth_a, &smooth_b);
            Ok(subtract(&trace.raw, &background))
        }
    }
}

fn subtract(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Split `[a0, b0, a1, b1, …]` into `([a0, a1, …], [b0, b1, …])`.
pub fn deinterleave(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    values.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip()
}

/// Inverse of [`deinterleave`].
pub fn interleave(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).flat_map(|(x, y)| [*x, *y]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ratio_and_midpoint_time() {
        let trace = Trace::new(
            "c1",
            vec![0.0, 1.0, 2.0, 3.0],
            vec![10.0, 2.0, 20.0, 4.0],
            vec![1.0; 4],
        )
        .unwrap();
        let trace = build_ratio(trace, BackgroundCorrection::None).unwrap();
        assert_eq!(trace.ratio(), &[5.0, 5.0]);
        assert_eq!(trace.median_time(), &[0.5, 2.5]);
        assert!(!trace.orientation_verified());
    }

    #[test]
    fn raw_background_subtraction() {
        let trace = Trace::new(
            "c1",
            vec![0.0, 1.0, 2.0, 3.0],
            vec![11.0, 3.0, 21.0, 5.0],
            vec![1.0; 4],
        )
        .unwrap();
        let trace = build_ratio(trace, BackgroundCorrection::from_flags(true, false, 51, 3)).unwrap();
        assert_eq!(trace.ratio(), &[5.0, 5.0]);
    }

    #[test]
    fn smoothed_background_of_constant_channels_is_exact() {
        let n = 20;
        let time: Vec<f64> = (0..2 * n).map(|i| i as f64).collect();
        let background = interleave(&vec![2.0; n], &vec![1.0; n]);
        let raw = interleave(&vec![8.0; n], &vec![3.0; n]);
        let trace = Trace::new("c", time, raw, background).unwrap();

        let trace = build_ratio(
            trace,
            BackgroundCorrection::SubtractSmoothed { window: 5, order: 3 },
        )
        .unwrap();
        for r in trace.ratio() {
            assert!((r - 3.0).abs() < 1e-9, "{r}");
        }
    }

    #[test]
    fn background_window_longer_than_channel_is_a_contract_error() {
        let trace = Trace::new("c", vec![0.0, 1.0, 2.0, 3.0], vec![1.0; 4], vec![0.0; 4]).unwrap();
        let err = build_ratio(
            trace,
            BackgroundCorrection::SubtractSmoothed { window: 51, order: 3 },
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Contract);
    }

    #[test]
    fn zero_denominator_is_numeric_error() {
        let trace = Trace::new("c", vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0; 2]).unwrap();
        let err = build_ratio(trace, BackgroundCorrection::None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Numeric);
    }

    #[test]
    fn interleave_round_trip() {
        let (a, b) = deinterleave(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a, vec![1.0, 3.0]);
        assert_eq!(b, vec![2.0, 4.0]);
        assert_eq!(interleave(&a, &b), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
