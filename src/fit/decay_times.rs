//! Threshold-crossing decay durations.
//!
//! Measured on the smoothed copy of a tracelet: `T10` is the span of points that
//! stay above 90% of the fall height, `T50` above 50%, `T90` above 10%. The fall
//! height runs from the segment maximum down to its last value.

use crate::domain::{DecayTimes, Tracelet};
use crate::math::max_value;

/// Compute decay durations for `(x, smoothed)`.
///
/// Returns `None` when the segment is empty or any threshold has no point above it.
pub fn decay_times(x: &[f64], smoothed: &[f64]) -> Option<DecayTimes> {
    if x.len() != smoothed.len() || x.is_empty() {
        return None;
    }
    let top = max_value(smoothed)?;
    let floor = smoothed[smoothed.len() - 1];

    let span_above = |fraction: f64| -> Option<f64> {
        let level = fraction * (top - floor) + floor;
        let mut above = x
            .iter()
            .zip(smoothed)
            .filter(|&(_, &s)| s > level)
            .map(|(&xi, _)| xi);
        let first = above.next()?;
        let last = above.last().unwrap_or(first);
        Some(last - first)
    };

    Some(DecayTimes {
        t10: span_above(0.9)?,
        t50: span_above(0.5)?,
        t90: span_above(0.1)?,
        t100: x[x.len() - 1] - x[0],
    })
}

impl Tracelet {
    pub fn decay_times(&self) -> Option<DecayTimes> {
        decay_times(&self.x, &self.smoothed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fall_thresholds() {
        // 10 → 0 in unit steps.
        let x: Vec<f64> = (0..=10).map(f64::from).collect();
        let s: Vec<f64> = (0..=10).rev().map(f64::from).collect();
        let t = decay_times(&x, &s).unwrap();
        // Above 9: only x = 0.
        assert_eq!(t.t10, 0.0);
        // Above 5: x = 0..=4.
        assert_eq!(t.t50, 4.0);
        // Above 1: x = 0..=8.
        assert_eq!(t.t90, 8.0);
        assert_eq!(t.t100, 10.0);
    }

    #[test]
    fn flat_segment_has_no_decay_times() {
        let x = [0.0, 1.0, 2.0];
        assert!(decay_times(&x, &[1.0; 3]).is_none());
        assert!(decay_times(&[], &[]).is_none());
    }

    #[test]
    fn tracelet_uses_smoothed_copy() {
        let x: Vec<f64> = (0..=10).map(f64::from).collect();
        let s: Vec<f64> = (0..=10).rev().map(f64::from).collect();
        let t = Tracelet::new(3, 14, x, vec![0.0; 11], s).unwrap();
        assert_eq!(t.decay_times().unwrap().t50, 4.0);
    }
}
