//! Orientation correction.
//!
//! Which wavelength the recorder captures first depends on the initial mirror
//! position, so a ratio can come out inverted. A correctly oriented calcium
//! trace rises faster than it falls, which makes the median of its derivative
//! non-positive. If the median is above the tolerance we take the reciprocal of
//! the ratio and check again.
//!
//! The loop is bounded: a trace that has not verified after `max_iterations`
//! checks is returned as [`OrientationOutcome::Undetermined`] and the caller
//! decides whether to keep it.

use crate::domain::{OrientationStatus, Trace};
use crate::error::AppError;
use crate::filter::SavitzkyGolay;
use crate::math::{diff, median};

/// Parameters of the orientation loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationParams {
    pub window: usize,
    pub order: usize,
    /// Largest derivative median still accepted as correctly oriented.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for OrientationParams {
    fn default() -> Self {
        Self {
            window: 15,
            order: 3,
            tolerance: 0.0,
            max_iterations: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrientationOutcome {
    Verified(Trace),
    Undetermined { trace: Trace, iterations: usize },
}

impl OrientationOutcome {
    pub fn status(&self) -> OrientationStatus {
        match self {
            OrientationOutcome::Verified(trace) => OrientationStatus::Verified {
                flipped: trace.was_flipped,
            },
            OrientationOutcome::Undetermined { iterations, .. } => OrientationStatus::Undetermined {
                iterations: *iterations,
            },
        }
    }

    pub fn into_trace(self) -> Trace {
        match self {
            OrientationOutcome::Verified(trace) => trace,
            OrientationOutcome::Undetermined { trace, .. } => trace,
        }
    }
}

/// Smooth the current ratio and take the first difference of the result.
///
/// The derivative is the plain first difference of the smoothed trace, not the
/// filter's derivative output.
pub fn smoothen(trace: Trace, window: usize, order: usize) -> Result<Trace, AppError> {
    if trace.ratio.is_empty() {
        return Err(AppError::contract(format!(
            "Ratio for '{}' has not been calculated.",
            trace.label
        )));
    }
    let smoothed = SavitzkyGolay::new(window, order)?.apply(&trace.ratio)?;
    let derivative = diff(&smoothed);
    Ok(Trace {
        smoothed,
        derivative,
        ..trace
    })
}

/// Replace every ratio element by its reciprocal and mark the trace as flipped.
///
/// Smoothed and derivative sequences are cleared; they no longer match the ratio.
pub fn flip_ratio(trace: Trace) -> Result<Trace, AppError> {
    if let Some(i) = trace.ratio.iter().position(|r| *r == 0.0) {
        return Err(AppError::numeric(format!(
            "Cannot flip ratio for '{}': zero at index {i}.",
            trace.label
        )));
    }
    let ratio = trace.ratio.iter().map(|r| 1.0 / r).collect();
    Ok(Trace {
        ratio,
        smoothed: Vec::new(),
        derivative: Vec::new(),
        was_flipped: true,
        ..trace
    })
}

/// Run the smooth → check → flip loop until the orientation verifies or the cap is hit.
///
/// A trace that is already verified is only re-smoothed; it is never flipped again.
pub fn correct_orientation(
    trace: Trace,
    params: &OrientationParams,
) -> Result<OrientationOutcome, AppError> {
    let mut trace = trace;

    if trace.orientation_verified {
        return Ok(OrientationOutcome::Verified(smoothen(
            trace,
            params.window,
            params.order,
        )?));
    }

    for iteration in 1..=params.max_iterations {
        trace = smoothen(trace, params.window, params.order)?;
        let m = median(&trace.derivative).ok_or_else(|| {
            AppError::contract(format!(
                "Derivative of '{}' is empty; ratio too short to check orientation.",
                trace.label
            ))
        })?;

        if m <= params.tolerance {
            log::debug!(
                "{}: orientation verified after {iteration} check(s) (median derivative {m:.3e}, flipped={})",
                trace.label,
                trace.was_flipped
            );
            trace.orientation_verified = true;
            return Ok(OrientationOutcome::Verified(trace));
        }
        if m.is_nan() {
            return Err(AppError::numeric(format!(
                "Median derivative of '{}' is NaN.",
                trace.label
            )));
        }

        log::debug!(
            "{}: median derivative {m:.3e} > {:.3e}, flipping ratio",
            trace.label,
            params.tolerance
        );
        trace = flip_ratio(trace)?;
    }

    // Leave the returned trace with a derivative that matches its ratio.
    let trace = smoothen(trace, params.window, params.order)?;
    log::warn!(
        "{}: orientation undetermined after {} iterations",
        trace.label,
        params.max_iterations
    );
    Ok(OrientationOutcome::Undetermined {
        trace,
        iterations: params.max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticSpec, generate_trace};
    use crate::trace::{BackgroundCorrection, build_ratio};

    fn ratio_trace(swapped: bool) -> Trace {
        let spec = SyntheticSpec {
            swapped,
            ..SyntheticSpec::default()
        };
        let input = generate_trace(&spec).unwrap();
        build_ratio(input.into_trace().unwrap(), BackgroundCorrection::None).unwrap()
    }

    #[test]
    fn well_oriented_trace_verifies_without_flip() {
        let outcome = correct_orientation(ratio_trace(false), &OrientationParams::default()).unwrap();
        assert_eq!(
            outcome.status(),
            OrientationStatus::Verified { flipped: false }
        );
        let trace = outcome.into_trace();
        assert!(trace.orientation_verified());
        assert_eq!(trace.derivative().len(), trace.ratio().len() - 1);
    }

    #[test]
    fn inverted_trace_flips_once_and_recovers_the_good_ratio() {
        let good = ratio_trace(false);
        let outcome = correct_orientation(ratio_trace(true), &OrientationParams::default()).unwrap();
        let OrientationOutcome::Verified(trace) = outcome else {
            panic!("expected verification");
        };
        assert!(trace.orientation_verified());
        assert!(trace.was_flipped());
        for (a, b) in trace.ratio().iter().zip(good.ratio()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn median_equal_to_tolerance_counts_as_verified() {
        let n = 40;
        let time: Vec<f64> = (0..2 * n).map(|i| i as f64).collect();
        let trace = Trace::new("flat", time, vec![2.0; 2 * n], vec![0.0; 2 * n]).unwrap();
        let trace = build_ratio(trace, BackgroundCorrection::None).unwrap();

        let outcome = correct_orientation(trace, &OrientationParams::default()).unwrap();
        let trace = outcome.into_trace();
        assert!(trace.orientation_verified());
        assert!(!trace.was_flipped());
    }

    #[test]
    fn unreachable_tolerance_is_undetermined_not_a_hang() {
        let params = OrientationParams {
            tolerance: -1.0,
            ..OrientationParams::default()
        };
        let original = ratio_trace(false);
        let outcome = correct_orientation(original.clone(), &params).unwrap();
        match outcome {
            OrientationOutcome::Undetermined { trace, iterations } => {
                assert_eq!(iterations, 10);
                assert!(!trace.orientation_verified());
                assert_eq!(trace.derivative().len(), trace.ratio().len() - 1);
                // Ten flips bring the ratio back to where it started.
                for (a, b) in trace.ratio().iter().zip(original.ratio()) {
                    assert!((a - b).abs() < 1e-12);
                }
            }
            other => panic!("expected undetermined, got {other:?}"),
        }
    }

    #[test]
    fn verified_trace_is_never_flipped_again() {
        let trace = correct_orientation(ratio_trace(false), &OrientationParams::default())
            .unwrap()
            .into_trace();
        let params = OrientationParams {
            tolerance: -1.0,
            ..OrientationParams::default()
        };
        let again = correct_orientation(trace.clone(), &params).unwrap().into_trace();
        assert_eq!(again.ratio(), trace.ratio());
        assert!(!again.was_flipped());
    }

    #[test]
    fn smoothing_without_ratio_is_rejected() {
        let trace = Trace::new("c", vec![0.0, 1.0], vec![1.0, 1.0], vec![0.0; 2]).unwrap();
        assert!(smoothen(trace, 3, 1).is_err());
    }
}
