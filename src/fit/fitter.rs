//! Decay fitting for a single tracelet.
//!
//! Given a fall segment `(x_i, y_i)` and a [`DecayModel`], we:
//! - reject segments that cannot identify the model's parameters
//! - minimize the residual sum of squares with `x` shifted to start at 0
//! - record `k`, `tau = 1/k`, the plateau and `R²` on the tracelet
//!
//! A failed fit is not an error: it is stored as [`FitOutcome::Failed`] and the
//! caller moves on to the next tracelet.

use crate::domain::{DecayFit, DecayModel, FitFailure, FitOutcome, Termination, Tracelet};
use crate::fit::optimize::{
    Minimum, OptimizeStatus, ScalarOptions, SimplexOptions, minimize_scalar, nelder_mead,
};
use crate::math::total_sum_of_squares;
use crate::models::{sum_squared_residuals, unpack_params};

/// Starting value for the rate constant.
pub const INITIAL_K: f64 = 2.0;

/// Optimizer settings used by [`fit_tracelet`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FitSettings {
    /// Used by the one-parameter models.
    pub scalar: ScalarOptions,
    /// Used by the two-parameter model.
    pub simplex: SimplexOptions,
}

/// Fit `model` to the tracelet and record the outcome on it.
///
/// A tracelet that already carries an outcome is returned unchanged.
pub fn fit_tracelet(mut tracelet: Tracelet, model: DecayModel, settings: &FitSettings) -> Tracelet {
    if tracelet.outcome != FitOutcome::Unfitted {
        log::debug!(
            "tracelet {}..{} already fitted; skipping",
            tracelet.start,
            tracelet.end
        );
        return tracelet;
    }

    tracelet.outcome = match fit_segment(&tracelet.x, &tracelet.y, model, settings) {
        Ok(fit) => {
            log::debug!(
                "tracelet {}..{}: {} k={:.6} tau={:.4} r2={:.5} ({} iterations, {:?})",
                tracelet.start,
                tracelet.end,
                model.display_name(),
                fit.k,
                fit.tau,
                fit.r2,
                fit.iterations,
                fit.termination
            );
            FitOutcome::Fitted(fit)
        }
        Err(failure) => {
            log::warn!(
                "tracelet {}..{}: {} fit failed: {:?}",
                tracelet.start,
                tracelet.end,
                model.display_name(),
                failure
            );
            FitOutcome::Failed(failure)
        }
    };
    tracelet
}

impl Tracelet {
    /// Method form of [`fit_tracelet`].
    pub fn optimize(self, model: DecayModel, settings: &FitSettings) -> Tracelet {
        fit_tracelet(self, model, settings)
    }

    /// Model prediction at every `x` of the tracelet, if the fit succeeded.
    pub fn fitted_curve(&self) -> Option<Vec<f64>> {
        let fit = self.fit()?;
        let (&x0, &y0) = (self.x.first()?, self.y.first()?);
        let y1 = fit.y1.unwrap_or(f64::NAN);
        Some(
            self.x
                .iter()
                .map(|&xi| crate::models::predict(fit.model, xi - x0, y0, fit.k, y1))
                .collect(),
        )
    }
}

/// Fit `model` to raw `(x, y)` data.
pub fn fit_segment(
    x: &[f64],
    y: &[f64],
    model: DecayModel,
    settings: &FitSettings,
) -> Result<DecayFit, FitFailure> {
    let tss = check_degenerate(x, y, model)?;

    let y_last = y[y.len() - 1];
    let objective = |params: &[f64]| {
        let (k, y1) = unpack_params(model, params, y_last);
        sum_squared_residuals(model, x, y, k, y1)
    };

    let minimum: Minimum = match model {
        DecayModel::ZeroOrderOneParam | DecayModel::FirstOrderOneParam => {
            minimize_scalar(|k| objective(&[k]), INITIAL_K, &settings.scalar)
        }
        DecayModel::FirstOrderTwoParam => {
            nelder_mead(objective, &[INITIAL_K, y_last], &settings.simplex)
        }
    };

    let termination = match minimum.status {
        OptimizeStatus::Converged => Termination::Converged,
        OptimizeStatus::IterationCap if model.param_count() > 1 => Termination::IterationCap,
        OptimizeStatus::IterationCap => {
            return Err(FitFailure::NonConvergence {
                iterations: minimum.iterations,
                message: "iteration cap reached".to_string(),
            });
        }
        OptimizeStatus::Failed(message) => {
            return Err(FitFailure::NonConvergence {
                iterations: minimum.iterations,
                message,
            });
        }
    };

    let (k, y1) = unpack_params(model, &minimum.x, y_last);
    if !(k.is_finite() && y1.is_finite() && minimum.fun.is_finite()) {
        return Err(FitFailure::NonConvergence {
            iterations: minimum.iterations,
            message: "optimizer returned non-finite parameters".to_string(),
        });
    }

    Ok(DecayFit {
        model,
        k,
        y1: (model != DecayModel::ZeroOrderOneParam).then_some(y1),
        tau: 1.0 / k,
        r2: 1.0 - minimum.fun / tss,
        sse: minimum.fun,
        iterations: minimum.iterations,
        termination,
    })
}

/// Returns the total sum of squares of `y` when the segment can be fitted.
fn check_degenerate(x: &[f64], y: &[f64], model: DecayModel) -> Result<f64, FitFailure> {
    let degenerate = |message: String| Err(FitFailure::Degenerate { message });

    if x.len() != y.len() {
        return degenerate(format!("x has {} points but y has {}", x.len(), y.len()));
    }
    if y.len() < model.param_count() {
        return degenerate(format!(
            "{} points cannot identify {} parameters",
            y.len(),
            model.param_count()
        ));
    }
    if !x.iter().chain(y).all(|v| v.is_finite()) {
        return degenerate("segment contains non-finite values".to_string());
    }
    if x.iter().all(|&v| v == x[0]) {
        return degenerate("fewer than two distinct x values".to_string());
    }
    let tss = total_sum_of_squares(y).unwrap_or(0.0);
    if !(tss > 0.0 && tss.is_finite()) {
        return degenerate("y has no variance".to_string());
    }
    Ok(tss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::first_order;

    fn exponential(k: f64, y0: f64, y1: f64) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..=100).map(|i| i as f64 * 0.1).collect();
        let y = x.iter().map(|&xi| first_order(xi, k, y0, y1)).collect();
        (x, y)
    }

    fn tracelet(x: Vec<f64>, y: Vec<f64>) -> Tracelet {
        let n = x.len();
        Tracelet::new(0, n, x, y.clone(), y).unwrap()
    }

    #[test]
    fn two_param_recovers_perfect_exponential() {
        let (x, y) = exponential(0.8, 2.0, 1.0);
        let fit = fit_segment(&x, &y, DecayModel::FirstOrderTwoParam, &FitSettings::default()).unwrap();
        assert!((fit.k - 0.8).abs() < 1e-2, "k = {}", fit.k);
        assert!((fit.y1.unwrap() - 1.0).abs() < 1e-2);
        assert!((fit.tau - 1.25).abs() < 2e-2);
        assert!(fit.r2 > 0.999);
        assert_eq!(fit.termination, Termination::Converged);
    }

    #[test]
    fn one_param_uses_last_value_as_plateau() {
        let (x, y) = exponential(0.8, 2.0, 1.0);
        let fit = fit_segment(&x, &y, DecayModel::FirstOrderOneParam, &FitSettings::default()).unwrap();
        assert!((fit.k - 0.8).abs() < 1e-2, "k = {}", fit.k);
        assert_eq!(fit.y1, Some(y[y.len() - 1]));
        assert!(fit.r2 > 0.999);
    }

    #[test]
    fn zero_order_fits_a_line() {
        let x: Vec<f64> = (0..8).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 3.0 - 0.5 * xi).collect();
        let fit = fit_segment(&x, &y, DecayModel::ZeroOrderOneParam, &FitSettings::default()).unwrap();
        assert!((fit.k - 0.5).abs() < 1e-6);
        assert!((fit.r2 - 1.0).abs() < 1e-9);
        assert_eq!(fit.y1, None);
    }

    #[test]
    fn fit_is_independent_of_time_offset() {
        let (x, y) = exponential(0.8, 2.0, 1.0);
        let shifted: Vec<f64> = x.iter().map(|v| v + 500.0).collect();
        let a = fit_segment(&x, &y, DecayModel::FirstOrderTwoParam, &FitSettings::default()).unwrap();
        let b = fit_segment(&shifted, &y, DecayModel::FirstOrderTwoParam, &FitSettings::default()).unwrap();
        assert!((a.k - b.k).abs() < 1e-3);
    }

    #[test]
    fn short_and_flat_segments_are_degenerate() {
        let s = FitSettings::default();
        let short = fit_segment(&[0.0], &[2.0], DecayModel::FirstOrderTwoParam, &s);
        assert!(matches!(short, Err(FitFailure::Degenerate { .. })));

        let flat = fit_segment(&[0.0, 1.0, 2.0], &[1.0; 3], DecayModel::FirstOrderOneParam, &s);
        assert!(matches!(flat, Err(FitFailure::Degenerate { .. })));

        let same_x = fit_segment(&[1.0; 3], &[3.0, 2.0, 1.0], DecayModel::ZeroOrderOneParam, &s);
        assert!(matches!(same_x, Err(FitFailure::Degenerate { .. })));
    }

    #[test]
    fn two_points_are_enough_for_two_parameters() {
        let fit = fit_segment(
            &[0.0, 1.0],
            &[2.0, 1.0],
            DecayModel::FirstOrderTwoParam,
            &FitSettings::default(),
        )
        .unwrap();
        assert!(fit.k.is_finite());
        assert!(fit.r2 > 0.99, "r2 = {}", fit.r2);
    }

    #[test]
    fn r2_worse_than_the_mean_is_kept_negative() {
        // y0 = y1 = 0 pins the prediction to zero for every k.
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 10.0, 10.0, 10.0, 0.0];
        let t = fit_tracelet(
            tracelet(x.to_vec(), y.to_vec()),
            DecayModel::FirstOrderOneParam,
            &FitSettings::default(),
        );
        assert!(t.success());
        let fit = t.fit().unwrap();
        assert_eq!(fit.sse, 300.0);
        assert_eq!(fit.r2, -1.5);
        assert_eq!(t.summary().r2, Some(-1.5));
    }

    #[test]
    fn overflowing_objective_is_non_convergence() {
        let x = [0.0, 1e200, 2e200];
        let y = [3.0, 2.0, 1.0];
        let out = fit_segment(&x, &y, DecayModel::ZeroOrderOneParam, &FitSettings::default());
        assert!(matches!(out, Err(FitFailure::NonConvergence { .. })));
    }

    #[test]
    fn simplex_cap_is_a_soft_success() {
        let (x, y) = exponential(0.8, 2.0, 1.0);
        let settings = FitSettings {
            simplex: SimplexOptions {
                max_iterations: 2,
                ..SimplexOptions::default()
            },
            ..FitSettings::default()
        };
        let fit = fit_segment(&x, &y, DecayModel::FirstOrderTwoParam, &settings).unwrap();
        assert_eq!(fit.termination, Termination::IterationCap);
        assert_eq!(fit.iterations, 2);
    }

    #[test]
    fn tracelet_outcome_is_written_once() {
        let (x, y) = exponential(0.8, 2.0, 1.0);
        let t = fit_tracelet(tracelet(x, y), DecayModel::FirstOrderTwoParam, &FitSettings::default());
        assert!(t.success());
        let first = t.outcome().clone();
        let again = t.optimize(DecayModel::ZeroOrderOneParam, &FitSettings::default());
        assert_eq!(again.outcome(), &first);

        let curve = again.fitted_curve().unwrap();
        assert_eq!(curve.len(), again.len());
        assert!((curve[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn failed_tracelet_has_no_curve() {
        let t = fit_tracelet(
            tracelet(vec![1.0, 1.0], vec![2.0, 1.0]),
            DecayModel::FirstOrderTwoParam,
            &FitSettings::default(),
        );
        assert!(!t.success());
        assert!(t.fitted_curve().is_none());
        assert!(matches!(t.outcome(), FitOutcome::Failed(FitFailure::Degenerate { .. })));
    }
}
