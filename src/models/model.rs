//! Model evaluation for the decay models.
//!
//! The fitter relies on two primitive operations:
//! - map an optimizer parameter vector to `(k, y1)` for a given model
//! - predict `ŷ(x)` for a model given `y0`, `k` and `y1`

use crate::domain::DecayModel;

/// Zero-order (linear) decay: `ŷ(x) = y0 - k·x`.
pub fn zero_order(x: f64, k: f64, y0: f64) -> f64 {
    y0 - k * x
}

/// First-order exponential approach from `y0` to the plateau `y1`.
///
/// `1 - e^{-kx}` is evaluated as `-expm1(-kx)` to keep precision for small `kx`.
pub fn first_order(x: f64, k: f64, y0: f64, y1: f64) -> f64 {
    y0 + (y1 - y0) * -(-k * x).exp_m1()
}

/// Predict `ŷ(x)` for the given model. `y1` is ignored by the zero-order model.
pub fn predict(model: DecayModel, x: f64, y0: f64, k: f64, y1: f64) -> f64 {
    match model {
        DecayModel::ZeroOrderOneParam => zero_order(x, k, y0),
        DecayModel::FirstOrderOneParam | DecayModel::FirstOrderTwoParam => {
            first_order(x, k, y0, y1)
        }
    }
}

/// Resolve `(k, y1)` from the optimizer's parameter vector.
///
/// For the one-parameter models `y1` is the segment's last observed value.
pub fn unpack_params(model: DecayModel, params: &[f64], y_last: f64) -> (f64, f64) {
    match model {
        DecayModel::ZeroOrderOneParam | DecayModel::FirstOrderOneParam => (params[0], y_last),
        DecayModel::FirstOrderTwoParam => (params[0], params[1]),
    }
}

/// Sum of squared residuals of `model` over `(x, y)`, with `x` shifted to start at 0.
///
/// Non-finite predictions propagate as a non-finite objective, which the
/// optimizers treat as "worse than anything finite".
pub fn sum_squared_residuals(model: DecayModel, x: &[f64], y: &[f64], k: f64, y1: f64) -> f64 {
    let (Some(&x0), Some(&y0)) = (x.first(), y.first()) else {
        return 0.0;
    };
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - predict(model, xi - x0, y0, k, y1);
            r * r
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_order_limits() {
        assert_eq!(first_order(0.0, 0.7, 2.0, 1.0), 2.0);
        assert!((first_order(100.0, 0.7, 2.0, 1.0) - 1.0).abs() < 1e-12);
        let half = first_order(std::f64::consts::LN_2 / 0.7, 0.7, 2.0, 1.0);
        assert!((half - 1.5).abs() < 1e-12);
    }

    #[test]
    fn zero_order_is_linear() {
        assert_eq!(zero_order(2.0, 0.5, 3.0), 2.0);
        assert_eq!(predict(DecayModel::ZeroOrderOneParam, 2.0, 3.0, 0.5, 99.0), 2.0);
    }

    #[test]
    fn one_param_models_fix_plateau_to_last_value() {
        assert_eq!(unpack_params(DecayModel::FirstOrderOneParam, &[0.3], 1.2), (0.3, 1.2));
        assert_eq!(unpack_params(DecayModel::FirstOrderTwoParam, &[0.3, 0.9], 1.2), (0.3, 0.9));
    }

    #[test]
    fn residuals_vanish_on_exact_data() {
        let x: Vec<f64> = (0..20).map(|i| 10.0 + i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|xi| first_order(xi - 10.0, 0.4, 3.0, 1.0)).collect();
        let sse = sum_squared_residuals(DecayModel::FirstOrderTwoParam, &x, &y, 0.4, 1.0);
        assert!(sse < 1e-24);
        assert!(sum_squared_residuals(DecayModel::FirstOrderTwoParam, &x, &y, 0.8, 1.0) > 1e-3);
    }
}
