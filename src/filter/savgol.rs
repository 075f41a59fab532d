//! Savitzky–Golay polynomial smoothing filter.
//!
//! For every sample we fit a polynomial of degree `order` to the `window`
//! samples centred on it and replace the sample by the fitted value (or by the
//! fitted derivative of order `deriv`). Because the fit is linear in the data,
//! the whole operation reduces to a fixed kernel applied by convolution.
//!
//! Boundary handling:
//! - the input is extended by `h = window / 2` samples at each end by odd
//!   reflection about the boundary value:
//!   `head[i] = y[0] - |y[h - i] - y[0]|`, `tail[i] = y[n-1] + |y[n-2-i] - y[n-1]|`
//! - the kernel is then applied in "valid" mode so the output has exactly the
//!   input length
//!
//! The filter is stateless: the same input and parameters always produce the
//! same output.

use nalgebra::DMatrix;

use crate::error::AppError;
use crate::math::pseudo_inverse;

/// A precomputed Savitzky–Golay kernel.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    order: usize,
    deriv: usize,
    kernel: Vec<f64>,
}

impl SavitzkyGolay {
    /// Smoothing filter (derivative order 0).
    pub fn new(window: usize, order: usize) -> Result<Self, AppError> {
        Self::with_derivative(window, order, 0, 1.0)
    }

    /// Filter returning the `deriv`-th derivative, scaled by `rate^deriv · deriv!`.
    pub fn with_derivative(
        window: usize,
        order: usize,
        deriv: usize,
        rate: f64,
    ) -> Result<Self, AppError> {
        validate_params(window, order)?;
        if deriv > order {
            return Err(AppError::contract(format!(
                "Derivative order {deriv} exceeds polynomial order {order}."
            )));
        }
        if !(rate.is_finite() && rate > 0.0) {
            return Err(AppError::contract(format!(
                "Sampling rate must be finite and > 0, got {rate}."
            )));
        }

        let kernel = build_kernel(window, order, deriv, rate)?;
        Ok(Self {
            window,
            order,
            deriv,
            kernel,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn deriv(&self) -> usize {
        self.deriv
    }

    /// Kernel weights, one per window offset `-h..=h`.
    pub fn kernel(&self) -> &[f64] {
        &self.kernel
    }

    /// Apply the filter. The output has the same length as `y`.
    pub fn apply(&self, y: &[f64]) -> Result<Vec<f64>, AppError> {
        if y.len() < self.window {
            return Err(AppError::contract(format!(
                "Window size {} exceeds sequence length {}.",
                self.window,
                y.len()
            )));
        }

        let extended = reflect_extend(y, self.window / 2);
        let out = extended
            .windows(self.window)
            .map(|w| w.iter().zip(&self.kernel).map(|(v, m)| v * m).sum())
            .collect();
        Ok(out)
    }
}

/// Smooth `y` with a `window`-point, `order`-degree Savitzky–Golay filter.
pub fn smooth(y: &[f64], window: usize, order: usize) -> Result<Vec<f64>, AppError> {
    SavitzkyGolay::new(window, order)?.apply(y)
}

/// Savitzky–Golay estimate of the `deriv`-th derivative of `y`.
pub fn smooth_derivative(
    y: &[f64],
    window: usize,
    order: usize,
    deriv: usize,
    rate: f64,
) -> Result<Vec<f64>, AppError> {
    SavitzkyGolay::with_derivative(window, order, deriv, rate)?.apply(y)
}

fn validate_params(window: usize, order: usize) -> Result<(), AppError> {
    if window == 0 || window % 2 == 0 {
        return Err(AppError::contract(format!(
            "Window size must be a positive odd number, got {window}."
        )));
    }
    if window < order + 2 {
        return Err(AppError::contract(format!(
            "Window size {window} is too small for polynomial order {order}."
        )));
    }
    Ok(())
}

fn build_kernel(window: usize, order: usize, deriv: usize, rate: f64) -> Result<Vec<f64>, AppError> {
    let half = (window / 2) as i64;

    // Vandermonde design matrix: one row per offset k in -h..=h, columns k^0..k^order.
    let design = DMatrix::from_fn(window, order + 1, |r, c| {
        let k = r as i64 - half;
        (k as f64).powi(c as i32)
    });

    let pinv = pseudo_inverse(&design).ok_or_else(|| {
        AppError::numeric(format!(
            "Could not invert Savitzky–Golay design matrix (window={window}, order={order})."
        ))
    })?;

    let scale = rate.powi(deriv as i32) * factorial(deriv);
    Ok(pinv.row(deriv).iter().map(|v| v * scale).collect())
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|v| v as f64).product()
}

/// Odd reflection about the end points, `half` samples on each side.
fn reflect_extend(y: &[f64], half: usize) -> Vec<f64> {
    let n = y.len();
    let first = y[0];
    let last = y[n - 1];

    let mut out = Vec::with_capacity(n + 2 * half);
    out.extend((1..=half).rev().map(|i| first - (y[i] - first).abs()));
    out.extend_from_slice(y);
    out.extend((1..=half).map(|i| last + (y[n - 1 - i] - last).abs()));
    out
}
