//! Moore–Penrose pseudo-inverse.
//!
//! Used to build local polynomial least-squares kernels: for a design matrix `B`
//! with one row per window offset and one column per polynomial power, row `d`
//! of `pinv(B)` is the linear functional that returns the `d`-th polynomial
//! coefficient of the least-squares fit.
//!
//! The design matrices here are tall (window rows, order+1 columns) and can be
//! badly scaled for wide windows (offsets raised to the third power), so we go
//! through the SVD rather than the normal equations.

use nalgebra::DMatrix;

/// Singular values below this are treated as zero.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Compute the pseudo-inverse of `x` via SVD.
///
/// Returns `None` for an empty or non-finite matrix.
pub fn pseudo_inverse(x: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if x.nrows() == 0 || x.ncols() == 0 || !x.iter().all(|v| v.is_finite()) {
        return None;
    }
    let p = x.clone().svd(true, true).pseudo_inverse(SINGULAR_TOLERANCE).ok()?;
    p.iter().all(|v| v.is_finite()).then_some(p)
}
