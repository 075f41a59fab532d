//! Small derivative-free and quasi-Newton minimizers.
//!
//! The objectives here are tiny (one or two parameters, a few hundred residuals),
//! so both routines favour robustness over speed:
//!
//! - [`minimize_scalar`]: one-dimensional BFGS (secant curvature update) with a
//!   central-difference gradient and Armijo backtracking.
//! - [`nelder_mead`]: the classic downhill simplex with standard coefficients.
//!
//! Non-finite objective values are treated as worse than any finite value, so a
//! trial step that overflows the model is simply rejected.

use std::cmp::Ordering;

/// Stopping rules for [`minimize_scalar`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarOptions {
    /// Converged once `|f'(x)|` falls below this.
    pub gtol: f64,
    pub max_iterations: usize,
}

impl Default for ScalarOptions {
    fn default() -> Self {
        Self {
            gtol: 1e-5,
            max_iterations: 200,
        }
    }
}

/// Stopping rules for [`nelder_mead`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexOptions {
    /// Largest allowed spread of the simplex vertices in any coordinate.
    pub xatol: f64,
    /// Largest allowed spread of objective values across the simplex.
    pub fatol: f64,
    pub max_iterations: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            xatol: 1e-4,
            fatol: 1e-4,
            max_iterations: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeStatus {
    Converged,
    /// Stopped at the iteration cap; the best point found is still returned.
    IterationCap,
    /// Stopped for any other reason (line search breakdown, non-finite start).
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub status: OptimizeStatus,
}

/// Armijo sufficient-decrease constant.
const ARMIJO_C1: f64 = 1e-4;
/// Line search gives up once the step fraction drops below this.
const MIN_STEP_FRACTION: f64 = 1e-12;
/// Relative step below which the scalar search is considered stationary.
const XTOL: f64 = 1e-10;
/// Central-difference step scale, roughly `eps^(1/3)`.
const FD_STEP: f64 = 6.055_454_452_393_339_5e-6;

/// Minimize a function of one variable starting at `x0`.
pub fn minimize_scalar<F>(f: F, x0: f64, opts: &ScalarOptions) -> Minimum
where
    F: Fn(f64) -> f64,
{
    let done = |x: f64, fun: f64, iterations: usize, status: OptimizeStatus| Minimum {
        x: vec![x],
        fun,
        iterations,
        status,
    };

    let mut x = x0;
    let mut fx = f(x);
    if !fx.is_finite() {
        return done(
            x,
            fx,
            0,
            OptimizeStatus::Failed("objective is not finite at the starting point".to_string()),
        );
    }
    let mut g = central_difference(&f, x);
    // Inverse curvature estimate; starts as a plain gradient step.
    let mut h_inv = 1.0;

    for iteration in 0..opts.max_iterations {
        if !g.is_finite() {
            return done(
                x,
                fx,
                iteration,
                OptimizeStatus::Failed("gradient is not finite".to_string()),
            );
        }
        if g.abs() < opts.gtol {
            return done(x, fx, iteration, OptimizeStatus::Converged);
        }

        let p = -h_inv * g;
        let mut alpha = 1.0;
        let (x_new, f_new) = loop {
            let xt = x + alpha * p;
            let ft = f(xt);
            if ft.is_finite() && ft <= fx + ARMIJO_C1 * alpha * g * p {
                break (xt, ft);
            }
            alpha *= 0.5;
            if alpha < MIN_STEP_FRACTION {
                return done(
                    x,
                    fx,
                    iteration,
                    OptimizeStatus::Failed("line search could not reduce the objective".to_string()),
                );
            }
        };

        let g_new = central_difference(&f, x_new);
        let s = x_new - x;
        let y = g_new - g;
        if s * y > 0.0 {
            h_inv = s / y;
        }

        let stationary = s.abs() <= XTOL * (1.0 + x.abs());
        x = x_new;
        fx = f_new;
        g = g_new;
        if stationary {
            return done(x, fx, iteration + 1, OptimizeStatus::Converged);
        }
    }

    done(x, fx, opts.max_iterations, OptimizeStatus::IterationCap)
}

fn central_difference<F>(f: &F, x: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let h = FD_STEP * x.abs().max(1.0);
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Reflection, expansion, contraction and shrink coefficients.
const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const PSI: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Relative perturbation for building the initial simplex.
const NONZERO_DELTA: f64 = 0.05;
/// Absolute perturbation for coordinates that start at zero.
const ZERO_DELTA: f64 = 0.00025;

/// Minimize a function of several variables with the Nelder–Mead simplex.
pub fn nelder_mead<F>(f: F, x0: &[f64], opts: &SimplexOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    if n == 0 {
        return Minimum {
            x: Vec::new(),
            fun: f64::NAN,
            iterations: 0,
            status: OptimizeStatus::Failed("no parameters to optimize".to_string()),
        };
    }

    let eval = |p: &[f64]| {
        let v = f(p);
        if v.is_nan() { f64::INFINITY } else { v }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for k in 0..n {
        let mut vertex = x0.to_vec();
        vertex[k] = if vertex[k] != 0.0 {
            (1.0 + NONZERO_DELTA) * vertex[k]
        } else {
            ZERO_DELTA
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut status = OptimizeStatus::IterationCap;

    while iterations < opts.max_iterations {
        sort_simplex(&mut simplex, &mut values);

        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        let f_spread = values[1..]
            .iter()
            .map(|v| (v - values[0]).abs())
            .fold(0.0_f64, f64::max);
        if x_spread <= opts.xatol && f_spread <= opts.fatol {
            status = OptimizeStatus::Converged;
            break;
        }

        // Centroid of every vertex except the worst.
        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let worst = simplex[n].clone();
        let along = |t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&worst)
                .map(|(c, w)| (1.0 + t) * c - t * w)
                .collect()
        };

        let xr = along(RHO);
        let fr = eval(&xr);
        let mut shrink = false;

        if fr < values[0] {
            let xe = along(RHO * CHI);
            let fe = eval(&xe);
            if fe < fr {
                simplex[n] = xe;
                values[n] = fe;
            } else {
                simplex[n] = xr;
                values[n] = fr;
            }
        } else if fr < values[n - 1] {
            simplex[n] = xr;
            values[n] = fr;
        } else if fr < values[n] {
            // Outside contraction.
            let xc = along(PSI * RHO);
            let fc = eval(&xc);
            if fc <= fr {
                simplex[n] = xc;
                values[n] = fc;
            } else {
                shrink = true;
            }
        } else {
            // Inside contraction.
            let xcc = along(-PSI);
            let fcc = eval(&xcc);
            if fcc < values[n] {
                simplex[n] = xcc;
                values[n] = fcc;
            } else {
                shrink = true;
            }
        }

        if shrink {
            let best = simplex[0].clone();
            for i in 1..=n {
                let shrunk: Vec<f64> = simplex[i]
                    .iter()
                    .zip(&best)
                    .map(|(v, b)| b + SIGMA * (v - b))
                    .collect();
                values[i] = eval(&shrunk);
                simplex[i] = shrunk;
            }
        }

        iterations += 1;
    }

    sort_simplex(&mut simplex, &mut values);
    Minimum {
        x: simplex.swap_remove(0),
        fun: values[0],
        iterations,
        status,
    }
}

fn sort_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}
