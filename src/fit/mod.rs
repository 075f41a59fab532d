//! Decay fitting.
//!
//! Responsibilities:
//!
//! - minimize a tracelet's residuals for the chosen decay model
//! - record the fit (or why it failed) on the tracelet
//! - measure threshold decay durations on the smoothed segment

pub mod decay_times;
pub mod fitter;
pub mod optimize;

pub use decay_times::*;
pub use fitter::*;
pub use optimize::{Minimum, OptimizeStatus, ScalarOptions, SimplexOptions};
