//! Signal filters.
//!
//! Only the Savitzky–Golay smoother is needed by the pipeline: it smooths the
//! ratio trace and (optionally) the background channels.

pub mod savgol;

pub use savgol::*;
