//! Rise/fall cycle detection on the derivative of a smoothed trace.

pub mod intervals;

pub use intervals::*;
