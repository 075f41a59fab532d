//! Trace-level stages: ratio building and orientation correction.
//!
//! Both stages take a `Trace` by value and hand back a new one so the derived
//! sequences (`ratio`, `smoothed`, `derivative`) always belong together.

pub mod orientation;
pub mod ratio;

pub use orientation::*;
pub use ratio::*;
