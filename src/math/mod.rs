//! Numeric helpers: SVD pseudo-inverse and small sequence statistics.

pub mod pinv;
pub mod stats;

pub use pinv::*;
pub use stats::*;
