//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the per-recording `Trace` and its derived sequences
//! - index `Interval`s and the rise metrics derived from them
//! - `Tracelet`s (fall segments) and their fit records
//! - the `TraceReport` handed to exporters

pub mod types;

pub use types::*;
