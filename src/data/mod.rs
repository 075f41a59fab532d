//! Input data sources.
//!
//! Real recordings arrive from the ingestion layer as [`crate::domain::TraceInput`];
//! this module provides a deterministic synthetic source with known kinetics.

pub mod synthetic;

pub use synthetic::*;
