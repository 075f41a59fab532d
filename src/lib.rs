//! `autocal` library crate.
//!
//! Extracts calcium kinetics from two-channel ratiometric fluorescence traces:
//!
//! - build a background-corrected ratio from interleaved channel readings
//! - smooth it and fix an inverted ratio (orientation check)
//! - find rise intervals on the derivative and cut the falls between them
//! - fit a decay model to each fall and score it with `R²`
//!
//! File ingestion and export live outside this crate; they exchange
//! [`domain::TraceInput`] and [`domain::TraceReport`] values with it.

pub mod config;
pub mod data;
pub mod detect;
pub mod domain;
pub mod error;
pub mod filter;
pub mod fit;
pub mod math;
pub mod models;
pub mod pipeline;
pub mod trace;

pub use config::PipelineConfig;
pub use error::{AppError, ErrorKind};
pub use pipeline::{process_batch, process_trace};
