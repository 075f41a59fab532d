//! End-to-end processing of one trace, and of many traces in parallel.
//!
//! Ratio → orientation → rise detection → per-tracelet decay fit. Each trace
//! runs its stages in order on its own data; traces share nothing, so a batch
//! fans out across the rayon pool.

use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::detect::{detect_rises, fall_ranges, rise_events};
use crate::domain::{TraceInput, TraceReport, Tracelet};
use crate::error::AppError;
use crate::fit::fit_tracelet;
use crate::trace::{build_ratio, correct_orientation};

/// Run the full pipeline on one recording.
///
/// Contract violations and ratio degeneracy are errors. An undetermined
/// orientation is recorded on the report and processing continues; failed
/// tracelet fits are recorded on the tracelets.
pub fn process_trace(input: TraceInput, config: &PipelineConfig) -> Result<TraceReport, AppError> {
    let trace = input.into_trace()?;
    let trace = build_ratio(trace, config.background_correction())?;

    let outcome = correct_orientation(trace, &config.orientation_params())?;
    let orientation = outcome.status();
    let trace = outcome.into_trace();

    let rises = detect_rises(trace.derivative(), config.y_tolerance, config.x_tolerance);
    let events = rise_events(&trace, &rises)?;

    let settings = config.fit_settings();
    let tracelets = fall_ranges(&rises)
        .into_iter()
        .map(|range| {
            Tracelet::slice(&trace, range.start, range.end)
                .map(|t| fit_tracelet(t, config.model, &settings))
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "{}: {} rises, {}/{} tracelets fitted ({:?})",
        trace.label(),
        events.len(),
        tracelets.iter().filter(|t| t.success()).count(),
        tracelets.len(),
        orientation
    );

    Ok(TraceReport {
        label: trace.label().to_string(),
        median_time: trace.median_time().to_vec(),
        ratio: trace.ratio().to_vec(),
        smoothed: trace.smoothed().to_vec(),
        derivative: trace.derivative().to_vec(),
        orientation,
        rises: events,
        tracelets,
    })
}

/// Process independent traces in parallel. Results keep the input order.
pub fn process_batch(
    inputs: Vec<TraceInput>,
    config: &PipelineConfig,
) -> Vec<Result<TraceReport, AppError>> {
    inputs
        .into_par_iter()
        .map(|input| {
            let label = input.label.clone();
            process_trace(input, config).inspect_err(|e| {
                log::warn!("{label}: trace skipped: {e}");
            })
        })
        .collect()
}
