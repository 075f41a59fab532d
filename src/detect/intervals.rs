//! Rise interval detection.
//!
//! A rise is a run of consecutive derivative samples strictly above
//! `y_tolerance` that is longer than `x_tolerance` samples. Both thresholds are
//! absolute: `y_tolerance` is in derivative units and does not adapt to the
//! signal scale.
//!
//! Falls are the gaps between consecutive rises. The partial segments before
//! the first rise and after the last one are never returned.

use std::ops::Range;

use crate::domain::{Interval, RiseEvent, Trace};
use crate::error::AppError;

/// Scan `derivative` left to right and return the rise intervals in order.
///
/// A run still open when the sequence ends is dropped.
pub fn detect_rises(derivative: &[f64], y_tolerance: f64, x_tolerance: usize) -> Vec<Interval> {
    let mut out = Vec::new();
    let mut run: Option<(usize, usize)> = None;

    for (i, &d) in derivative.iter().enumerate() {
        if d > y_tolerance {
            run = match run {
                Some((start, _)) => Some((start, i)),
                None => Some((i, i)),
            };
            continue;
        }

        if let Some((start, end)) = run.take() {
            if end - start + 1 > x_tolerance {
                out.push(Interval::new(start, end));
            }
        }
    }

    out
}

/// Half-open index ranges of the falls between consecutive rises.
///
/// Each range runs from the end of one rise to the start of the next.
pub fn fall_ranges(rises: &[Interval]) -> Vec<Range<usize>> {
    rises.windows(2).map(|w| w[0].end..w[1].start).collect()
}

/// Duration and height of each rise, measured on the trace's ratio.
pub fn rise_events(trace: &Trace, rises: &[Interval]) -> Result<Vec<RiseEvent>, AppError> {
    let n = trace.ratio().len().min(trace.median_time().len());
    rises
        .iter()
        .map(|iv| {
            if iv.start > iv.end || iv.end >= n {
                return Err(AppError::contract(format!(
                    "Rise interval ({}, {}) out of range for {n} ratio points.",
                    iv.start, iv.end
                )));
            }
            Ok(RiseEvent {
                interval: *iv,
                rise_time: trace.median_time()[iv.end] - trace.median_time()[iv.start],
                amplitude: trace.ratio()[iv.end] - trace.ratio()[iv.start],
            })
        })
        .collect()
}
