//! Shared domain types.
//!
//! Output records are serializable so an exporter can write them to JSON/CSV
//! without reaching into pipeline internals.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Parametric decay model fitted to each tracelet.
///
/// `x` is measured from the tracelet's first time point and `y0 = y[0]` is
/// always taken from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayModel {
    /// `ŷ(x) = y0 - k·x`
    ZeroOrderOneParam,
    /// `ŷ(x) = y0 + (y1 - y0)(1 - e^{-kx})` with `y1 = y[-1]` fixed.
    FirstOrderOneParam,
    /// Same exponential form with `y1` free.
    FirstOrderTwoParam,
}

impl DecayModel {
    pub const ALL: [DecayModel; 3] = [
        DecayModel::ZeroOrderOneParam,
        DecayModel::FirstOrderOneParam,
        DecayModel::FirstOrderTwoParam,
    ];

    /// Human-readable label for logs and exporters.
    pub fn display_name(self) -> &'static str {
        match self {
            DecayModel::ZeroOrderOneParam => "zero-order (k)",
            DecayModel::FirstOrderOneParam => "first-order (k)",
            DecayModel::FirstOrderTwoParam => "first-order (k, y1)",
        }
    }

    /// Number of free parameters.
    pub fn param_count(self) -> usize {
        match self {
            DecayModel::ZeroOrderOneParam | DecayModel::FirstOrderOneParam => 1,
            DecayModel::FirstOrderTwoParam => 2,
        }
    }

    /// Parse the names accepted in configuration (`snake_case` or short aliases).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "zero_order_one_param" | "o0p1" | "0" => Some(DecayModel::ZeroOrderOneParam),
            "first_order_one_param" | "o1p1" | "1" => Some(DecayModel::FirstOrderOneParam),
            "first_order_two_param" | "o1p2" | "2" => Some(DecayModel::FirstOrderTwoParam),
            _ => None,
        }
    }
}

/// An inclusive `(start, end)` index pair into a derivative sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of samples spanned (inclusive of both ends).
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// A detected rise with its duration and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiseEvent {
    pub interval: Interval,
    /// `median_time[end] - median_time[start]`.
    pub rise_time: f64,
    /// `ratio[end] - ratio[start]`.
    pub amplitude: f64,
}

/// How the orientation check finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrientationStatus {
    Verified { flipped: bool },
    Undetermined { iterations: usize },
}

impl OrientationStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, OrientationStatus::Verified { .. })
    }
}

/// What the ingestion layer hands over for one sample column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceInput {
    pub label: String,
    pub time: Vec<f64>,
    /// Interleaved channel A / channel B readings.
    pub raw: Vec<f64>,
    /// Interleaved background, same layout as `raw`.
    pub background: Vec<f64>,
}

impl TraceInput {
    pub fn into_trace(self) -> Result<Trace, AppError> {
        Trace::new(&self.label, self.time, self.raw, self.background)
    }
}

/// One two-channel fluorescence recording and the sequences derived from it.
///
/// Pipeline stages consume a `Trace` and return a new one, so a trace value
/// always holds a mutually consistent set of derived sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub(crate) label: String,
    pub(crate) time: Vec<f64>,
    pub(crate) raw: Vec<f64>,
    pub(crate) background: Vec<f64>,
    pub(crate) ratio: Vec<f64>,
    pub(crate) median_time: Vec<f64>,
    pub(crate) smoothed: Vec<f64>,
    pub(crate) derivative: Vec<f64>,
    pub(crate) orientation_verified: bool,
    pub(crate) was_flipped: bool,
}

impl Trace {
    /// Create a trace from interleaved channel data.
    ///
    /// `raw` and `background` alternate channel A, channel B, channel A, …
    /// All three sequences must have the same, even, non-zero length.
    pub fn new(
        label: &str,
        time: Vec<f64>,
        raw: Vec<f64>,
        background: Vec<f64>,
    ) -> Result<Self, AppError> {
        if raw.len() != time.len() || background.len() != time.len() {
            return Err(AppError::contract(format!(
                "Dimension mismatch in data/background/time: raw={}, background={}, time={}.",
                raw.len(),
                background.len(),
                time.len()
            )));
        }
        if time.is_empty() || time.len() % 2 != 0 {
            return Err(AppError::contract(format!(
                "Number of rows must be even and non-zero, got {}.",
                time.len()
            )));
        }
        if let Some(i) = time.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(AppError::contract(format!(
                "Time must be strictly increasing (rows {} and {}).",
                i,
                i + 1
            )));
        }
        let all_finite = |v: &[f64]| v.iter().all(|x| x.is_finite());
        if !(all_finite(&time) && all_finite(&raw) && all_finite(&background)) {
            return Err(AppError::contract("Trace contains non-finite values."));
        }

        Ok(Self {
            label: sanitize_label(label),
            time,
            raw,
            background,
            ratio: Vec::new(),
            median_time: Vec::new(),
            smoothed: Vec::new(),
            derivative: Vec::new(),
            orientation_verified: false,
            was_flipped: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn raw(&self) -> &[f64] {
        &self.raw
    }

    pub fn background(&self) -> &[f64] {
        &self.background
    }

    pub fn ratio(&self) -> &[f64] {
        &self.ratio
    }

    pub fn median_time(&self) -> &[f64] {
        &self.median_time
    }

    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    pub fn derivative(&self) -> &[f64] {
        &self.derivative
    }

    pub fn orientation_verified(&self) -> bool {
        self.orientation_verified
    }

    pub fn was_flipped(&self) -> bool {
        self.was_flipped
    }
}

/// Keep only word characters so labels are safe to use in file names.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Why a tracelet fit produced no usable parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FitFailure {
    /// Too few points, no spread in `x` or `y`, or non-finite samples.
    Degenerate { message: String },
    /// The optimizer stopped without converging and not because of its iteration cap.
    NonConvergence { iterations: usize, message: String },
}

/// How a successful optimization ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    /// Iteration cap reached; parameters are still usable.
    IterationCap,
}

/// Parameters and diagnostics of a successful fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayFit {
    pub model: DecayModel,
    /// Rate constant.
    pub k: f64,
    /// Plateau. `None` for the zero-order model.
    pub y1: Option<f64>,
    /// `1 / k`.
    pub tau: f64,
    /// Coefficient of determination against the segment's own mean. May be negative.
    pub r2: f64,
    /// Residual sum of squares at the optimum.
    pub sse: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Fit state of a tracelet. Written once by the fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FitOutcome {
    Unfitted,
    Fitted(DecayFit),
    Failed(FitFailure),
}

/// Decay durations measured on a tracelet's smoothed copy.
///
/// `t10` spans the points above 90% of the fall height, `t50` above 50%, and
/// `t90` above 10%; `t100` is the whole tracelet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayTimes {
    pub t10: f64,
    pub t50: f64,
    pub t90: f64,
    pub t100: f64,
}

/// One fall segment cut from a trace.
///
/// Holds its own copies of the sliced sequences so later changes to the parent
/// trace cannot leak in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tracelet {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) x: Vec<f64>,
    pub(crate) y: Vec<f64>,
    pub(crate) smoothed: Vec<f64>,
    pub(crate) outcome: FitOutcome,
}

impl Tracelet {
    /// Build a tracelet from already-sliced sequences covering `[start, end)`.
    pub fn new(
        start: usize,
        end: usize,
        x: Vec<f64>,
        y: Vec<f64>,
        smoothed: Vec<f64>,
    ) -> Result<Self, AppError> {
        if x.len() != y.len() || smoothed.len() != y.len() {
            return Err(AppError::contract(format!(
                "Tracelet sequences differ in length: x={}, y={}, smoothed={}.",
                x.len(),
                y.len(),
                smoothed.len()
            )));
        }
        Ok(Self {
            start,
            end,
            x,
            y,
            smoothed,
            outcome: FitOutcome::Unfitted,
        })
    }

    /// Cut `[start, end)` out of a trace's `median_time` / `ratio` / `smoothed`.
    pub fn slice(trace: &Trace, start: usize, end: usize) -> Result<Self, AppError> {
        let n = trace.ratio.len();
        if start > end || end > n || trace.smoothed.len() != n || trace.median_time.len() != n {
            return Err(AppError::contract(format!(
                "Tracelet range {start}..{end} is invalid for a trace of {n} ratio points."
            )));
        }
        Self::new(
            start,
            end,
            trace.median_time[start..end].to_vec(),
            trace.ratio[start..end].to_vec(),
            trace.smoothed[start..end].to_vec(),
        )
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn outcome(&self) -> &FitOutcome {
        &self.outcome
    }

    /// The fit, if one succeeded.
    pub fn fit(&self) -> Option<&DecayFit> {
        match &self.outcome {
            FitOutcome::Fitted(fit) => Some(fit),
            _ => None,
        }
    }

    pub fn success(&self) -> bool {
        self.fit().is_some()
    }

    /// Flat per-tracelet record for exporters.
    pub fn summary(&self) -> TraceletSummary {
        match self.fit() {
            Some(fit) => TraceletSummary {
                start: self.start,
                end: self.end,
                k: Some(fit.k),
                tau: Some(fit.tau),
                y1: fit.y1,
                r2: Some(fit.r2),
                success: true,
            },
            None => TraceletSummary {
                start: self.start,
                end: self.end,
                k: None,
                tau: None,
                y1: None,
                r2: None,
                success: false,
            },
        }
    }
}

/// `(k, tau, y1, R2, success)` for one tracelet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceletSummary {
    pub start: usize,
    pub end: usize,
    pub k: Option<f64>,
    pub tau: Option<f64>,
    pub y1: Option<f64>,
    pub r2: Option<f64>,
    pub success: bool,
}

/// Everything the pipeline produces for one trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub label: String,
    pub median_time: Vec<f64>,
    pub ratio: Vec<f64>,
    pub smoothed: Vec<f64>,
    pub derivative: Vec<f64>,
    pub orientation: OrientationStatus,
    pub rises: Vec<RiseEvent>,
    pub tracelets: Vec<Tracelet>,
}

impl TraceReport {
    pub fn summaries(&self) -> Vec<TraceletSummary> {
        self.tracelets.iter().map(Tracelet::summary).collect()
    }

    /// Tracelets whose fit succeeded (the only ones an exporter should aggregate).
    pub fn successful_tracelets(&self) -> impl Iterator<Item = &Tracelet> {
        self.tracelets.iter().filter(|t| t.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace() -> Trace {
        Trace::new(
            "Sheet 1/Cell #3",
            vec![0.0, 1.0, 2.0, 3.0],
            vec![10.0, 2.0, 20.0, 4.0],
            vec![0.0; 4],
        )
        .unwrap()
    }

    #[test]
    fn label_is_sanitized() {
        assert_eq!(trace().label(), "Sheet1Cell3");
    }

    #[test]
    fn rejects_mismatched_and_odd_lengths() {
        let err = Trace::new("a", vec![0.0, 1.0], vec![1.0], vec![0.0, 0.0]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Contract);
        assert!(Trace::new("a", vec![0.0, 1.0, 2.0], vec![1.0; 3], vec![0.0; 3]).is_err());
        assert!(Trace::new("a", vec![0.0, 0.0], vec![1.0; 2], vec![0.0; 2]).is_err());
        assert!(Trace::new("a", vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn interval_len_is_inclusive() {
        assert_eq!(Interval::new(2, 4).len(), 3);
        assert!(!Interval::new(2, 2).is_empty());
    }

    #[test]
    fn model_names_parse() {
        assert_eq!(DecayModel::parse("o1p2"), Some(DecayModel::FirstOrderTwoParam));
        assert_eq!(
            DecayModel::parse("Zero_Order_One_Param"),
            Some(DecayModel::ZeroOrderOneParam)
        );
        assert_eq!(DecayModel::parse("3"), None);
        for m in DecayModel::ALL {
            assert!(m.param_count() >= 1);
        }
    }

    #[test]
    fn unfitted_tracelet_reports_failure_summary() {
        let t = Tracelet::new(0, 2, vec![0.0, 1.0], vec![2.0, 1.0], vec![2.0, 1.0]).unwrap();
        let s = t.summary();
        assert!(!s.success);
        assert_eq!(s.k, None);
        assert!(Tracelet::new(0, 2, vec![0.0], vec![2.0, 1.0], vec![2.0, 1.0]).is_err());
    }
}
