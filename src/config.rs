//! Pipeline configuration.
//!
//! Loaded from defaults, JSON, or the environment (`.env` plus `AUTOCAL_*`
//! overrides). Every loader finishes with [`PipelineConfig::validate`].

use serde::{Deserialize, Serialize};

use crate::domain::DecayModel;
use crate::error::AppError;
use crate::fit::{FitSettings, ScalarOptions, SimplexOptions};
use crate::trace::{BackgroundCorrection, OrientationParams};

/// Prefix of environment variables read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "AUTOCAL_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Savitzky–Golay window for the ratio trace (odd).
    pub smooth_window: usize,
    pub smooth_order: usize,

    /// Savitzky–Golay window for each background channel (odd).
    pub background_window: usize,
    pub background_order: usize,
    pub subtract_background: bool,
    /// Smooth the background before subtracting it.
    pub smooth_background: bool,

    /// Largest derivative median accepted as correctly oriented.
    pub orientation_tolerance: f64,
    pub max_orientation_iterations: usize,

    /// Minimum rise length, in derivative samples.
    pub x_tolerance: usize,
    /// Derivative value a sample must exceed to count as rising.
    pub y_tolerance: f64,

    pub model: DecayModel,
    pub simplex_max_iterations: usize,
    pub scalar_max_iterations: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smooth_window: 15,
            smooth_order: 3,
            background_window: 51,
            background_order: 3,
            subtract_background: false,
            smooth_background: true,
            orientation_tolerance: 0.0,
            max_orientation_iterations: 10,
            x_tolerance: 10,
            y_tolerance: 0.0005,
            model: DecayModel::FirstOrderTwoParam,
            simplex_max_iterations: 500,
            scalar_max_iterations: 200,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| AppError::config(format!("Invalid pipeline config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `AUTOCAL_*` variables (a `.env` file is loaded first if present).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AUTOCAL_<FIELD>` overrides from `(name, value)` pairs.
    ///
    /// Unrelated names are ignored; an unknown `AUTOCAL_` name or an unparsable
    /// value is a config error.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(field) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.trim();
            match field {
                "SMOOTH_WINDOW" => self.smooth_window = parse_value(&name, value)?,
                "SMOOTH_ORDER" => self.smooth_order = parse_value(&name, value)?,
                "BACKGROUND_WINDOW" => self.background_window = parse_value(&name, value)?,
                "BACKGROUND_ORDER" => self.background_order = parse_value(&name, value)?,
                "SUBTRACT_BACKGROUND" => self.subtract_background = parse_flag(&name, value)?,
                "SMOOTH_BACKGROUND" => self.smooth_background = parse_flag(&name, value)?,
                "ORIENTATION_TOLERANCE" => self.orientation_tolerance = parse_value(&name, value)?,
                "MAX_ORIENTATION_ITERATIONS" => {
                    self.max_orientation_iterations = parse_value(&name, value)?
                }
                "X_TOLERANCE" => self.x_tolerance = parse_value(&name, value)?,
                "Y_TOLERANCE" => self.y_tolerance = parse_value(&name, value)?,
                "MODEL" => {
                    self.model = DecayModel::parse(value).ok_or_else(|| {
                        AppError::config(format!("{name}: unknown decay model '{value}'."))
                    })?
                }
                "SIMPLEX_MAX_ITERATIONS" => self.simplex_max_iterations = parse_value(&name, value)?,
                "SCALAR_MAX_ITERATIONS" => self.scalar_max_iterations = parse_value(&name, value)?,
                _ => {
                    return Err(AppError::config(format!(
                        "Unknown configuration variable {name}."
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        check_window("smooth", self.smooth_window, self.smooth_order)?;
        if self.subtract_background && self.smooth_background {
            check_window("background", self.background_window, self.background_order)?;
        }
        if !self.orientation_tolerance.is_finite() {
            return Err(AppError::config("orientation_tolerance must be finite."));
        }
        if !self.y_tolerance.is_finite() {
            return Err(AppError::config("y_tolerance must be finite."));
        }
        if self.max_orientation_iterations == 0 {
            return Err(AppError::config("max_orientation_iterations must be at least 1."));
        }
        if self.simplex_max_iterations == 0 || self.scalar_max_iterations == 0 {
            return Err(AppError::config("Optimizer iteration caps must be at least 1."));
        }
        Ok(())
    }

    pub fn background_correction(&self) -> BackgroundCorrection {
        BackgroundCorrection::from_flags(
            self.subtract_background,
            self.smooth_background,
            self.background_window,
            self.background_order,
        )
    }

    pub fn orientation_params(&self) -> OrientationParams {
        OrientationParams {
            window: self.smooth_window,
            order: self.smooth_order,
            tolerance: self.orientation_tolerance,
            max_iterations: self.max_orientation_iterations,
        }
    }

    pub fn fit_settings(&self) -> FitSettings {
        FitSettings {
            scalar: ScalarOptions {
                max_iterations: self.scalar_max_iterations,
                ..ScalarOptions::default()
            },
            simplex: SimplexOptions {
                max_iterations: self.simplex_max_iterations,
                ..SimplexOptions::default()
            },
        }
    }
}

fn check_window(what: &str, window: usize, order: usize) -> Result<(), AppError> {
    if window % 2 == 0 {
        return Err(AppError::config(format!(
            "{what}_window must be odd, got {window}."
        )));
    }
    if window < order + 2 {
        return Err(AppError::config(format!(
            "{what}_window {window} is too small for polynomial order {order}."
        )));
    }
    Ok(())
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| AppError::config(format!("{name}: cannot parse '{value}': {e}")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, AppError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!("{name}: expected a boolean, got '{value}'."))),
    }
}
