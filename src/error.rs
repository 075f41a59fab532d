//! Crate error type.
//!
//! Only two failure families are errors here:
//!
//! - malformed input (lengths, odd channel data, bad filter parameters, bad config)
//! - numeric degeneracy local to one trace (division by zero while building a ratio)
//!
//! Optimizer non-convergence and an undetermined orientation are *outcomes*, not
//! errors, and are recorded on the tracelet / trace report instead.

use thiserror::Error;

/// Broad category of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied malformed input. Not recovered.
    Contract,
    /// Numeric degeneracy confined to one trace or tracelet.
    Numeric,
    /// Invalid pipeline configuration.
    Config,
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Contract, message)
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Numeric, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Exit code mapping for external front-ends wrapping this library
    /// (2 for bad input or config, 3 for numeric failures).
    pub fn exit_code(&self) -> u8 {
        match self.kind {
            ErrorKind::Contract | ErrorKind::Config => 2,
            ErrorKind::Numeric => 3,
        }
    }
}
