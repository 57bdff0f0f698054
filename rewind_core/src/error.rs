//! Error types for the rewind engine.

use thiserror::Error;

/// Errors surfaced by the rewind engine.
///
/// Only configuration problems are errors. Redundant start/stop calls,
/// insufficient history and missing capabilities have defined fallbacks.
#[derive(Debug, Error, PartialEq)]
pub enum RewindError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown speed preset {index} (have {available})")]
    UnknownSpeedPreset { index: usize, available: usize },
}

impl RewindError {
    /// Creates an invalid-configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
