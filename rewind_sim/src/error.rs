//! Simulator error types.

use rewind_core::{RewindError, SubscriberId};
use rewind_env::EnvError;
use thiserror::Error;

/// Errors raised while building or driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Rewind engine error: {0}")]
    Rewind(#[from] RewindError),

    #[error("Entity adapter error: {0}")]
    Env(#[from] EnvError),

    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),

    #[error("No tracked entity for {0:?}")]
    UnknownEntity(SubscriberId),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
