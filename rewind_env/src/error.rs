//! Error types for the rewind environment abstraction.

use thiserror::Error;

/// Errors that can occur at the adapter boundary.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The entity does not expose a requested capability
    #[error("Entity {entity} does not support {capability}")]
    MissingCapability {
        entity: String,
        capability: &'static str,
    },
}

impl EnvError {
    /// Creates a missing-capability error.
    pub fn missing_capability(entity: impl std::fmt::Display, capability: &'static str) -> Self {
        Self::MissingCapability {
            entity: entity.to_string(),
            capability,
        }
    }
}
