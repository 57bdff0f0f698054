//! Rewind Environment Abstraction Layer
//!
//! This crate defines the boundary between the rewind engine and whatever
//! owns the entities: a game engine, a physics engine, or the deterministic
//! simulator in `rewind_sim`.
//!
//! # Core Concept: Injected Capabilities
//!
//! The engine only consumes a handful of operations:
//! - Pose and velocity (`EntityBody`)
//! - Physics pause / resume / resync (`EntityBody`)
//! - Animation pause / resume (`AnimationDriver`)
//! - Movement velocity + mode, for entities with locomotion (`MotionDriver`)
//!
//! Implementing [`RewindTarget`] for an entity type is all that is needed to
//! make it rewindable.
//!
//! # Example
//!
//! ```ignore
//! use rewind_env::{RewindTarget, EntityBody, AnimationDriver};
//!
//! impl RewindTarget for Crate {
//!     fn label(&self) -> String {
//!         self.name.clone()
//!     }
//! }
//! ```

mod adapters;
mod error;
mod types;

pub use adapters::{require_motion, AnimationDriver, EntityBody, MotionDriver, RewindTarget};
pub use error::EnvError;
pub use types::{EntityId, MovementMode, Pose};
