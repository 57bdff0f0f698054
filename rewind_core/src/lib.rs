//! Rewind Core - Per-entity time manipulation for tick-driven simulations
//!
//! This library lets a live simulation be rewound, fast-forwarded and
//! scrubbed entity by entity while every entity follows one global signal:
//! 1. **Recording**: each [`RewindTracker`] samples its entity into a
//!    fixed-budget ring buffer of pose/velocity (and optional movement) snapshots
//! 2. **Playback**: manipulated trackers walk their history and blend between
//!    neighbouring snapshots, settling exactly on a snapshot when they stop
//! 3. **Coordination**: a [`TimeController`] broadcasts start/stop events to an
//!    explicit subscriber list; each tracker decides legality through a
//!    tagged state machine
//!
//! Entities are reached only through the adapter traits of `rewind_env`.

pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod ring_buffer;
pub mod snapshot;
pub mod state;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types for convenience
pub use config::{ControllerConfig, TrackerConfig};
pub use controller::{
    ControlEvent, ControlFlags, ControlListener, ControllerSnapshot, SpeedPreset, SubscriberId,
    TimeController,
};
pub use error::RewindError;
pub use history::{CapacityPlan, SnapshotHistory};
pub use ring_buffer::RingBuffer;
pub use snapshot::{MotionSnapshot, PoseVelocitySnapshot};
pub use state::{ManipulationKind, ManipulationState, ScrubMotion};
pub use tracker::{RewindTracker, TrackerEvent};
