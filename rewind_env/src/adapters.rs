//! Adapter traits through which the rewind engine reads and drives entities.
//!
//! The engine never talks to a physics or animation engine directly. Each
//! tracked entity is wrapped in something implementing [`RewindTarget`], and
//! every side effect (pausing physics, pausing animation, writing a pose)
//! goes through these traits. Tests substitute a recording double.
//!
//! ```text
//!  RewindTracker ──► RewindTarget
//!                      ├── EntityBody       pose, velocities, physics toggles
//!                      ├── AnimationDriver  pause / resume
//!                      └── MotionDriver?    movement velocity + mode (capability)
//! ```

use crate::error::EnvError;
use crate::types::{MovementMode, Pose};
use nalgebra::Vector3;

/// Pose, velocity and physics-simulation access for one entity.
pub trait EntityBody {
    /// Returns the current world-space pose.
    fn pose(&self) -> Pose;

    /// Teleports the entity to `pose`.
    fn set_pose(&mut self, pose: Pose);

    /// Returns the linear velocity in m/s.
    fn linear_velocity(&self) -> Vector3<f64>;

    /// Sets the linear velocity in m/s.
    fn set_linear_velocity(&mut self, velocity: Vector3<f64>);

    /// Returns the angular velocity in rad/s.
    fn angular_velocity(&self) -> Vector3<f64>;

    /// Sets the angular velocity in rad/s.
    fn set_angular_velocity(&mut self, velocity: Vector3<f64>);

    /// Returns true while the physics engine integrates this body.
    fn is_simulating_physics(&self) -> bool;

    /// Enables or disables physics integration for this body.
    fn set_simulate_physics(&mut self, simulate: bool);

    /// Rebuilds the physics state from the current pose and velocities.
    ///
    /// Called after re-enabling simulation so written velocities take effect.
    fn force_physics_resync(&mut self);
}

/// Animation playback control for one entity.
pub trait AnimationDriver {
    /// Pauses or resumes animation playback.
    fn set_animation_paused(&mut self, paused: bool);

    /// Returns true if animation playback is currently paused.
    fn is_animation_paused(&self) -> bool;
}

/// Locomotion state for entities driven by a movement controller.
pub trait MotionDriver {
    /// Returns the movement controller's velocity in m/s.
    fn movement_velocity(&self) -> Vector3<f64>;

    /// Sets the movement controller's velocity in m/s.
    fn set_movement_velocity(&mut self, velocity: Vector3<f64>);

    /// Returns the current movement mode.
    fn movement_mode(&self) -> MovementMode;

    /// Switches the movement mode.
    fn set_movement_mode(&mut self, mode: MovementMode);
}

/// An entity that can be recorded and played back.
///
/// The motion capability is optional. Entities without locomotion keep the
/// default `None` accessors and never get a motion history.
pub trait RewindTarget: EntityBody + AnimationDriver {
    /// Human-readable name for diagnostics.
    fn label(&self) -> String;

    /// Movement state capability, if this entity has one.
    fn motion(&self) -> Option<&dyn MotionDriver> {
        None
    }

    /// Mutable movement state capability, if this entity has one.
    fn motion_mut(&mut self) -> Option<&mut dyn MotionDriver> {
        None
    }

    /// Returns true if this entity exposes the motion capability.
    fn has_motion(&self) -> bool {
        self.motion().is_some()
    }
}

/// Borrows the motion capability of `target`, or reports it missing.
pub fn require_motion<T>(target: &mut T) -> Result<&mut dyn MotionDriver, EnvError>
where
    T: RewindTarget + ?Sized,
{
    if !target.has_motion() {
        return Err(EnvError::missing_capability(target.label(), "movement state"));
    }
    target
        .motion_mut()
        .ok_or(EnvError::missing_capability("entity", "movement state"))
}
