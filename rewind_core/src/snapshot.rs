//! Recorded instants of an entity's state and how to blend between them.
//!
//! Every snapshot carries the time elapsed since the previous one, so a
//! history of snapshots is a piecewise timeline with variable-length
//! segments. Blending is continuous for poses and velocities; the movement
//! mode is categorical and is picked from the nearer endpoint.

use nalgebra::{UnitQuaternion, Vector3};
use rewind_env::{EntityBody, MotionDriver, MovementMode, Pose};
use serde::{Deserialize, Serialize};

/// Pose and rigid-body velocities captured on one sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseVelocitySnapshot {
    /// Seconds since the previous snapshot (always positive)
    pub interval_since_prev: f64,

    /// World-space pose
    pub pose: Pose,

    /// Linear velocity in m/s
    pub linear_velocity: Vector3<f64>,

    /// Angular velocity in rad/s
    pub angular_velocity: Vector3<f64>,
}

impl PoseVelocitySnapshot {
    /// Reads the current pose and velocities from `body`.
    pub fn capture(body: &(impl EntityBody + ?Sized), interval_since_prev: f64) -> Self {
        Self {
            interval_since_prev,
            pose: body.pose(),
            linear_velocity: body.linear_velocity(),
            angular_velocity: body.angular_velocity(),
        }
    }

    /// Writes the pose and velocities back to `body`.
    ///
    /// Velocities are written as recorded, also during a rewind pass.
    pub fn apply(&self, body: &mut (impl EntityBody + ?Sized)) {
        body.set_pose(self.pose);
        body.set_linear_velocity(self.linear_velocity);
        body.set_angular_velocity(self.angular_velocity);
    }

    /// Blends `a` towards `b` by `alpha` (clamped to [0, 1]).
    ///
    /// Position, scale and velocities are lerped; rotation is slerped along
    /// the shortest arc. The result carries `b`'s interval.
    pub fn blend(a: &Self, b: &Self, alpha: f64) -> Self {
        let t = alpha.clamp(0.0, 1.0);
        Self {
            interval_since_prev: b.interval_since_prev,
            pose: Pose {
                position: a.pose.position.lerp(&b.pose.position, t),
                rotation: shortest_slerp(&a.pose.rotation, &b.pose.rotation, t),
                scale: a.pose.scale.lerp(&b.pose.scale, t),
            },
            linear_velocity: a.linear_velocity.lerp(&b.linear_velocity, t),
            angular_velocity: a.angular_velocity.lerp(&b.angular_velocity, t),
        }
    }
}

/// Movement-controller state captured alongside a [`PoseVelocitySnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSnapshot {
    /// Seconds since the previous snapshot (always positive)
    pub interval_since_prev: f64,

    /// Movement velocity in m/s
    pub movement_velocity: Vector3<f64>,

    /// Discrete locomotion mode
    pub movement_mode: MovementMode,
}

impl MotionSnapshot {
    /// Reads the movement state from `motion`.
    pub fn capture(motion: &dyn MotionDriver, interval_since_prev: f64) -> Self {
        Self {
            interval_since_prev,
            movement_velocity: motion.movement_velocity(),
            movement_mode: motion.movement_mode(),
        }
    }

    /// Writes the movement state back, scaling the velocity by `velocity_scale`.
    pub fn apply(&self, motion: &mut dyn MotionDriver, velocity_scale: f64) {
        motion.set_movement_velocity(self.movement_velocity * velocity_scale);
        motion.set_movement_mode(self.movement_mode);
    }

    /// Blends velocity continuously; the mode snaps to the nearer endpoint.
    pub fn blend(a: &Self, b: &Self, alpha: f64) -> Self {
        let t = alpha.clamp(0.0, 1.0);
        Self {
            interval_since_prev: b.interval_since_prev,
            movement_velocity: a.movement_velocity.lerp(&b.movement_velocity, t),
            movement_mode: if t < 0.5 { a.movement_mode } else { b.movement_mode },
        }
    }
}

/// Slerp that never takes the long way round.
///
/// Falls back to nlerp when the inputs are too close to antipodal for slerp
/// to pick a well-defined great circle.
fn shortest_slerp(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>, t: f64) -> UnitQuaternion<f64> {
    let target = if a.coords.dot(&b.coords) < 0.0 {
        UnitQuaternion::new_unchecked(-b.into_inner())
    } else {
        *b
    };
    a.try_slerp(&target, t, 1.0e-9)
        .unwrap_or_else(|| a.nlerp(&target, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn snapshot_at(x: f64, yaw: f64) -> PoseVelocitySnapshot {
        PoseVelocitySnapshot {
            interval_since_prev: 1.0 / 30.0,
            pose: Pose {
                position: Vector3::new(x, 0.0, 0.0),
                rotation: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
                scale: Vector3::new(1.0, 1.0, 1.0),
            },
            linear_velocity: Vector3::new(x, 0.0, 0.0),
            angular_velocity: Vector3::new(0.0, 0.0, yaw),
        }
    }

    #[test]
    fn test_blend_midpoint() {
        let a = snapshot_at(0.0, 0.0);
        let b = snapshot_at(2.0, FRAC_PI_2);

        let mid = PoseVelocitySnapshot::blend(&a, &b, 0.5);
        assert_relative_eq!(mid.pose.position.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(mid.linear_velocity.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(mid.pose.rotation.angle(), FRAC_PI_2 / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_blend_endpoints_are_exact() {
        let a = snapshot_at(0.0, 0.3);
        let b = snapshot_at(5.0, 1.2);

        assert_eq!(PoseVelocitySnapshot::blend(&a, &b, 0.0).pose.position, a.pose.position);
        assert_eq!(PoseVelocitySnapshot::blend(&a, &b, 1.0).pose.position, b.pose.position);
        assert!(PoseVelocitySnapshot::blend(&a, &b, 1.0).pose.approx_eq(&b.pose, 1e-12));
    }

    #[test]
    fn test_blend_clamps_alpha() {
        let a = snapshot_at(0.0, 0.0);
        let b = snapshot_at(1.0, 0.0);

        assert_eq!(PoseVelocitySnapshot::blend(&a, &b, 7.5).pose.position.x, 1.0);
        assert_eq!(PoseVelocitySnapshot::blend(&a, &b, -3.0).pose.position.x, 0.0);
    }

    #[test]
    fn test_rotation_takes_shortest_path() {
        let a = snapshot_at(0.0, -5.0_f64.to_radians());
        let mut b = snapshot_at(0.0, 5.0_f64.to_radians());
        // Same orientation expressed in the opposite hemisphere
        b.pose.rotation = UnitQuaternion::new_unchecked(-b.pose.rotation.into_inner());

        let mid = PoseVelocitySnapshot::blend(&a, &b, 0.5);
        assert!(mid.pose.rotation.angle() < 1.0e-9);
    }

    #[test]
    fn test_motion_mode_snaps_to_nearest_endpoint() {
        let a = MotionSnapshot {
            interval_since_prev: 0.1,
            movement_velocity: Vector3::new(0.0, 0.0, 0.0),
            movement_mode: MovementMode::Walking,
        };
        let b = MotionSnapshot {
            interval_since_prev: 0.2,
            movement_velocity: Vector3::new(4.0, 0.0, 0.0),
            movement_mode: MovementMode::Falling,
        };

        let early = MotionSnapshot::blend(&a, &b, 0.49);
        assert_eq!(early.movement_mode, MovementMode::Walking);
        assert_relative_eq!(early.movement_velocity.x, 1.96, epsilon = 1e-12);

        let late = MotionSnapshot::blend(&a, &b, 0.5);
        assert_eq!(late.movement_mode, MovementMode::Falling);
        assert_eq!(late.interval_since_prev, 0.2);
    }
}
