//! Kinematic physics for simulated entities.
//!
//! A [`SimBody`] is both the ground truth of the simulated world and the
//! adapter the rewind engine drives. Props are rigid bodies under gravity
//! that bounce off the floor at z = 0; characters are moved by their
//! movement velocity according to their movement mode. Nothing integrates
//! while physics simulation is switched off.

use nalgebra::{UnitQuaternion, Vector3};
use rewind_core::RingBuffer;
use rewind_env::{AnimationDriver, EntityBody, MotionDriver, MovementMode, Pose, RewindTarget};
use serde::{Deserialize, Serialize};

/// Fraction of vertical speed kept after a floor bounce.
const RESTITUTION: f64 = 0.6;

/// Vertical speed below which a bouncing prop comes to rest.
const REST_SPEED: f64 = 0.05;

/// Most recent adapter writes kept per body; older ones are dropped.
pub const CALL_LOG_CAPACITY: usize = 256;

/// What drives a body's motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Rigid body integrated from its velocities
    Prop,
    /// Locomotion driven by movement velocity and mode
    Character,
}

/// One adapter write, recorded in call order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyCall {
    SetPose,
    SetLinearVelocity,
    SetAngularVelocity,
    SetSimulatePhysics(bool),
    ForcePhysicsResync,
    SetAnimationPaused(bool),
    SetMovementVelocity,
    SetMovementMode(MovementMode),
}

/// A simulated entity.
#[derive(Debug, Clone)]
pub struct SimBody {
    label: String,
    kind: BodyKind,
    pose: Pose,
    linear_velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    simulating: bool,

    /// Animation clock; advances only while not paused
    animation_time: f64,
    animation_paused: bool,

    movement_velocity: Vector3<f64>,
    movement_mode: MovementMode,

    calls: RingBuffer<BodyCall>,
}

impl SimBody {
    /// Creates a prop at `position` moving with `velocity`.
    pub fn prop(label: &str, position: Vector3<f64>, velocity: Vector3<f64>, spin: Vector3<f64>) -> Self {
        Self {
            label: label.to_string(),
            kind: BodyKind::Prop,
            pose: Pose::from_position(position),
            linear_velocity: velocity,
            angular_velocity: spin,
            simulating: true,
            animation_time: 0.0,
            animation_paused: false,
            movement_velocity: Vector3::zeros(),
            movement_mode: MovementMode::None,
            calls: RingBuffer::with_capacity(CALL_LOG_CAPACITY),
        }
    }

    /// Creates a character walking with `movement_velocity`.
    pub fn character(label: &str, position: Vector3<f64>, movement_velocity: Vector3<f64>) -> Self {
        Self {
            label: label.to_string(),
            kind: BodyKind::Character,
            pose: Pose::from_position(position),
            linear_velocity: movement_velocity,
            angular_velocity: Vector3::zeros(),
            simulating: true,
            animation_time: 0.0,
            animation_paused: false,
            movement_velocity,
            movement_mode: MovementMode::Walking,
            calls: RingBuffer::with_capacity(CALL_LOG_CAPACITY),
        }
    }

    /// Advances the body by `dt` seconds under `gravity` (m/s², along z).
    pub fn step(&mut self, dt: f64, gravity: f64) {
        if !self.animation_paused {
            self.animation_time += dt;
        }
        if !self.simulating {
            return;
        }

        match self.kind {
            BodyKind::Prop => self.step_prop(dt, gravity),
            BodyKind::Character => self.step_character(dt, gravity),
        }
    }

    fn step_prop(&mut self, dt: f64, gravity: f64) {
        self.linear_velocity.z += gravity * dt;
        self.pose.position += self.linear_velocity * dt;

        if self.pose.position.z < 0.0 {
            self.pose.position.z = -self.pose.position.z * RESTITUTION;
            self.linear_velocity.z = -self.linear_velocity.z * RESTITUTION;
            if self.linear_velocity.z.abs() < REST_SPEED {
                self.pose.position.z = 0.0;
                self.linear_velocity.z = 0.0;
            }
        }

        let spin = UnitQuaternion::from_scaled_axis(self.angular_velocity * dt);
        self.pose.rotation = spin * self.pose.rotation;
    }

    fn step_character(&mut self, dt: f64, gravity: f64) {
        match self.movement_mode {
            MovementMode::Walking | MovementMode::NavWalking => {
                self.movement_velocity.z = 0.0;
            }
            MovementMode::Falling => {
                self.movement_velocity.z += gravity * dt;
            }
            MovementMode::Swimming | MovementMode::Flying => {}
            MovementMode::None | MovementMode::Custom(_) => return,
        }

        self.pose.position += self.movement_velocity * dt;
        if self.movement_mode == MovementMode::Falling && self.pose.position.z <= 0.0 {
            self.pose.position.z = 0.0;
            self.movement_velocity.z = 0.0;
            self.movement_mode = MovementMode::Walking;
        }
        self.linear_velocity = self.movement_velocity;
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn position(&self) -> Vector3<f64> {
        self.pose.position
    }

    pub fn animation_time(&self) -> f64 {
        self.animation_time
    }

    /// Adapter writes since the last [`SimBody::take_calls`], oldest first.
    ///
    /// Only the newest [`CALL_LOG_CAPACITY`] writes are kept.
    pub fn calls(&self) -> impl Iterator<Item = &BodyCall> {
        self.calls.iter()
    }

    pub fn take_calls(&mut self) -> Vec<BodyCall> {
        let calls = self.calls.iter().copied().collect();
        self.calls.clear();
        calls
    }

    fn log(&mut self, call: BodyCall) {
        self.calls.push_back(call);
    }

    pub fn count_calls(&self, call: BodyCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl EntityBody for SimBody {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.log(BodyCall::SetPose);
        self.pose = pose;
    }

    fn linear_velocity(&self) -> Vector3<f64> {
        self.linear_velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vector3<f64>) {
        self.log(BodyCall::SetLinearVelocity);
        self.linear_velocity = velocity;
    }

    fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    fn set_angular_velocity(&mut self, velocity: Vector3<f64>) {
        self.log(BodyCall::SetAngularVelocity);
        self.angular_velocity = velocity;
    }

    fn is_simulating_physics(&self) -> bool {
        self.simulating
    }

    fn set_simulate_physics(&mut self, simulate: bool) {
        self.log(BodyCall::SetSimulatePhysics(simulate));
        self.simulating = simulate;
    }

    fn force_physics_resync(&mut self) {
        self.log(BodyCall::ForcePhysicsResync);
        if self.kind == BodyKind::Character {
            self.linear_velocity = self.movement_velocity;
        }
    }
}

impl AnimationDriver for SimBody {
    fn set_animation_paused(&mut self, paused: bool) {
        self.log(BodyCall::SetAnimationPaused(paused));
        self.animation_paused = paused;
    }

    fn is_animation_paused(&self) -> bool {
        self.animation_paused
    }
}

impl MotionDriver for SimBody {
    fn movement_velocity(&self) -> Vector3<f64> {
        self.movement_velocity
    }

    fn set_movement_velocity(&mut self, velocity: Vector3<f64>) {
        self.log(BodyCall::SetMovementVelocity);
        self.movement_velocity = velocity;
    }

    fn movement_mode(&self) -> MovementMode {
        self.movement_mode
    }

    fn set_movement_mode(&mut self, mode: MovementMode) {
        self.log(BodyCall::SetMovementMode(mode));
        self.movement_mode = mode;
    }
}

impl RewindTarget for SimBody {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn motion(&self) -> Option<&dyn MotionDriver> {
        match self.kind {
            BodyKind::Character => Some(self),
            BodyKind::Prop => None,
        }
    }

    fn motion_mut(&mut self) -> Option<&mut dyn MotionDriver> {
        match self.kind {
            BodyKind::Character => Some(self),
            BodyKind::Prop => None,
        }
    }
}
