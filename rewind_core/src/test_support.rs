//! Recording adapter double for tracker tests.

use nalgebra::Vector3;
use rewind_env::{AnimationDriver, EntityBody, MotionDriver, MovementMode, Pose, RewindTarget};

/// One adapter write, in call order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdapterCall {
    SetPose(Pose),
    SetLinearVelocity(Vector3<f64>),
    SetAngularVelocity(Vector3<f64>),
    SetSimulatePhysics(bool),
    ForcePhysicsResync,
    SetAnimationPaused(bool),
    SetMovementVelocity(Vector3<f64>),
    SetMovementMode(MovementMode),
}

/// Entity that stores whatever it is told and logs every write.
#[derive(Debug, Clone)]
pub struct RecordingEntity {
    pub pose: Pose,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub simulating: bool,
    pub animation_paused: bool,
    pub movement_velocity: Vector3<f64>,
    pub movement_mode: MovementMode,
    pub has_motion_capability: bool,
    pub calls: Vec<AdapterCall>,
}

impl RecordingEntity {
    /// A physics prop without locomotion.
    pub fn prop() -> Self {
        Self {
            pose: Pose::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            simulating: true,
            animation_paused: false,
            movement_velocity: Vector3::zeros(),
            movement_mode: MovementMode::None,
            has_motion_capability: false,
            calls: Vec::new(),
        }
    }

    /// An entity exposing the motion capability.
    pub fn character() -> Self {
        Self {
            movement_mode: MovementMode::Walking,
            has_motion_capability: true,
            ..Self::prop()
        }
    }

    /// Moves the entity as live simulation would, without logging.
    pub fn place_at(&mut self, x: f64) {
        self.pose.position = Vector3::new(x, 0.0, 0.0);
        self.linear_velocity = Vector3::new(1.0, 0.0, 0.0);
        self.angular_velocity = Vector3::new(0.0, 0.0, 0.5);
        self.movement_velocity = Vector3::new(2.0, 0.0, 0.0);
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, call: AdapterCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    pub fn position_x(&self) -> f64 {
        self.pose.position.x
    }
}

impl EntityBody for RecordingEntity {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.calls.push(AdapterCall::SetPose(pose));
        self.pose = pose;
    }

    fn linear_velocity(&self) -> Vector3<f64> {
        self.linear_velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vector3<f64>) {
        self.calls.push(AdapterCall::SetLinearVelocity(velocity));
        self.linear_velocity = velocity;
    }

    fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    fn set_angular_velocity(&mut self, velocity: Vector3<f64>) {
        self.calls.push(AdapterCall::SetAngularVelocity(velocity));
        self.angular_velocity = velocity;
    }

    fn is_simulating_physics(&self) -> bool {
        self.simulating
    }

    fn set_simulate_physics(&mut self, simulate: bool) {
        self.calls.push(AdapterCall::SetSimulatePhysics(simulate));
        self.simulating = simulate;
    }

    fn force_physics_resync(&mut self) {
        self.calls.push(AdapterCall::ForcePhysicsResync);
    }
}

impl AnimationDriver for RecordingEntity {
    fn set_animation_paused(&mut self, paused: bool) {
        self.calls.push(AdapterCall::SetAnimationPaused(paused));
        self.animation_paused = paused;
    }

    fn is_animation_paused(&self) -> bool {
        self.animation_paused
    }
}

impl MotionDriver for RecordingEntity {
    fn movement_velocity(&self) -> Vector3<f64> {
        self.movement_velocity
    }

    fn set_movement_velocity(&mut self, velocity: Vector3<f64>) {
        self.calls.push(AdapterCall::SetMovementVelocity(velocity));
        self.movement_velocity = velocity;
    }

    fn movement_mode(&self) -> MovementMode {
        self.movement_mode
    }

    fn set_movement_mode(&mut self, mode: MovementMode) {
        self.calls.push(AdapterCall::SetMovementMode(mode));
        self.movement_mode = mode;
    }
}

impl RewindTarget for RecordingEntity {
    fn label(&self) -> String {
        if self.has_motion_capability {
            "recording-character".to_string()
        } else {
            "recording-prop".to_string()
        }
    }

    fn motion(&self) -> Option<&dyn MotionDriver> {
        if self.has_motion_capability {
            Some(self)
        } else {
            None
        }
    }

    fn motion_mut(&mut self) -> Option<&mut dyn MotionDriver> {
        if self.has_motion_capability {
            Some(self)
        } else {
            None
        }
    }
}
