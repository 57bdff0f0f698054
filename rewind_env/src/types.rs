//! Common value types shared between the rewind engine and its adapters.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a tracked entity.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Creates a new random EntityId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an EntityId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic EntityId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// World-space pose of an entity: translation, orientation and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position [x, y, z] in meters
    pub position: Vector3<f64>,

    /// Orientation as a unit quaternion
    pub rotation: UnitQuaternion<f64>,

    /// Per-axis scale
    pub scale: Vector3<f64>,
}

impl Pose {
    /// Pose at the origin with no rotation and unit scale.
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Unrotated, unit-scale pose at `position`.
    pub fn from_position(position: Vector3<f64>) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Returns true if both poses agree within `eps` on every component.
    ///
    /// Rotations are compared by angle, so `q` and `-q` count as equal.
    pub fn approx_eq(&self, other: &Pose, eps: f64) -> bool {
        (self.position - other.position).amax() <= eps
            && (self.scale - other.scale).amax() <= eps
            && self.rotation.angle_to(&other.rotation) <= eps
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Discrete locomotion mode of an entity with movement state.
///
/// Categorical: it is selected, never blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementMode {
    /// No movement processing
    #[default]
    None,

    /// Grounded locomotion
    Walking,

    /// Grounded locomotion constrained to a navigation mesh
    NavWalking,

    /// Airborne, affected by gravity
    Falling,

    /// Moving through a fluid volume
    Swimming,

    /// Airborne, ignoring gravity
    Flying,

    /// Game-specific mode
    Custom(u8),
}

impl MovementMode {
    /// Returns true for modes in which gravity acts on the movement velocity.
    pub fn is_airborne(&self) -> bool {
        matches!(self, MovementMode::Falling)
    }
}
