//! Per-entity snapshot history: two ring buffers kept in lock-step.
//!
//! The pose stream is always present. The motion stream exists only when
//! movement capture was enabled at activation, and then index `i` in one
//! buffer describes the same instant as index `i` in the other.

use crate::ring_buffer::RingBuffer;
use crate::snapshot::{MotionSnapshot, PoseVelocitySnapshot};
use nalgebra::Vector3;
use rewind_env::MovementMode;
use std::mem::size_of;

/// Memory budget for a pose-only history (1 MiB).
pub const SINGLE_STREAM_BUDGET_BYTES: usize = 1024 * 1024;

/// Memory budget for a pose + motion history (3 MiB).
pub const DUAL_STREAM_BUDGET_BYTES: usize = 3 * 1024 * 1024;

/// Bytes one history slot costs.
pub fn bytes_per_sample(capture_motion: bool) -> usize {
    let motion = if capture_motion {
        size_of::<MotionSnapshot>()
    } else {
        0
    };
    size_of::<PoseVelocitySnapshot>() + motion
}

/// Outcome of sizing a history against its memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPlan {
    /// Slots needed to cover the requested history length
    pub requested: usize,

    /// Slots actually allocated
    pub effective: usize,

    /// Cost of one slot
    pub bytes_per_sample: usize,

    /// `requested * bytes_per_sample`
    pub requested_bytes: usize,

    /// Budget that applied
    pub budget_bytes: usize,
}

impl CapacityPlan {
    /// Sizes a history of `history_seconds` sampled at `frequency_hz`.
    ///
    /// `requested = ceil(history_seconds * frequency_hz)`, then clamped so
    /// the allocation never exceeds the budget for the chosen stream layout.
    pub fn compute(history_seconds: f64, frequency_hz: f64, capture_motion: bool) -> Self {
        // Guard against 3.0000000000000004-style products rounding up a slot
        let raw = (history_seconds * frequency_hz - 1.0e-9).ceil();
        let requested = if raw.is_finite() && raw >= 1.0 {
            raw as usize
        } else {
            1
        };

        let bytes_per_sample = bytes_per_sample(capture_motion);
        let budget_bytes = if capture_motion {
            DUAL_STREAM_BUDGET_BYTES
        } else {
            SINGLE_STREAM_BUDGET_BYTES
        };
        let effective = requested.min(budget_bytes / bytes_per_sample).max(1);

        Self {
            requested,
            effective,
            bytes_per_sample,
            requested_bytes: requested.saturating_mul(bytes_per_sample),
            budget_bytes,
        }
    }

    /// Returns true if the budget forced a smaller capacity.
    pub fn is_clamped(&self) -> bool {
        self.effective < self.requested
    }

    /// Bytes the effective capacity occupies.
    pub fn effective_bytes(&self) -> usize {
        self.effective * self.bytes_per_sample
    }
}

/// Pose history with an optional, synchronized motion history.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    poses: RingBuffer<PoseVelocitySnapshot>,
    motion: Option<RingBuffer<MotionSnapshot>>,
}

impl SnapshotHistory {
    /// Allocates both streams (motion only if `capture_motion`).
    pub fn new(capacity: usize, capture_motion: bool) -> Self {
        Self {
            poses: RingBuffer::with_capacity(capacity),
            motion: capture_motion.then(|| RingBuffer::with_capacity(capacity)),
        }
    }

    /// Number of recorded instants.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Returns true when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Slots per stream.
    pub fn capacity(&self) -> usize {
        self.poses.capacity()
    }

    /// Returns true if a motion stream is kept.
    pub fn captures_motion(&self) -> bool {
        self.motion.is_some()
    }

    /// Returns true if both streams have the same length.
    pub fn is_synchronized(&self) -> bool {
        self.motion
            .as_ref()
            .map_or(true, |motion| motion.len() == self.poses.len())
    }

    /// Appends one instant to every stream, evicting the oldest when full.
    ///
    /// Returns the index of the new entry, which is the same in both streams.
    pub fn record(&mut self, pose: PoseVelocitySnapshot, motion: Option<MotionSnapshot>) -> usize {
        self.poses.push_back(pose);
        let index = self.poses.len() - 1;

        if let Some(stream) = self.motion.as_mut() {
            debug_assert!(motion.is_some(), "motion stream active but no motion snapshot recorded");
            let entry = motion.unwrap_or(MotionSnapshot {
                interval_since_prev: pose.interval_since_prev,
                movement_velocity: Vector3::zeros(),
                movement_mode: MovementMode::None,
            });
            stream.push_back(entry);
            debug_assert_eq!(
                stream.len() - 1,
                index,
                "pose and motion histories disagree on the latest index"
            );
        }

        debug_assert!(self.is_synchronized(), "pose and motion histories out of sync");
        index
    }

    /// Discards every entry after `index` from all streams.
    ///
    /// Returns how many instants were removed.
    pub fn truncate_after(&mut self, index: usize) -> usize {
        let keep = (index + 1).min(self.poses.len());
        let removed = self.poses.len() - keep;
        self.poses.truncate(keep);
        if let Some(stream) = self.motion.as_mut() {
            stream.truncate(keep);
        }
        debug_assert!(self.is_synchronized(), "pose and motion histories out of sync");
        removed
    }

    /// Pose snapshot at `index` (0 = oldest).
    pub fn pose(&self, index: usize) -> Option<&PoseVelocitySnapshot> {
        self.poses.get(index)
    }

    /// Motion snapshot at `index`, if a motion stream is kept.
    pub fn motion(&self, index: usize) -> Option<&MotionSnapshot> {
        self.motion.as_ref().and_then(|stream| stream.get(index))
    }

    /// Seconds between snapshot `index` and the one before it.
    pub fn interval(&self, index: usize) -> Option<f64> {
        self.poses.get(index).map(|s| s.interval_since_prev)
    }

    /// Iterates pose snapshots oldest to newest.
    pub fn poses(&self) -> impl Iterator<Item = &PoseVelocitySnapshot> {
        self.poses.iter()
    }

    /// Iterates motion snapshots oldest to newest (empty without a motion stream).
    pub fn motions(&self) -> impl Iterator<Item = &MotionSnapshot> {
        self.motion.iter().flat_map(|stream| stream.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_env::Pose;

    fn pose_at(x: f64) -> PoseVelocitySnapshot {
        PoseVelocitySnapshot {
            interval_since_prev: 0.1,
            pose: Pose::from_position(Vector3::new(x, 0.0, 0.0)),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }

    fn motion_at(x: f64) -> MotionSnapshot {
        MotionSnapshot {
            interval_since_prev: 0.1,
            movement_velocity: Vector3::new(x, 0.0, 0.0),
            movement_mode: MovementMode::Walking,
        }
    }

    #[test]
    fn test_capacity_default_session_fits_budget() {
        let plan = CapacityPlan::compute(120.0, 30.0, false);
        assert_eq!(plan.requested, 3600);
        assert!(plan.requested_bytes <= SINGLE_STREAM_BUDGET_BYTES);
        assert_eq!(plan.effective, 3600);
        assert!(!plan.is_clamped());
    }

    #[test]
    fn test_capacity_clamped_to_single_stream_budget() {
        let plan = CapacityPlan::compute(120.0, 240.0, false);
        assert_eq!(plan.requested, 28_800);
        assert!(plan.requested_bytes > SINGLE_STREAM_BUDGET_BYTES);
        assert_eq!(plan.effective, SINGLE_STREAM_BUDGET_BYTES / bytes_per_sample(false));
        assert!(plan.effective < plan.requested);
        assert!(plan.effective_bytes() <= SINGLE_STREAM_BUDGET_BYTES);
    }

    #[test]
    fn test_capacity_dual_stream_uses_larger_budget() {
        let plan = CapacityPlan::compute(120.0, 240.0, true);
        assert_eq!(plan.budget_bytes, DUAL_STREAM_BUDGET_BYTES);
        assert_eq!(plan.bytes_per_sample, bytes_per_sample(true));
        assert_eq!(plan.effective, DUAL_STREAM_BUDGET_BYTES / bytes_per_sample(true));
    }

    #[test]
    fn test_capacity_rounds_up_partial_slots() {
        assert_eq!(CapacityPlan::compute(0.1, 30.0, false).requested, 3);
        assert_eq!(CapacityPlan::compute(0.11, 30.0, false).requested, 4);
        assert_eq!(CapacityPlan::compute(0.0, 30.0, false).effective, 1);
    }

    #[test]
    fn test_record_keeps_streams_in_lock_step() {
        let mut history = SnapshotHistory::new(3, true);
        for i in 0..5 {
            let index = history.record(pose_at(i as f64), Some(motion_at(i as f64)));
            assert_eq!(index, history.len() - 1);
            assert!(history.is_synchronized());
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.pose(0).unwrap().pose.position.x, 2.0);
        assert_eq!(history.motion(0).unwrap().movement_velocity.x, 2.0);
        assert_eq!(history.motions().count(), 3);
    }

    #[test]
    fn test_truncate_after_drops_future_from_both_streams() {
        let mut history = SnapshotHistory::new(10, true);
        for i in 0..6 {
            history.record(pose_at(i as f64), Some(motion_at(i as f64)));
        }

        assert_eq!(history.truncate_after(2), 3);
        assert_eq!(history.len(), 3);
        assert_eq!(history.motions().count(), 3);
        assert_eq!(history.truncate_after(7), 0);
    }

    #[test]
    #[should_panic(expected = "motion stream active but no motion snapshot recorded")]
    fn test_missing_motion_snapshot_fails_loudly() {
        let mut history = SnapshotHistory::new(4, true);
        history.record(pose_at(1.0), None);
    }

    #[test]
    fn test_pose_only_history_has_no_motion() {
        let mut history = SnapshotHistory::new(4, false);
        history.record(pose_at(1.0), None);
        assert!(!history.captures_motion());
        assert!(history.motion(0).is_none());
        assert_eq!(history.interval(0), Some(0.1));
    }
}
