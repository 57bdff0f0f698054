//! Per-entity rewind tracker.
//!
//! While live, the tracker samples its entity at a fixed rate into a
//! [`SnapshotHistory`]. While manipulated, it drives the entity from that
//! history instead, walking a playback cursor across the variable-length
//! recorded intervals and blending between neighbouring snapshots.
//!
//! # Playback cursor
//!
//! `latest_index` is the snapshot the playhead is travelling towards. The
//! origin is its neighbour on the side the playhead came from (`+1` when
//! rewinding, `-1` when fast-forwarding) and the accumulator is the time
//! travelled from the origin. The segment between them lasts the later
//! snapshot's `interval_since_prev`; with no origin (the live edge) the
//! playhead sits exactly on the cursor snapshot.
//!
//! ```text
//!   rewinding:    [0] [1] [2] [3] [4]
//!                          ▲ ◄──── acc ── origin
//!                       latest
//! ```

use crate::config::TrackerConfig;
use crate::controller::{ControlEvent, ControlListener, ControllerSnapshot};
use crate::error::RewindError;
use crate::history::{CapacityPlan, SnapshotHistory};
use crate::snapshot::{MotionSnapshot, PoseVelocitySnapshot};
use crate::state::{ManipulationKind, ManipulationState, ScrubMotion};
use rewind_env::{EntityId, RewindTarget};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Alpha at or above which a held blend counts as settled on a snapshot.
const SETTLE_EPSILON: f64 = 1.0e-6;

/// Notifications a tracker emits about its own transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackerEvent {
    /// Left live play
    ManipulationStarted,
    /// Returned to live play
    ManipulationCompleted,
    RewindStarted,
    RewindCompleted,
    FastForwardStarted,
    FastForwardCompleted,
    ScrubStarted,
    ScrubCompleted,
}

impl TrackerEvent {
    fn started(kind: ManipulationKind) -> Self {
        match kind {
            ManipulationKind::Rewind => TrackerEvent::RewindStarted,
            ManipulationKind::FastForward => TrackerEvent::FastForwardStarted,
            ManipulationKind::Scrub => TrackerEvent::ScrubStarted,
        }
    }

    fn completed(kind: ManipulationKind) -> Self {
        match kind {
            ManipulationKind::Rewind => TrackerEvent::RewindCompleted,
            ManipulationKind::FastForward => TrackerEvent::FastForwardCompleted,
            ManipulationKind::Scrub => TrackerEvent::ScrubCompleted,
        }
    }
}

/// Records one entity's history and plays it back on demand.
pub struct RewindTracker<E> {
    id: EntityId,
    entity: E,
    config: TrackerConfig,
    history: SnapshotHistory,
    state: ManipulationState,
    recording_enabled: bool,

    /// Playback cursor (None while the history is empty)
    latest_index: Option<usize>,

    /// Seconds since the last sample (live) or travelled from the origin (playback)
    time_accumulator: f64,

    /// Cursor orientation: origin is `latest + 1` when true, `latest - 1` otherwise
    last_manipulation_was_rewind: bool,

    animation_was_paused_before_manipulation: bool,

    /// Physics was running when we took over and must be restarted on resume
    paused_physics: bool,

    /// Hold has reached a snapshot boundary
    hold_settled: bool,

    /// Speed multiplier from the most recent controller snapshot
    speed: f64,

    events: Vec<TrackerEvent>,
}

impl<E: RewindTarget> RewindTracker<E> {
    /// Activates a tracker for `entity`, sizing its history once.
    ///
    /// Motion capture is enabled only if the config asks for it and the
    /// entity exposes the motion capability. A history that would exceed its
    /// memory budget is shrunk to fit and a warning is logged.
    pub fn new(
        id: EntityId,
        entity: E,
        config: TrackerConfig,
        max_history_seconds: f64,
    ) -> Result<Self, RewindError> {
        config.validate()?;
        if !(max_history_seconds.is_finite() && max_history_seconds > 0.0) {
            return Err(RewindError::config(format!(
                "max_history_seconds must be positive, got {}",
                max_history_seconds
            )));
        }

        let capture_motion = config.capture_movement_state && entity.has_motion();
        if config.capture_movement_state && !capture_motion {
            debug!(
                "{} ({}) has no movement state; recording poses only",
                entity.label(),
                id
            );
        }

        let plan = CapacityPlan::compute(
            max_history_seconds,
            config.sampling_frequency_hz,
            capture_motion,
        );
        if plan.is_clamped() {
            warn!(
                "{} ({}) requested {} bytes of snapshots (budget {}); history clamped from {} to {} samples. Check sampling frequency!",
                entity.label(),
                id,
                plan.requested_bytes,
                plan.budget_bytes,
                plan.requested,
                plan.effective
            );
        }

        Ok(Self {
            id,
            entity,
            config,
            history: SnapshotHistory::new(plan.effective, capture_motion),
            state: ManipulationState::Idle,
            recording_enabled: true,
            latest_index: None,
            time_accumulator: 0.0,
            last_manipulation_was_rewind: true,
            animation_was_paused_before_manipulation: false,
            paused_physics: false,
            hold_settled: false,
            speed: 1.0,
            events: Vec::new(),
        })
    }

    // ========================================================================
    // STATE MACHINE
    // ========================================================================

    /// Starts `kind` if the transition table allows it.
    ///
    /// Returns false (and touches nothing) when participation is disabled or
    /// the start is redundant or illegal from the current state.
    pub fn try_start(&mut self, kind: ManipulationKind, reset_accumulator: bool) -> bool {
        if !self.recording_enabled {
            return false;
        }
        let Some(next) = self.state.started(kind) else {
            return false;
        };

        let was_live = !self.state.is_manipulating();
        if reset_accumulator {
            self.time_accumulator = 0.0;
        }
        self.pause_physics();
        if was_live {
            self.animation_was_paused_before_manipulation = self.entity.is_animation_paused();
        }

        debug!("{} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        self.hold_settled = false;

        self.events.push(TrackerEvent::started(kind));
        if was_live {
            self.events.push(TrackerEvent::ManipulationStarted);
        }
        true
    }

    /// Stops `kind` if it is active.
    ///
    /// When this returns the tracker to live play, physics and animation are
    /// resumed, the cursor snapshot is applied and everything after it is
    /// discarded. Otherwise the entity stays frozen where it is.
    pub fn try_stop(
        &mut self,
        kind: ManipulationKind,
        reset_accumulator: bool,
        reset_velocity: bool,
    ) -> bool {
        let Some(next) = self.state.stopped(kind) else {
            return false;
        };

        debug!("{} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        self.hold_settled = false;

        let resumed = !next.is_manipulating();
        if resumed {
            self.resume_live(reset_accumulator, reset_velocity);
        }

        self.events.push(TrackerEvent::completed(kind));
        if resumed {
            self.events.push(TrackerEvent::ManipulationCompleted);
        }
        true
    }

    /// Turns this entity's participation on or off.
    ///
    /// Disabling stops every active manipulation before returning. Enabling
    /// adopts whatever the controller currently has active.
    pub fn set_recording_enabled(&mut self, enabled: bool, controller: &ControllerSnapshot) {
        self.speed = controller.speed;
        if enabled == self.recording_enabled {
            return;
        }
        self.recording_enabled = enabled;

        if enabled {
            debug!("{} rejoining time control ({:?})", self.id, controller.flags);
            if controller.flags.scrubbing {
                self.on_started(ManipulationKind::Scrub);
            }
            if controller.flags.rewinding {
                self.on_started(ManipulationKind::Rewind);
            }
            if controller.flags.fast_forwarding {
                self.on_started(ManipulationKind::FastForward);
            }
        } else {
            debug!("{} leaving time control", self.id);
            for kind in ManipulationKind::ALL {
                self.on_stopped(kind, controller);
            }
        }
    }

    fn on_started(&mut self, kind: ManipulationKind) {
        let reset = match kind {
            ManipulationKind::Rewind => !self.state.is_scrubbing(),
            ManipulationKind::FastForward | ManipulationKind::Scrub => false,
        };
        self.try_start(kind, reset);
    }

    fn on_stopped(&mut self, kind: ManipulationKind, controller: &ControllerSnapshot) {
        match kind {
            ManipulationKind::Rewind => {
                self.try_stop(kind, !self.state.is_scrubbing(), false);
                if self.state.is_scrubbing() && controller.flags.fast_forwarding {
                    self.on_started(ManipulationKind::FastForward);
                }
            }
            ManipulationKind::FastForward => {
                self.try_stop(kind, !self.state.is_scrubbing(), false);
                if self.state.is_scrubbing() && controller.flags.rewinding {
                    self.on_started(ManipulationKind::Rewind);
                }
            }
            ManipulationKind::Scrub => {
                self.try_stop(kind, true, true);
            }
        }
    }

    fn pause_physics(&mut self) {
        if self.entity.is_simulating_physics() {
            self.entity.set_simulate_physics(false);
            self.paused_physics = true;
        }
    }

    fn resume_live(&mut self, reset_accumulator: bool, reset_velocity: bool) {
        if reset_accumulator {
            self.time_accumulator = 0.0;
        }
        if self.paused_physics {
            self.entity.set_simulate_physics(true);
            self.paused_physics = false;
        }
        self.entity
            .set_animation_paused(self.animation_was_paused_before_manipulation);

        if let Some(latest) = self.latest_index {
            if let Some(pose) = self.history.pose(latest).copied() {
                pose.apply(&mut self.entity);
            }
            if let Some(motion) = self.history.motion(latest).copied() {
                let scale = if reset_velocity { 0.0 } else { self.speed };
                if let Some(driver) = self.entity.motion_mut() {
                    motion.apply(driver, scale);
                }
            }

            let removed = self.history.truncate_after(latest);
            if removed > 0 {
                debug!(
                    "{} resumed at snapshot {}; discarded {} future snapshots",
                    self.id, latest, removed
                );
            }
            self.latest_index = Some(latest);
        }
        self.entity.force_physics_resync();

        // Live edge: no origin, the playhead sits on the newest snapshot
        self.last_manipulation_was_rewind = true;
    }

    // ========================================================================
    // TICK
    // ========================================================================

    /// Advances the tracker by `dt` seconds.
    ///
    /// Must run after the physics step of the same tick so recorded state is
    /// post-resolution.
    pub fn tick(&mut self, dt: f64, controller: &ControllerSnapshot) {
        if !self.recording_enabled {
            return;
        }
        self.speed = controller.speed;
        let dt = dt.max(0.0);

        match self.state {
            ManipulationState::Idle => self.record(dt),
            ManipulationState::Rewinding | ManipulationState::Scrubbing(ScrubMotion::Rewinding) => {
                self.play(dt, true)
            }
            ManipulationState::Scrubbing(ScrubMotion::FastForwarding) => self.play(dt, false),
            ManipulationState::Scrubbing(ScrubMotion::Hold) => self.hold(dt),
        }
    }

    fn record(&mut self, dt: f64) {
        self.time_accumulator += dt;
        if self.time_accumulator < self.config.sampling_interval() && !self.history.is_empty() {
            return;
        }

        let interval = self.time_accumulator;
        let pose = PoseVelocitySnapshot::capture(&self.entity, interval);
        let motion = if self.history.captures_motion() {
            self.entity
                .motion()
                .map(|driver| MotionSnapshot::capture(driver, interval))
        } else {
            None
        };

        let index = self.history.record(pose, motion);
        self.latest_index = Some(index);
        self.time_accumulator = 0.0;
    }

    fn play(&mut self, dt: f64, rewind: bool) {
        self.unpause_animation();
        self.hold_settled = false;

        if self.history.len() < 2 {
            self.apply_only_sample();
            return;
        }

        if rewind != self.last_manipulation_was_rewind {
            self.reorient(rewind);
        }

        self.time_accumulator += dt * self.speed;

        let mut steps = 0usize;
        loop {
            let span = self.segment_span(rewind);
            if self.time_accumulator <= span {
                break;
            }
            match self.next_index(rewind) {
                Some(next) => {
                    self.time_accumulator -= span;
                    self.latest_index = Some(next);
                    steps += 1;
                }
                None => {
                    self.time_accumulator = span;
                    break;
                }
            }
        }
        let at_end = self.next_index(rewind).is_none();

        let alpha = self.apply_playhead(rewind);
        trace!(
            "{} playback rewind={} cursor={:?} steps={} alpha={:.3}",
            self.id,
            rewind,
            self.latest_index,
            steps,
            alpha
        );

        if at_end && alpha >= 1.0 - SETTLE_EPSILON && self.config.pause_animation_during_scrub {
            self.entity.set_animation_paused(true);
        }
    }

    /// Lets the last partial blend finish, then freezes on the snapshot.
    fn hold(&mut self, dt: f64) {
        if self.hold_settled {
            return;
        }
        if self.history.len() < 2 {
            if !self.history.is_empty() {
                self.apply_only_sample();
                self.settle();
            }
            return;
        }

        self.unpause_animation();
        let rewind = self.last_manipulation_was_rewind;
        let span = self.segment_span(rewind);
        self.time_accumulator = (self.time_accumulator + dt * self.speed).min(span);

        let alpha = self.apply_playhead(rewind);
        if alpha >= 1.0 - SETTLE_EPSILON {
            self.settle();
        }
    }

    fn settle(&mut self) {
        self.hold_settled = true;
        trace!("{} hold settled on snapshot {:?}", self.id, self.latest_index);
        if self.config.pause_animation_during_scrub {
            self.entity.set_animation_paused(true);
        }
    }

    fn unpause_animation(&mut self) {
        if self.entity.is_animation_paused() {
            self.entity.set_animation_paused(false);
        }
    }

    /// Fewer than two snapshots: apply what exists, no walk, no blend.
    fn apply_only_sample(&mut self) {
        let Some(index) = self.latest_index else {
            return;
        };
        if let Some(pose) = self.history.pose(index).copied() {
            pose.apply(&mut self.entity);
        }
        if let Some(motion) = self.history.motion(index).copied() {
            if let Some(driver) = self.entity.motion_mut() {
                motion.apply(driver, 1.0);
            }
        }
    }

    /// Flips the cursor to travel the other way without moving the playhead.
    fn reorient(&mut self, rewind: bool) {
        let previous = self.last_manipulation_was_rewind;
        match self.origin_index(previous) {
            Some(origin) => {
                let span = self.segment_span(previous);
                self.latest_index = Some(origin);
                self.time_accumulator = (span - self.time_accumulator).max(0.0);
                self.last_manipulation_was_rewind = rewind;
            }
            None => {
                self.last_manipulation_was_rewind = rewind;
                self.time_accumulator = self.segment_span(rewind);
            }
        }
    }

    fn origin_index(&self, rewind: bool) -> Option<usize> {
        let latest = self.latest_index?;
        if rewind {
            let origin = latest + 1;
            (origin < self.history.len()).then_some(origin)
        } else {
            latest.checked_sub(1)
        }
    }

    fn next_index(&self, rewind: bool) -> Option<usize> {
        self.origin_index(!rewind)
    }

    /// Length of the segment between origin and cursor (0 without an origin).
    fn segment_span(&self, rewind: bool) -> f64 {
        match (self.latest_index, self.origin_index(rewind)) {
            (Some(latest), Some(origin)) => self.history.interval(latest.max(origin)).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn alpha(&self, rewind: bool) -> f64 {
        let span = self.segment_span(rewind);
        if span <= 0.0 {
            1.0
        } else {
            (self.time_accumulator / span).clamp(0.0, 1.0)
        }
    }

    /// Writes the playhead state to the entity and returns its alpha.
    ///
    /// At alpha 1 the cursor snapshot is applied as recorded, not blended.
    fn apply_playhead(&mut self, rewind: bool) -> f64 {
        let Some(target) = self.latest_index else {
            return 0.0;
        };
        let alpha = self.alpha(rewind);
        let origin = self.origin_index(rewind).filter(|_| alpha < 1.0);

        let pose = match (origin.and_then(|o| self.history.pose(o)), self.history.pose(target)) {
            (Some(from), Some(to)) => Some(PoseVelocitySnapshot::blend(from, to, alpha)),
            (None, Some(to)) => Some(*to),
            _ => None,
        };
        let motion = match (origin.and_then(|o| self.history.motion(o)), self.history.motion(target)) {
            (Some(from), Some(to)) => Some(MotionSnapshot::blend(from, to, alpha)),
            (None, Some(to)) => Some(*to),
            _ => None,
        };

        if let Some(pose) = pose {
            pose.apply(&mut self.entity);
        }
        if let Some(motion) = motion {
            if let Some(driver) = self.entity.motion_mut() {
                motion.apply(driver, 1.0);
            }
        }
        alpha
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn state(&self) -> ManipulationState {
        self.state
    }

    pub fn is_rewinding(&self) -> bool {
        self.state.is_rewinding()
    }

    pub fn is_fast_forwarding(&self) -> bool {
        self.state.is_fast_forwarding()
    }

    pub fn is_scrubbing(&self) -> bool {
        self.state.is_scrubbing()
    }

    pub fn is_manipulating(&self) -> bool {
        self.state.is_manipulating()
    }

    pub fn recording_enabled(&self) -> bool {
        self.recording_enabled
    }

    pub fn captures_motion(&self) -> bool {
        self.history.captures_motion()
    }

    /// Playback cursor; `None` while nothing has been recorded.
    pub fn latest_index(&self) -> Option<usize> {
        self.latest_index
    }

    pub fn time_accumulator(&self) -> f64 {
        self.time_accumulator
    }

    /// Blend progress of the playhead between origin and cursor, in [0, 1].
    pub fn playhead_alpha(&self) -> f64 {
        self.alpha(self.last_manipulation_was_rewind)
    }

    /// Returns true once a scrub hold has come to rest on a snapshot.
    pub fn is_hold_settled(&self) -> bool {
        self.hold_settled
    }

    /// Takes the events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<TrackerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Consumes the tracker and returns its entity.
    pub fn into_entity(self) -> E {
        self.entity
    }
}

impl<E: RewindTarget> ControlListener for RewindTracker<E> {
    fn on_control_event(&mut self, event: ControlEvent, snapshot: &ControllerSnapshot) {
        self.speed = snapshot.speed;
        match event {
            ControlEvent::RewindStarted => self.on_started(ManipulationKind::Rewind),
            ControlEvent::FastForwardStarted => self.on_started(ManipulationKind::FastForward),
            ControlEvent::ScrubStarted => self.on_started(ManipulationKind::Scrub),
            ControlEvent::RewindStopped => self.on_stopped(ManipulationKind::Rewind, snapshot),
            ControlEvent::FastForwardStopped => {
                self.on_stopped(ManipulationKind::FastForward, snapshot)
            }
            ControlEvent::ScrubStopped => self.on_stopped(ManipulationKind::Scrub, snapshot),
        }
    }
}
