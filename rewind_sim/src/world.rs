//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::error::SimError;
use crate::physics::SimBody;

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rewind_core::{
    ControllerConfig, ControllerSnapshot, RewindTracker, SpeedPreset, SubscriberId, TimeController,
    TrackerConfig, TrackerEvent,
};
use rewind_env::{require_motion, EntityId, RewindTarget};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Nominal tick rate in Hz
    pub tick_rate_hz: u32,

    /// Relative standard deviation of frame times (0 = fixed step)
    pub frame_jitter: f64,

    /// Gravity along z in m/s²
    pub gravity: f64,

    /// Props spawned at startup
    pub props: usize,

    /// Characters spawned at startup
    pub characters: usize,

    /// Tracker settings for props
    pub tracker: TrackerConfig,

    /// Tracker settings for characters
    pub character_tracker: TrackerConfig,

    /// Time controller settings
    pub controller: ControllerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 30,
            frame_jitter: 0.0,
            gravity: -9.81,
            props: 4,
            characters: 2,
            tracker: TrackerConfig::default(),
            character_tracker: TrackerConfig::character(),
            controller: ControllerConfig::default(),
        }
    }
}

impl SimConfig {
    /// Loads a config from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: SimConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.tick_rate_hz == 0 {
            return Err(SimError::InvalidConfig("tick_rate_hz must be positive".into()));
        }
        if !(self.frame_jitter.is_finite() && self.frame_jitter >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "frame_jitter must be non-negative, got {}",
                self.frame_jitter
            )));
        }
        self.tracker.validate()?;
        self.character_tracker.validate()?;
        self.controller.validate()?;
        Ok(())
    }
}

/// The SimWorld - container for the entire simulation.
///
/// Each tick steps physics for every body first and only then lets the
/// trackers record or play back, so recorded state is always post-physics.
pub struct SimWorld {
    /// Configuration
    config: SimConfig,

    /// Virtual clock
    context: SimContext,

    /// Spawn parameters
    spawn_rng: ChaCha8Rng,

    /// Time controller; owns every tracker (and through it, every body)
    controller: TimeController<RewindTracker<SimBody>>,

    /// Entities spawned so far
    spawned: u64,

    /// Current tick count
    tick_count: u64,
}

impl SimWorld {
    /// Creates a world and spawns the configured props and characters.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let world = Self::empty(config)?;
        world.populated()
    }

    /// Creates a world with no entities.
    pub fn empty(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        // Derive separate seeds for different subsystems
        let context_seed = config.seed;
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);

        let context = SimContext::new(context_seed, config.tick_rate_hz)
            .with_jitter(config.frame_jitter)?;
        let controller = TimeController::new(config.controller.clone())?;

        Ok(Self {
            config,
            context,
            spawn_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            controller,
            spawned: 0,
            tick_count: 0,
        })
    }

    fn populated(mut self) -> Result<Self, SimError> {
        for _ in 0..self.config.props {
            let position = Vector3::new(
                self.spawn_rng.gen_range(-10.0..10.0),
                self.spawn_rng.gen_range(-10.0..10.0),
                self.spawn_rng.gen_range(1.0..5.0),
            );
            let velocity = Vector3::new(
                self.spawn_rng.gen_range(-3.0..3.0),
                self.spawn_rng.gen_range(-3.0..3.0),
                self.spawn_rng.gen_range(0.0..4.0),
            );
            let spin = Vector3::new(0.0, 0.0, self.spawn_rng.gen_range(-2.0..2.0));
            self.spawn_prop(position, velocity, spin)?;
        }
        for _ in 0..self.config.characters {
            let position = Vector3::new(
                self.spawn_rng.gen_range(-10.0..10.0),
                self.spawn_rng.gen_range(-10.0..10.0),
                0.0,
            );
            let heading = self.spawn_rng.gen_range(0.0..std::f64::consts::TAU);
            let speed = self.spawn_rng.gen_range(1.0..3.0);
            let velocity = Vector3::new(heading.cos() * speed, heading.sin() * speed, 0.0);
            self.spawn_character(position, velocity)?;
        }
        Ok(self)
    }

    /// Spawns a prop and subscribes its tracker.
    pub fn spawn_prop(
        &mut self,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        spin: Vector3<f64>,
    ) -> Result<SubscriberId, SimError> {
        let label = format!("prop-{}", self.spawned);
        let body = SimBody::prop(&label, position, velocity, spin);
        let config = self.config.tracker.clone();
        self.track(body, config)
    }

    /// Spawns a walking character and subscribes its tracker.
    pub fn spawn_character(
        &mut self,
        position: Vector3<f64>,
        movement_velocity: Vector3<f64>,
    ) -> Result<SubscriberId, SimError> {
        let label = format!("character-{}", self.spawned);
        let body = SimBody::character(&label, position, movement_velocity);
        let config = self.config.character_tracker.clone();
        self.track(body, config)
    }

    fn track(&mut self, body: SimBody, config: TrackerConfig) -> Result<SubscriberId, SimError> {
        let id = EntityId::from_seed(self.config.seed.wrapping_add(self.spawned));
        let label = body.label();
        let mut tracker =
            RewindTracker::new(id, body, config, self.controller.max_history_seconds())?;
        self.spawned += 1;

        // A late joiner follows whatever is already active
        let snapshot = self.controller.snapshot();
        if snapshot.flags.any() {
            tracker.set_recording_enabled(false, &snapshot);
            tracker.set_recording_enabled(true, &snapshot);
        }

        debug!(
            "Tracking {} ({}), history capacity {}",
            label,
            id,
            tracker.history().capacity()
        );
        Ok(self.controller.subscribe(tracker))
    }

    /// Advances the world by one frame and returns its length in seconds.
    pub fn tick(&mut self) -> f64 {
        let dt = self.context.next_frame_dt();
        let gravity = self.config.gravity;

        for (_, tracker) in self.controller.subscribers_mut() {
            tracker.entity_mut().step(dt, gravity);
        }

        let snapshot = self.controller.snapshot();
        for (_, tracker) in self.controller.subscribers_mut() {
            tracker.tick(dt, &snapshot);
        }

        self.context.advance(dt);
        self.tick_count += 1;
        dt
    }

    /// Ticks until at least `secs` of virtual time have passed.
    pub fn run_for(&mut self, secs: f64) -> u64 {
        let end = self.context.now() + secs;
        let mut ticks = 0;
        while self.context.now() < end {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    // ========================================================================
    // TIME CONTROL
    // ========================================================================

    pub fn start_rewind(&mut self) {
        self.controller.start_rewind();
    }

    pub fn stop_rewind(&mut self) {
        self.controller.stop_rewind();
    }

    pub fn start_fast_forward(&mut self) {
        self.controller.start_fast_forward();
    }

    pub fn stop_fast_forward(&mut self) {
        self.controller.stop_fast_forward();
    }

    pub fn toggle_scrub(&mut self) {
        self.controller.toggle_scrub();
    }

    pub fn set_speed(&mut self, index: usize) -> Result<f64, SimError> {
        Ok(self.controller.set_speed(index)?)
    }

    pub fn set_speed_preset(&mut self, preset: SpeedPreset) -> Result<f64, SimError> {
        Ok(self.controller.set_speed_preset(preset)?)
    }

    /// Turns one entity's participation in time control on or off.
    pub fn set_participation(&mut self, id: SubscriberId, enabled: bool) -> Result<(), SimError> {
        let snapshot = self.controller.snapshot();
        let tracker = self
            .controller
            .subscriber_mut(id)
            .ok_or(SimError::UnknownEntity(id))?;
        tracker.set_recording_enabled(enabled, &snapshot);
        Ok(())
    }

    /// Overrides a character's movement velocity.
    pub fn set_movement_velocity(
        &mut self,
        id: SubscriberId,
        velocity: Vector3<f64>,
    ) -> Result<(), SimError> {
        let tracker = self
            .controller
            .subscriber_mut(id)
            .ok_or(SimError::UnknownEntity(id))?;
        require_motion(tracker.entity_mut())?.set_movement_velocity(velocity);
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn controller(&self) -> &TimeController<RewindTracker<SimBody>> {
        &self.controller
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.controller.snapshot()
    }

    pub fn tracker(&self, id: SubscriberId) -> Option<&RewindTracker<SimBody>> {
        self.controller.subscriber(id)
    }

    pub fn trackers(&self) -> impl Iterator<Item = (SubscriberId, &RewindTracker<SimBody>)> {
        self.controller.subscribers()
    }

    pub fn tracker_ids(&self) -> Vec<SubscriberId> {
        self.controller.subscribers().map(|(id, _)| id).collect()
    }

    pub fn entity_count(&self) -> usize {
        self.controller.subscriber_count()
    }

    /// Current position of every tracked entity.
    pub fn positions(&self) -> Vec<(EntityId, Vector3<f64>)> {
        self.controller
            .subscribers()
            .map(|(_, t)| (t.id(), t.entity().position()))
            .collect()
    }

    /// Tracker events emitted since the last call, tagged by entity.
    pub fn drain_events(&mut self) -> Vec<(EntityId, TrackerEvent)> {
        let mut events = Vec::new();
        for (_, tracker) in self.controller.subscribers_mut() {
            let id = tracker.id();
            events.extend(tracker.drain_events().into_iter().map(|e| (id, e)));
        }
        events
    }

    pub fn time(&self) -> f64 {
        self.context.now()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
