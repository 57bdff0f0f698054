//! Scenario runner - drives time-control scenarios against a SimWorld.

use crate::exporter::{EntityFrame, SimEvent, SimExport, SimFrame};
use crate::physics::SimBody;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use nalgebra::Vector3;
use rewind_core::{
    CapacityPlan, ManipulationState, RewindTracker, ScrubMotion, SpeedPreset, SubscriberId,
    TrackerEvent,
};
use rewind_env::{AnimationDriver, EntityBody, MotionDriver};
use tracing::{debug, info, warn};

/// Tolerance for "playhead reached the snapshot" checks.
const ALPHA_EPSILON: f64 = 1.0e-9;

/// Tolerance for exact-restore pose checks.
const POSE_EPSILON: f64 = 1.0e-9;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of tracked entities at end
    pub final_entity_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Tracker events observed
    pub tracker_events: u64,

    /// Returns to live play
    pub manipulations_completed: u64,

    /// Longest history seen on any tracker
    pub max_history_len: usize,

    /// Snapshots dropped by resuming live play mid-history
    pub snapshots_discarded: usize,

    /// Largest distance between a restored pose and its snapshot (m)
    pub max_pose_error: f64,

    /// Snapshots walked per speed preset, slowest first
    pub steps_per_preset: Vec<usize>,
}

/// Accumulates everything a scenario reports, across however many worlds
/// it builds.
#[derive(Default)]
struct RunLog {
    metrics: ScenarioMetrics,
    export: Option<SimExport>,
    total_ticks: u64,
    final_time_secs: f64,
    final_entity_count: usize,
}

/// A world plus the bookkeeping that follows each of its ticks.
struct ScenarioSession<'a> {
    world: SimWorld,
    log: &'a mut RunLog,
    export_every: u64,
    pending_events: Vec<SimEvent>,
}

impl<'a> ScenarioSession<'a> {
    fn new(world: SimWorld, log: &'a mut RunLog) -> Self {
        let export_every = u64::from((world.config().tick_rate_hz / 10).max(1));
        Self {
            world,
            log,
            export_every,
            pending_events: Vec::new(),
        }
    }

    fn tick(&mut self) {
        self.world.tick();
        self.log.total_ticks += 1;
        self.collect();

        if self.log.export.is_some() && self.world.tick_count() % self.export_every == 0 {
            let frame = self.frame();
            if let Some(export) = self.log.export.as_mut() {
                export.add_frame(frame);
            }
        }
    }

    fn run_for(&mut self, secs: f64) {
        let end = self.world.time() + secs;
        while self.world.time() < end {
            self.tick();
        }
    }

    /// Ticks until `done` holds or `max_secs` pass; returns whether it held.
    fn run_until(&mut self, max_secs: f64, mut done: impl FnMut(&SimWorld) -> bool) -> bool {
        let end = self.world.time() + max_secs;
        while self.world.time() < end {
            if done(&self.world) {
                return true;
            }
            self.tick();
        }
        done(&self.world)
    }

    fn collect(&mut self) {
        for (entity, event) in self.world.drain_events() {
            self.log.metrics.tracker_events += 1;
            if event == TrackerEvent::ManipulationCompleted {
                self.log.metrics.manipulations_completed += 1;
            }
            if self.log.export.is_some() {
                self.pending_events.push(SimEvent {
                    entity: entity.to_string(),
                    event,
                });
            }
        }
        let longest = self
            .world
            .trackers()
            .map(|(_, t)| t.history().len())
            .max()
            .unwrap_or(0);
        self.log.metrics.max_history_len = self.log.metrics.max_history_len.max(longest);
    }

    fn frame(&mut self) -> SimFrame {
        let snapshot = self.world.snapshot();
        let entities = self
            .world
            .trackers()
            .map(|(_, t)| {
                EntityFrame::new(
                    t.id(),
                    t.entity().position(),
                    t.state(),
                    t.history().len(),
                    t.latest_index(),
                )
            })
            .collect();
        SimFrame {
            time_sec: self.world.time(),
            flags: snapshot.flags,
            speed: snapshot.speed,
            entities,
            events: std::mem::take(&mut self.pending_events),
        }
    }

    fn record_pose_error(&mut self, error: f64) {
        self.log.metrics.max_pose_error = self.log.metrics.max_pose_error.max(error);
    }

    /// Drains what the last control calls emitted and closes the session.
    fn finish(mut self) {
        self.collect();
        if self.log.export.is_some() {
            let frame = self.frame();
            if let Some(export) = self.log.export.as_mut() {
                export.add_frame(frame);
            }
        }
        self.log.final_time_secs = self.world.time();
        self.log.final_entity_count = self.world.entity_count();
    }
}

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

fn lookup(world: &SimWorld, id: SubscriberId) -> Result<&RewindTracker<SimBody>, String> {
    world
        .tracker(id)
        .ok_or_else(|| format!("tracker {:?} vanished", id))
}

fn first_tracker(world: &SimWorld) -> Result<SubscriberId, String> {
    world
        .tracker_ids()
        .first()
        .copied()
        .ok_or_else(|| "world has no tracked entities".to_string())
}

/// Runs time-control scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Length of the live-play phase in seconds
    max_duration_secs: f64,

    /// Base world configuration; scenarios override entity counts
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_duration_secs: 4.0,
            config: SimConfig::default(),
        }
    }

    /// Sets the live-play duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets the base world configuration.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None).0
    }

    /// Runs a scenario and also returns its frame export.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let export = SimExport::new(scenario.name(), self.seed);
        let (result, export) = self.execute(scenario, Some(export));
        (result, export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed)))
    }

    fn execute(
        &self,
        scenario: ScenarioId,
        export: Option<SimExport>,
    ) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut log = RunLog {
            export,
            ..Default::default()
        };
        let outcome = match scenario {
            ScenarioId::RoundTrip => self.run_round_trip(&mut log),
            ScenarioId::ScrubHold => self.run_scrub_hold(&mut log),
            ScenarioId::RejoinMidRewind => self.run_rejoin_mid_rewind(&mut log),
            ScenarioId::BranchTruncation => self.run_branch_truncation(&mut log),
            ScenarioId::MemoryBudget => self.run_memory_budget(&mut log),
            ScenarioId::SpeedRamp => self.run_speed_ramp(&mut log),
            ScenarioId::CharacterResume => self.run_character_resume(&mut log),
        };

        let failure_reason = outcome.err();
        match &failure_reason {
            None => info!(
                "✓ {} complete: {} ticks, {} tracker events",
                scenario.name(),
                log.total_ticks,
                log.metrics.tracker_events
            ),
            Some(reason) => warn!("✗ {} failed: {}", scenario.name(), reason),
        }

        let mut export = log.export;
        if let Some(export) = export.as_mut() {
            export.finalize(failure_reason.is_none(), failure_reason.clone());
        }

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks: log.total_ticks,
            final_time_secs: log.final_time_secs,
            final_entity_count: log.final_entity_count,
            failure_reason,
            metrics: log.metrics,
        };
        (result, export)
    }

    fn world_config(&self, props: usize, characters: usize) -> SimConfig {
        SimConfig {
            seed: self.seed,
            props,
            characters,
            ..self.config.clone()
        }
    }

    fn session<'a>(&self, config: SimConfig, log: &'a mut RunLog) -> Result<ScenarioSession<'a>, String> {
        let world = SimWorld::new(config).map_err(|e| e.to_string())?;
        Ok(ScenarioSession::new(world, log))
    }

    /// RW-001: Rewind to the oldest snapshot, then fast-forward to the newest.
    ///
    /// Both ends must be restored exactly, and the round trip must not cost
    /// any history.
    fn run_round_trip(&self, log: &mut RunLog) -> Result<(), String> {
        info!("RW-001: RoundTrip - scrub to both ends of history");

        let mut s = self.session(self.world_config(1, 0), log)?;
        let id = first_tracker(&s.world)?;

        s.run_for(self.max_duration_secs);
        let recorded = lookup(&s.world, id)?.history().len();
        ensure(recorded >= 2, || format!("only {} snapshots recorded", recorded))?;
        debug!("  recorded {} snapshots", recorded);

        s.world.toggle_scrub();
        s.world.start_rewind();
        let reached_oldest = s.run_until(self.max_duration_secs * 2.0 + 1.0, |w| {
            w.tracker(id).map_or(false, |t| {
                t.latest_index() == Some(0) && t.playhead_alpha() >= 1.0 - ALPHA_EPSILON
            })
        });
        ensure(reached_oldest, || "rewind never reached the oldest snapshot".into())?;

        let tracker = lookup(&s.world, id)?;
        let oldest = tracker
            .history()
            .pose(0)
            .ok_or("oldest snapshot missing")?
            .pose;
        let at_oldest = tracker.entity().pose();
        s.record_pose_error((at_oldest.position - oldest.position).norm());
        ensure(at_oldest.approx_eq(&oldest, POSE_EPSILON), || {
            format!("oldest pose off: {:?} vs {:?}", at_oldest, oldest)
        })?;

        s.world.stop_rewind();
        s.world.start_fast_forward();
        let newest_index = recorded - 1;
        let reached_newest = s.run_until(self.max_duration_secs * 2.0 + 1.0, |w| {
            w.tracker(id).map_or(false, |t| {
                t.latest_index() == Some(newest_index) && t.playhead_alpha() >= 1.0 - ALPHA_EPSILON
            })
        });
        ensure(reached_newest, || "fast-forward never reached the newest snapshot".into())?;

        let tracker = lookup(&s.world, id)?;
        let newest = tracker
            .history()
            .pose(newest_index)
            .ok_or("newest snapshot missing")?
            .pose;
        let at_newest = tracker.entity().pose();
        s.record_pose_error((at_newest.position - newest.position).norm());
        ensure(at_newest.approx_eq(&newest, POSE_EPSILON), || {
            format!("newest pose off: {:?} vs {:?}", at_newest, newest)
        })?;

        s.world.stop_fast_forward();
        s.world.toggle_scrub();

        let tracker = lookup(&s.world, id)?;
        ensure(tracker.state() == ManipulationState::Idle, || {
            format!("expected Idle after round trip, got {:?}", tracker.state())
        })?;
        ensure(tracker.history().len() == recorded, || {
            format!("round trip lost history: {} -> {}", recorded, tracker.history().len())
        })?;

        s.finish();
        Ok(())
    }

    /// RW-002: Release rewind while scrubbing and hold on a snapshot.
    fn run_scrub_hold(&self, log: &mut RunLog) -> Result<(), String> {
        info!("RW-002: ScrubHold - settle and freeze mid-history");

        let mut config = self.world_config(3, 1);
        config.tracker.pause_animation_during_scrub = true;
        config.character_tracker.pause_animation_during_scrub = true;
        let mut s = self.session(config, log)?;

        s.run_for(self.max_duration_secs.max(1.0));
        s.world.toggle_scrub();
        s.world.start_rewind();
        s.run_for(0.3);
        s.world.stop_rewind();
        s.run_for(0.2);

        for (id, tracker) in s.world.trackers() {
            ensure(tracker.state() == ManipulationState::Scrubbing(ScrubMotion::Hold), || {
                format!("{:?} not holding: {:?}", id, tracker.state())
            })?;
            ensure(tracker.is_hold_settled(), || format!("{:?} never settled", id))?;
            ensure(tracker.entity().is_animation_paused(), || {
                format!("{:?} animation still running", id)
            })?;
        }

        let frozen = s.world.positions();
        s.run_for(0.2);
        ensure(s.world.positions() == frozen, || "entities moved while held".into())?;

        s.world.toggle_scrub();
        for (id, tracker) in s.world.trackers() {
            ensure(tracker.state() == ManipulationState::Idle, || {
                format!("{:?} still manipulating after scrub", id)
            })?;
            ensure(tracker.entity().is_simulating_physics(), || {
                format!("{:?} physics not restored", id)
            })?;
            ensure(!tracker.entity().is_animation_paused(), || {
                format!("{:?} animation not restored", id)
            })?;
        }

        s.finish();
        Ok(())
    }

    /// RW-003: Entities leave and rejoin time control during a rewind.
    fn run_rejoin_mid_rewind(&self, log: &mut RunLog) -> Result<(), String> {
        info!("RW-003: RejoinMidRewind - participation changes under rewind");

        let mut s = self.session(self.world_config(3, 0), log)?;
        let ids = s.world.tracker_ids();
        let (a, b, c) = match ids.as_slice() {
            [a, b, c] => (*a, *b, *c),
            _ => return Err(format!("expected 3 entities, got {}", ids.len())),
        };

        s.run_for(self.max_duration_secs.max(1.0));
        s.world.set_participation(b, false).map_err(|e| e.to_string())?;
        let b_len = lookup(&s.world, b)?.history().len();

        s.world.start_rewind();
        s.run_for(0.3);
        let tracker = lookup(&s.world, b)?;
        ensure(tracker.state() == ManipulationState::Idle, || "disabled entity rewound".into())?;
        ensure(tracker.history().len() == b_len, || "disabled entity kept recording".into())?;

        s.world.set_participation(b, true).map_err(|e| e.to_string())?;
        ensure(lookup(&s.world, b)?.is_rewinding(), || {
            "re-enabled entity did not join the active rewind".into()
        })?;
        s.run_for(0.2);

        s.world.set_participation(a, false).map_err(|e| e.to_string())?;
        let tracker = lookup(&s.world, a)?;
        ensure(tracker.state() == ManipulationState::Idle, || "disabled entity still rewinding".into())?;
        ensure(tracker.entity().is_simulating_physics(), || "disabled entity left frozen".into())?;
        let a_len = tracker.history().len();
        ensure(tracker.latest_index() == a_len.checked_sub(1), || {
            format!("history not truncated at cursor: len {} cursor {:?}", a_len, tracker.latest_index())
        })?;

        s.world.stop_rewind();
        for id in [b, c] {
            let tracker = lookup(&s.world, id)?;
            ensure(tracker.state() == ManipulationState::Idle, || format!("{:?} still rewinding", id))?;
        }

        s.run_for(0.2);
        ensure(lookup(&s.world, a)?.history().len() == a_len, || {
            "disabled entity recorded while out of time control".into()
        })?;

        s.finish();
        Ok(())
    }

    /// RW-004: Resuming mid-history discards the abandoned future.
    fn run_branch_truncation(&self, log: &mut RunLog) -> Result<(), String> {
        info!("RW-004: BranchTruncation - resume drops the old future");

        let mut s = self.session(self.world_config(1, 0), log)?;
        let id = first_tracker(&s.world)?;

        s.run_for(self.max_duration_secs.max(1.0));
        let before = lookup(&s.world, id)?.history().len();

        s.world.start_rewind();
        s.run_for(0.5);
        s.world.stop_rewind();

        let tracker = lookup(&s.world, id)?;
        let after = tracker.history().len();
        ensure(after < before, || format!("history did not shrink: {} -> {}", before, after))?;
        ensure(tracker.latest_index() == Some(after - 1), || {
            format!("cursor {:?} not at newest of {}", tracker.latest_index(), after)
        })?;
        s.log.metrics.snapshots_discarded += before - after;

        s.run_for(0.5);
        let tracker = lookup(&s.world, id)?;
        let history = tracker.history();
        ensure(history.len() > after, || "recording did not resume".into())?;
        ensure(history.poses().all(|p| p.interval_since_prev > 0.0), || {
            "non-positive snapshot interval after resume".into()
        })?;

        s.finish();
        Ok(())
    }

    /// RW-005: Oversized history requests are clamped to the memory budget.
    fn run_memory_budget(&self, log: &mut RunLog) -> Result<(), String> {
        info!("RW-005: MemoryBudget - 240 Hz over the full history window");

        let mut config = self.world_config(1, 1);
        config.tick_rate_hz = 240;
        config.tracker.sampling_frequency_hz = 240.0;
        config.character_tracker.sampling_frequency_hz = 240.0;
        let history_secs = config.controller.max_history_seconds;
        let mut s = self.session(config, log)?;

        let mut longest_fill = 0usize;
        for (id, tracker) in s.world.trackers() {
            let plan = CapacityPlan::compute(
                history_secs,
                tracker.config().sampling_frequency_hz,
                tracker.captures_motion(),
            );
            ensure(plan.is_clamped(), || format!("{:?} history was not clamped", id))?;
            ensure(tracker.history().capacity() == plan.effective, || {
                format!(
                    "{:?} capacity {} != planned {}",
                    id,
                    tracker.history().capacity(),
                    plan.effective
                )
            })?;
            ensure(plan.effective_bytes() <= plan.budget_bytes, || {
                format!("{:?} allocation exceeds budget", id)
            })?;
            longest_fill = longest_fill.max(plan.effective);
        }

        let fill_secs = longest_fill as f64 / 240.0 + 1.0;
        let full = s.run_until(fill_secs, |w| {
            w.trackers()
                .all(|(_, t)| t.history().len() == t.history().capacity())
        });
        ensure(full, || "histories never filled".into())?;

        s.run_for(0.5);
        for (id, tracker) in s.world.trackers() {
            ensure(tracker.history().len() == tracker.history().capacity(), || {
                format!("{:?} grew past capacity", id)
            })?;
            ensure(tracker.history().is_synchronized(), || {
                format!("{:?} streams out of step", id)
            })?;
        }

        s.finish();
        Ok(())
    }

    /// RW-006: Each speed preset walks further through history than the last.
    fn run_speed_ramp(&self, log: &mut RunLog) -> Result<(), String> {
        info!("RW-006: SpeedRamp - rewind once per preset");

        let presets = self.config.controller.speed_presets.len();
        for index in 0..presets {
            let mut s = self.session(self.world_config(1, 0), log)?;
            let id = first_tracker(&s.world)?;
            s.run_for(3.0);

            let speed = s.world.set_speed(index).map_err(|e| e.to_string())?;
            s.world.start_rewind();
            let start = lookup(&s.world, id)?.latest_index().unwrap_or(0);
            s.run_for(0.5);
            let end = lookup(&s.world, id)?.latest_index().unwrap_or(0);
            s.world.stop_rewind();

            let steps = start.saturating_sub(end);
            debug!("  preset {} (x{}) walked {} snapshots", index, speed, steps);
            s.log.metrics.steps_per_preset.push(steps);
            s.finish();
        }

        let steps = &log.metrics.steps_per_preset;
        ensure(steps.windows(2).all(|w| w[0] <= w[1]), || {
            format!("faster preset walked less: {:?}", steps)
        })?;
        ensure(steps.last() > steps.first(), || {
            format!("speed had no effect: {:?}", steps)
        })?;
        Ok(())
    }

    /// RW-007: Characters resume with scaled velocity after a rewind and with
    /// zero velocity after a scrub.
    fn run_character_resume(&self, log: &mut RunLog) -> Result<(), String> {
        info!("RW-007: CharacterResume - movement velocity on resume");

        let mut s = self.session(self.world_config(0, 0), log)?;
        let id = s
            .world
            .spawn_character(Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0))
            .map_err(|e| e.to_string())?;
        s.run_for(self.max_duration_secs.max(1.0));

        let speed = s
            .world
            .set_speed_preset(SpeedPreset::Faster)
            .map_err(|e| e.to_string())?;
        s.world.start_rewind();
        s.run_for(0.3);
        s.world.stop_rewind();

        let tracker = lookup(&s.world, id)?;
        let cursor = tracker.latest_index().ok_or("no cursor after rewind")?;
        let recorded = tracker
            .history()
            .motion(cursor)
            .ok_or("no movement snapshot at cursor")?
            .movement_velocity;
        let resumed = tracker.entity().movement_velocity();
        ensure((resumed - recorded * speed).norm() < 1.0e-9, || {
            format!("resumed velocity {:?}, expected {:?} x{}", resumed, recorded, speed)
        })?;

        s.run_for(0.5);
        s.world.toggle_scrub();
        s.world.start_rewind();
        s.run_for(0.2);
        s.world.stop_rewind();
        s.world.toggle_scrub();

        let tracker = lookup(&s.world, id)?;
        ensure(tracker.state() == ManipulationState::Idle, || "scrub did not resume".into())?;
        let resumed = tracker.entity().movement_velocity();
        ensure(resumed.norm() < 1.0e-12, || {
            format!("scrub resume kept velocity {:?}", resumed)
        })?;

        s.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(42).with_duration(2.0)
    }

    #[test]
    fn test_round_trip_scenario() {
        let result = runner().run(ScenarioId::RoundTrip);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.max_pose_error < POSE_EPSILON);
        assert_eq!(result.final_entity_count, 1);
    }

    #[test]
    fn test_scrub_hold_scenario() {
        let result = runner().run(ScenarioId::ScrubHold);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.manipulations_completed, 4);
    }

    #[test]
    fn test_rejoin_mid_rewind_scenario() {
        let result = runner().run(ScenarioId::RejoinMidRewind);

        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_branch_truncation_scenario() {
        let result = runner().run(ScenarioId::BranchTruncation);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.snapshots_discarded > 0);
    }

    #[test]
    fn test_memory_budget_scenario() {
        let result = runner().run(ScenarioId::MemoryBudget);

        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_speed_ramp_scenario() {
        let result = runner().run(ScenarioId::SpeedRamp);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.steps_per_preset.len(), 5);
    }

    #[test]
    fn test_character_resume_scenario() {
        let result = runner().run(ScenarioId::CharacterResume);

        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_scenarios_deterministic() {
        let a = runner().run(ScenarioId::RejoinMidRewind);
        let b = runner().run(ScenarioId::RejoinMidRewind);

        assert_eq!(a.total_ticks, b.total_ticks);
        assert_eq!(a.metrics.tracker_events, b.metrics.tracker_events);
        assert_eq!(a.metrics.max_history_len, b.metrics.max_history_len);
    }

    #[test]
    fn test_export_captures_frames_and_events() {
        let (result, export) = runner().run_with_export(ScenarioId::BranchTruncation);

        assert!(result.passed);
        assert!(export.passed);
        assert!(!export.frames.is_empty());
        let events: usize = export.frames.iter().map(|f| f.events.len()).sum();
        assert_eq!(events as u64, result.metrics.tracker_events);
    }
}
