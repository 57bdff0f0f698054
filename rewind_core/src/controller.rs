//! Session-wide time controller.
//!
//! The controller holds three intent flags and a speed multiplier. Each
//! start/stop flips one flag unconditionally and broadcasts the matching
//! event to every subscriber, in subscription order. Whether a transition is
//! legal for a given entity is decided by the subscriber, not here.

use crate::config::ControllerConfig;
use crate::error::RewindError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Events broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlEvent {
    RewindStarted,
    RewindStopped,
    FastForwardStarted,
    FastForwardStopped,
    ScrubStarted,
    ScrubStopped,
}

/// The controller's three intent flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlFlags {
    pub rewinding: bool,
    pub fast_forwarding: bool,
    pub scrubbing: bool,
}

impl ControlFlags {
    /// Returns true if any flag is set.
    pub fn any(&self) -> bool {
        self.rewinding || self.fast_forwarding || self.scrubbing
    }
}

/// Read-only view of the controller handed to subscribers and ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub flags: ControlFlags,
    pub speed: f64,
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        Self {
            flags: ControlFlags::default(),
            speed: 1.0,
        }
    }
}

/// Receives controller broadcasts.
pub trait ControlListener {
    /// Called once per broadcast with the controller state after the flip.
    fn on_control_event(&mut self, event: ControlEvent, snapshot: &ControllerSnapshot);
}

/// Handle returned by [`TimeController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Named tiers of the default five-entry speed preset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedPreset {
    Slowest,
    Slower,
    Normal,
    Faster,
    Fastest,
}

impl SpeedPreset {
    /// Position of this tier in the preset list.
    pub fn index(self) -> usize {
        match self {
            SpeedPreset::Slowest => 0,
            SpeedPreset::Slower => 1,
            SpeedPreset::Normal => 2,
            SpeedPreset::Faster => 3,
            SpeedPreset::Fastest => 4,
        }
    }
}

/// Global time controller with an explicit subscriber list.
pub struct TimeController<L> {
    config: ControllerConfig,
    flags: ControlFlags,
    speed: f64,
    subscribers: Vec<(SubscriberId, L)>,
    next_id: u64,
}

impl<L: ControlListener> TimeController<L> {
    /// Creates a controller with all flags clear and speed 1.0.
    pub fn new(config: ControllerConfig) -> Result<Self, RewindError> {
        config.validate()?;
        Ok(Self {
            config,
            flags: ControlFlags::default(),
            speed: 1.0,
            subscribers: Vec::new(),
            next_id: 0,
        })
    }

    /// Adds a subscriber; it receives every later broadcast.
    pub fn subscribe(&mut self, listener: L) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, listener));
        id
    }

    /// Removes a subscriber and hands it back.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> Option<L> {
        let pos = self.subscribers.iter().position(|(sid, _)| *sid == id)?;
        Some(self.subscribers.remove(pos).1)
    }

    pub fn subscriber(&self, id: SubscriberId) -> Option<&L> {
        self.subscribers
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, l)| l)
    }

    pub fn subscriber_mut(&mut self, id: SubscriberId) -> Option<&mut L> {
        self.subscribers
            .iter_mut()
            .find(|(sid, _)| *sid == id)
            .map(|(_, l)| l)
    }

    /// Iterates subscribers in subscription order.
    pub fn subscribers(&self) -> impl Iterator<Item = (SubscriberId, &L)> {
        self.subscribers.iter().map(|(id, l)| (*id, l))
    }

    pub fn subscribers_mut(&mut self) -> impl Iterator<Item = (SubscriberId, &mut L)> {
        self.subscribers.iter_mut().map(|(id, l)| (*id, l))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn start_rewind(&mut self) {
        self.flags.rewinding = true;
        self.broadcast(ControlEvent::RewindStarted);
    }

    pub fn stop_rewind(&mut self) {
        self.flags.rewinding = false;
        self.broadcast(ControlEvent::RewindStopped);
    }

    pub fn start_fast_forward(&mut self) {
        self.flags.fast_forwarding = true;
        self.broadcast(ControlEvent::FastForwardStarted);
    }

    pub fn stop_fast_forward(&mut self) {
        self.flags.fast_forwarding = false;
        self.broadcast(ControlEvent::FastForwardStopped);
    }

    /// Flips the scrub flag and broadcasts start or stop to match.
    pub fn toggle_scrub(&mut self) {
        self.flags.scrubbing = !self.flags.scrubbing;
        let event = if self.flags.scrubbing {
            ControlEvent::ScrubStarted
        } else {
            ControlEvent::ScrubStopped
        };
        self.broadcast(event);
    }

    /// Selects the speed preset at `index`, returning the new multiplier.
    pub fn set_speed(&mut self, index: usize) -> Result<f64, RewindError> {
        let speed = *self
            .config
            .speed_presets
            .get(index)
            .ok_or(RewindError::UnknownSpeedPreset {
                index,
                available: self.config.speed_presets.len(),
            })?;
        debug!("Speed multiplier {} -> {}", self.speed, speed);
        self.speed = speed;
        Ok(speed)
    }

    /// Selects a named tier of the preset list.
    pub fn set_speed_preset(&mut self, preset: SpeedPreset) -> Result<f64, RewindError> {
        self.set_speed(preset.index())
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn speed_presets(&self) -> &[f64] {
        &self.config.speed_presets
    }

    pub fn max_history_seconds(&self) -> f64 {
        self.config.max_history_seconds
    }

    pub fn current_flags(&self) -> ControlFlags {
        self.flags
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            flags: self.flags,
            speed: self.speed,
        }
    }

    fn broadcast(&mut self, event: ControlEvent) {
        let snapshot = self.snapshot();
        debug!(
            "Broadcasting {:?} to {} subscribers (flags: {:?})",
            event,
            self.subscribers.len(),
            snapshot.flags
        );
        for (_, listener) in self.subscribers.iter_mut() {
            listener.on_control_event(event, &snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingListener {
        received: Vec<(ControlEvent, ControllerSnapshot)>,
    }

    impl ControlListener for RecordingListener {
        fn on_control_event(&mut self, event: ControlEvent, snapshot: &ControllerSnapshot) {
            self.received.push((event, *snapshot));
        }
    }

    fn controller() -> TimeController<RecordingListener> {
        TimeController::new(ControllerConfig::default()).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let ctl = controller();
        assert_eq!(ctl.speed(), 1.0);
        assert!(!ctl.current_flags().any());
        assert_eq!(ctl.max_history_seconds(), 120.0);
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber_with_post_flip_flags() {
        let mut ctl = controller();
        let a = ctl.subscribe(RecordingListener::default());
        let b = ctl.subscribe(RecordingListener::default());

        ctl.start_rewind();

        for id in [a, b] {
            let received = &ctl.subscriber(id).unwrap().received;
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].0, ControlEvent::RewindStarted);
            assert!(received[0].1.flags.rewinding);
        }
    }

    #[test]
    fn test_flags_flip_unconditionally() {
        let mut ctl = controller();
        let id = ctl.subscribe(RecordingListener::default());

        // No cross-flag legality here
        ctl.start_fast_forward();
        ctl.start_fast_forward();
        assert!(ctl.current_flags().fast_forwarding);
        ctl.stop_fast_forward();
        assert!(!ctl.current_flags().fast_forwarding);

        assert_eq!(ctl.subscriber(id).unwrap().received.len(), 3);
    }

    #[test]
    fn test_toggle_scrub_alternates_events() {
        let mut ctl = controller();
        let id = ctl.subscribe(RecordingListener::default());

        ctl.toggle_scrub();
        ctl.toggle_scrub();

        let events: Vec<_> = ctl
            .subscriber(id)
            .unwrap()
            .received
            .iter()
            .map(|(e, _)| *e)
            .collect();
        assert_eq!(events, vec![ControlEvent::ScrubStarted, ControlEvent::ScrubStopped]);
        assert!(!ctl.current_flags().scrubbing);
    }

    #[test]
    fn test_set_speed() {
        let mut ctl = controller();
        assert_eq!(ctl.set_speed(4), Ok(4.0));
        assert_eq!(ctl.snapshot().speed, 4.0);
        assert_eq!(ctl.set_speed_preset(SpeedPreset::Slowest), Ok(0.25));

        assert_eq!(
            ctl.set_speed(9),
            Err(RewindError::UnknownSpeedPreset { index: 9, available: 5 })
        );
        assert_eq!(ctl.speed(), 0.25);
    }

    #[test]
    fn test_unsubscribed_listener_gets_nothing() {
        let mut ctl = controller();
        let a = ctl.subscribe(RecordingListener::default());
        let b = ctl.subscribe(RecordingListener::default());

        let removed = ctl.unsubscribe(a).unwrap();
        ctl.start_rewind();

        assert!(removed.received.is_empty());
        assert!(ctl.subscriber(a).is_none());
        assert_eq!(ctl.subscriber(b).unwrap().received.len(), 1);
        assert_eq!(ctl.subscriber_count(), 1);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ControllerConfig {
            speed_presets: vec![],
            ..Default::default()
        };
        assert!(TimeController::<RecordingListener>::new(config).is_err());
    }
}
