//! Tracker and controller configuration.
//!
//! Both structs deserialize with serde and fall back to the documented
//! defaults for any missing field, so a config file only needs to name what
//! it overrides.

use crate::error::RewindError;
use serde::{Deserialize, Serialize};

/// Per-entity tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Snapshot rate in Hz (default: 30)
    pub sampling_frequency_hz: f64,

    /// Also record movement velocity and mode (default: off)
    ///
    /// Ignored for entities without the motion capability.
    pub capture_movement_state: bool,

    /// Pause animation once a scrub has settled on a snapshot (default: off)
    pub pause_animation_during_scrub: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sampling_frequency_hz: 30.0,
            capture_movement_state: false,
            pause_animation_during_scrub: false,
        }
    }
}

impl TrackerConfig {
    /// Settings suited to a character: movement state captured, animation
    /// paused while scrubbing.
    pub fn character() -> Self {
        Self {
            capture_movement_state: true,
            pause_animation_during_scrub: true,
            ..Self::default()
        }
    }

    /// Seconds between snapshots.
    pub fn sampling_interval(&self) -> f64 {
        1.0 / self.sampling_frequency_hz
    }

    /// Checks that the sampling rate is usable.
    pub fn validate(&self) -> Result<(), RewindError> {
        if !(self.sampling_frequency_hz.is_finite() && self.sampling_frequency_hz > 0.0) {
            return Err(RewindError::config(format!(
                "sampling_frequency_hz must be positive, got {}",
                self.sampling_frequency_hz
            )));
        }
        Ok(())
    }
}

/// Session-wide time controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Length of history each tracker keeps, in seconds (default: 120)
    pub max_history_seconds: f64,

    /// Selectable speed multipliers, slowest first (default: 0.25, 0.5, 1, 2, 4)
    pub speed_presets: Vec<f64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_history_seconds: 120.0,
            speed_presets: vec![0.25, 0.5, 1.0, 2.0, 4.0],
        }
    }
}

impl ControllerConfig {
    /// Checks history length and speed presets.
    pub fn validate(&self) -> Result<(), RewindError> {
        if !(self.max_history_seconds.is_finite() && self.max_history_seconds > 0.0) {
            return Err(RewindError::config(format!(
                "max_history_seconds must be positive, got {}",
                self.max_history_seconds
            )));
        }
        if self.speed_presets.is_empty() {
            return Err(RewindError::config("speed_presets must not be empty"));
        }
        if let Some(bad) = self
            .speed_presets
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(RewindError::config(format!(
                "speed presets must be positive, got {}",
                bad
            )));
        }
        if self.speed_presets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RewindError::config("speed_presets must be strictly increasing"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tracker = TrackerConfig::default();
        assert_eq!(tracker.sampling_frequency_hz, 30.0);
        assert!(!tracker.capture_movement_state);
        assert!(!tracker.pause_animation_during_scrub);

        let controller = ControllerConfig::default();
        assert_eq!(controller.max_history_seconds, 120.0);
        assert_eq!(controller.speed_presets, vec![0.25, 0.5, 1.0, 2.0, 4.0]);
        assert!(controller.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let tracker: TrackerConfig =
            serde_json::from_str(r#"{ "capture_movement_state": true }"#).unwrap();
        assert!(tracker.capture_movement_state);
        assert_eq!(tracker.sampling_frequency_hz, 30.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let tracker = TrackerConfig {
            sampling_frequency_hz: 0.0,
            ..Default::default()
        };
        assert!(matches!(tracker.validate(), Err(RewindError::InvalidConfig(_))));

        let empty = ControllerConfig {
            speed_presets: vec![],
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let unordered = ControllerConfig {
            speed_presets: vec![1.0, 0.5],
            ..Default::default()
        };
        assert!(unordered.validate().is_err());

        let negative_history = ControllerConfig {
            max_history_seconds: -1.0,
            ..Default::default()
        };
        assert!(negative_history.validate().is_err());
    }
}
