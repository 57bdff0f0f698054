//! JSON exporter for offline inspection of a run.
//!
//! Exports sampled simulation frames (entity positions, tracker state,
//! controller flags) plus the tracker events that fired in between.

use nalgebra::Vector3;
use rewind_core::{ControlFlags, ManipulationState, TrackerEvent};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Controller flags at this frame
    pub flags: ControlFlags,

    /// Controller speed multiplier
    pub speed: f64,

    /// Per-entity state
    pub entities: Vec<EntityFrame>,

    /// Tracker events since the previous frame
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// One entity's state in a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFrame {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub state: ManipulationState,
    pub history_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<usize>,
}

impl EntityFrame {
    pub fn new(
        id: impl ToString,
        pos: Vector3<f64>,
        state: ManipulationState,
        history_len: usize,
        cursor: Option<usize>,
    ) -> Self {
        Self {
            id: id.to_string(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            state,
            history_len,
            cursor,
        }
    }
}

/// A tracker event attributed to its entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub entity: String,
    pub event: TrackerEvent,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final result
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_serializes_frames() {
        let mut export = SimExport::new("round_trip", 42);
        export.add_frame(SimFrame {
            time_sec: 1.5,
            flags: ControlFlags {
                rewinding: true,
                ..Default::default()
            },
            speed: 2.0,
            entities: vec![EntityFrame::new(
                "abcd1234",
                Vector3::new(1.0, 2.0, 3.0),
                ManipulationState::Rewinding,
                45,
                Some(30),
            )],
            events: vec![],
        });
        export.finalize(true, None);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["duration_sec"], 1.5);
        assert_eq!(json["frames"][0]["flags"]["rewinding"], true);
        assert_eq!(json["frames"][0]["entities"][0]["state"], "Rewinding");
        assert!(json["frames"][0].get("events").is_none());
        assert!(json.get("failure_reason").is_none());
    }
}
