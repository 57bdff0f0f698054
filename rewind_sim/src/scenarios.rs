//! Time-control scenarios for the simulator.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// RW-001: Rewind to the oldest snapshot, fast-forward back to the newest
    RoundTrip,

    /// RW-002: Stop a rewind mid-scrub and hold on a settled snapshot
    ScrubHold,

    /// RW-003: Entities leaving and rejoining time control mid-rewind
    RejoinMidRewind,

    /// RW-004: Resume after a rewind discards the abandoned future
    BranchTruncation,

    /// RW-005: Oversized history is clamped to the memory budget
    MemoryBudget,

    /// RW-006: Higher speed presets walk further through history
    SpeedRamp,

    /// RW-007: Characters resume with scaled or zeroed movement velocity
    CharacterResume,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::RoundTrip,
            ScenarioId::ScrubHold,
            ScenarioId::RejoinMidRewind,
            ScenarioId::BranchTruncation,
            ScenarioId::MemoryBudget,
            ScenarioId::SpeedRamp,
            ScenarioId::CharacterResume,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::RoundTrip => "round_trip",
            ScenarioId::ScrubHold => "scrub_hold",
            ScenarioId::RejoinMidRewind => "rejoin_mid_rewind",
            ScenarioId::BranchTruncation => "branch_truncation",
            ScenarioId::MemoryBudget => "memory_budget",
            ScenarioId::SpeedRamp => "speed_ramp",
            ScenarioId::CharacterResume => "character_resume",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::RoundTrip => "Scrub back to the oldest snapshot and forward again; end exactly on the newest",
            ScenarioId::ScrubHold => "Release rewind while scrubbing; every entity settles and freezes",
            ScenarioId::RejoinMidRewind => "Disable one entity, rewind, re-enable it mid-rewind, disable another",
            ScenarioId::BranchTruncation => "Rewind, resume live play, verify the old future is gone",
            ScenarioId::MemoryBudget => "240 Hz sampling over 120 s history; capacity clamps to the budget",
            ScenarioId::SpeedRamp => "Rewind once per speed preset; faster presets travel further",
            ScenarioId::CharacterResume => "Rewind at 2x then resume; scrub then resume with zero velocity",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "round_trip" | "roundtrip" | "rw-001" => Ok(ScenarioId::RoundTrip),
            "scrub_hold" | "scrubhold" | "rw-002" => Ok(ScenarioId::ScrubHold),
            "rejoin_mid_rewind" | "rejoin" | "rw-003" => Ok(ScenarioId::RejoinMidRewind),
            "branch_truncation" | "truncation" | "rw-004" => Ok(ScenarioId::BranchTruncation),
            "memory_budget" | "budget" | "rw-005" => Ok(ScenarioId::MemoryBudget),
            "speed_ramp" | "speedramp" | "rw-006" => Ok(ScenarioId::SpeedRamp),
            "character_resume" | "character" | "rw-007" => Ok(ScenarioId::CharacterResume),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
