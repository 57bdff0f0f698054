//! Tagged manipulation state and its transition table.
//!
//! A tracker is either live, rewinding live time, or scrubbing (live time
//! paused) with at most one seek operation running. Fast-forward only exists
//! inside a scrub, so "fast-forwarding without scrubbing" cannot be built.
//!
//! ```text
//!            start Rewind              start Scrub
//!   Idle ───────────────► Rewinding ───────────────► Scrubbing(Rewinding)
//!    │  ◄─────────────────    ▲      ◄───────────────       │  ▲
//!    │     stop Rewind        │          stop Scrub          │  │ start Rewind
//!    │ start Scrub            │                  stop Rewind ▼  │
//!    └──────────────────────────────────────────────► Scrubbing(Hold)
//!      ◄──────────────────────────────────────────────   │  ▲
//!                       stop Scrub              start FF ▼  │ stop FF
//!                                            Scrubbing(FastForwarding)
//! ```

use serde::{Deserialize, Serialize};

/// The three kinds of time manipulation a controller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManipulationKind {
    Rewind,
    FastForward,
    Scrub,
}

impl ManipulationKind {
    /// All kinds, in the order used to stop them.
    pub const ALL: [ManipulationKind; 3] = [
        ManipulationKind::Rewind,
        ManipulationKind::FastForward,
        ManipulationKind::Scrub,
    ];
}

/// What a scrubbing tracker is doing with its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScrubMotion {
    /// Frozen on (or settling onto) a snapshot
    #[default]
    Hold,

    /// Seeking backwards
    Rewinding,

    /// Seeking forwards
    FastForwarding,
}

/// Manipulation state of one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ManipulationState {
    /// Live play: recording, not playing back
    #[default]
    Idle,

    /// Rewinding while live time is not paused
    Rewinding,

    /// Live time paused; history is seeked instead
    Scrubbing(ScrubMotion),
}

impl ManipulationState {
    /// State after starting `kind`, or `None` if the start is redundant or illegal.
    pub fn started(self, kind: ManipulationKind) -> Option<Self> {
        use ManipulationKind as K;
        use ManipulationState as S;

        match (self, kind) {
            (S::Idle, K::Rewind) => Some(S::Rewinding),
            (S::Idle, K::Scrub) => Some(S::Scrubbing(ScrubMotion::Hold)),
            (S::Rewinding, K::Scrub) => Some(S::Scrubbing(ScrubMotion::Rewinding)),
            (S::Scrubbing(ScrubMotion::Hold), K::Rewind) => Some(S::Scrubbing(ScrubMotion::Rewinding)),
            (S::Scrubbing(ScrubMotion::Hold), K::FastForward) => {
                Some(S::Scrubbing(ScrubMotion::FastForwarding))
            }
            _ => None,
        }
    }

    /// State after stopping `kind`, or `None` if `kind` is not active.
    pub fn stopped(self, kind: ManipulationKind) -> Option<Self> {
        use ManipulationKind as K;
        use ManipulationState as S;

        match (self, kind) {
            (S::Rewinding, K::Rewind) => Some(S::Idle),
            (S::Scrubbing(ScrubMotion::Rewinding), K::Rewind) => Some(S::Scrubbing(ScrubMotion::Hold)),
            (S::Scrubbing(ScrubMotion::FastForwarding), K::FastForward) => {
                Some(S::Scrubbing(ScrubMotion::Hold))
            }
            (S::Scrubbing(ScrubMotion::Rewinding), K::Scrub) => Some(S::Rewinding),
            (S::Scrubbing(_), K::Scrub) => Some(S::Idle),
            _ => None,
        }
    }

    /// Returns true if `kind` is currently active.
    pub fn is_active(self, kind: ManipulationKind) -> bool {
        match kind {
            ManipulationKind::Rewind => self.is_rewinding(),
            ManipulationKind::FastForward => self.is_fast_forwarding(),
            ManipulationKind::Scrub => self.is_scrubbing(),
        }
    }

    pub fn is_rewinding(self) -> bool {
        matches!(
            self,
            ManipulationState::Rewinding | ManipulationState::Scrubbing(ScrubMotion::Rewinding)
        )
    }

    pub fn is_fast_forwarding(self) -> bool {
        matches!(self, ManipulationState::Scrubbing(ScrubMotion::FastForwarding))
    }

    pub fn is_scrubbing(self) -> bool {
        matches!(self, ManipulationState::Scrubbing(_))
    }

    /// Returns true for anything other than live play.
    pub fn is_manipulating(self) -> bool {
        self != ManipulationState::Idle
    }
}
