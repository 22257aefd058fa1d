//! Session-related type definitions
//!
//! Supporting types for the breathing phase timer and its snapshots.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Breathing phase enumeration
///
/// `Inhale`, `Hold1`, `Exhale` and `Hold2` are the phases of a cycle.
/// `Start` is reported while no pattern is selected; `Rest` keys the
/// terminal narration clip played when an exercise completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathPhase {
    Start,
    Inhale,
    Hold1,
    Exhale,
    Hold2,
    Rest,
}

impl BreathPhase {
    /// Phases that make up one breathing cycle, in order
    pub const CYCLE: [BreathPhase; 4] = [
        BreathPhase::Inhale,
        BreathPhase::Hold1,
        BreathPhase::Exhale,
        BreathPhase::Hold2,
    ];

    /// True for the two hold phases
    pub fn is_hold(&self) -> bool {
        matches!(self, BreathPhase::Hold1 | BreathPhase::Hold2)
    }
}

impl std::fmt::Display for BreathPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreathPhase::Start => write!(f, "start"),
            BreathPhase::Inhale => write!(f, "inhale"),
            BreathPhase::Hold1 => write!(f, "hold1"),
            BreathPhase::Exhale => write!(f, "exhale"),
            BreathPhase::Hold2 => write!(f, "hold2"),
            BreathPhase::Rest => write!(f, "rest"),
        }
    }
}

impl std::str::FromStr for BreathPhase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(BreathPhase::Start),
            "inhale" => Ok(BreathPhase::Inhale),
            "hold1" => Ok(BreathPhase::Hold1),
            "exhale" => Ok(BreathPhase::Exhale),
            "hold2" => Ok(BreathPhase::Hold2),
            "rest" => Ok(BreathPhase::Rest),
            other => Err(crate::Error::InvalidInput(format!("unknown phase '{}'", other))),
        }
    }
}

/// Point-in-time view of a breathing session, published for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Identifier of the current session run (None until a pattern is selected)
    pub session_id: Option<Uuid>,
    /// Selected pattern identifier
    pub pattern_id: Option<String>,
    /// Whether the tick sources are running
    pub active: bool,
    /// Current phase
    pub phase: BreathPhase,
    /// Current cycle (1-based)
    pub cycle: u32,
    /// Total cycles configured by the pattern
    pub total_cycles: u32,
    /// Whole seconds left in the current phase
    pub seconds_left: u32,
    /// Phase-relative progress, 0.0 to 100.0
    pub progress: f64,
    /// Whether the exercise has completed
    pub completed: bool,
}

impl SessionSnapshot {
    /// Snapshot of a session with no pattern selected
    pub fn idle() -> Self {
        Self {
            session_id: None,
            pattern_id: None,
            active: false,
            phase: BreathPhase::Start,
            cycle: 1,
            total_cycles: 0,
            seconds_left: 0,
            progress: 0.0,
            completed: false,
        }
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
