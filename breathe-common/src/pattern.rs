//! Breathing pattern definitions
//!
//! A pattern is supplied by collaborators as plain configuration and is
//! immutable once a session starts.

use crate::events::BreathPhase;
use crate::persona::{clip_for, PhaseClips};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Breathing pattern definition
///
/// Durations are whole seconds. A hold of 0 means the phase is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingPattern {
    /// Unique pattern identifier
    pub id: String,
    /// Display name
    pub name: String,
    pub inhale: u32,
    #[serde(default)]
    pub hold_after_inhale: u32,
    pub exhale: u32,
    #[serde(default)]
    pub hold_after_exhale: u32,
    /// Number of cycles in one exercise
    pub cycles: u32,
    /// Pattern default narration, used when the active persona has no clip
    #[serde(default)]
    pub narration: PhaseClips,
}

impl BreathingPattern {
    /// Create a pattern without narration
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        durations: [u32; 4],
        cycles: u32,
    ) -> Self {
        let [inhale, hold_after_inhale, exhale, hold_after_exhale] = durations;
        Self {
            id: id.into(),
            name: name.into(),
            inhale,
            hold_after_inhale,
            exhale,
            hold_after_exhale,
            cycles,
            narration: PhaseClips::new(),
        }
    }

    /// Attach a pattern default clip for a phase
    pub fn with_clip(mut self, phase: BreathPhase, url: impl Into<String>) -> Self {
        self.narration.insert(phase, url.into());
        self
    }

    /// Reject patterns a session cannot run
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("pattern id is empty".to_string()));
        }
        if self.inhale == 0 || self.exhale == 0 {
            return Err(Error::InvalidInput(format!(
                "pattern '{}' needs non-zero inhale and exhale durations",
                self.id
            )));
        }
        if self.cycles == 0 {
            return Err(Error::InvalidInput(format!(
                "pattern '{}' needs at least one cycle",
                self.id
            )));
        }
        Ok(())
    }

    /// Configured duration of a phase in seconds (0 for skipped or non-cycle phases)
    pub fn duration_of(&self, phase: BreathPhase) -> u32 {
        match phase {
            BreathPhase::Inhale => self.inhale,
            BreathPhase::Hold1 => self.hold_after_inhale,
            BreathPhase::Exhale => self.exhale,
            BreathPhase::Hold2 => self.hold_after_exhale,
            BreathPhase::Start | BreathPhase::Rest => 0,
        }
    }

    /// Whether the phase is entered during a cycle
    pub fn includes(&self, phase: BreathPhase) -> bool {
        BreathPhase::CYCLE.contains(&phase) && self.duration_of(phase) > 0
    }

    /// Phases entered during one cycle, in order
    pub fn cycle_phases(&self) -> Vec<BreathPhase> {
        BreathPhase::CYCLE
            .iter()
            .copied()
            .filter(|phase| self.includes(*phase))
            .collect()
    }

    /// Phase following `phase` within the same cycle, None at the end of a cycle
    pub fn next_phase(&self, phase: BreathPhase) -> Option<BreathPhase> {
        let position = BreathPhase::CYCLE.iter().position(|p| *p == phase)?;
        BreathPhase::CYCLE[position + 1..]
            .iter()
            .copied()
            .find(|candidate| self.includes(*candidate))
    }

    /// Last configured phase of a cycle (exhale if hold2 is 0, else hold2)
    pub fn last_phase(&self) -> BreathPhase {
        if self.hold_after_exhale > 0 {
            BreathPhase::Hold2
        } else {
            BreathPhase::Exhale
        }
    }

    /// Pattern default clip for a phase, ignoring empty strings
    pub fn clip(&self, phase: BreathPhase) -> Option<&str> {
        clip_for(&self.narration, phase)
    }

    /// Patterns available when configuration supplies none
    pub fn builtin() -> Vec<BreathingPattern> {
        vec![
            BreathingPattern::new("4-7-8", "Relaxing Breath", [4, 7, 8, 0], 4),
            BreathingPattern::new("box", "Box Breathing", [4, 4, 4, 4], 6),
            BreathingPattern::new("coherence", "Coherent Breathing", [5, 0, 5, 0], 10),
        ]
    }
}
