//! Voice persona clip sets
//!
//! Each persona maps phases to narration clip URLs. At most two personas
//! are configured; the pattern's own clips act as the fallback set.

use crate::events::BreathPhase;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Clip URL per phase
///
/// Every field is optional; an empty string is treated the same as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseClips {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inhale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<String>,
}

impl PhaseClips {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, phase: BreathPhase) -> &Option<String> {
        match phase {
            BreathPhase::Start => &self.start,
            BreathPhase::Inhale => &self.inhale,
            BreathPhase::Hold1 => &self.hold1,
            BreathPhase::Exhale => &self.exhale,
            BreathPhase::Hold2 => &self.hold2,
            BreathPhase::Rest => &self.rest,
        }
    }

    fn slot_mut(&mut self, phase: BreathPhase) -> &mut Option<String> {
        match phase {
            BreathPhase::Start => &mut self.start,
            BreathPhase::Inhale => &mut self.inhale,
            BreathPhase::Hold1 => &mut self.hold1,
            BreathPhase::Exhale => &mut self.exhale,
            BreathPhase::Hold2 => &mut self.hold2,
            BreathPhase::Rest => &mut self.rest,
        }
    }

    pub fn get(&self, phase: BreathPhase) -> Option<&String> {
        self.slot(phase).as_ref()
    }

    pub fn insert(&mut self, phase: BreathPhase, url: String) {
        *self.slot_mut(phase) = Some(url);
    }

    /// Phases that carry a non-empty clip
    pub fn phases(&self) -> impl Iterator<Item = (BreathPhase, &str)> + '_ {
        [
            BreathPhase::Start,
            BreathPhase::Inhale,
            BreathPhase::Hold1,
            BreathPhase::Exhale,
            BreathPhase::Hold2,
            BreathPhase::Rest,
        ]
        .into_iter()
        .filter_map(move |phase| clip_for(self, phase).map(|url| (phase, url)))
    }
}

/// Maximum number of personas a library may hold
pub const MAX_PERSONAS: usize = 2;

/// Clip for a phase, treating empty strings as absent
pub fn clip_for(clips: &PhaseClips, phase: BreathPhase) -> Option<&str> {
    clips
        .get(phase)
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
}

/// Named persona clip sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaLibrary {
    personas: BTreeMap<String, PhaseClips>,
}

impl PersonaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a persona's clip set
    pub fn insert(&mut self, name: impl Into<String>, clips: PhaseClips) -> Result<()> {
        let name = name.into();
        if !self.personas.contains_key(&name) && self.personas.len() >= MAX_PERSONAS {
            return Err(Error::InvalidInput(format!(
                "cannot add persona '{}': at most {} personas are supported",
                name, MAX_PERSONAS
            )));
        }
        self.personas.insert(name, clips);
        Ok(())
    }

    /// Builder-style insert for tests and static setups
    pub fn with_persona(mut self, name: impl Into<String>, clips: PhaseClips) -> Result<Self> {
        self.insert(name, clips)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.personas.len() > MAX_PERSONAS {
            return Err(Error::Config(format!(
                "{} personas configured, at most {} are supported",
                self.personas.len(),
                MAX_PERSONAS
            )));
        }
        if let Some(name) = self.personas.keys().find(|name| name.trim().is_empty()) {
            return Err(Error::Config(format!("invalid persona name '{}'", name)));
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.personas.contains_key(name)
    }

    pub fn clips(&self, name: &str) -> Option<&PhaseClips> {
        self.personas.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.personas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PhaseClips)> {
        self.personas.iter().map(|(name, clips)| (name.as_str(), clips))
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
