//! Clip resolution
//!
//! Pure lookup keyed by `(persona, phase)`:
//! active persona's clip → pattern default clip → silence.

use crate::error::{Error, Result};
use breathe_common::persona::clip_for;
use breathe_common::{BreathPhase, BreathingPattern, PersonaLibrary};

/// Where a resolved clip came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSource {
    Persona,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClip {
    pub phase: BreathPhase,
    pub url: String,
    pub source: ClipSource,
}

#[derive(Debug, Clone, Default)]
pub struct ClipTable {
    personas: PersonaLibrary,
}

impl ClipTable {
    pub fn new(personas: PersonaLibrary) -> Self {
        Self { personas }
    }

    pub fn personas(&self) -> &PersonaLibrary {
        &self.personas
    }

    pub fn contains(&self, persona: &str) -> bool {
        self.personas.contains(persona)
    }

    /// Clip for `phase`, or None for silence
    pub fn resolve(
        &self,
        persona: Option<&str>,
        pattern: Option<&BreathingPattern>,
        phase: BreathPhase,
    ) -> Option<ResolvedClip> {
        let from_persona = persona
            .and_then(|name| self.personas.clips(name))
            .and_then(|clips| clip_for(clips, phase))
            .map(|url| (url, ClipSource::Persona));
        let from_pattern = || {
            pattern
                .and_then(|pattern| pattern.clip(phase))
                .map(|url| (url, ClipSource::Pattern))
        };

        from_persona.or_else(from_pattern).map(|(url, source)| ResolvedClip {
            phase,
            url: url.to_string(),
            source,
        })
    }

    /// Clips a persona must provide (directly or by fallback) before it can
    /// be activated
    ///
    /// With a pattern, every phase the pattern enters must resolve to a
    /// clip. Without one, the persona's own cycle clips are required, and
    /// at least one must exist.
    pub fn required_clips(
        &self,
        persona: &str,
        pattern: Option<&BreathingPattern>,
    ) -> Result<Vec<ResolvedClip>> {
        let clips = self
            .personas
            .clips(persona)
            .ok_or_else(|| Error::Narration(format!("unknown persona '{}'", persona)))?;

        match pattern {
            Some(pattern) => pattern
                .cycle_phases()
                .into_iter()
                .map(|phase| {
                    self.resolve(Some(persona), Some(pattern), phase)
                        .ok_or_else(|| {
                            Error::Narration(format!(
                                "persona '{}' has no clip for {} in pattern '{}'",
                                persona, phase, pattern.id
                            ))
                        })
                })
                .collect(),
            None => {
                let required: Vec<ResolvedClip> = BreathPhase::CYCLE
                    .iter()
                    .filter_map(|phase| {
                        clip_for(clips, *phase).map(|url| ResolvedClip {
                            phase: *phase,
                            url: url.to_string(),
                            source: ClipSource::Persona,
                        })
                    })
                    .collect();
                if required.is_empty() {
                    return Err(Error::Narration(format!(
                        "persona '{}' has no clips",
                        persona
                    )));
                }
                Ok(required)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathe_common::PhaseClips;

    fn table() -> ClipTable {
        let mut calm = PhaseClips::new();
        calm.insert(BreathPhase::Inhale, "https://cdn.example.com/calm/inhale.mp3".into());
        calm.insert(BreathPhase::Exhale, "https://cdn.example.com/calm/exhale.mp3".into());
        calm.insert(BreathPhase::Hold1, "   ".into());
        let personas = PersonaLibrary::new().with_persona("calm", calm).unwrap();
        ClipTable::new(personas)
    }

    fn pattern() -> BreathingPattern {
        BreathingPattern::new("4-7-8", "Relaxing", [4, 7, 8, 0], 1)
            .with_clip(BreathPhase::Inhale, "https://cdn.example.com/default/inhale.mp3")
            .with_clip(BreathPhase::Hold1, "https://cdn.example.com/default/hold.mp3")
            .with_clip(BreathPhase::Rest, "https://cdn.example.com/default/done.mp3")
    }

    #[test]
    fn test_persona_clip_wins() {
        let clip = table()
            .resolve(Some("calm"), Some(&pattern()), BreathPhase::Inhale)
            .unwrap();
        assert_eq!(clip.url, "https://cdn.example.com/calm/inhale.mp3");
        assert_eq!(clip.source, ClipSource::Persona);
    }

    #[test]
    fn test_empty_persona_clip_falls_back_to_pattern() {
        let clip = table()
            .resolve(Some("calm"), Some(&pattern()), BreathPhase::Hold1)
            .unwrap();
        assert_eq!(clip.url, "https://cdn.example.com/default/hold.mp3");
        assert_eq!(clip.source, ClipSource::Pattern);
    }

    #[test]
    fn test_unresolved_phase_is_silence() {
        let table = table();
        assert!(table
            .resolve(Some("calm"), Some(&pattern()), BreathPhase::Hold2)
            .is_none());
        assert!(table.resolve(None, None, BreathPhase::Inhale).is_none());
        assert!(table
            .resolve(Some("unknown"), None, BreathPhase::Inhale)
            .is_none());
    }

    #[test]
    fn test_required_clips_follow_pattern_phases() {
        let required = table().required_clips("calm", Some(&pattern())).unwrap();
        let phases: Vec<_> = required.iter().map(|clip| clip.phase).collect();
        assert_eq!(
            phases,
            vec![BreathPhase::Inhale, BreathPhase::Hold1, BreathPhase::Exhale]
        );
    }

    #[test]
    fn test_required_clips_reject_gaps() {
        let sparse = BreathingPattern::new("box", "Box", [4, 4, 4, 4], 1);
        assert!(matches!(
            table().required_clips("calm", Some(&sparse)),
            Err(Error::Narration(_))
        ));
        assert!(matches!(
            table().required_clips("missing", None),
            Err(Error::Narration(_))
        ));
    }

    #[test]
    fn test_required_clips_without_pattern() {
        let required = table().required_clips("calm", None).unwrap();
        assert_eq!(required.len(), 2);
    }
}
