//! Audio engine
//!
//! Narration and ambient playback behind the session's audio seam. Ambient
//! playback is independent of phase changes; only pausing and resetting the
//! session reach it.

use crate::audio::{AmbientTrack, MediaBackend, PlaybackController, SourceClassifier};
use crate::error::Result;
use crate::narration::{ClipProbe, ClipTable, NarrationSynchronizer};
use crate::timer::SessionAudio;
use breathe_common::config::BreatheConfig;
use breathe_common::events::{EventBus, PlaybackSnapshot, TrackKind};
use breathe_common::{BreathPhase, BreathingPattern};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Snapshot of both tracks
#[derive(Debug, Clone, Serialize)]
pub struct AudioSnapshot {
    pub persona: Option<String>,
    pub narration: PlaybackSnapshot,
    pub ambient: PlaybackSnapshot,
}

pub struct AudioEngine {
    pub narration: NarrationSynchronizer,
    pub ambient: AmbientTrack,
}

impl AudioEngine {
    pub fn new(
        config: &BreatheConfig,
        backend: &dyn MediaBackend,
        probe: Arc<dyn ClipProbe>,
        events: EventBus,
    ) -> Self {
        let classifier = Arc::new(SourceClassifier::new(&config.classifier));
        let narration_controller = PlaybackController::new(
            TrackKind::Narration,
            backend.create_element(),
            Arc::clone(&classifier),
            config.playback.clone(),
            config.narration.volume,
            events.clone(),
        );
        let narration = NarrationSynchronizer::new(
            narration_controller,
            ClipTable::new(config.personas.clone()),
            probe,
            config.narration.probe_attempts,
            events.clone(),
        );
        let ambient = AmbientTrack::new(
            backend,
            classifier,
            &config.playback,
            &config.crossfade,
            events,
        );
        Self { narration, ambient }
    }

    pub fn snapshot(&self) -> AudioSnapshot {
        AudioSnapshot {
            persona: self.narration.persona(),
            narration: self.narration.controller().snapshot(),
            ambient: self.ambient.snapshot(),
        }
    }

    pub async fn activate_persona(
        &self,
        persona: Option<&str>,
        pattern: Option<&BreathingPattern>,
    ) -> Result<()> {
        self.narration.activate_persona(persona, pattern).await
    }
}

impl SessionAudio for AudioEngine {
    fn phase_changed(&self, pattern: &BreathingPattern, phase: BreathPhase) {
        self.narration.on_phase_change(pattern, phase);
    }

    fn exercise_completed(&self, pattern: &BreathingPattern) {
        self.narration.on_complete(pattern);
    }

    fn stop_all(&self) {
        debug!("Stopping all audio outputs");
        self.narration.stop();
        self.ambient.stop();
    }

    fn reset_all(&self) {
        debug!("Resetting all audio outputs");
        self.narration.reset();
        self.ambient.reset();
    }
}
