//! Shared application state
//!
//! One instance per process, handed to the HTTP layer behind an `Arc`.

use crate::audio::MediaBackend;
use crate::engine::AudioEngine;
use crate::error::{Error, Result};
use crate::narration::ClipProbe;
use crate::timer::{BreathingSession, SessionAudio};
use breathe_common::config::BreatheConfig;
use breathe_common::events::{BreatheEvent, EventBus};
use breathe_common::BreathingPattern;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

pub struct SharedState {
    pub config: BreatheConfig,

    /// Event bus shared by the engine and the SSE surface
    pub events: EventBus,

    /// Pattern library (from configuration, or the built-ins)
    pub patterns: RwLock<Vec<BreathingPattern>>,

    pub session: BreathingSession,

    pub audio: Arc<AudioEngine>,

    pub started_at: Instant,
}

impl SharedState {
    pub fn new(
        config: BreatheConfig,
        backend: &dyn MediaBackend,
        probe: Arc<dyn ClipProbe>,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        let audio = Arc::new(AudioEngine::new(&config, backend, probe, events.clone()));
        let session_audio: Arc<dyn SessionAudio> = audio.clone();
        let session = BreathingSession::new(&config.timer, events.clone(), session_audio);
        let patterns = RwLock::new(config.pattern_library());
        Self {
            config,
            events,
            patterns,
            session,
            audio,
            started_at: Instant::now(),
        }
    }

    /// Activate the configured initial persona, if any
    ///
    /// A persona that fails validation is logged and left inactive.
    pub async fn activate_initial_persona(&self) {
        let Some(persona) = self.config.narration.initial_persona.clone() else {
            return;
        };
        match self.activate_persona(Some(&persona)).await {
            Ok(()) => info!("Initial persona '{}' active", persona),
            Err(e) => warn!("Initial persona '{}' not activated: {}", persona, e),
        }
    }

    pub async fn list_patterns(&self) -> Vec<BreathingPattern> {
        self.patterns.read().await.clone()
    }

    pub async fn find_pattern(&self, id: &str) -> Result<BreathingPattern> {
        self.patterns
            .read()
            .await
            .iter()
            .find(|pattern| pattern.id == id)
            .cloned()
            .ok_or_else(|| Error::PatternNotFound(id.to_string()))
    }

    /// Validate and activate a persona against the selected pattern
    pub async fn activate_persona(&self, persona: Option<&str>) -> Result<()> {
        let pattern = self.session.pattern();
        self.audio.activate_persona(persona, pattern.as_ref()).await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BreatheEvent> {
        self.events.subscribe()
    }

    /// Stop ticking and silence every output
    pub fn shutdown(&self) {
        self.session.halt();
        self.audio.stop_all();
    }
}
