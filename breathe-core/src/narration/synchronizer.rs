//! Narration synchronizer
//!
//! Turns phase changes into narration playback. Each phase change fully
//! interrupts the clip in flight before the next one starts, so clips never
//! overlap. URLs are probed once before their first playback; a probe that
//! completes after a newer phase change is discarded.

use super::probe::{probe_with_attempts, ClipProbe};
use super::resolver::{ClipTable, ResolvedClip};
use crate::audio::PlaybackController;
use crate::error::{Error, Result};
use breathe_common::events::{BreatheEvent, EventBus, NotificationLevel};
use breathe_common::{BreathPhase, BreathingPattern};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct SyncState {
    persona: Option<String>,
    validated: HashSet<String>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

struct SyncInner {
    controller: PlaybackController,
    table: ClipTable,
    probe: Arc<dyn ClipProbe>,
    probe_attempts: u32,
    events: EventBus,
    state: Mutex<SyncState>,
}

#[derive(Clone)]
pub struct NarrationSynchronizer {
    inner: Arc<SyncInner>,
}

impl NarrationSynchronizer {
    pub fn new(
        controller: PlaybackController,
        table: ClipTable,
        probe: Arc<dyn ClipProbe>,
        probe_attempts: u32,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                controller,
                table,
                probe,
                probe_attempts,
                events,
                state: Mutex::new(SyncState {
                    persona: None,
                    validated: HashSet::new(),
                    generation: 0,
                    pending: None,
                }),
            }),
        }
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.inner.controller
    }

    pub fn table(&self) -> &ClipTable {
        &self.inner.table
    }

    pub fn persona(&self) -> Option<String> {
        self.inner.state.lock().persona.clone()
    }

    /// Play the clip for `phase`, or stay silent when none resolves
    ///
    /// Returns the clip that was requested.
    pub fn on_phase_change(
        &self,
        pattern: &BreathingPattern,
        phase: BreathPhase,
    ) -> Option<ResolvedClip> {
        let persona = self.persona();
        let Some(clip) = self
            .inner
            .table
            .resolve(persona.as_deref(), Some(pattern), phase)
        else {
            debug!("No narration for {} ({:?})", phase, persona);
            return None;
        };

        let (generation, validated) = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            if let Some(pending) = state.pending.take() {
                pending.abort();
            }
            (state.generation, state.validated.contains(&clip.url))
        };

        self.inner.controller.interrupt();

        if validated {
            debug!("Narration {} -> {}", phase, clip.url);
            self.inner.controller.load(&clip.url);
            return Some(clip);
        }

        let inner = Arc::clone(&self.inner);
        let url = clip.url.clone();
        let handle = tokio::spawn(async move {
            let result = probe_with_attempts(inner.probe.as_ref(), &url, inner.probe_attempts).await;
            let current = {
                let mut state = inner.state.lock();
                if state.generation != generation {
                    false
                } else {
                    state.pending = None;
                    if result.is_ok() {
                        state.validated.insert(url.clone());
                    }
                    true
                }
            };
            if !current {
                debug!("Discarding stale probe for {}", url);
                return;
            }
            match result {
                Ok(()) => inner.controller.load(&url),
                Err(e) => {
                    warn!("Narration clip unreachable, skipping: {}", e);
                    inner.events.emit_lossy(BreatheEvent::notification(
                        NotificationLevel::Warning,
                        format!("narration clip unavailable for {}", phase),
                    ));
                }
            }
        });

        let mut state = self.inner.state.lock();
        if state.generation == generation && !handle.is_finished() {
            state.pending = Some(handle);
        }
        Some(clip)
    }

    /// Request the terminal "exercise complete" clip
    pub fn on_complete(&self, pattern: &BreathingPattern) -> Option<ResolvedClip> {
        self.on_phase_change(pattern, BreathPhase::Rest)
    }

    /// Switch persona after validating every clip it must provide
    ///
    /// `None` falls back to pattern defaults. On failure the previous
    /// persona stays active.
    pub async fn activate_persona(
        &self,
        persona: Option<&str>,
        pattern: Option<&BreathingPattern>,
    ) -> Result<()> {
        let Some(name) = persona else {
            self.set_persona(None);
            return Ok(());
        };
        if !self.inner.table.contains(name) {
            return Err(Error::Narration(format!("unknown persona '{}'", name)));
        }

        let required = self.inner.table.required_clips(name, pattern)?;
        let unchecked: Vec<ResolvedClip> = {
            let state = self.inner.state.lock();
            required
                .into_iter()
                .filter(|clip| !state.validated.contains(&clip.url))
                .collect()
        };

        let probes = unchecked.iter().map(|clip| {
            probe_with_attempts(
                self.inner.probe.as_ref(),
                &clip.url,
                self.inner.probe_attempts,
            )
        });
        let results = join_all(probes).await;

        if let Some((clip, Err(e))) = unchecked
            .iter()
            .zip(results.iter())
            .find(|(_, result)| result.is_err())
        {
            warn!("Persona '{}' rejected: {} clip failed: {}", name, clip.phase, e);
            return Err(Error::Narration(format!(
                "persona '{}' rejected: clip for {} is unreachable",
                name, clip.phase
            )));
        }

        {
            let mut state = self.inner.state.lock();
            state
                .validated
                .extend(unchecked.into_iter().map(|clip| clip.url));
        }
        self.set_persona(Some(name.to_string()));
        Ok(())
    }

    /// Cancel pending probes and stop the narration output
    pub fn stop(&self) {
        self.cancel_pending();
        self.inner.controller.stop();
    }

    /// `stop` plus clearing the controller's retry counter and error flags
    pub fn reset(&self) {
        self.cancel_pending();
        self.inner.controller.reset();
    }

    fn cancel_pending(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
    }

    fn set_persona(&self, persona: Option<String>) {
        {
            let mut state = self.inner.state.lock();
            if state.persona == persona {
                return;
            }
            state.persona = persona.clone();
        }
        info!("Narration persona: {:?}", persona);
        self.inner.events.emit_lossy(BreatheEvent::PersonaChanged {
            persona,
            timestamp: Utc::now(),
        });
    }
}
