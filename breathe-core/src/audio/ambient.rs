//! Ambient background track
//!
//! Two decks (playback controllers on separate media elements) plus the
//! crossfade coordinator. The active deck plays; when a queued follow-up
//! source exists and the active deck enters its fade window, the standby
//! deck loads it and the two are crossfaded. On completion the decks swap.

use super::classifier::SourceClassifier;
use super::controller::PlaybackController;
use super::crossfade::CrossfadeCoordinator;
use super::media::MediaBackend;
use crate::error::Result;
use breathe_common::config::{CrossfadeSettings, PlaybackSettings};
use breathe_common::events::{EventBus, PlaybackSnapshot, TrackKind};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct Decks {
    active: PlaybackController,
    standby: PlaybackController,
    queued: Option<String>,
    looping: bool,
}

#[derive(Clone)]
pub struct AmbientTrack {
    decks: Arc<Mutex<Decks>>,
    coordinator: CrossfadeCoordinator,
    monitor: Arc<Mutex<Option<JoinHandle<()>>>>,
    step: Duration,
}

impl AmbientTrack {
    pub fn new(
        backend: &dyn MediaBackend,
        classifier: Arc<SourceClassifier>,
        playback: &PlaybackSettings,
        crossfade: &CrossfadeSettings,
        events: EventBus,
    ) -> Self {
        let deck = || {
            PlaybackController::new(
                TrackKind::Ambient,
                backend.create_element(),
                Arc::clone(&classifier),
                playback.clone(),
                playback.initial_volume,
                events.clone(),
            )
        };
        Self {
            decks: Arc::new(Mutex::new(Decks {
                active: deck(),
                standby: deck(),
                queued: None,
                looping: false,
            })),
            coordinator: CrossfadeCoordinator::new(crossfade, events.clone()),
            monitor: Arc::new(Mutex::new(None)),
            step: Duration::from_millis(crossfade.step_ms.max(1)),
        }
    }

    /// Deck currently audible
    pub fn active(&self) -> PlaybackController {
        self.decks.lock().active.clone()
    }

    pub fn coordinator(&self) -> &CrossfadeCoordinator {
        &self.coordinator
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let mut snapshot = self.active().snapshot();
        snapshot.is_crossfading = self.coordinator.is_active();
        snapshot
    }

    /// Replace whatever is playing with `url`
    pub fn play(&self, url: &str) {
        self.coordinator.cancel();
        let (active, standby, looping) = {
            let decks = self.decks.lock();
            (decks.active.clone(), decks.standby.clone(), decks.looping)
        };
        standby.stop();
        active.load(url);
        if looping {
            active.set_loop(true);
        }
        self.ensure_monitor();
    }

    /// Queue the source to crossfade into when the current one nears its end
    pub fn set_next(&self, url: Option<String>) {
        debug!("Ambient follow-up source: {:?}", url);
        self.decks.lock().queued = url;
    }

    pub fn queued(&self) -> Option<String> {
        self.decks.lock().queued.clone()
    }

    /// Resume the active deck; `stop` tears the monitor down, so restart it
    pub async fn resume(&self) -> Result<()> {
        self.ensure_monitor();
        let active = self.active();
        active.play().await
    }

    pub fn pause(&self) {
        self.coordinator.cancel();
        self.active().pause();
    }

    /// Seek the active deck; seeking back out of a running fade cancels it
    pub fn seek(&self, seconds: f64) -> bool {
        let active = self.active();
        let applied = active.seek(seconds);
        if applied {
            self.coordinator.on_seek(active.position());
        }
        applied
    }

    pub fn set_volume(&self, volume: f32) {
        let (active, standby) = {
            let decks = self.decks.lock();
            (decks.active.clone(), decks.standby.clone())
        };
        active.set_volume(volume);
        standby.set_volume(volume);
    }

    pub fn set_loop(&self, enabled: bool) -> bool {
        let active = self.active();
        let looping = active.set_loop(enabled);
        self.decks.lock().looping = looping;
        looping
    }

    pub fn retry(&self) {
        self.active().retry();
        self.ensure_monitor();
    }

    /// Stop both decks and any fade in progress
    pub fn stop(&self) {
        self.coordinator.cancel();
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.abort();
        }
        let (active, standby) = {
            let decks = self.decks.lock();
            (decks.active.clone(), decks.standby.clone())
        };
        active.stop();
        standby.stop();
    }

    /// Stop and clear retry counters and error flags on both decks
    pub fn reset(&self) {
        self.stop();
        let (active, standby) = {
            let decks = self.decks.lock();
            (decks.active.clone(), decks.standby.clone())
        };
        active.reset();
        standby.reset();
    }

    fn ensure_monitor(&self) {
        let mut monitor = self.monitor.lock();
        if monitor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let track = self.clone();
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(track.step);
            loop {
                ticker.tick().await;
                track.check_crossfade();
            }
        }));
    }

    fn check_crossfade(&self) {
        let (active, standby, next_url) = {
            let mut decks = self.decks.lock();
            if decks.looping || decks.queued.is_none() {
                return;
            }
            if !self.coordinator.should_trigger(&decks.active) {
                return;
            }
            let Some(next_url) = decks.queued.take() else {
                return;
            };
            (decks.active.clone(), decks.standby.clone(), next_url)
        };

        let Some(done) = self.coordinator.start(&active, &standby, &next_url) else {
            return;
        };
        let decks = Arc::clone(&self.decks);
        tokio::spawn(async move {
            if done.await.is_ok() {
                let mut guard = decks.lock();
                let decks = &mut *guard;
                std::mem::swap(&mut decks.active, &mut decks.standby);
                info!("Ambient decks swapped, now playing {}", next_url);
            }
        });
    }
}
