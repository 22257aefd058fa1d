//! Crossfade coordinator
//!
//! Overlaps the tail of one finite ambient track with the head of the next.
//! The outgoing and incoming decks each get an independent ramp task running
//! over the time left on the outgoing source; a separate completion task
//! fires the one-shot completion signal once that time has elapsed, whatever
//! the ramps are doing.

use super::controller::PlaybackController;
use breathe_common::config::CrossfadeSettings;
use breathe_common::events::{BreatheEvent, EventBus, PlaybackStatus};
use breathe_common::FadeCurve;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

struct ActiveFade {
    id: u64,
    from: PlaybackController,
    to: PlaybackController,
    from_url: String,
    to_url: String,
    ramps: Vec<JoinHandle<()>>,
    completion: Option<JoinHandle<()>>,
}

impl ActiveFade {
    fn abort_tasks(&mut self) {
        for ramp in self.ramps.drain(..) {
            ramp.abort();
        }
        if let Some(completion) = self.completion.take() {
            completion.abort();
        }
    }
}

#[derive(Default)]
struct FadeState {
    next_id: u64,
    active: Option<ActiveFade>,
}

/// Decides when to crossfade and runs the dual-deck fade
#[derive(Clone)]
pub struct CrossfadeCoordinator {
    window: Duration,
    step: Duration,
    curve: FadeCurve,
    events: EventBus,
    state: Arc<Mutex<FadeState>>,
}

impl CrossfadeCoordinator {
    pub fn new(settings: &CrossfadeSettings, events: EventBus) -> Self {
        Self {
            window: Duration::from_secs_f64(settings.window_secs.max(0.0)),
            step: Duration::from_millis(settings.step_ms.max(1)),
            curve: settings.curve,
            events,
            state: Arc::new(Mutex::new(FadeState::default())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Whether `current` has entered its crossfade window
    ///
    /// Only finite sources longer than the window qualify, and never while a
    /// fade is already running.
    pub fn should_trigger(&self, current: &PlaybackController) -> bool {
        if self.is_active() || current.is_live() {
            return false;
        }
        if current.status() != PlaybackStatus::Playing {
            return false;
        }
        let Some(duration) = current.duration() else {
            return false;
        };
        let window = self.window.as_secs_f64();
        let remaining = duration - current.position();
        duration > window && remaining <= window
    }

    /// Start fading `current` out and `next` (loading `next_url`) in
    ///
    /// Returns the completion receiver, or `None` when a fade is already
    /// running. The receiver resolves exactly once when the fade completes;
    /// it errors if the fade is cancelled.
    pub fn start(
        &self,
        current: &PlaybackController,
        next: &PlaybackController,
        next_url: &str,
    ) -> Option<oneshot::Receiver<()>> {
        let mut state = self.state.lock();
        if state.active.is_some() {
            debug!("Crossfade already running, ignoring start for {}", next_url);
            return None;
        }
        state.next_id += 1;
        let id = state.next_id;

        let from_url = current.source_url().unwrap_or_default();
        let span = self.span(current);
        let from_level = current.volume();
        let to_level = next.volume();

        current.set_crossfading(true);
        current.apply_level(from_level);
        next.set_crossfading(true);
        next.apply_level(0.0);
        next.load(next_url);

        let ramps = vec![
            self.spawn_ramp(current.clone(), from_level, 0.0, span),
            self.spawn_ramp(next.clone(), 0.0, to_level, span),
        ];

        let (done_tx, done_rx) = oneshot::channel();
        let coordinator = self.clone();
        let completion = tokio::spawn(async move {
            tokio::time::sleep(span).await;
            coordinator.finish(id, done_tx);
        });

        info!("Crossfade started: {} -> {} over {:?}", from_url, next_url, span);
        self.events.emit_lossy(BreatheEvent::CrossfadeStarted {
            from_url: from_url.clone(),
            to_url: next_url.to_string(),
            duration_ms: span.as_millis() as u64,
            timestamp: Utc::now(),
        });

        state.active = Some(ActiveFade {
            id,
            from: current.clone(),
            to: next.clone(),
            from_url,
            to_url: next_url.to_string(),
            ramps,
            completion: Some(completion),
        });
        Some(done_rx)
    }

    /// React to a seek on the outgoing deck
    ///
    /// Seeking back out of the window abandons the fade. Returns whether a
    /// fade was cancelled.
    pub fn on_seek(&self, position: f64) -> bool {
        let outside_window = {
            let state = self.state.lock();
            let Some(active) = &state.active else {
                return false;
            };
            match active.from.duration() {
                Some(duration) => duration - position > self.window.as_secs_f64(),
                None => true,
            }
        };
        if outside_window {
            self.cancel()
        } else {
            false
        }
    }

    /// Abandon the running fade: the incoming deck is stopped and the
    /// outgoing deck returns to its user volume
    pub fn cancel(&self) -> bool {
        let Some(mut fade) = self.state.lock().active.take() else {
            return false;
        };
        fade.abort_tasks();
        fade.to.stop();
        fade.to.set_crossfading(false);
        fade.from.set_crossfading(false);

        info!("Crossfade cancelled: {} -> {}", fade.from_url, fade.to_url);
        self.events.emit_lossy(BreatheEvent::CrossfadeCancelled {
            from_url: fade.from_url,
            to_url: fade.to_url,
            timestamp: Utc::now(),
        });
        true
    }

    fn finish(&self, id: u64, done: oneshot::Sender<()>) {
        let fade = {
            let mut state = self.state.lock();
            match &state.active {
                Some(active) if active.id == id => state.active.take(),
                _ => None,
            }
        };
        let Some(mut fade) = fade else {
            return;
        };
        // Ramps end on their own; drop any stragglers so final levels stick
        for ramp in fade.ramps.drain(..) {
            ramp.abort();
        }
        fade.completion = None;

        fade.from.stop();
        fade.from.rewind();
        fade.from.set_crossfading(false);
        fade.to.set_crossfading(false);

        info!("Crossfade complete: {} -> {}", fade.from_url, fade.to_url);
        self.events.emit_lossy(BreatheEvent::CrossfadeEnded {
            from_url: fade.from_url,
            to_url: fade.to_url,
            timestamp: Utc::now(),
        });
        let _ = done.send(());
    }

    /// Time left on `current`, capped at the window
    fn span(&self, current: &PlaybackController) -> Duration {
        current
            .duration()
            .map(|duration| (duration - current.position()).max(0.0))
            .filter(|remaining| *remaining > 0.0)
            .map(Duration::from_secs_f64)
            .map_or(self.window, |remaining| remaining.min(self.window))
    }

    fn spawn_ramp(
        &self,
        controller: PlaybackController,
        from: f32,
        to: f32,
        span: Duration,
    ) -> JoinHandle<()> {
        let span_secs = span.as_secs_f64();
        let step = self.step;
        let curve = self.curve;
        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(step);
            loop {
                ticker.tick().await;
                let t = if span_secs > 0.0 {
                    (started.elapsed().as_secs_f64() / span_secs).min(1.0)
                } else {
                    1.0
                };
                controller.apply_level(curve.ramp(from, to, t as f32));
                if t >= 1.0 {
                    break;
                }
            }
        })
    }
}
