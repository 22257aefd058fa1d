//! Playback controller
//!
//! Owns one media element and drives it through
//! `Idle → Loading → {Ready | Error}`, `Ready → Playing ⇄ Paused` and
//! `Error → Loading` (bounded retry).
//!
//! Every asynchronous step (readiness wait, play attempt, retry delay, loop
//! monitor) is tagged with the controller generation at the time it was
//! started. Loading, stopping and failing bump the generation, and any
//! completion carrying an older generation is discarded.

use super::classifier::{is_live_duration, SourceClassifier};
use super::gain::GainGraph;
use super::media::{MediaElement, MediaSignal};
use crate::error::{Error, Result};
use breathe_common::config::PlaybackSettings;
use breathe_common::events::{
    BreatheEvent, EventBus, NotificationLevel, PlaybackSnapshot, PlaybackStatus, TrackKind,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// A source failing within this long after it started playing is retried
/// against the last known-good resolved URL.
const FAILOVER_WINDOW: Duration = Duration::from_secs(3);

#[derive(Default)]
struct Tasks {
    load: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
    looper: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for handle in [self.load.take(), self.retry.take(), self.looper.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }

    fn abort_looper(&mut self) {
        if let Some(handle) = self.looper.take() {
            handle.abort();
        }
    }
}

struct ControllerState {
    status: PlaybackStatus,
    source_url: Option<String>,
    /// URL handed to the element for the current attempt
    attempt_url: Option<String>,
    known_good_url: Option<String>,
    played_at: Option<Instant>,
    is_loaded: bool,
    load_error: bool,
    last_error: Option<String>,
    retry_count: u32,
    is_live: bool,
    /// Live was observed from a reported infinite duration; sticky per source
    live_confirmed: bool,
    is_crossfading: bool,
    looping: bool,
    autoplay: bool,
    announced_loaded: bool,
    duration: Option<f64>,
    /// Ramp level owned by a crossfade; replaces the user volume while set
    level_override: Option<f32>,
    generation: u64,
    graph: GainGraph,
    tasks: Tasks,
}

impl ControllerState {
    fn reset_source(&mut self, url: &str) {
        self.source_url = Some(url.to_string());
        self.known_good_url = None;
        self.played_at = None;
        self.retry_count = 0;
        self.last_error = None;
        self.is_live = false;
        self.live_confirmed = false;
        self.announced_loaded = false;
        self.duration = None;
    }

    fn apply_gain(&self) {
        match self.level_override {
            Some(level) => self.graph.apply_level(level),
            None => self.graph.apply(),
        }
    }

    /// Fold a reported duration into the live/finite classification
    fn observe_duration(&mut self, duration: Option<f64>) {
        if self.live_confirmed {
            self.duration = None;
            return;
        }
        if is_live_duration(duration) {
            self.is_live = true;
            self.duration = None;
            // Only an explicit infinite duration is sticky; an unknown one can
            // still be corrected by a later finite report.
            if matches!(duration, Some(d) if d.is_infinite()) {
                self.live_confirmed = true;
            }
            if self.looping {
                debug!("Looping disabled: source reclassified as live");
                self.looping = false;
                self.tasks.abort_looper();
            }
        } else {
            self.is_live = false;
            self.duration = duration;
        }
    }
}

/// Playback controller for one track
#[derive(Clone)]
pub struct PlaybackController {
    track: TrackKind,
    settings: PlaybackSettings,
    classifier: Arc<SourceClassifier>,
    events: EventBus,
    element: Arc<dyn MediaElement>,
    state: Arc<Mutex<ControllerState>>,
}

impl PlaybackController {
    pub fn new(
        track: TrackKind,
        element: Arc<dyn MediaElement>,
        classifier: Arc<SourceClassifier>,
        settings: PlaybackSettings,
        initial_volume: f32,
        events: EventBus,
    ) -> Self {
        let graph = GainGraph::new(settings.fixed_attenuation, initial_volume);
        Self {
            track,
            settings,
            classifier,
            events,
            element,
            state: Arc::new(Mutex::new(ControllerState {
                status: PlaybackStatus::Idle,
                source_url: None,
                attempt_url: None,
                known_good_url: None,
                played_at: None,
                is_loaded: false,
                load_error: false,
                last_error: None,
                retry_count: 0,
                is_live: false,
                live_confirmed: false,
                is_crossfading: false,
                looping: false,
                autoplay: false,
                announced_loaded: false,
                duration: None,
                level_override: None,
                generation: 0,
                graph,
                tasks: Tasks::default(),
            })),
        }
    }

    pub fn track(&self) -> TrackKind {
        self.track
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.state.lock();
        PlaybackSnapshot {
            track: self.track,
            status: state.status,
            source_url: state.source_url.clone(),
            is_playing: state.status == PlaybackStatus::Playing,
            is_loaded: state.is_loaded,
            load_error: state.load_error,
            last_error: state.last_error.clone(),
            retry_count: state.retry_count,
            is_live_source: state.is_live,
            is_crossfading: state.is_crossfading,
            is_looping: state.looping,
            volume: state.graph.user_volume(),
            duration: if state.is_live { None } else { state.duration },
            position: self.element.current_time(),
        }
    }

    pub fn source_url(&self) -> Option<String> {
        self.state.lock().source_url.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.lock().status
    }

    pub fn is_live(&self) -> bool {
        self.state.lock().is_live
    }

    /// Known finite duration; always `None` for live sources
    pub fn duration(&self) -> Option<f64> {
        let state = self.state.lock();
        if state.is_live {
            None
        } else {
            state.duration
        }
    }

    pub fn position(&self) -> f64 {
        self.element.current_time()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().graph.user_volume()
    }


    /// Load a source and start playing it once ready
    ///
    /// Loading the current source again keeps its retry counter and live
    /// classification; a different URL starts from a clean playback state.
    pub fn load(&self, url: &str) {
        self.begin_load(url, None);
    }

    /// Start or resume playback
    ///
    /// Before the source is ready this only arms autoplay. A platform
    /// rejection is routed through the retry policy and also returned.
    pub async fn play(&self) -> Result<()> {
        let generation = {
            let mut state = self.state.lock();
            let Some(url) = state.source_url.clone() else {
                return Err(Error::InvalidState("no source loaded".to_string()));
            };
            if !state.is_loaded {
                state.autoplay = true;
                let idle = !matches!(state.status, PlaybackStatus::Loading);
                let exhausted = state.load_error && state.retry_count >= self.settings.max_retries;
                drop(state);
                if idle && !exhausted {
                    self.begin_load(&url, None);
                }
                return Ok(());
            }
            state.autoplay = true;
            state.generation
        };

        match self.element.play().await {
            Ok(()) => {
                self.on_playing(generation);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.handle_failure(generation, message.clone());
                Err(Error::Playback(message))
            }
        }
    }

    pub fn pause(&self) {
        {
            let mut state = self.state.lock();
            state.autoplay = false;
            state.tasks.abort_looper();
            if matches!(state.status, PlaybackStatus::Playing | PlaybackStatus::Ready) {
                state.status = PlaybackStatus::Paused;
            }
        }
        self.element.pause();
        self.emit_state();
    }

    /// Move the play head; a no-op for live sources
    ///
    /// Returns whether the seek was applied.
    pub fn seek(&self, seconds: f64) -> bool {
        let target = {
            let state = self.state.lock();
            if state.source_url.is_none() {
                return false;
            }
            if state.is_live {
                debug!("Ignoring seek on live source ({})", self.track);
                return false;
            }
            let upper = state.duration.unwrap_or(f64::MAX);
            seconds.max(0.0).min(upper)
        };
        self.element.set_current_time(target);
        debug!("Seek {} to {:.2}s", self.track, target);
        true
    }

    /// Set user volume (0.0-1.0)
    pub fn set_volume(&self, volume: f32) {
        let stored = {
            let mut state = self.state.lock();
            let stored = state.graph.set_user_volume(volume);
            state.apply_gain();
            stored
        };
        self.events.emit_lossy(BreatheEvent::VolumeChanged {
            track: self.track,
            volume: stored,
            timestamp: Utc::now(),
        });
        self.emit_state();
    }

    /// Enable or disable seamless looping (ignored for live sources)
    ///
    /// Returns the resulting loop flag.
    pub fn set_loop(&self, enabled: bool) -> bool {
        let looping = {
            let mut state = self.state.lock();
            if enabled && state.is_live {
                debug!("Ignoring loop request on live source ({})", self.track);
                return false;
            }
            state.looping = enabled;
            state.tasks.abort_looper();
            if enabled && state.status == PlaybackStatus::Playing {
                let generation = state.generation;
                state.tasks.looper = Some(self.spawn_loop_monitor(generation));
            }
            state.looping
        };
        self.emit_state();
        looping
    }

    /// Reset the retry counter and load the current source again
    pub fn retry(&self) {
        let url = {
            let mut state = self.state.lock();
            state.retry_count = 0;
            state.load_error = false;
            state.last_error = None;
            state.source_url.clone()
        };
        match url {
            Some(url) => {
                info!("Manual retry of {} source {}", self.track, url);
                self.begin_load(&url, None);
            }
            None => debug!("Retry requested with no source ({})", self.track),
        }
    }

    /// Cancel pending work, stop output and rewind
    ///
    /// Error flags and the retry counter are kept; see `reset`.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.tasks.abort_all();
            state.autoplay = false;
            state.status = if state.load_error {
                PlaybackStatus::Error
            } else if state.is_loaded {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Idle
            };
        }
        self.element.pause();
        if !self.is_live() {
            self.element.set_current_time(0.0);
        }
        self.emit_state();
    }

    /// Pause and rewind the current clip, dropping any in-flight load or
    /// retry but keeping the source
    pub fn interrupt(&self) {
        debug!("Interrupting {} playback", self.track);
        self.stop();
    }

    /// Stop and clear retry counters and error flags
    pub fn reset(&self) {
        self.stop();
        {
            let mut state = self.state.lock();
            state.retry_count = 0;
            state.load_error = false;
            state.last_error = None;
            state.status = if state.is_loaded {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Idle
            };
        }
        self.emit_state();
    }

    pub(crate) fn set_crossfading(&self, crossfading: bool) {
        {
            let mut state = self.state.lock();
            state.is_crossfading = crossfading;
            if !crossfading {
                state.level_override = None;
                state.apply_gain();
            }
        }
        self.emit_state();
    }

    /// Drive the output from a crossfade ramp instead of the user volume
    pub(crate) fn apply_level(&self, level: f32) {
        let mut state = self.state.lock();
        state.level_override = Some(level.clamp(0.0, 1.0));
        state.apply_gain();
    }

    pub(crate) fn rewind(&self) {
        self.element.set_current_time(0.0);
    }

    // ------------------------------------------------------------------
    // Load sequence
    // ------------------------------------------------------------------

    fn begin_load(&self, url: &str, attempt_url: Option<String>) {
        let (generation, signals) = {
            let mut state = self.state.lock();
            if state.source_url.as_deref() != Some(url) {
                state.reset_source(url);
            }
            state.generation += 1;
            state.tasks.abort_all();
            state.is_loaded = false;
            state.load_error = false;
            state.status = PlaybackStatus::Loading;
            state.autoplay = true;

            if !state.live_confirmed {
                state.is_live = self.classifier.classify(url).is_live;
            }

            let attempt = attempt_url.unwrap_or_else(|| url.to_string());
            state.graph.detach();
            self.element.pause();
            self.element.set_source(&attempt);
            if let Err(e) = state.graph.attach(&self.element, &attempt) {
                warn!("Gain graph attach failed for {}: {}", attempt, e);
            }
            state.apply_gain();
            state.attempt_url = Some(attempt.clone());

            let signals = self.element.subscribe();
            self.element.load();
            debug!(
                "Loading {} source {} (generation {}, live guess {})",
                self.track, attempt, state.generation, state.is_live
            );
            (state.generation, signals)
        };

        self.emit_state();

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            controller.run_load(generation, signals).await;
        });

        let mut state = self.state.lock();
        if state.generation == generation {
            state.tasks.load = Some(handle);
        } else {
            handle.abort();
        }
    }

    async fn run_load(&self, generation: u64, mut signals: broadcast::Receiver<MediaSignal>) {
        let timeout = Duration::from_millis(self.settings.readiness_timeout_ms);
        match tokio::time::timeout(timeout, wait_until_ready(&mut signals)).await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                self.handle_failure(generation, message);
                return;
            }
            Err(_) => {
                warn!(
                    "{} source not ready after {:?}, attempting playback anyway",
                    self.track, timeout
                );
            }
        }

        let Some(autoplay) = self.on_ready(generation) else {
            return;
        };
        if autoplay {
            match self.element.play().await {
                Ok(()) => self.on_playing(generation),
                Err(e) => {
                    self.handle_failure(generation, e.to_string());
                    return;
                }
            }
        }

        loop {
            match signals.recv().await {
                Ok(signal) => {
                    if !self.on_signal(generation, signal).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("{} controller lagged {} media signals", self.track, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Mark the source loaded; returns whether to autoplay, or None if stale
    fn on_ready(&self, generation: u64) -> Option<bool> {
        let (autoplay, announce) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return None;
            }
            state.is_loaded = true;
            state.status = PlaybackStatus::Ready;
            let duration = self.element.duration();
            state.observe_duration(duration);
            let announce = !state.announced_loaded;
            state.announced_loaded = true;
            (state.autoplay, announce)
        };

        if announce {
            self.events.emit_lossy(BreatheEvent::notification(
                NotificationLevel::Info,
                format!("{} audio loaded", self.track),
            ));
        }
        self.emit_state();
        Some(autoplay)
    }

    fn on_playing(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.status = PlaybackStatus::Playing;
            state.played_at = Some(Instant::now());
            state.known_good_url = self
                .element
                .current_src()
                .or_else(|| state.attempt_url.clone());
            if state.looping && !state.is_live {
                state.tasks.abort_looper();
                state.tasks.looper = Some(self.spawn_loop_monitor(generation));
            }
        }
        self.emit_state();
    }

    /// Handle a follow-up media signal; returns false when the watcher should exit
    async fn on_signal(&self, generation: u64, signal: MediaSignal) -> bool {
        if self.state.lock().generation != generation {
            return false;
        }
        match signal {
            MediaSignal::CanPlay => true,
            MediaSignal::DurationChanged(duration) => {
                self.state.lock().observe_duration(Some(duration));
                self.emit_state();
                true
            }
            MediaSignal::Ended => {
                let looping = {
                    let state = self.state.lock();
                    state.looping && !state.is_live
                };
                if looping {
                    self.rewind_preserving_output();
                    if let Err(e) = self.element.play().await {
                        self.handle_failure(generation, e.to_string());
                        return false;
                    }
                } else {
                    {
                        let mut state = self.state.lock();
                        if state.status == PlaybackStatus::Playing {
                            state.status = PlaybackStatus::Ready;
                        }
                    }
                    self.emit_state();
                }
                true
            }
            MediaSignal::Error(message) => {
                self.handle_failure(generation, message);
                false
            }
        }
    }

    /// Apply the bounded retry policy to a failed attempt
    fn handle_failure(&self, generation: u64, message: String) {
        let (url, retry) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.tasks.abort_looper();
            state.is_loaded = false;
            state.load_error = true;
            state.status = PlaybackStatus::Error;
            state.last_error = Some(message.clone());

            let url = state.source_url.clone().unwrap_or_default();
            let retry = if state.retry_count < self.settings.max_retries {
                state.retry_count += 1;
                let failed_after_working = state
                    .played_at
                    .map(|at| at.elapsed() <= FAILOVER_WINDOW)
                    .unwrap_or(false);
                let fallback = if failed_after_working {
                    state
                        .known_good_url
                        .clone()
                        .filter(|good| Some(good) != state.attempt_url.as_ref())
                } else {
                    None
                };
                Some((state.retry_count, fallback))
            } else {
                None
            };
            (url, retry)
        };

        let retry_count = self.state.lock().retry_count;
        self.events.emit_lossy(BreatheEvent::PlaybackError {
            track: self.track,
            url: url.clone(),
            message: message.clone(),
            retry_count,
            terminal: retry.is_none(),
            timestamp: Utc::now(),
        });
        self.emit_state();

        match retry {
            Some((attempt, fallback)) => {
                warn!(
                    "{} source {} failed ({}), retry {}/{}",
                    self.track, url, message, attempt, self.settings.max_retries
                );
                let controller = self.clone();
                let delay = Duration::from_millis(self.settings.retry_delay_ms);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let current = {
                        let mut state = controller.state.lock();
                        // Detach our own handle so the reload does not abort this task
                        state.tasks.retry = None;
                        state.generation == generation
                    };
                    if current {
                        controller.begin_load(&url, fallback);
                    }
                });
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.tasks.retry = Some(handle);
                } else {
                    handle.abort();
                }
            }
            None => {
                error!(
                    "{} source {} failed after {} retries: {}",
                    self.track, url, self.settings.max_retries, message
                );
                self.events.emit_lossy(BreatheEvent::notification(
                    NotificationLevel::Error,
                    format!("{} playback failed", self.track),
                ));
            }
        }
    }

    // ------------------------------------------------------------------
    // Looping
    // ------------------------------------------------------------------

    fn rewind_preserving_output(&self) {
        let rate = self.element.playback_rate();
        self.element.set_current_time(0.0);
        self.element.set_playback_rate(rate);
        self.state.lock().apply_gain();
    }

    fn spawn_loop_monitor(&self, generation: u64) -> JoinHandle<()> {
        let controller = self.clone();
        let period = Duration::from_secs_f64(1.0 / f64::from(self.settings.loop_monitor_hz.max(1)));
        let threshold = self.settings.loop_threshold_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let duration = {
                    let state = controller.state.lock();
                    if state.generation != generation || !state.looping || state.is_live {
                        break;
                    }
                    state.duration
                };
                if let Some(duration) = duration {
                    if duration - controller.element.current_time() <= threshold {
                        debug!("Loop seam on {} at {:.3}s", controller.track, duration);
                        controller.rewind_preserving_output();
                    }
                }
            }
        })
    }

    fn emit_state(&self) {
        self.events.emit_lossy(BreatheEvent::PlaybackStateChanged {
            track: self.track,
            snapshot: self.snapshot(),
            timestamp: Utc::now(),
        });
    }
}

/// Wait for `CanPlay`; an `Error` signal (or a closed element) fails the wait
async fn wait_until_ready(
    signals: &mut broadcast::Receiver<MediaSignal>,
) -> std::result::Result<(), String> {
    loop {
        match signals.recv().await {
            Ok(MediaSignal::CanPlay) => return Ok(()),
            Ok(MediaSignal::Error(message)) => return Err(message),
            Ok(_) => continue,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return Err("media element closed".to_string()),
        }
    }
}
