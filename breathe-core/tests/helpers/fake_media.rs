//! Scriptable media backend
//!
//! Elements answer `load` after a short virtual delay according to a
//! per-URL script, and advance their play head on the tokio clock.

use async_trait::async_trait;
use breathe_core::audio::{MediaBackend, MediaElement, MediaError, MediaSignal};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How a URL responds to `load`
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Report the duration (if any) then `CanPlay`
    Ready(Option<f64>),
    /// Report an `Error` signal
    Fail(String),
    /// Never answer (exercises the readiness watchdog)
    Silent,
}

struct ScriptInner {
    outcomes: HashMap<String, LoadOutcome>,
    play_rejections: HashMap<String, u32>,
    redirects: HashMap<String, String>,
    loads: Vec<String>,
    default_outcome: LoadOutcome,
    load_delay: Duration,
}

/// Shared per-URL script and load log
#[derive(Clone)]
pub struct Script {
    inner: Arc<Mutex<ScriptInner>>,
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl Script {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptInner {
                outcomes: HashMap::new(),
                play_rejections: HashMap::new(),
                redirects: HashMap::new(),
                loads: Vec::new(),
                default_outcome: LoadOutcome::Ready(Some(60.0)),
                load_delay: Duration::from_millis(50),
            })),
        }
    }

    pub fn set_outcome(&self, url: &str, outcome: LoadOutcome) {
        self.inner.lock().outcomes.insert(url.to_string(), outcome);
    }

    /// Reject the next `count` play attempts for `url`
    pub fn reject_plays(&self, url: &str, count: u32) {
        self.inner
            .lock()
            .play_rejections
            .insert(url.to_string(), count);
    }

    /// Report `resolved` as the element's current source after loading `url`
    pub fn redirect(&self, url: &str, resolved: &str) {
        self.inner
            .lock()
            .redirects
            .insert(url.to_string(), resolved.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        self.inner.lock().load_delay = delay;
    }

    pub fn loads(&self) -> Vec<String> {
        self.inner.lock().loads.clone()
    }

    pub fn load_count(&self, url: &str) -> usize {
        self.inner.lock().loads.iter().filter(|l| *l == url).count()
    }

    fn begin_load(&self, url: &str) -> (LoadOutcome, Duration) {
        let mut inner = self.inner.lock();
        inner.loads.push(url.to_string());
        let outcome = inner
            .outcomes
            .get(url)
            .cloned()
            .unwrap_or_else(|| inner.default_outcome.clone());
        (outcome, inner.load_delay)
    }

    fn take_play_rejection(&self, url: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.play_rejections.get_mut(url) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn resolved(&self, url: &str) -> String {
        self.inner
            .lock()
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string())
    }
}

struct FakeState {
    source: Option<String>,
    resolved: Option<String>,
    duration: Option<f64>,
    volume: f32,
    rate: f64,
    base: f64,
    since: Option<Instant>,
    plays: u32,
}

impl FakeState {
    fn position(&self) -> f64 {
        let position = match self.since {
            Some(since) => self.base + since.elapsed().as_secs_f64() * self.rate,
            None => self.base,
        };
        match self.duration {
            Some(d) if d.is_finite() => position.min(d),
            _ => position,
        }
    }
}

pub struct FakeElement {
    script: Script,
    state: Arc<Mutex<FakeState>>,
    signals: broadcast::Sender<MediaSignal>,
    load_task: Mutex<Option<JoinHandle<()>>>,
}

impl FakeElement {
    pub fn new(script: Script) -> Self {
        let (signals, _) = broadcast::channel(32);
        Self {
            script,
            state: Arc::new(Mutex::new(FakeState {
                source: None,
                resolved: None,
                duration: None,
                volume: 1.0,
                rate: 1.0,
                base: 0.0,
                since: None,
                plays: 0,
            })),
            signals,
            load_task: Mutex::new(None),
        }
    }

    pub fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().since.is_some()
    }

    pub fn play_count(&self) -> u32 {
        self.state.lock().plays
    }

    /// Push a signal as if the platform had raised it
    pub fn emit(&self, signal: MediaSignal) {
        let _ = self.signals.send(signal);
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    fn set_source(&self, url: &str) {
        let mut state = self.state.lock();
        state.source = Some(url.to_string());
        state.resolved = None;
        state.duration = None;
        state.base = 0.0;
        state.since = None;
    }

    fn clear_source(&self) {
        let mut state = self.state.lock();
        state.source = None;
        state.resolved = None;
        state.duration = None;
        state.since = None;
    }

    fn load(&self) {
        let Some(url) = self.source() else {
            self.emit(MediaSignal::Error("no source".to_string()));
            return;
        };
        let (outcome, delay) = self.script.begin_load(&url);
        let resolved = self.script.resolved(&url);
        let state = Arc::clone(&self.state);
        let signals = self.signals.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match outcome {
                LoadOutcome::Ready(duration) => {
                    {
                        let mut state = state.lock();
                        state.duration = duration;
                        state.resolved = Some(resolved);
                    }
                    if let Some(duration) = duration {
                        let _ = signals.send(MediaSignal::DurationChanged(duration));
                    }
                    let _ = signals.send(MediaSignal::CanPlay);
                }
                LoadOutcome::Fail(message) => {
                    let _ = signals.send(MediaSignal::Error(message));
                }
                LoadOutcome::Silent => {}
            }
        });
        if let Some(previous) = self.load_task.lock().replace(task) {
            previous.abort();
        }
    }

    async fn play(&self) -> Result<(), MediaError> {
        let Some(url) = self.source() else {
            return Err(MediaError::NoSource);
        };
        if self.script.take_play_rejection(&url) {
            return Err(MediaError::NotAllowed("autoplay blocked".to_string()));
        }
        let mut state = self.state.lock();
        if state.since.is_none() {
            state.since = Some(Instant::now());
        }
        state.plays += 1;
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.base = state.position();
        state.since = None;
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position()
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.base = seconds.max(0.0);
        if state.since.is_some() {
            state.since = Some(Instant::now());
        }
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&self, gain: f32) {
        self.state.lock().volume = gain;
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut state = self.state.lock();
        state.base = state.position();
        if state.since.is_some() {
            state.since = Some(Instant::now());
        }
        state.rate = rate;
    }

    fn current_src(&self) -> Option<String> {
        self.state.lock().resolved.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaSignal> {
        self.signals.subscribe()
    }
}

/// Backend handing out fake elements, kept for inspection in creation order
#[derive(Default)]
pub struct FakeBackend {
    pub script: Script,
    elements: Mutex<Vec<Arc<FakeElement>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, index: usize) -> Arc<FakeElement> {
        Arc::clone(&self.elements.lock()[index])
    }

    pub fn element_count(&self) -> usize {
        self.elements.lock().len()
    }
}

impl MediaBackend for FakeBackend {
    fn create_element(&self) -> Arc<dyn MediaElement> {
        let element = Arc::new(FakeElement::new(self.script.clone()));
        self.elements.lock().push(Arc::clone(&element));
        element
    }
}
