//! Headless media backend
//!
//! Used by the service binary where no platform audio element exists. A
//! "load" is an HTTP HEAD request: response headers decide readiness,
//! resolved URL and duration. Playback is a virtual play head advanced by
//! the tokio clock, which keeps timing, retry and crossfade behavior
//! observable without decoding anything.

use super::media::{MediaBackend, MediaElement, MediaError, MediaSignal};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Content types of playlist manifests, which always describe live sources
const PLAYLIST_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
    "audio/x-scpls",
    "application/xspf+xml",
    "video/x-ms-asf",
];

/// Bit rate assumed when only the content length is known
const ASSUMED_BITRATE_BPS: f64 = 128_000.0;

/// Duration implied by response headers
///
/// `Some(f64::INFINITY)` for Icecast/Shoutcast or playlist responses, a finite
/// value from an explicit duration header or the content length, `None` when
/// nothing is known.
pub fn duration_from_headers(headers: &HeaderMap) -> Option<f64> {
    if headers.keys().any(|name| name.as_str().starts_with("icy-")) {
        return Some(f64::INFINITY);
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase());
    if let Some(content_type) = &content_type {
        if PLAYLIST_TYPES
            .iter()
            .any(|playlist| content_type.starts_with(playlist))
        {
            return Some(f64::INFINITY);
        }
    }

    for name in ["x-content-duration", "content-duration"] {
        if let Some(seconds) = headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        {
            return Some(seconds);
        }
    }

    let is_audio = content_type
        .as_deref()
        .map(|value| value.starts_with("audio/"))
        .unwrap_or(false);
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|length| is_audio && *length > 0)
        .map(|length| length as f64 * 8.0 / ASSUMED_BITRATE_BPS)
}

/// Backend producing HTTP-probing elements
pub struct HttpMediaBackend {
    client: reqwest::Client,
}

impl HttpMediaBackend {
    pub fn new(timeout: Duration) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::error::Error::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

impl MediaBackend for HttpMediaBackend {
    fn create_element(&self) -> Arc<dyn MediaElement> {
        Arc::new(HttpMediaElement::new(self.client.clone()))
    }
}

struct ElementState {
    source: Option<String>,
    resolved: Option<String>,
    duration: Option<f64>,
    volume: f32,
    rate: f64,
    /// Play head at `playing_since` (or the paused position)
    base_position: f64,
    playing_since: Option<Instant>,
    load_task: Option<JoinHandle<()>>,
    end_task: Option<JoinHandle<()>>,
}

impl ElementState {
    fn position(&self) -> f64 {
        let position = match self.playing_since {
            Some(since) => self.base_position + since.elapsed().as_secs_f64() * self.rate,
            None => self.base_position,
        };
        match self.duration {
            Some(duration) if duration.is_finite() => position.min(duration),
            _ => position,
        }
    }

    fn freeze(&mut self) {
        self.base_position = self.position();
        self.playing_since = None;
        if let Some(task) = self.end_task.take() {
            task.abort();
        }
    }
}

/// Virtual media element backed by HTTP HEAD probing
pub struct HttpMediaElement {
    client: reqwest::Client,
    state: Arc<Mutex<ElementState>>,
    signals: broadcast::Sender<MediaSignal>,
}

impl HttpMediaElement {
    pub fn new(client: reqwest::Client) -> Self {
        let (signals, _) = broadcast::channel(32);
        Self {
            client,
            state: Arc::new(Mutex::new(ElementState {
                source: None,
                resolved: None,
                duration: None,
                volume: 1.0,
                rate: 1.0,
                base_position: 0.0,
                playing_since: None,
                load_task: None,
                end_task: None,
            })),
            signals,
        }
    }

    /// Arrange an `Ended` signal for when the play head reaches the end
    fn schedule_end(&self, state: &mut ElementState) {
        if let Some(task) = state.end_task.take() {
            task.abort();
        }
        let Some(duration) = state.duration.filter(|d| d.is_finite()) else {
            return;
        };
        if state.playing_since.is_none() {
            return;
        }
        let remaining = ((duration - state.position()) / state.rate.max(f64::EPSILON)).max(0.0);
        let shared = Arc::clone(&self.state);
        let signals = self.signals.clone();
        state.end_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            {
                let mut state = shared.lock();
                state.base_position = duration;
                state.playing_since = None;
                state.end_task = None;
            }
            let _ = signals.send(MediaSignal::Ended);
        }));
    }
}

#[async_trait]
impl MediaElement for HttpMediaElement {
    fn set_source(&self, url: &str) {
        let mut state = self.state.lock();
        state.freeze();
        if let Some(task) = state.load_task.take() {
            task.abort();
        }
        state.source = Some(url.to_string());
        state.resolved = None;
        state.duration = None;
        state.base_position = 0.0;
    }

    fn clear_source(&self) {
        let mut state = self.state.lock();
        state.freeze();
        if let Some(task) = state.load_task.take() {
            task.abort();
        }
        state.source = None;
        state.resolved = None;
        state.duration = None;
        state.base_position = 0.0;
    }

    fn load(&self) {
        let mut state = self.state.lock();
        let Some(url) = state.source.clone() else {
            let _ = self.signals.send(MediaSignal::Error("no source".to_string()));
            return;
        };
        if let Some(task) = state.load_task.take() {
            task.abort();
        }

        let client = self.client.clone();
        let shared = Arc::clone(&self.state);
        let signals = self.signals.clone();
        state.load_task = Some(tokio::spawn(async move {
            let signal = match client.head(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let duration = duration_from_headers(response.headers());
                    {
                        let mut state = shared.lock();
                        state.resolved = Some(response.url().to_string());
                        state.duration = duration;
                    }
                    debug!("HEAD {} ok, duration {:?}", url, duration);
                    if let Some(duration) = duration {
                        let _ = signals.send(MediaSignal::DurationChanged(duration));
                    }
                    MediaSignal::CanPlay
                }
                Ok(response) => MediaSignal::Error(format!("HTTP {}", response.status())),
                Err(e) => MediaSignal::Error(e.to_string()),
            };
            let _ = signals.send(signal);
        }));
    }

    async fn play(&self) -> Result<(), MediaError> {
        let mut state = self.state.lock();
        if state.source.is_none() {
            return Err(MediaError::NoSource);
        }
        if state.playing_since.is_none() {
            if let Some(duration) = state.duration.filter(|d| d.is_finite()) {
                if state.base_position >= duration {
                    state.base_position = 0.0;
                }
            }
            state.playing_since = Some(Instant::now());
        }
        self.schedule_end(&mut state);
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().freeze();
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position()
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.base_position = seconds.max(0.0);
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
        self.schedule_end(&mut state);
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&self, gain: f32) {
        self.state.lock().volume = gain.clamp(0.0, 1.0);
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut state = self.state.lock();
        let position = state.position();
        state.base_position = position;
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
        state.rate = rate.max(0.0);
        self.schedule_end(&mut state);
    }

    fn current_src(&self) -> Option<String> {
        self.state.lock().resolved.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaSignal> {
        self.signals.subscribe()
    }
}
