//! Platform media seam
//!
//! A `MediaElement` is one platform audio output (an `<audio>`-style
//! element): it accepts a source URL, buffers it, plays, and reports
//! readiness/duration/failure asynchronously through a signal stream.
//! The engine never decodes audio itself.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Asynchronous notifications from a media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSignal {
    /// Enough data is buffered to start playback
    CanPlay,
    /// Duration became known or changed (`f64::INFINITY` for unbounded sources)
    DurationChanged(f64),
    /// Play head reached the end of a finite source
    Ended,
    /// Network or decode failure
    Error(String),
}

/// Rejection reasons for `MediaElement::play`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaError {
    /// Platform refused to start playback (autoplay policy)
    #[error("playback not allowed: {0}")]
    NotAllowed(String),

    /// Transient or decode failure
    #[error("media failure: {0}")]
    Failed(String),

    /// `play` called with no source attached
    #[error("no source attached")]
    NoSource,
}

/// One platform audio output
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Attach a source URL (does not start loading)
    fn set_source(&self, url: &str);

    /// Detach the current source
    fn clear_source(&self);

    /// Request buffering of the attached source; results arrive as signals
    fn load(&self);

    /// Start playback; may be rejected
    async fn play(&self) -> Result<(), MediaError>;

    fn pause(&self);

    /// Play head in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    /// `None` while unknown, `Some(f64::INFINITY)` for unbounded sources
    fn duration(&self) -> Option<f64>;

    /// Element output gain (0.0-1.0)
    fn volume(&self) -> f32;

    fn set_volume(&self, gain: f32);

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64);

    /// Resolved URL after redirects, once known
    fn current_src(&self) -> Option<String> {
        None
    }

    /// Subscribe to element signals
    ///
    /// Only signals sent after subscription are received.
    fn subscribe(&self) -> broadcast::Receiver<MediaSignal>;
}

/// Factory for media elements
pub trait MediaBackend: Send + Sync {
    fn create_element(&self) -> Arc<dyn MediaElement>;
}
