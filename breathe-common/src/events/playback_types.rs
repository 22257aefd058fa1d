//! Playback-related type definitions
//!
//! Supporting types for playback controller state and notifications.

use serde::{Deserialize, Serialize};

/// Logical audio track a controller plays on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Phase narration clips
    Narration,
    /// Ambient music or live streams
    Ambient,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Narration => write!(f, "narration"),
            TrackKind::Ambient => write!(f, "ambient"),
        }
    }
}

/// Playback controller state machine
///
/// `Idle → Loading → {Ready | Error}`, `Ready → Playing ⇄ Paused`,
/// `Error → Loading` via retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Error,
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Loading => write!(f, "loading"),
            PlaybackStatus::Ready => write!(f, "ready"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Error => write!(f, "error"),
        }
    }
}

/// Point-in-time view of one playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub track: TrackKind,
    pub status: PlaybackStatus,
    pub source_url: Option<String>,
    pub is_playing: bool,
    pub is_loaded: bool,
    pub load_error: bool,
    /// Message of the most recent load or playback failure
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub is_live_source: bool,
    pub is_crossfading: bool,
    pub is_looping: bool,
    /// User-facing volume (0.0-1.0)
    pub volume: f32,
    /// Known finite duration in seconds (never set for live sources)
    pub duration: Option<f64>,
    /// Play head in seconds
    pub position: f64,
}

impl PlaybackSnapshot {
    /// Snapshot of a controller that has never been given a source
    pub fn idle(track: TrackKind, volume: f32) -> Self {
        Self {
            track,
            status: PlaybackStatus::Idle,
            source_url: None,
            is_playing: false,
            is_loaded: false,
            load_error: false,
            last_error: None,
            retry_count: 0,
            is_live_source: false,
            is_crossfading: false,
            is_looping: false,
            volume,
            duration: None,
            position: 0.0,
        }
    }
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}
