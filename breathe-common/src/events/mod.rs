//! Event types for the Breathe event system
//!
//! Provides shared event definitions and the EventBus used by the engine
//! and the SSE surface.

mod playback_types;
mod session_types;

pub use playback_types::{NotificationLevel, PlaybackSnapshot, PlaybackStatus, TrackKind};
pub use session_types::{BreathPhase, SessionSnapshot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Breathe event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Discrete events (`PhaseChanged`, `CycleCompleted`, `ExerciseCompleted`,
/// `PlaybackError`, `CrossfadeStarted`, `CrossfadeEnded`) are what UI
/// collaborators react to; snapshot events carry full state for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BreatheEvent {
    /// Timer entered a new phase
    ///
    /// Triggers:
    /// - Narration: play the clip for (persona, phase)
    /// - SSE: update phase label and countdown
    PhaseChanged {
        session_id: Uuid,
        phase: BreathPhase,
        /// Cycle the phase belongs to (1-based)
        cycle: u32,
        /// Full duration of the entered phase in seconds
        seconds_left: u32,
        timestamp: DateTime<Utc>,
    },

    /// A full cycle finished
    CycleCompleted {
        session_id: Uuid,
        /// The cycle that just finished (1-based)
        cycle: u32,
        timestamp: DateTime<Utc>,
    },

    /// Final cycle finished; the session is no longer active
    ExerciseCompleted {
        session_id: Uuid,
        pattern_id: String,
        cycles: u32,
        timestamp: DateTime<Utc>,
    },

    /// Session snapshot, published on every countdown tick
    SessionProgress {
        snapshot: SessionSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Playback controller changed state
    PlaybackStateChanged {
        track: TrackKind,
        snapshot: PlaybackSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Load or playback failure
    ///
    /// `terminal` is true once automatic retries are exhausted.
    PlaybackError {
        track: TrackKind,
        url: String,
        message: String,
        retry_count: u32,
        terminal: bool,
        timestamp: DateTime<Utc>,
    },

    /// Dual-output fade began
    CrossfadeStarted {
        from_url: String,
        to_url: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Dual-output fade ran to completion
    CrossfadeEnded {
        from_url: String,
        to_url: String,
        timestamp: DateTime<Utc>,
    },

    /// Dual-output fade was abandoned (seek outside the window, stop)
    CrossfadeCancelled {
        from_url: String,
        to_url: String,
        timestamp: DateTime<Utc>,
    },

    /// User volume changed (collaborators persist it)
    VolumeChanged {
        track: TrackKind,
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Active narration persona changed (collaborators persist it)
    PersonaChanged {
        persona: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Transient user-facing status ("audio loaded", "playback failed", ...)
    Notification {
        level: NotificationLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl BreatheEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            BreatheEvent::PhaseChanged { .. } => "PhaseChanged",
            BreatheEvent::CycleCompleted { .. } => "CycleCompleted",
            BreatheEvent::ExerciseCompleted { .. } => "ExerciseCompleted",
            BreatheEvent::SessionProgress { .. } => "SessionProgress",
            BreatheEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            BreatheEvent::PlaybackError { .. } => "PlaybackError",
            BreatheEvent::CrossfadeStarted { .. } => "CrossfadeStarted",
            BreatheEvent::CrossfadeEnded { .. } => "CrossfadeEnded",
            BreatheEvent::CrossfadeCancelled { .. } => "CrossfadeCancelled",
            BreatheEvent::VolumeChanged { .. } => "VolumeChanged",
            BreatheEvent::PersonaChanged { .. } => "PersonaChanged",
            BreatheEvent::Notification { .. } => "Notification",
        }
    }

    /// Build a notification event stamped now
    pub fn notification(level: NotificationLevel, message: impl Into<String>) -> Self {
        BreatheEvent::Notification {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use breathe_common::events::{BreatheEvent, EventBus, NotificationLevel};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(BreatheEvent::notification(NotificationLevel::Info, "audio loaded"));
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BreatheEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before lagging subscribers drop old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<BreatheEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: BreatheEvent,
    ) -> Result<usize, broadcast::error::SendError<BreatheEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BreatheEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
