//! Breathing session
//!
//! Owns the phase timer and its two tick sources (1 Hz countdown and the
//! progress frame clock). Tick tasks belong to the session, are never
//! shared, and are aborted on pause, reset and completion.
//!
//! Transitions are dispatched to the audio side synchronously and in
//! emission order; the timer never waits on audio.

use super::phase_machine::{PhaseTimer, TimerEvent};
use crate::error::Result;
use breathe_common::config::TimerSettings;
use breathe_common::events::{BreatheEvent, EventBus, SessionSnapshot};
use breathe_common::{BreathPhase, BreathingPattern};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// Audio collaborator driven by a session
pub trait SessionAudio: Send + Sync {
    /// A phase of `pattern` was entered
    fn phase_changed(&self, pattern: &BreathingPattern, phase: BreathPhase);

    /// The exercise completed; request the terminal clip
    fn exercise_completed(&self, pattern: &BreathingPattern);

    /// Session paused: cancel retries and fades, stop every output
    fn stop_all(&self);

    /// Session reset: `stop_all` plus clearing retry counters and error flags
    fn reset_all(&self);
}

struct TimerRecord {
    timer: PhaseTimer,
    session_id: Option<Uuid>,
}

struct SessionInner {
    record: Mutex<TimerRecord>,
    ticks: Mutex<Vec<JoinHandle<()>>>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: EventBus,
    audio: Arc<dyn SessionAudio>,
    progress_period: Duration,
}

#[derive(Clone)]
pub struct BreathingSession {
    inner: Arc<SessionInner>,
}

impl BreathingSession {
    pub fn new(settings: &TimerSettings, events: EventBus, audio: Arc<dyn SessionAudio>) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::idle());
        let hz = settings.progress_hz.max(1);
        Self {
            inner: Arc::new(SessionInner {
                record: Mutex::new(TimerRecord {
                    timer: PhaseTimer::new(),
                    session_id: None,
                }),
                ticks: Mutex::new(Vec::new()),
                snapshots,
                events,
                audio,
                progress_period: Duration::from_secs_f64(1.0 / f64::from(hz)),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let record = self.inner.record.lock();
        record.timer.snapshot(record.session_id)
    }

    /// Snapshot stream, updated on every tick and transition
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn pattern(&self) -> Option<BreathingPattern> {
        self.inner.record.lock().timer.pattern().cloned()
    }

    /// Start (or resume) `pattern`
    ///
    /// A pattern different from the selected one resets the session first.
    /// An invalid pattern is rejected without touching the current session.
    /// Starting an already running session is a no-op.
    pub fn start(&self, pattern: BreathingPattern) -> Result<SessionSnapshot> {
        let changed = self.inner.record.lock().timer.pattern() != Some(&pattern);
        if changed {
            let mut candidate = PhaseTimer::new();
            candidate.select(pattern.clone())?;
            self.inner.stop_ticks();
            self.inner.audio.reset_all();
            let mut record = self.inner.record.lock();
            record.timer = candidate;
            record.session_id = None;
            info!("Session pattern set to {}", pattern.id);
        }

        {
            let mut record = self.inner.record.lock();
            if record.timer.is_active() {
                return Ok(record.timer.snapshot(record.session_id));
            }
            let events = record.timer.start(Instant::now());
            if !events.is_empty() {
                // Fresh run
                record.session_id = Some(Uuid::new_v4());
                info!(
                    "Session {} started: {} x{}",
                    record.session_id.unwrap_or_default(),
                    pattern.id,
                    pattern.cycles
                );
            } else {
                debug!("Session resumed");
            }
            self.inner.dispatch(&record, events);
            self.inner.publish(&record, false);
        }

        self.inner.spawn_ticks();
        Ok(self.snapshot())
    }

    /// Stop both tick sources and every audio output, preserving position
    pub fn pause(&self) -> SessionSnapshot {
        self.inner.stop_ticks();
        {
            let mut record = self.inner.record.lock();
            record.timer.pause(Instant::now());
            self.inner.publish(&record, false);
        }
        self.inner.audio.stop_all();
        info!("Session paused");
        self.snapshot()
    }

    /// Back to the start of the pattern, optionally switching pattern
    pub fn reset(&self, pattern: Option<BreathingPattern>) -> Result<SessionSnapshot> {
        let mut candidate = None;
        if let Some(pattern) = pattern {
            let mut timer = PhaseTimer::new();
            timer.select(pattern)?;
            candidate = Some(timer);
        }

        self.inner.stop_ticks();
        {
            let mut record = self.inner.record.lock();
            match candidate {
                Some(timer) => record.timer = timer,
                None => record.timer.reset(),
            }
            record.session_id = None;
            self.inner.publish(&record, false);
        }
        self.inner.audio.reset_all();
        info!("Session reset");
        Ok(self.snapshot())
    }

    /// Stop ticking without touching audio (shutdown path)
    pub fn halt(&self) {
        self.inner.stop_ticks();
        let mut record = self.inner.record.lock();
        record.timer.pause(Instant::now());
    }
}

impl SessionInner {
    fn spawn_ticks(self: &Arc<Self>) {
        let mut ticks = self.ticks.lock();
        for handle in ticks.drain(..) {
            handle.abort();
        }
        for (period, countdown) in [(COUNTDOWN_PERIOD, true), (self.progress_period, false)] {
            let inner = Arc::clone(self);
            ticks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if !inner.on_tick(countdown) {
                        break;
                    }
                }
            }));
        }
    }

    fn stop_ticks(&self) {
        let handles: Vec<_> = self.ticks.lock().drain(..).collect();
        for handle in handles {
            handle.abort();
        }
    }

    /// Returns false once the timer is no longer active
    fn on_tick(&self, countdown: bool) -> bool {
        let mut record = self.record.lock();
        // Lock order: record, then ticks
        let events = record.timer.tick(Instant::now());
        let completed = events
            .iter()
            .any(|event| matches!(event, TimerEvent::ExerciseCompleted { .. }));
        self.dispatch(&record, events);
        self.publish(&record, countdown);

        if completed {
            // Terminal clip was requested during dispatch; now the ticks stop
            self.stop_ticks();
            return false;
        }
        record.timer.is_active()
    }

    fn dispatch(&self, record: &TimerRecord, events: Vec<TimerEvent>) {
        let session_id = record.session_id.unwrap_or_default();
        for event in events {
            match event {
                TimerEvent::PhaseChanged {
                    phase,
                    cycle,
                    seconds,
                } => {
                    self.events.emit_lossy(BreatheEvent::PhaseChanged {
                        session_id,
                        phase,
                        cycle,
                        seconds_left: seconds,
                        timestamp: Utc::now(),
                    });
                    if let Some(pattern) = record.timer.pattern() {
                        self.audio.phase_changed(pattern, phase);
                    }
                }
                TimerEvent::CycleCompleted { cycle } => {
                    debug!("Cycle {} completed", cycle);
                    self.events.emit_lossy(BreatheEvent::CycleCompleted {
                        session_id,
                        cycle,
                        timestamp: Utc::now(),
                    });
                }
                TimerEvent::ExerciseCompleted { cycles } => {
                    let pattern = record.timer.pattern();
                    let pattern_id = pattern.map(|p| p.id.clone()).unwrap_or_default();
                    info!("Exercise {} completed after {} cycles", pattern_id, cycles);
                    if let Some(pattern) = pattern {
                        self.audio.exercise_completed(pattern);
                    }
                    self.events.emit_lossy(BreatheEvent::ExerciseCompleted {
                        session_id,
                        pattern_id,
                        cycles,
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    fn publish(&self, record: &TimerRecord, countdown: bool) {
        let snapshot = record.timer.snapshot(record.session_id);
        if countdown {
            self.events.emit_lossy(BreatheEvent::SessionProgress {
                snapshot: snapshot.clone(),
                timestamp: Utc::now(),
            });
        }
        self.snapshots.send_replace(snapshot);
    }
}
