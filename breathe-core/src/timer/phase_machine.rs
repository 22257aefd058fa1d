//! Breathing phase state machine
//!
//! Pure and clock-agnostic: every operation takes the current instant, and
//! phase boundaries are derived from elapsed wall-clock time since the phase
//! started. The session layer owns the tick sources and feeds them in.
//!
//! Phase order per cycle is `inhale → hold1 → exhale → hold2`, where a hold
//! with zero duration is never entered. The cycle counter only increments on
//! the transition out of the pattern's last configured phase.

use crate::error::{Error, Result};
use breathe_common::events::SessionSnapshot;
use breathe_common::{BreathPhase, BreathingPattern};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Transitions produced by the state machine, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A phase was entered with its full duration
    PhaseChanged {
        phase: BreathPhase,
        cycle: u32,
        seconds: u32,
    },
    /// `cycle` just finished
    CycleCompleted { cycle: u32 },
    /// The final cycle finished; the timer is no longer active
    ExerciseCompleted { cycles: u32 },
}

#[derive(Debug, Clone)]
pub struct PhaseTimer {
    pattern: Option<BreathingPattern>,
    active: bool,
    completed: bool,
    phase: BreathPhase,
    cycle: u32,
    seconds_left: u32,
    progress: f64,
    /// Start of the current phase while running
    phase_started: Option<Instant>,
    /// Elapsed time in the current phase while paused
    paused_elapsed: Duration,
    /// Whether entry into the current phase has been announced
    announced: bool,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self {
            pattern: None,
            active: false,
            completed: false,
            phase: BreathPhase::Start,
            cycle: 1,
            seconds_left: 0,
            progress: 0.0,
            phase_started: None,
            paused_elapsed: Duration::ZERO,
            announced: false,
        }
    }

    /// Select a pattern; always resets session state
    ///
    /// An invalid pattern is rejected and the timer is left untouched.
    pub fn select(&mut self, pattern: BreathingPattern) -> Result<()> {
        pattern
            .validate()
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;
        debug!("Pattern selected: {}", pattern.id);
        self.pattern = Some(pattern);
        self.reset();
        Ok(())
    }

    pub fn pattern(&self) -> Option<&BreathingPattern> {
        self.pattern.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn phase(&self) -> BreathPhase {
        self.phase
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Start or resume
    ///
    /// A fresh run announces its first phase. Resuming continues mid-phase
    /// from the elapsed time preserved by `pause`. Starting a completed
    /// exercise runs it again from the top.
    pub fn start(&mut self, now: Instant) -> Vec<TimerEvent> {
        if self.pattern.is_none() || self.active {
            return Vec::new();
        }
        if self.completed {
            self.reset();
        }
        let cycle_count = self.pattern.as_ref().map(|p| p.cycles).unwrap_or(0);

        self.active = true;
        self.phase_started = Some(now.checked_sub(self.paused_elapsed).unwrap_or(now));
        debug!(
            "Timer running: {} cycle {}/{} ({}s left)",
            self.phase, self.cycle, cycle_count, self.seconds_left
        );

        if self.announced {
            Vec::new()
        } else {
            self.announced = true;
            vec![TimerEvent::PhaseChanged {
                phase: self.phase,
                cycle: self.cycle,
                seconds: self.seconds_left,
            }]
        }
    }

    /// Stop counting, preserving phase, cycle, seconds left and progress
    pub fn pause(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        if let Some(started) = self.phase_started.take() {
            self.paused_elapsed = now.saturating_duration_since(started);
        }
        self.active = false;
        debug!("Timer paused in {} ({}s left)", self.phase, self.seconds_left);
    }

    /// Back to inhale, cycle 1, full inhale duration; clears `completed`
    pub fn reset(&mut self) {
        self.active = false;
        self.completed = false;
        self.cycle = 1;
        self.progress = 0.0;
        self.phase_started = None;
        self.paused_elapsed = Duration::ZERO;
        self.announced = false;
        match &self.pattern {
            Some(pattern) => {
                self.phase = BreathPhase::Inhale;
                self.seconds_left = pattern.inhale;
            }
            None => {
                self.phase = BreathPhase::Start;
                self.seconds_left = 0;
            }
        }
    }

    /// Countdown or progress tick: recompute from elapsed time and cross any
    /// boundaries that have passed
    ///
    /// When several boundaries elapsed since the last tick, each skipped
    /// phase is emitted in order and the next phase start is carried forward
    /// by exact phase durations.
    pub fn tick(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        while self.active {
            let Some((started, duration)) = self.current_window() else {
                break;
            };
            let elapsed = now.saturating_duration_since(started);
            if elapsed < duration {
                let whole = elapsed.as_secs() as u32;
                self.seconds_left = (duration.as_secs() as u32).saturating_sub(whole);
                self.progress = (elapsed.as_secs_f64() / duration.as_secs_f64() * 100.0).min(100.0);
                break;
            }
            self.phase_started = Some(started + duration);
            self.step(&mut events);
        }
        events
    }

    /// Force the transition out of the current phase now
    pub fn advance(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if !self.active {
            return events;
        }
        self.step(&mut events);
        if self.active {
            self.phase_started = Some(now);
        }
        events
    }

    pub fn snapshot(&self, session_id: Option<Uuid>) -> SessionSnapshot {
        match &self.pattern {
            Some(pattern) => SessionSnapshot {
                session_id,
                pattern_id: Some(pattern.id.clone()),
                active: self.active,
                phase: self.phase,
                cycle: self.cycle,
                total_cycles: pattern.cycles,
                seconds_left: self.seconds_left,
                progress: self.progress,
                completed: self.completed,
            },
            None => SessionSnapshot::idle(),
        }
    }

    fn current_window(&self) -> Option<(Instant, Duration)> {
        let pattern = self.pattern.as_ref()?;
        let started = self.phase_started?;
        let seconds = pattern.duration_of(self.phase);
        Some((started, Duration::from_secs(u64::from(seconds))))
    }

    /// Leave the current phase
    fn step(&mut self, events: &mut Vec<TimerEvent>) {
        let Some(pattern) = &self.pattern else {
            return;
        };
        let next = match pattern.next_phase(self.phase) {
            Some(next) => next,
            None => {
                events.push(TimerEvent::CycleCompleted { cycle: self.cycle });
                if self.cycle >= pattern.cycles {
                    let cycles = pattern.cycles;
                    let inhale = pattern.inhale;
                    self.complete(inhale);
                    events.push(TimerEvent::ExerciseCompleted { cycles });
                    return;
                }
                self.cycle += 1;
                BreathPhase::Inhale
            }
        };

        self.phase = next;
        self.seconds_left = pattern.duration_of(next);
        self.progress = 0.0;
        self.announced = true;
        debug!("Phase {} (cycle {}, {}s)", next, self.cycle, self.seconds_left);
        events.push(TimerEvent::PhaseChanged {
            phase: next,
            cycle: self.cycle,
            seconds: self.seconds_left,
        });
    }

    fn complete(&mut self, inhale: u32) {
        self.active = false;
        self.completed = true;
        self.cycle = 1;
        self.phase = BreathPhase::Inhale;
        self.seconds_left = inhale;
        self.progress = 0.0;
        self.phase_started = None;
        self.paused_elapsed = Duration::ZERO;
        self.announced = false;
    }
}
