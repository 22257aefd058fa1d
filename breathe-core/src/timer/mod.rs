//! Breathing phase timer
//!
//! `phase_machine` is the pure cycle/phase state machine; `session` owns the
//! tick sources and connects transitions to events and audio.

pub mod phase_machine;
pub mod session;

pub use phase_machine::{PhaseTimer, TimerEvent};
pub use session::{BreathingSession, SessionAudio};
