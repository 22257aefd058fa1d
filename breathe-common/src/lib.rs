//! # Breathe Common Library
//!
//! Shared code for the Breathe workspace including:
//! - Breathing pattern and voice persona definitions
//! - Event types (BreatheEvent enum) and the EventBus
//! - Configuration loading
//! - Fade curve definitions and calculations

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod pattern;
pub mod persona;

pub use error::{Error, Result};
pub use events::BreathPhase;
pub use fade_curves::FadeCurve;
pub use pattern::BreathingPattern;
pub use persona::{PersonaLibrary, PhaseClips};
