//! # Breathe Core (breathe-core)
//!
//! Breathing phase timer and the audio playback engine it drives.
//!
//! **Purpose:** Run cycle-based breathing sessions, play the narration clip
//! for every phase change, and keep ambient audio playing through network
//! failures, autoplay rejections and live-stream sources.
//!
//! **Architecture:** A pure phase state machine ticked by session-owned
//! tokio tasks; playback controllers over a platform media seam; an
//! HTTP/SSE control surface built on axum.

pub mod api;
pub mod audio;
pub mod engine;
pub mod error;
pub mod narration;
pub mod state;
pub mod timer;

pub use error::{Error, Result};
pub use state::SharedState;
