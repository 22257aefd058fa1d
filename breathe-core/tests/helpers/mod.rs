//! Test helper modules for breathe-core integration tests
//!
//! - FakeBackend: scriptable media elements on the tokio clock
//! - ScriptedProbe: clip probe with configurable failures
//! - event helpers for draining the event bus

#![allow(dead_code)]

pub mod events;
pub mod fake_media;
pub mod scripted_probe;

pub use events::{drain, settle};
pub use fake_media::{FakeBackend, FakeElement, LoadOutcome, Script};
pub use scripted_probe::ScriptedProbe;
