//! Audio playback engine
//!
//! - `media`: platform media element seam
//! - `classifier`: finite clip vs. live source
//! - `gain`: two-stage gain graph (user volume × fixed attenuation)
//! - `controller`: per-element load/retry/watchdog state machine
//! - `crossfade`: dual-deck fade coordinator
//! - `ambient`: ambient track built from two decks and the coordinator
//! - `headless`: HTTP-probing backend for the service binary

pub mod ambient;
pub mod classifier;
pub mod controller;
pub mod crossfade;
pub mod gain;
pub mod headless;
pub mod media;

pub use ambient::AmbientTrack;
pub use classifier::{is_live_duration, Classification, SourceClassifier};
pub use controller::PlaybackController;
pub use crossfade::CrossfadeCoordinator;
pub use gain::GainGraph;
pub use headless::HttpMediaBackend;
pub use media::{MediaBackend, MediaElement, MediaError, MediaSignal};
