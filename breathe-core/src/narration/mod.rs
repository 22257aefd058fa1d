//! Narration: clip resolution, reachability probing and phase-synchronized playback

pub mod probe;
pub mod resolver;
pub mod synchronizer;

pub use probe::{probe_with_attempts, ClipProbe, HttpProbe};
pub use resolver::{ClipSource, ClipTable, ResolvedClip};
pub use synchronizer::NarrationSynchronizer;
