//! Two-stage gain graph
//!
//! Output gain is `level × fixed_attenuation`, where `level` is the user
//! volume (or a crossfade ramp value) and the fixed stage keeps summed
//! narration and ambient tracks from clipping.
//!
//! A graph is bound to at most one source attachment at a time. Binding a
//! second source requires an explicit `detach` first.

use super::media::MediaElement;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::debug;

struct Attachment {
    element: Arc<dyn MediaElement>,
    source: String,
}

/// Gain stages for one logical voice or track
pub struct GainGraph {
    fixed_attenuation: f32,
    user_volume: f32,
    attachment: Option<Attachment>,
}

impl GainGraph {
    pub fn new(fixed_attenuation: f32, user_volume: f32) -> Self {
        Self {
            fixed_attenuation: fixed_attenuation.clamp(0.0, 1.0),
            user_volume: user_volume.clamp(0.0, 1.0),
            attachment: None,
        }
    }

    /// Bind the graph to a source playing on `element`
    ///
    /// Fails with `InvalidState` while a previous attachment is still bound.
    pub fn attach(&mut self, element: &Arc<dyn MediaElement>, source: &str) -> Result<()> {
        if let Some(existing) = &self.attachment {
            return Err(Error::InvalidState(format!(
                "gain graph already attached to '{}'",
                existing.source
            )));
        }
        debug!("Gain graph attached to {}", source);
        self.attachment = Some(Attachment {
            element: Arc::clone(element),
            source: source.to_string(),
        });
        Ok(())
    }

    /// Tear down the current attachment, returning its source URL
    pub fn detach(&mut self) -> Option<String> {
        self.attachment.take().map(|attachment| {
            debug!("Gain graph detached from {}", attachment.source);
            attachment.source
        })
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn user_volume(&self) -> f32 {
        self.user_volume
    }

    /// Set user volume (clamped to 0.0-1.0); returns the stored value
    pub fn set_user_volume(&mut self, volume: f32) -> f32 {
        self.user_volume = volume.clamp(0.0, 1.0);
        self.user_volume
    }

    /// Output gain for an arbitrary level passed through the fixed stage
    pub fn output_gain(&self, level: f32) -> f32 {
        level.clamp(0.0, 1.0) * self.fixed_attenuation
    }

    /// Push the user-volume gain to the attached element
    pub fn apply(&self) {
        self.apply_level(self.user_volume);
    }

    /// Push an arbitrary level (crossfade ramps) to the attached element
    pub fn apply_level(&self, level: f32) {
        if let Some(attachment) = &self.attachment {
            attachment.element.set_volume(self.output_gain(level));
        }
    }
}
