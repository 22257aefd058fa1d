//! Fade curve implementations for crossfading
//!
//! Crossfade ramps are linear by default. The other shapes are offered for
//! ambient material where a constant perceived loudness matters more than
//! a constant rate of change.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Fade curve types for crossfade ramps
///
/// - Linear: constant rate of change
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: constant perceived loudness during a crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: v(t) = t
    #[default]
    Linear,

    /// S-Curve: v(t) = 0.5 × (1 - cos(π × t))
    SCurve,

    /// Equal-Power: v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Fade-in multiplier at normalized position `t` (0.0 to 1.0)
    pub fn fade_in(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Fade-out multiplier at normalized position `t` (1.0 at start, 0.0 at end)
    pub fn fade_out(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Level of a ramp from `from` to `to` at normalized position `t`
    ///
    /// Rising ramps use the fade-in shape, falling ramps the fade-out shape,
    /// so both ends of a crossfade stay symmetric.
    pub fn ramp(&self, from: f32, to: f32, t: f32) -> f32 {
        if to >= from {
            from + (to - from) * self.fade_in(t)
        } else {
            to + (from - to) * self.fade_out(t)
        }
    }

    /// Parse curve from a configuration string
    ///
    /// Accepts `linear`, `s_curve` (aliases `scurve`, `s-curve`, `cosine`)
    /// and `equal_power` (alias `equalpower`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Some(FadeCurve::EqualPower),
            _ => None,
        }
    }

    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::Linear, FadeCurve::SCurve, FadeCurve::EqualPower]
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FadeCurve::Linear => write!(f, "Linear"),
            FadeCurve::SCurve => write!(f, "S-Curve"),
            FadeCurve::EqualPower => write!(f, "Equal Power"),
        }
    }
}
