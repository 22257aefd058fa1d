//! Configuration loading and config file resolution
//!
//! Bootstrap configuration is a single TOML file. Every setting has a
//! built-in default, so a missing file yields a runnable configuration.
//!
//! # Config File Resolution Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `BREATHE_CONFIG` environment variable
//! 3. `<config_dir>/breathe/config.toml` if it exists
//! 4. Built-in defaults (no file)

use crate::fade_curves::FadeCurve;
use crate::pattern::BreathingPattern;
use crate::persona::PersonaLibrary;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "BREATHE_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreatheConfig {
    /// HTTP control surface port
    pub port: u16,
    /// Event bus buffer size
    pub event_capacity: usize,
    pub logging: LoggingConfig,
    pub timer: TimerSettings,
    pub playback: PlaybackSettings,
    pub crossfade: CrossfadeSettings,
    pub classifier: ClassifierSettings,
    pub narration: NarrationSettings,
    /// Pattern library; built-in patterns are used when empty
    pub patterns: Vec<BreathingPattern>,
    /// Narration personas (at most two)
    pub personas: PersonaLibrary,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is not set
    pub level: String,
}

/// Breathing timer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// Progress tick frequency (animation rate)
    pub progress_hz: u32,
}

/// Playback controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Automatic retries before an error becomes terminal
    pub max_retries: u32,
    /// Delay before each automatic retry
    pub retry_delay_ms: u64,
    /// Readiness watchdog; playback is attempted anyway when it fires
    pub readiness_timeout_ms: u64,
    /// Upstream gain stage applied beneath the user volume
    pub fixed_attenuation: f32,
    /// End-of-source monitor frequency while looping
    pub loop_monitor_hz: u32,
    /// Distance from the end at which a looping source rewinds
    pub loop_threshold_secs: f64,
    /// Initial ambient volume (0.0-1.0)
    pub initial_volume: f32,
}

/// Crossfade coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeSettings {
    /// Trailing window of a finite source during which the successor fades in
    pub window_secs: f64,
    /// Ramp step interval
    pub step_ms: u64,
    pub curve: FadeCurve,
}

/// URL markers used by the source classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Playlist manifest extensions that indicate a live source
    pub live_extensions: Vec<String>,
    /// URL tokens that indicate a live source
    pub live_tokens: Vec<String>,
    /// URL tokens for narrated content; these override live markers
    pub content_tokens: Vec<String>,
}

/// Narration synchronizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    /// Reachability probe attempts per clip before it counts as failed
    pub probe_attempts: u32,
    pub probe_timeout_ms: u64,
    /// Persona active at startup
    pub initial_persona: Option<String>,
    /// Initial narration volume (0.0-1.0)
    pub volume: f32,
}

impl Default for BreatheConfig {
    fn default() -> Self {
        Self {
            port: 5780,
            event_capacity: 256,
            logging: LoggingConfig::default(),
            timer: TimerSettings::default(),
            playback: PlaybackSettings::default(),
            crossfade: CrossfadeSettings::default(),
            classifier: ClassifierSettings::default(),
            narration: NarrationSettings::default(),
            patterns: Vec::new(),
            personas: PersonaLibrary::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "breathe_core=info,breathe_common=info,tower_http=info".to_string(),
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self { progress_hz: 60 }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            readiness_timeout_ms: 5000,
            fixed_attenuation: 0.7,
            loop_monitor_hz: 100,
            loop_threshold_secs: 0.2,
            initial_volume: 0.8,
        }
    }
}

impl Default for CrossfadeSettings {
    fn default() -> Self {
        Self {
            window_secs: 5.0,
            step_ms: 100,
            curve: FadeCurve::Linear,
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            live_extensions: owned(&["m3u8", "m3u", "pls", "xspf", "asx"]),
            live_tokens: owned(&["stream", "live", "radio", "icecast", "shoutcast"]),
            content_tokens: owned(&["meditation", "narration", "narrated", "voice", "guided", "breath"]),
        }
    }
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            probe_attempts: 2,
            probe_timeout_ms: 3000,
            initial_persona: None,
            volume: 1.0,
        }
    }
}

impl BreatheConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BreatheConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be within 0.0-1.0, got {}", name, value)))
            }
        };
        unit("playback.initial_volume", self.playback.initial_volume)?;
        unit("narration.volume", self.narration.volume)?;
        if !(self.playback.fixed_attenuation > 0.0 && self.playback.fixed_attenuation <= 1.0) {
            return Err(Error::Config(format!(
                "playback.fixed_attenuation must be within (0.0, 1.0], got {}",
                self.playback.fixed_attenuation
            )));
        }
        if self.timer.progress_hz == 0 || self.playback.loop_monitor_hz == 0 {
            return Err(Error::Config("tick frequencies must be non-zero".to_string()));
        }
        if self.crossfade.step_ms == 0 || self.crossfade.window_secs <= 0.0 {
            return Err(Error::Config(
                "crossfade.step_ms and crossfade.window_secs must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for pattern in &self.patterns {
            pattern.validate().map_err(|e| Error::Config(e.to_string()))?;
            if !seen.insert(pattern.id.as_str()) {
                return Err(Error::Config(format!("duplicate pattern id '{}'", pattern.id)));
            }
        }

        self.personas.validate()?;
        if let Some(persona) = &self.narration.initial_persona {
            if !self.personas.contains(persona) {
                return Err(Error::Config(format!(
                    "narration.initial_persona '{}' is not a configured persona",
                    persona
                )));
            }
        }
        Ok(())
    }

    /// Configured patterns, or the built-in library when none are configured
    pub fn pattern_library(&self) -> Vec<BreathingPattern> {
        if self.patterns.is_empty() {
            BreathingPattern::builtin()
        } else {
            self.patterns.clone()
        }
    }
}

/// Locate the config file following the resolution priority
///
/// Returns `None` when no file is named and the user config file does not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    dirs::config_dir()
        .map(|dir| dir.join("breathe").join("config.toml"))
        .filter(|path| path.exists())
}

/// Load configuration following the resolution priority
///
/// An explicitly named file (CLI or environment) that cannot be read is an
/// error; with no file at all the built-in defaults are returned.
pub fn load_config(cli_arg: Option<&Path>) -> Result<(BreatheConfig, Option<PathBuf>)> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config file not found: {:?}", path)));
            }
            let config = BreatheConfig::load(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok((config, Some(path)))
        }
        None => {
            debug!("No config file found, using built-in defaults");
            Ok((BreatheConfig::default(), None))
        }
    }
}
