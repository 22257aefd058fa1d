//! Source classification: finite clip vs. unbounded live source
//!
//! Two stages. Before loading, the URL is inspected for streaming markers.
//! After the platform starts buffering, the reported duration is
//! authoritative and replaces the URL guess.

use breathe_common::config::ClassifierSettings;
use serde::Serialize;

/// Result of classifying a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_live: bool,
}

/// URL heuristic classifier
#[derive(Debug, Clone)]
pub struct SourceClassifier {
    live_extensions: Vec<String>,
    live_tokens: Vec<String>,
    content_tokens: Vec<String>,
}

impl SourceClassifier {
    pub fn new(settings: &ClassifierSettings) -> Self {
        let lower = |items: &[String]| -> Vec<String> { items.iter().map(|s| s.to_lowercase()).collect() };
        Self {
            live_extensions: lower(&settings.live_extensions),
            live_tokens: lower(&settings.live_tokens),
            content_tokens: lower(&settings.content_tokens),
        }
    }

    /// Pre-load classification from the URL alone
    ///
    /// Live when the URL carries a playlist manifest extension or a
    /// streaming token, unless it also carries a narrated-content token.
    pub fn classify(&self, url: &str) -> Classification {
        let lower = url.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|token| !token.is_empty())
            .collect();

        let has_token = |markers: &[String]| {
            tokens
                .iter()
                .any(|token| matches_marker(token, markers))
        };

        if has_token(&self.content_tokens) {
            return Classification { is_live: false };
        }

        let is_manifest = extension(&lower)
            .map(|ext| self.live_extensions.iter().any(|marker| marker == ext))
            .unwrap_or(false);

        Classification {
            is_live: is_manifest || has_token(&self.live_tokens),
        }
    }
}

impl Default for SourceClassifier {
    fn default() -> Self {
        Self::new(&ClassifierSettings::default())
    }
}

/// Post-load classification from the platform-reported duration
///
/// A finite duration means a clip; an infinite, NaN or still-unknown
/// duration means a live source.
pub fn is_live_duration(duration: Option<f64>) -> bool {
    !matches!(duration, Some(d) if d.is_finite())
}

/// Whether a URL segment is built from markers
///
/// A segment matches when it is one or more markers run together, with an
/// optional numeric suffix (`livestream`, `stream1`, `radio128`). Markers
/// embedded after other text (`upstream`, `olive`) do not match.
fn matches_marker(token: &str, markers: &[String]) -> bool {
    let stem = token.trim_end_matches(|c: char| c.is_ascii_digit());
    !stem.is_empty() && composed_of(stem, markers)
}

fn composed_of(rest: &str, markers: &[String]) -> bool {
    if rest.is_empty() {
        return true;
    }
    markers.iter().any(|marker| {
        !marker.is_empty()
            && rest
                .strip_prefix(marker.as_str())
                .is_some_and(|tail| composed_of(tail, markers))
    })
}

/// Extension of the URL path, ignoring query string and fragment
fn extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let last_segment = path.rsplit('/').next()?;
    let (stem, ext) = last_segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
