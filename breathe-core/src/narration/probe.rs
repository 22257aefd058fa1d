//! Clip reachability probe

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Checks that a clip URL can be fetched before it is first played
#[async_trait]
pub trait ClipProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<()>;
}

/// Probe using an HTTP `HEAD` request
///
/// Servers that refuse `HEAD` are retried with a one-byte ranged `GET`.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ClipProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Error::Load(format!("{}: {}", url, e)))?;

        let status = if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            self.client
                .get(url)
                .header(RANGE, "bytes=0-0")
                .send()
                .await
                .map_err(|e| Error::Load(format!("{}: {}", url, e)))?
                .status()
        } else {
            response.status()
        };

        if status.is_success() {
            debug!("Probe ok: {}", url);
            Ok(())
        } else {
            Err(Error::Load(format!("{}: HTTP {}", url, status)))
        }
    }
}

/// Probe up to `attempts` times, returning the last failure
pub async fn probe_with_attempts(probe: &dyn ClipProbe, url: &str, attempts: u32) -> Result<()> {
    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match probe.probe(url).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!("Probe attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::Load(url.to_string())))
}
