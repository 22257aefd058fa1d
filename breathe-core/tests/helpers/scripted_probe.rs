//! Clip probe with scripted failures

use async_trait::async_trait;
use breathe_core::narration::ClipProbe;
use breathe_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Default)]
pub struct ScriptedProbe {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn heal(&self, url: &str) {
        self.failing.lock().remove(url);
    }

    /// Make every probe take `delay` of virtual time
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == url).count()
    }
}

#[async_trait]
impl ClipProbe for ScriptedProbe {
    async fn probe(&self, url: &str) -> Result<()> {
        self.calls.lock().push(url.to_string());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(url) {
            Err(Error::Load(format!("{}: HTTP 404", url)))
        } else {
            Ok(())
        }
    }
}
