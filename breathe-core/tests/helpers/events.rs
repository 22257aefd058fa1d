//! Event bus helpers

use breathe_common::events::BreatheEvent;
use std::time::Duration;
use tokio::sync::broadcast;

/// Everything currently buffered on `rx`
pub fn drain(rx: &mut broadcast::Receiver<BreatheEvent>) -> Vec<BreatheEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

/// Let spawned tasks run and virtual time pass
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
