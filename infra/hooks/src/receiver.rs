use crate::event::StorageEvent;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Lag-tolerant receiving for hook subscribers.
pub trait HookReceiverExt {
    /// Receives the next event, skipping over anything lost to lag.
    ///
    /// Returns `None` once every bus handle has been dropped.
    fn recv_event(&mut self) -> impl Future<Output = Option<Arc<StorageEvent>>> + Send;
}

impl HookReceiverExt for broadcast::Receiver<Arc<StorageEvent>> {
    async fn recv_event(&mut self) -> Option<Arc<StorageEvent>> {
        let mut skipped = 0u64;

        loop {
            match self.recv().await {
                Ok(event) => {
                    if skipped > 0 {
                        warn!(skipped, "Hook subscriber lagged; continuing from oldest retained event");
                    }
                    return Some(event);
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    skipped = skipped.saturating_add(n);
                    debug!(skipped = n, total_skipped = skipped, "Hook subscriber lagged");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
