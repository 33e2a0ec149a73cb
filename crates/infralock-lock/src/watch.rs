//! Watch bridge
//!
//! Turns a store watch stream into a single-shot "key was deleted" signal,
//! raced against a [`CancelSignal`].

use std::sync::Arc;

use futures::StreamExt;
use infralock_common::CancelSignal;
use infralock_store::{KvStore, WatchStream};
use tracing::{debug, warn};

use crate::error::{LockError, Result};
use crate::metrics;
use crate::model::WaitOutcome;

#[derive(Clone)]
pub struct WatchBridge {
    store: Arc<dyn KvStore>,
}

impl WatchBridge {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Open a watch on `key`. Events start after the current revision.
    pub async fn open(&self, key: &str) -> Result<WatchStream> {
        self.store.watch(key).await.map_err(|e| {
            warn!(key = %key, error = %e, "Failed to open watch");
            LockError::WatchBroken {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Wait until `key` is deleted, then run `on_release` exactly once.
    ///
    /// Returns [`WaitOutcome::Cancelled`] without running the continuation when
    /// `cancel` fires first. The watch is dropped on every exit path.
    pub async fn wait_for_release<F>(
        &self,
        key: &str,
        cancel: &CancelSignal,
        on_release: F,
    ) -> Result<WaitOutcome>
    where
        F: FnOnce() + Send,
    {
        if cancel.is_cancelled() {
            metrics::record_wait("cancelled");
            return Ok(WaitOutcome::Cancelled);
        }

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                metrics::record_wait("cancelled");
                return Ok(WaitOutcome::Cancelled);
            }
            opened = self.open(key) => opened?,
        };

        let outcome = wait_for_delete(key, &mut stream, cancel).await;
        drop(stream);

        match outcome {
            Ok(WaitOutcome::Released) => {
                metrics::record_wait("released");
                on_release();
                Ok(WaitOutcome::Released)
            }
            Ok(WaitOutcome::Cancelled) => {
                metrics::record_wait("cancelled");
                Ok(WaitOutcome::Cancelled)
            }
            Err(e) => {
                metrics::record_wait(e.kind());
                Err(e)
            }
        }
    }
}

/// Drive `stream` until a delete event for `key`, cancellation, or failure.
///
/// Put events are ignored.
pub(crate) async fn wait_for_delete(
    key: &str,
    stream: &mut WatchStream,
    cancel: &CancelSignal,
) -> Result<WaitOutcome> {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(key = %key, "Wait for release cancelled");
                return Ok(WaitOutcome::Cancelled);
            }
            item = stream.next() => match item {
                Some(Ok(event)) if event.is_delete() => {
                    debug!(key = %key, revision = event.revision, "Lock released");
                    return Ok(WaitOutcome::Released);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(key = %key, error = %e, "Watch stream failed");
                    return Err(LockError::WatchBroken {
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                }
                None => {
                    warn!(key = %key, "Watch stream ended");
                    return Err(LockError::WatchBroken {
                        key: key.to_string(),
                        reason: "stream ended".to_string(),
                    });
                }
            },
        }
    }
}
