//! Configuration watcher
//!
//! Streams typed values written to a key into a channel until cancelled.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::StreamExt;
use infralock_common::CancelSignal;
use infralock_store::{EventType, KvStore};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::{RegistryError, Result};

/// Why a watcher stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    Cancelled,
    ReceiverClosed,
}

pub struct ConfigWatcher<T> {
    store: Arc<dyn KvStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> ConfigWatcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Forward every decodable value written to `key` into `sender`.
    ///
    /// Values that fail to decode are logged and skipped. Deletes are ignored.
    pub async fn run(
        &self,
        key: &str,
        sender: mpsc::Sender<T>,
        cancel: &CancelSignal,
    ) -> Result<WatchExit> {
        let mut stream = self.store.watch(key).await.map_err(|e| {
            error!(key = %key, error = %e, "Failed to start watcher");
            RegistryError::WatchBroken {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        info!(key = %key, "Watcher started");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(key = %key, "Watcher cancelled");
                    return Ok(WatchExit::Cancelled);
                }
                item = stream.next() => match item {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        warn!(key = %key, error = %e, "Watcher stream failed");
                        return Err(RegistryError::WatchBroken {
                            key: key.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    None => {
                        return Err(RegistryError::WatchBroken {
                            key: key.to_string(),
                            reason: "stream ended".to_string(),
                        });
                    }
                },
            };

            if event.event_type != EventType::Put {
                continue;
            }

            let value: T = match serde_json::from_slice(&event.value) {
                Ok(value) => value,
                Err(e) => {
                    error!(
                        key = %key,
                        value = %String::from_utf8_lossy(&event.value),
                        error = %e,
                        "Error reading new configuration"
                    );
                    continue;
                }
            };

            info!(key = %key, revision = event.revision, "New configuration received");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(WatchExit::Cancelled),
                sent = sender.send(value) => {
                    if sent.is_err() {
                        info!(key = %key, "Configuration receiver closed");
                        return Ok(WatchExit::ReceiverClosed);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infralock_store::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct AppConfig {
        replicas: u32,
    }

    async fn wait_for_watcher(store: &MemoryStore, key: &str) {
        while store.watcher_count(key) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_forwards_decoded_values() {
        let store = MemoryStore::new();
        let watcher = ConfigWatcher::<AppConfig>::new(Arc::new(store.clone()));
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancelSignal::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { watcher.run("/config/app", tx, &cancel).await })
        };
        wait_for_watcher(&store, "/config/app").await;

        store
            .put("/config/app", br#"{"replicas":2}"#.to_vec(), None)
            .await
            .unwrap();
        store
            .put("/config/app", b"garbage".to_vec(), None)
            .await
            .unwrap();
        store.delete("/config/app").await.unwrap();
        store
            .put("/config/app", br#"{"replicas":5}"#.to_vec(), None)
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(AppConfig { replicas: 2 }));
        assert_eq!(rx.recv().await, Some(AppConfig { replicas: 5 }));

        cancel.cancel();
        assert_eq!(task.await.unwrap().unwrap(), WatchExit::Cancelled);
    }

    #[tokio::test]
    async fn test_receiver_closed() {
        let store = MemoryStore::new();
        let watcher = ConfigWatcher::<AppConfig>::new(Arc::new(store.clone()));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let cancel = CancelSignal::new();

        let task = tokio::spawn(async move { watcher.run("/config/app", tx, &cancel).await });
        wait_for_watcher(&store, "/config/app").await;
        store
            .put("/config/app", br#"{"replicas":1}"#.to_vec(), None)
            .await
            .unwrap();

        assert_eq!(task.await.unwrap().unwrap(), WatchExit::ReceiverClosed);
    }

    #[tokio::test]
    async fn test_broken_stream() {
        let store = MemoryStore::new();
        let watcher = ConfigWatcher::<AppConfig>::new(Arc::new(store.clone()));
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancelSignal::new();

        let task = tokio::spawn(async move { watcher.run("/config/app", tx, &cancel).await });
        wait_for_watcher(&store, "/config/app").await;
        store.break_watches("/config/app", "server shutdown");

        assert!(matches!(
            task.await.unwrap(),
            Err(RegistryError::WatchBroken { .. })
        ));
    }
}
