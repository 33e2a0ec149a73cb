//! Endpoint registry
//!
//! Typed JSON records stored under plain keys. Records are not lease-bound and
//! live until deleted.

use std::sync::Arc;
use std::time::Duration;

use infralock_common::DEFAULT_REQUEST_TIMEOUT;
use infralock_store::{KvStore, with_timeout};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::error::{RegistryError, Result};

#[derive(Clone)]
pub struct EndpointRegistry {
    store: Arc<dyn KvStore>,
    timeout: Duration,
}

impl EndpointRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_timeout(store, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Create or overwrite the record at `key`
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| {
            error!(key = %key, error = %e, "Error encoding endpoint record");
            RegistryError::Encode {
                key: key.to_string(),
                source: e,
            }
        })?;

        with_timeout(self.timeout, self.store.put(key, bytes, None))
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Error updating endpoint record");
                RegistryError::Store {
                    key: key.to_string(),
                    source: e,
                }
            })?;

        info!(key = %key, "Endpoint record updated");
        Ok(())
    }

    /// Read the record at `key`; `None` when absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(kv) = self.get_raw(key).await? else {
            debug!(key = %key, "Endpoint record not found");
            return Ok(None);
        };

        serde_json::from_slice(&kv)
            .map(Some)
            .map_err(|e| RegistryError::Decode {
                key: key.to_string(),
                source: e,
            })
    }

    /// Read the raw bytes at `key`
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let kv = with_timeout(self.timeout, self.store.get(key))
            .await
            .map_err(|e| RegistryError::Store {
                key: key.to_string(),
                source: e,
            })?;
        Ok(kv.map(|kv| kv.value))
    }

    /// Delete the record at `key`. Returns `false` if nothing was there.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let deleted = with_timeout(self.timeout, self.store.delete(key))
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Error deleting endpoint record");
                RegistryError::Store {
                    key: key.to_string(),
                    source: e,
                }
            })?;

        if deleted {
            info!(key = %key, "Endpoint record deleted");
        }
        Ok(deleted)
    }
}
