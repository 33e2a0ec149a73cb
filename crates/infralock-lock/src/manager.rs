//! Lock manager
//!
//! Mutual exclusion is the presence of a single key bound to a lease. Acquire
//! creates the key only if it does not exist; release deletes it only if it is
//! still bound to the caller's lease. A crashed holder is recovered by lease
//! expiry, which deletes the key.

use std::sync::Arc;

use chrono::Utc;
use infralock_common::CancelSignal;
use infralock_store::{KvStore, LeaseId, StoreError, with_timeout};
use tracing::{debug, error, info, warn};

use crate::error::{LockError, Result};
use crate::lease::LeaseAllocator;
use crate::metrics::{self, Timer};
use crate::model::{LockHolder, LockManagerConfig, LockMetadata, LockToken, WaitOutcome};
use crate::watch::{WatchBridge, wait_for_delete};

/// Acquires and releases lease-bound locks on a shared store.
///
/// The store handle is injected; the manager never opens or closes it.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn KvStore>,
    leases: LeaseAllocator,
    watches: WatchBridge,
    config: LockManagerConfig,
}

impl LockManager {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_config(store, LockManagerConfig::default())
    }

    pub fn with_config(store: Arc<dyn KvStore>, config: LockManagerConfig) -> Self {
        Self {
            leases: LeaseAllocator::new(store.clone(), config.request_timeout),
            watches: WatchBridge::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Try once to acquire `key` for `ttl_secs` seconds.
    ///
    /// Returns the lease that owns the lock. The lock disappears when the lease
    /// is revoked by [`release`](Self::release) or when it expires. Returns
    /// [`LockError::Busy`] if another holder has it; this call never waits.
    pub async fn acquire(&self, key: &str, ttl_secs: i64) -> Result<LeaseId> {
        let timer = Timer::new();
        let result = self.try_acquire(key, ttl_secs).await;
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_acquire(label, timer.elapsed_secs());
        result
    }

    /// [`acquire`](Self::acquire), returning a token that pairs the key with its lease
    pub async fn acquire_token(&self, key: &str, ttl_secs: i64) -> Result<LockToken> {
        let lease = self.acquire(key, ttl_secs).await?;
        Ok(LockToken::new(key, lease))
    }

    async fn try_acquire(&self, key: &str, ttl_secs: i64) -> Result<LeaseId> {
        validate_key(key)?;
        if ttl_secs <= 0 {
            return Err(LockError::InvalidTtl(ttl_secs));
        }

        info!(key = %key, ttl = ttl_secs, "Acquiring lock");

        // Fast path: skip the lease grant when the key is visibly held. The
        // conditional create below is what guarantees exclusion.
        let existing = self.read(key).await?;
        if existing.is_some() {
            warn!(key = %key, "Lock key already exists");
            return Err(LockError::Busy {
                key: key.to_string(),
            });
        }

        let lease = self.leases.grant(ttl_secs).await?;
        let value = self.metadata_value(ttl_secs);

        let created = match with_timeout(
            self.config.request_timeout,
            self.store.create_if_absent(key, value, lease),
        )
        .await
        {
            Ok(created) => created,
            Err(e) => {
                error!(key = %key, lease_id = %lease, error = %e, "Conditional create failed");
                // The outcome is unknown; revoking deletes the key if it was written.
                if let Err(revoke_err) = self.leases.revoke(lease).await {
                    warn!(lease_id = %lease, error = %revoke_err, "Failed to revoke lease after create error");
                }
                return Err(LockError::Store {
                    key: key.to_string(),
                    source: e,
                });
            }
        };

        if !created {
            warn!(key = %key, lease_id = %lease, "Lost acquire race");
            if let Err(e) = self.leases.revoke(lease).await {
                warn!(lease_id = %lease, error = %e, "Failed to revoke losing lease");
            }
            return Err(LockError::Busy {
                key: key.to_string(),
            });
        }

        info!(key = %key, lease_id = %lease, "Lock acquired");
        Ok(lease)
    }

    /// Release `key` held by `lease`.
    ///
    /// The key is deleted only if it is still bound to `lease`, then the lease
    /// is revoked. [`LockError::AlreadyReleased`] and [`LockError::NotOwner`]
    /// leave the caller's lease to expire on its own.
    pub async fn release(&self, key: &str, lease: LeaseId) -> Result<()> {
        let result = self.try_release(key, lease).await;
        let label = match &result {
            Ok(()) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_release(label);
        result
    }

    /// [`release`](Self::release) using a token from [`acquire_token`](Self::acquire_token)
    pub async fn release_token(&self, token: &LockToken) -> Result<()> {
        self.release(&token.key, token.lease_id).await
    }

    async fn try_release(&self, key: &str, lease: LeaseId) -> Result<()> {
        validate_key(key)?;
        info!(key = %key, lease_id = %lease, "Releasing lock");

        let Some(current) = self.read(key).await? else {
            warn!(key = %key, "Lock already released");
            return Err(LockError::AlreadyReleased(key.to_string()));
        };

        if current.lease != Some(lease) {
            warn!(key = %key, lease_id = %lease, holder = ?current.lease, "Lock held by another lease");
            return Err(LockError::NotOwner {
                key: key.to_string(),
                lease_id: lease,
            });
        }

        let deleted = with_timeout(
            self.config.request_timeout,
            self.store.delete_if_lease(key, lease),
        )
        .await
        .map_err(|e| {
            error!(key = %key, error = %e, "Failed to delete lock key");
            LockError::DeleteFailed {
                key: key.to_string(),
                source: e,
            }
        })?;

        if !deleted {
            // The key changed between the read and the delete.
            return match self.read(key).await? {
                None => {
                    warn!(key = %key, "Lock expired before delete");
                    Err(LockError::AlreadyReleased(key.to_string()))
                }
                Some(_) => Err(LockError::NotOwner {
                    key: key.to_string(),
                    lease_id: lease,
                }),
            };
        }

        if let Err(e) = self.leases.revoke(lease).await {
            error!(key = %key, lease_id = %lease, error = %e, "Lock key deleted but lease revoke failed");
            return Err(e);
        }

        info!(key = %key, lease_id = %lease, "Lock released");
        Ok(())
    }

    /// Wait until `key` is deleted and run `on_release` once.
    ///
    /// This only signals; it does not acquire. Use [`lock`](Self::lock) to wait
    /// and acquire.
    pub async fn wait_for_release<F>(
        &self,
        key: &str,
        cancel: &CancelSignal,
        on_release: F,
    ) -> Result<WaitOutcome>
    where
        F: FnOnce() + Send,
    {
        validate_key(key)?;
        self.watches.wait_for_release(key, cancel, on_release).await
    }

    /// Acquire `key`, waiting for the current holder to release it.
    ///
    /// The watch is opened before each attempt so a release between a failed
    /// attempt and the wait is not missed.
    pub async fn lock(&self, key: &str, ttl_secs: i64, cancel: &CancelSignal) -> Result<LeaseId> {
        validate_key(key)?;
        if ttl_secs <= 0 {
            return Err(LockError::InvalidTtl(ttl_secs));
        }

        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled(key.to_string()));
            }

            let mut stream = self.watches.open(key).await?;
            match self.acquire(key, ttl_secs).await {
                Ok(lease) => return Ok(lease),
                Err(LockError::Busy { .. }) => {}
                Err(e) => return Err(e),
            }

            debug!(key = %key, "Lock busy, waiting for release");
            match wait_for_delete(key, &mut stream, cancel).await? {
                WaitOutcome::Released => {
                    metrics::record_wait("released");
                    continue;
                }
                WaitOutcome::Cancelled => {
                    metrics::record_wait("cancelled");
                    return Err(LockError::Cancelled(key.to_string()));
                }
            }
        }
    }

    /// Read the current holder of `key`, if any
    pub async fn holder(&self, key: &str) -> Result<Option<LockHolder>> {
        validate_key(key)?;
        Ok(self.read(key).await?.map(|kv| LockHolder {
            metadata: serde_json::from_slice(&kv.value).ok(),
            key: kv.key,
            lease_id: kv.lease,
            create_revision: kv.create_revision,
        }))
    }

    async fn read(&self, key: &str) -> Result<Option<infralock_store::KeyValue>> {
        with_timeout(self.config.request_timeout, self.store.get(key))
            .await
            .map_err(|e: StoreError| {
                error!(key = %key, error = %e, "Failed to read lock key");
                LockError::Store {
                    key: key.to_string(),
                    source: e,
                }
            })
    }

    fn metadata_value(&self, ttl_secs: i64) -> Vec<u8> {
        let metadata = LockMetadata {
            holder_id: self.config.holder_id.clone(),
            acquired_at: Utc::now(),
            ttl_seconds: ttl_secs,
        };
        serde_json::to_vec(&metadata).unwrap_or_default()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(LockError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use infralock_store::MemoryStore;
    use std::time::Duration;

    fn manager(store: &MemoryStore) -> LockManager {
        LockManager::with_config(
            Arc::new(store.clone()),
            LockManagerConfig::default().with_holder_id("test-holder"),
        )
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        let lease = locks.acquire("orders", 10).await.unwrap();
        let kv = store.get("orders").await.unwrap().unwrap();
        assert_eq!(kv.lease, Some(lease));

        locks.release("orders", lease).await.unwrap();
        assert!(store.get("orders").await.unwrap().is_none());
        assert!(!store.lease_exists(lease));
    }

    #[tokio::test]
    async fn test_acquire_busy() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        let lease = locks.acquire("orders", 10).await.unwrap();
        let result = locks.acquire("orders", 10).await;
        assert!(matches!(result, Err(LockError::Busy { .. })));
        assert_eq!(store.lease_count(), 1);

        locks.release("orders", lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_acquire_invalid_ttl() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        assert!(matches!(
            locks.acquire("orders", 0).await,
            Err(LockError::InvalidTtl(0))
        ));
        assert!(matches!(
            locks.acquire("orders", -1).await,
            Err(LockError::InvalidTtl(-1))
        ));
        assert_eq!(store.lease_count(), 0);
        assert!(store.get("orders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        assert!(matches!(
            locks.acquire("", 10).await,
            Err(LockError::InvalidKey(_))
        ));
        assert!(matches!(
            locks.release(" ", LeaseId(1)).await,
            Err(LockError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_release_twice() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        let lease = locks.acquire("orders", 10).await.unwrap();
        locks.release("orders", lease).await.unwrap();

        let result = locks.release("orders", lease).await;
        assert!(matches!(result, Err(LockError::AlreadyReleased(_))));
    }

    #[tokio::test]
    async fn test_release_with_foreign_lease() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        let lease = locks.acquire("orders", 10).await.unwrap();
        let stranger = store.grant_lease(10).await.unwrap();

        let result = locks.release("orders", stranger).await;
        assert!(matches!(result, Err(LockError::NotOwner { .. })));

        // The holder's lock is untouched
        let kv = store.get("orders").await.unwrap().unwrap();
        assert_eq!(kv.lease, Some(lease));
        assert!(store.lease_exists(stranger));
    }

    #[tokio::test]
    async fn test_holder_metadata() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        assert!(locks.holder("orders").await.unwrap().is_none());

        let lease = locks.acquire("orders", 15).await.unwrap();
        let holder = locks.holder("orders").await.unwrap().unwrap();
        assert_eq!(holder.lease_id, Some(lease));
        let metadata = holder.metadata.unwrap();
        assert_eq!(metadata.holder_id, "test-holder");
        assert_eq!(metadata.ttl_seconds, 15);
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        let token = locks.acquire_token("orders", 10).await.unwrap();
        assert_eq!(token.key, "orders");
        locks.release_token(&token).await.unwrap();
        assert!(store.get("orders").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lock_can_be_reacquired() {
        let store = MemoryStore::new();
        let locks = manager(&store);

        let first = locks.acquire("orders", 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let second = locks.acquire("orders", 1).await.unwrap();
        assert_ne!(first, second);
        assert!(matches!(
            locks.release("orders", first).await,
            Err(LockError::NotOwner { .. })
        ));
    }

    #[tokio::test]
    async fn test_lock_waits_for_release() {
        let store = MemoryStore::new();
        let locks = manager(&store);
        let cancel = CancelSignal::new();

        let held = locks.acquire("orders", 10).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { locks.lock("orders", 10, &cancel).await })
        };

        while store.watcher_count("orders") == 0 {
            tokio::task::yield_now().await;
        }
        locks.release("orders", held).await.unwrap();

        let lease = waiter.await.unwrap().unwrap();
        assert_ne!(lease, held);
        let kv = store.get("orders").await.unwrap().unwrap();
        assert_eq!(kv.lease, Some(lease));
    }

    #[tokio::test]
    async fn test_lock_cancelled() {
        let store = MemoryStore::new();
        let locks = manager(&store);
        let cancel = CancelSignal::new();

        locks.acquire("orders", 10).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { locks.lock("orders", 10, &cancel).await })
        };

        while store.watcher_count("orders") == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(LockError::Cancelled(_))));
        assert_eq!(store.watcher_count("orders"), 0);
        assert_eq!(store.lease_count(), 1);
    }
}
