//! Common test utilities for lock integration tests
//!
//! - FaultyStore: wraps a MemoryStore and fails selected operations on demand
//! - unique_key: per-test lock keys

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use infralock_lock::{LockManager, LockManagerConfig};
use infralock_store::{KeyValue, KvStore, LeaseId, MemoryStore, Result, StoreError, WatchStream};

/// Store wrapper with switchable failures
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_grant: Arc<AtomicBool>,
    pub fail_revoke: Arc<AtomicBool>,
    pub fail_delete: Arc<AtomicBool>,
    pub fail_create: Arc<AtomicBool>,
    pub fail_watch: Arc<AtomicBool>,
    /// Reads report every key as absent, as a read racing a create would
    pub stale_reads: Arc<AtomicBool>,
    /// The caller's lease expires between the release read and the conditional delete
    pub expire_before_delete: Arc<AtomicBool>,
    /// As above, and another holder takes the key before the delete lands
    pub takeover_before_delete: Arc<AtomicBool>,
    pub revoke_calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    pub fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>> {
        if self.stale_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: Option<LeaseId>) -> Result<()> {
        self.inner.put(key, value, lease).await
    }

    async fn create_if_absent(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<bool> {
        Self::check(&self.fail_create, "create")?;
        self.inner.create_if_absent(key, value, lease).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(key).await
    }

    async fn delete_if_lease(&self, key: &str, lease: LeaseId) -> Result<bool> {
        Self::check(&self.fail_delete, "delete")?;
        let expire = self.expire_before_delete.load(Ordering::SeqCst);
        let takeover = self.takeover_before_delete.load(Ordering::SeqCst);
        if expire || takeover {
            self.inner.revoke_lease(lease).await?;
        }
        if takeover {
            let other = self.inner.grant_lease(60).await?;
            self.inner.create_if_absent(key, Vec::new(), other).await?;
        }
        self.inner.delete_if_lease(key, lease).await
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId> {
        Self::check(&self.fail_grant, "grant")?;
        self.inner.grant_lease(ttl_secs).await
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_revoke, "revoke")?;
        self.inner.revoke_lease(lease).await
    }

    async fn watch(&self, key: &str) -> Result<WatchStream> {
        Self::check(&self.fail_watch, "watch")?;
        self.inner.watch(key).await
    }
}

/// Lock manager over a plain memory store
#[allow(dead_code)]
pub fn memory_manager() -> (MemoryStore, LockManager) {
    let store = MemoryStore::new();
    let locks = LockManager::with_config(
        Arc::new(store.clone()),
        LockManagerConfig::default().with_holder_id("integration"),
    );
    (store, locks)
}

/// Lock manager over a faulty store
#[allow(dead_code)]
pub fn faulty_manager() -> (FaultyStore, LockManager) {
    let store = FaultyStore::new();
    let locks = LockManager::with_config(
        Arc::new(store.clone()),
        LockManagerConfig::default().with_holder_id("integration"),
    );
    (store, locks)
}

/// Generate a unique lock key to avoid conflicts between tests
#[allow(dead_code)]
pub fn unique_key(prefix: &str) -> String {
    format!("/test/{}/{}", prefix, uuid_like())
}

fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{:x}", timestamp)
}

/// Yield until `store` has at least one watcher on `key`
#[allow(dead_code)]
pub async fn wait_for_watcher(store: &MemoryStore, key: &str) {
    while store.watcher_count(key) == 0 {
        tokio::task::yield_now().await;
    }
}
