//! In-memory linearizable key-value store
//!
//! All state sits behind one mutex, so every operation is applied atomically and
//! observes every operation that completed before it. Keys carry etcd-style
//! create/mod revisions, leases expire on a background reaper tick as well as
//! lazily at the start of every call, and watchers receive events in revision
//! order.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::KvStore;
use crate::error::{Result, StoreError};
use crate::model::{EventType, KeyValue, LeaseId, WatchEvent, WatchStream};

/// Default interval of the lease expiry task
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(100);

// Expiry used when a TTL does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

type WatchSender = mpsc::UnboundedSender<Result<WatchEvent>>;

struct StoredKv {
    value: Vec<u8>,
    create_revision: i64,
    mod_revision: i64,
    lease: Option<LeaseId>,
}

struct StoredLease {
    ttl_secs: i64,
    expires_at: Instant,
    keys: HashSet<String>,
}

#[derive(Default)]
struct State {
    revision: i64,
    entries: HashMap<String, StoredKv>,
    leases: HashMap<LeaseId, StoredLease>,
    watchers: HashMap<String, Vec<WatchSender>>,
}

impl State {
    fn notify(&mut self, event: WatchEvent) {
        if let Some(senders) = self.watchers.get_mut(&event.key) {
            senders.retain(|tx| tx.send(Ok(event.clone())).is_ok());
            if senders.is_empty() {
                self.watchers.remove(&event.key);
            }
        }
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };

        if let Some(lease) = entry.lease
            && let Some(stored) = self.leases.get_mut(&lease)
        {
            stored.keys.remove(key);
        }

        self.revision += 1;
        let revision = self.revision;
        self.notify(WatchEvent {
            event_type: EventType::Delete,
            key: key.to_string(),
            value: Vec::new(),
            revision,
        });
        true
    }

    fn write_key(&mut self, key: &str, value: Vec<u8>, lease: Option<LeaseId>) -> Result<()> {
        if let Some(lease) = lease
            && !self.leases.contains_key(&lease)
        {
            return Err(StoreError::LeaseNotFound(lease.as_i64()));
        }

        self.revision += 1;
        let revision = self.revision;

        let create_revision = match self.entries.get(key) {
            Some(existing) => {
                if existing.lease != lease
                    && let Some(old) = existing.lease
                    && let Some(stored) = self.leases.get_mut(&old)
                {
                    stored.keys.remove(key);
                }
                existing.create_revision
            }
            None => revision,
        };

        if let Some(lease) = lease
            && let Some(stored) = self.leases.get_mut(&lease)
        {
            stored.keys.insert(key.to_string());
        }

        self.entries.insert(
            key.to_string(),
            StoredKv {
                value: value.clone(),
                create_revision,
                mod_revision: revision,
                lease,
            },
        );

        self.notify(WatchEvent {
            event_type: EventType::Put,
            key: key.to_string(),
            value,
            revision,
        });
        Ok(())
    }

    fn drop_lease(&mut self, lease: LeaseId) -> bool {
        let Some(stored) = self.leases.remove(&lease) else {
            return false;
        };
        let mut keys: Vec<String> = stored.keys.into_iter().collect();
        keys.sort();
        for key in keys {
            self.remove_key(&key);
        }
        true
    }

    fn expire_due(&mut self, now: Instant) -> usize {
        let expired: Vec<LeaseId> = self
            .leases
            .iter()
            .filter(|(_, stored)| stored.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();

        for lease in &expired {
            self.drop_lease(*lease);
        }
        expired.len()
    }
}

struct Inner {
    state: Mutex<State>,
    next_lease: AtomicI64,
}

/// In-memory [`KvStore`] implementation
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create a new store. When called inside a tokio runtime, a background
    /// task expires leases every [`DEFAULT_REAP_INTERVAL`].
    pub fn new() -> Self {
        Self::with_reap_interval(DEFAULT_REAP_INTERVAL)
    }

    /// Create a new store with a custom lease expiry interval
    pub fn with_reap_interval(interval: Duration) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::default()),
            next_lease: AtomicI64::new(1),
        });

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let weak = Arc::downgrade(&inner);
            handle.spawn(Self::reap_loop(weak, interval));
        }

        Self { inner }
    }

    async fn reap_loop(inner: Weak<Inner>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(strong) = inner.upgrade() else {
                break;
            };
            let expired = strong.state.lock().expire_due(Instant::now());
            if expired > 0 {
                debug!(count = expired, "Expired leases");
            }
        }
    }

    /// Whether a lease is still alive
    pub fn lease_exists(&self, lease: LeaseId) -> bool {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        state.leases.contains_key(&lease)
    }

    /// Number of live leases
    pub fn lease_count(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        state.leases.len()
    }

    /// TTL a lease was granted with
    pub fn lease_ttl(&self, lease: LeaseId) -> Option<i64> {
        self.inner
            .state
            .lock()
            .leases
            .get(&lease)
            .map(|stored| stored.ttl_secs)
    }

    /// Number of open watch streams on `key`
    pub fn watcher_count(&self, key: &str) -> usize {
        let mut state = self.inner.state.lock();
        let Some(senders) = state.watchers.get_mut(key) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        let count = senders.len();
        if count == 0 {
            state.watchers.remove(key);
        }
        count
    }

    /// Terminate every watch on `key` with an error, the way a store-side
    /// stream failure would surface to clients.
    pub fn break_watches(&self, key: &str, reason: &str) -> usize {
        let mut state = self.inner.state.lock();
        let senders = state.watchers.remove(key).unwrap_or_default();
        let count = senders.len();
        for tx in senders {
            let _ = tx.send(Err(StoreError::WatchClosed(reason.to_string())));
        }
        count
    }

    /// Current store revision
    pub fn revision(&self) -> i64 {
        self.inner.state.lock().revision
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>> {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        Ok(state.entries.get(key).map(|entry| KeyValue {
            key: key.to_string(),
            value: entry.value.clone(),
            create_revision: entry.create_revision,
            mod_revision: entry.mod_revision,
            lease: entry.lease,
        }))
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: Option<LeaseId>) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        state.write_key(key, value, lease)
    }

    async fn create_if_absent(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<bool> {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        if state.entries.contains_key(key) {
            return Ok(false);
        }
        state.write_key(key, value, Some(lease))?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        Ok(state.remove_key(key))
    }

    async fn delete_if_lease(&self, key: &str, lease: LeaseId) -> Result<bool> {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        match state.entries.get(key) {
            Some(entry) if entry.lease == Some(lease) => Ok(state.remove_key(key)),
            _ => Ok(false),
        }
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId> {
        if ttl_secs <= 0 {
            return Err(StoreError::InvalidArgument(format!(
                "lease ttl must be positive, got {}",
                ttl_secs
            )));
        }

        let lease = LeaseId(self.inner.next_lease.fetch_add(1, Ordering::SeqCst));
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_secs as u64))
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut state = self.inner.state.lock();
        state.expire_due(now);
        state.leases.insert(
            lease,
            StoredLease {
                ttl_secs,
                expires_at,
                keys: HashSet::new(),
            },
        );
        Ok(lease)
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        if state.drop_lease(lease) {
            Ok(())
        } else {
            Err(StoreError::LeaseNotFound(lease.as_i64()))
        }
    }

    async fn watch(&self, key: &str) -> Result<WatchStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.state.lock();
        state.expire_due(Instant::now());
        let senders = state.watchers.entry(key.to_string()).or_default();
        senders.retain(|tx| !tx.is_closed());
        senders.push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}
