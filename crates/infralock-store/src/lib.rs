//! Infralock Store - linearizable key-value store abstraction
//!
//! This crate provides:
//! - The [`KvStore`] trait: reads, conditional writes, leases and watches
//! - [`MemoryStore`]: an in-process linearizable store with lease expiry
//! - [`EtcdStore`]: an etcd v3 backend (feature `etcd`)
//! - Client configuration and connection helpers

pub mod error;
pub mod memory;
pub mod model;

#[cfg(feature = "etcd")]
pub mod client;
#[cfg(feature = "etcd")]
pub mod etcd;

use async_trait::async_trait;

pub use error::{Result, StoreError, with_timeout};
pub use memory::MemoryStore;
pub use model::{EventType, KeyValue, LeaseId, WatchEvent, WatchStream};

#[cfg(feature = "etcd")]
pub use client::{StoreClientConfig, connect};
#[cfg(feature = "etcd")]
pub use etcd::EtcdStore;

/// Primitives consumed by the lock manager and the registry.
///
/// Implementations must be linearizable: every call observes the effects of
/// every call that completed before it started.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a single key
    async fn get(&self, key: &str) -> Result<Option<KeyValue>>;

    /// Unconditionally write a key, optionally bound to a lease
    async fn put(&self, key: &str, value: Vec<u8>, lease: Option<LeaseId>) -> Result<()>;

    /// Atomically create `key` bound to `lease` iff its create revision is 0.
    ///
    /// Returns `false` when the key already exists.
    async fn create_if_absent(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<bool>;

    /// Delete a key. Returns `false` when nothing was deleted.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomically delete `key` iff it is currently bound to `lease`.
    ///
    /// Returns `false` when the key is absent or bound to another lease.
    async fn delete_if_lease(&self, key: &str, lease: LeaseId) -> Result<bool>;

    /// Grant a lease that expires after `ttl_secs` seconds
    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId>;

    /// Revoke a lease, deleting every key bound to it
    async fn revoke_lease(&self, lease: LeaseId) -> Result<()>;

    /// Open a watch on a single key, starting after the current revision
    async fn watch(&self, key: &str) -> Result<WatchStream>;
}
