//! Infralock Lock - distributed mutual exclusion over a linearizable store
//!
//! This crate provides:
//! - [`LockManager`]: acquire, release, wait for release, and blocking lock
//! - [`LeaseAllocator`]: TTL-bound lease grant and revocation
//! - [`WatchBridge`]: single-shot release notification over a watch stream
//! - Lock metrics

pub mod error;
pub mod lease;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod watch;

pub use error::{LockError, Result};
pub use lease::LeaseAllocator;
pub use manager::LockManager;
pub use model::{LockHolder, LockManagerConfig, LockMetadata, LockToken, WaitOutcome};
pub use watch::WatchBridge;

pub use infralock_store::LeaseId;
