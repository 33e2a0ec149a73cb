//! Infralock Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used across all infralock components:
//! - Cancellation and shutdown signals
//! - Key validation and holder identity helpers
//! - Common constants (timeouts, default endpoints)

pub mod signal;
pub mod utils;

use std::time::Duration;

// Re-exports for convenience
pub use signal::{CancelSignal, wait_for_shutdown_signal};
pub use utils::{default_holder_id, is_valid_key};

/// Default etcd endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:2379";

/// Time allowed to establish the store connection
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for a single store round-trip (get, put, txn, lease ops)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Key prefix used by the command line tool for lock keys
pub const LOCK_KEY_PREFIX: &str = "/infralock/locks/";

/// Build a lock key under [`LOCK_KEY_PREFIX`]
pub fn lock_key(name: &str) -> String {
    if name.starts_with(LOCK_KEY_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", LOCK_KEY_PREFIX, name.trim_start_matches('/'))
    }
}
