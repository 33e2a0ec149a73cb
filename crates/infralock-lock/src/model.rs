//! Lock data model

use std::time::Duration;

use chrono::{DateTime, Utc};
use infralock_common::DEFAULT_REQUEST_TIMEOUT;
use infralock_store::LeaseId;
use serde::{Deserialize, Serialize};

/// Ownership token returned to a successful acquirer.
///
/// Nothing stores it centrally: losing it means the lock is only released by
/// lease expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub key: String,
    pub lease_id: LeaseId,
}

impl LockToken {
    pub fn new(key: impl Into<String>, lease_id: LeaseId) -> Self {
        Self {
            key: key.into(),
            lease_id,
        }
    }
}

/// Informational payload written as the lock key's value.
///
/// Mutual exclusion never depends on it; only the key's presence does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockMetadata {
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

/// Current holder of a lock as read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub key: String,
    pub lease_id: Option<LeaseId>,
    /// `None` when the value is empty or not written by this crate
    pub metadata: Option<LockMetadata>,
    pub create_revision: i64,
}

/// How a single-shot wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A delete event was observed and the continuation ran
    Released,
    /// The cancel signal fired first; the continuation did not run
    Cancelled,
}

/// Lock manager settings
#[derive(Debug, Clone)]
pub struct LockManagerConfig {
    /// Upper bound for each store round-trip in acquire, release and lease ops
    pub request_timeout: Duration,
    /// Written into [`LockMetadata::holder_id`]
    pub holder_id: String,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            holder_id: infralock_common::default_holder_id(),
        }
    }
}

impl LockManagerConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }
}
