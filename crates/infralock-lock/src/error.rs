//! Lock error taxonomy
//!
//! Contention and transient store failures are steady-state conditions, so every
//! failure is a typed value the caller can branch on.

use infralock_store::{LeaseId, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The key is already held. Back off or wait for release.
    #[error("lock '{key}' is held by another owner")]
    Busy { key: String },

    #[error("invalid ttl {0}: must be a positive number of seconds")]
    InvalidTtl(i64),

    #[error("invalid lock key '{0}'")]
    InvalidKey(String),

    /// A read or conditional write failed (network, timeout)
    #[error("store error on lock '{key}': {source}")]
    Store { key: String, source: StoreError },

    #[error("lease grant failed: {0}")]
    LeaseGrantFailed(#[source] StoreError),

    #[error("failed to delete lock '{key}': {source}")]
    DeleteFailed { key: String, source: StoreError },

    /// The lock key is gone but the lease outlives it until its TTL
    #[error("failed to revoke lease {lease_id}: {source}")]
    RevokeFailed {
        lease_id: LeaseId,
        source: StoreError,
    },

    /// Nothing to release: expiry or another caller got there first
    #[error("lock '{0}' is already released")]
    AlreadyReleased(String),

    /// The key is bound to a different lease than the caller's token
    #[error("lock '{key}' is not held by lease {lease_id}")]
    NotOwner { key: String, lease_id: LeaseId },

    /// The watch stream failed or ended; re-establish the wait
    #[error("watch on '{key}' broken: {reason}")]
    WatchBroken { key: String, reason: String },

    #[error("wait for lock '{0}' cancelled")]
    Cancelled(String),
}

impl LockError {
    /// Whether the same call may succeed if retried with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LockError::Busy { .. }
                | LockError::Store { .. }
                | LockError::LeaseGrantFailed(_)
                | LockError::DeleteFailed { .. }
                | LockError::RevokeFailed { .. }
                | LockError::WatchBroken { .. }
        )
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            LockError::Busy { .. } => "busy",
            LockError::InvalidTtl(_) => "invalid_ttl",
            LockError::InvalidKey(_) => "invalid_key",
            LockError::Store { .. } => "store",
            LockError::LeaseGrantFailed(_) => "lease_grant_failed",
            LockError::DeleteFailed { .. } => "delete_failed",
            LockError::RevokeFailed { .. } => "revoke_failed",
            LockError::AlreadyReleased(_) => "already_released",
            LockError::NotOwner { .. } => "not_owner",
            LockError::WatchBroken { .. } => "watch_broken",
            LockError::Cancelled(_) => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
