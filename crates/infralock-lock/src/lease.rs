//! Lease allocation
//!
//! Thin wrapper over the store's lease primitives that bounds each call by the
//! request timeout and maps failures into [`LockError`].

use std::sync::Arc;
use std::time::Duration;

use infralock_store::{KvStore, LeaseId, StoreError, with_timeout};
use tracing::{debug, error};

use crate::error::{LockError, Result};
use crate::metrics;

/// Grants and revokes TTL-bound leases
#[derive(Clone)]
pub struct LeaseAllocator {
    store: Arc<dyn KvStore>,
    timeout: Duration,
}

impl LeaseAllocator {
    pub fn new(store: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Grant a lease that expires `ttl_secs` seconds from now unless revoked
    pub async fn grant(&self, ttl_secs: i64) -> Result<LeaseId> {
        if ttl_secs <= 0 {
            return Err(LockError::InvalidTtl(ttl_secs));
        }

        match with_timeout(self.timeout, self.store.grant_lease(ttl_secs)).await {
            Ok(lease) => {
                debug!(lease_id = %lease, ttl = ttl_secs, "Lease granted");
                Ok(lease)
            }
            Err(e) => {
                error!(ttl = ttl_secs, error = %e, "Failed creating lease");
                Err(LockError::LeaseGrantFailed(e))
            }
        }
    }

    /// Revoke a lease, deleting every key bound to it.
    ///
    /// A lease the store no longer knows has already expired, which is the
    /// state revocation aims for.
    pub async fn revoke(&self, lease: LeaseId) -> Result<()> {
        match with_timeout(self.timeout, self.store.revoke_lease(lease)).await {
            Ok(()) => {
                debug!(lease_id = %lease, "Lease revoked");
                Ok(())
            }
            Err(StoreError::LeaseNotFound(_)) => {
                debug!(lease_id = %lease, "Lease already expired");
                Ok(())
            }
            Err(e) => {
                metrics::record_revoke_error();
                Err(LockError::RevokeFailed {
                    lease_id: lease,
                    source: e,
                })
            }
        }
    }
}
