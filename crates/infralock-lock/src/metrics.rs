// Lock metrics
// Counters for acquire/release/wait outcomes and a gauge of locks held by this process

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        "lock_acquire_total",
        "Total number of lock acquire attempts by result"
    );
    describe_histogram!(
        "lock_acquire_duration_seconds",
        "Lock acquire duration in seconds"
    );
    describe_counter!(
        "lock_release_total",
        "Total number of lock release attempts by result"
    );
    describe_counter!(
        "lock_wait_total",
        "Total number of waits for lock release by outcome"
    );
    describe_gauge!(
        "locks_held",
        "Locks acquired by this process minus locks it released; leases that expire are not subtracted"
    );
    describe_counter!(
        "lease_revoke_errors_total",
        "Total number of failed lease revocations"
    );

    tracing::info!("Metrics initialized");
}

/// Record an acquire attempt
pub fn record_acquire(result: &str, duration_secs: f64) {
    counter!("lock_acquire_total", "result" => result.to_string()).increment(1);
    histogram!("lock_acquire_duration_seconds", "result" => result.to_string())
        .record(duration_secs);

    if result == "ok" {
        gauge!("locks_held").increment(1.0);
    }
}

/// Record a release attempt
pub fn record_release(result: &str) {
    counter!("lock_release_total", "result" => result.to_string()).increment(1);

    if release_frees_lock(result) {
        gauge!("locks_held").decrement(1.0);
    }
}

/// Release results after which this process's key is gone.
///
/// `already_released` is excluded: the key went away by expiry or another
/// caller, and `locks_held` only tracks explicit releases.
fn release_frees_lock(result: &str) -> bool {
    matches!(result, "ok" | "revoke_failed")
}

/// Record how a wait for release ended
pub fn record_wait(outcome: &str) {
    counter!("lock_wait_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a lease that could not be revoked
pub fn record_revoke_error() {
    counter!("lease_revoke_errors_total").increment(1);
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
