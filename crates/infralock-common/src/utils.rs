//! Utility functions for infralock
//!
//! Common helper functions used across the codebase.

use std::sync::LazyLock;

/// Allowed characters in store keys: alphanumeric, underscore, dot, colon, slash, hyphen
static VALID_KEY_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:/-]+$").expect("Invalid regex pattern"));

/// Validate a lock or endpoint key
///
/// # Examples
///
/// ```
/// use infralock_common::is_valid_key;
///
/// assert!(is_valid_key("/infralock/locks/order-42"));
/// assert!(is_valid_key("service:v1"));
/// assert!(!is_valid_key(""));
/// assert!(!is_valid_key("with spaces"));
/// ```
pub fn is_valid_key(key: &str) -> bool {
    VALID_KEY_PATTERN.is_match(key)
}

/// Build a holder id for lock metadata: `<hostname>-<short uuid>`
pub fn default_holder_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "infralock-node".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &suffix[..8])
}
