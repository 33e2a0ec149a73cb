//! Registry error types

use infralock_store::StoreError;

/// Error type for endpoint and configuration operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("store error on '{key}': {source}")]
    Store { key: String, source: StoreError },

    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to decode value of '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    #[error("watch on '{key}' broken: {reason}")]
    WatchBroken { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
