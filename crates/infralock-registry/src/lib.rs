//! Infralock Registry - typed records and configuration watches
//!
//! This crate provides:
//! - [`EndpointRegistry`]: JSON-encoded endpoint records under plain keys
//! - [`ConfigWatcher`]: forwards configuration updates on a key into a channel

pub mod endpoint;
pub mod error;
pub mod model;
pub mod watcher;

pub use endpoint::EndpointRegistry;
pub use error::{RegistryError, Result};
pub use model::{InitEndpoint, ServiceEndpoint};
pub use watcher::{ConfigWatcher, WatchExit};
