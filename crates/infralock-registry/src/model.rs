//! Endpoint records

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A service endpoint published for discovery
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub address: String,
    pub port: u16,
    /// Whether the service finished its initialization
    #[serde(default)]
    pub init: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl ServiceEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_init(mut self, init: bool) -> Self {
        self.init = init;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `address:port`
    pub fn authority(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Initialization flag record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InitEndpoint {
    pub init: bool,
}
