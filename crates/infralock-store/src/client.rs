//! Store client configuration and connection
//!
//! The composing application builds a [`StoreClientConfig`], calls [`connect`]
//! once, and hands the resulting store to the components that need it.

use std::time::Duration;

use etcd_client::{Client, ConnectOptions};
use infralock_common::{DEFAULT_DIAL_TIMEOUT, DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT};
use tracing::{error, info};

use crate::error::{Result, StoreError};
use crate::etcd::EtcdStore;

/// Connection settings for the etcd backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreClientConfig {
    /// Cluster endpoints, e.g. `127.0.0.1:2379`
    pub endpoints: Vec<String>,
    /// Time allowed to establish the connection
    pub dial_timeout: Duration,
    /// Upper bound for each request
    pub request_timeout: Duration,
}

impl Default for StoreClientConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl StoreClientConfig {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn with_timeouts(mut self, dial_timeout: Duration, request_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self.request_timeout = request_timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(StoreError::InvalidArgument(
                "at least one endpoint is required".to_string(),
            ));
        }
        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(StoreError::InvalidArgument(
                "endpoints must not be empty strings".to_string(),
            ));
        }
        if self.dial_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(StoreError::InvalidArgument(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connect to the configured etcd cluster
pub async fn connect(config: &StoreClientConfig) -> Result<EtcdStore> {
    config.validate()?;

    let options = ConnectOptions::new()
        .with_connect_timeout(config.dial_timeout)
        .with_timeout(config.request_timeout);

    match Client::connect(&config.endpoints, Some(options)).await {
        Ok(client) => {
            info!(endpoints = ?config.endpoints, "Connected to etcd");
            Ok(EtcdStore::new(client, config.endpoints.clone()))
        }
        Err(e) => {
            error!(endpoints = ?config.endpoints, error = %e, "Error connecting to etcd");
            Err(StoreError::Unavailable(e.to_string()))
        }
    }
}
