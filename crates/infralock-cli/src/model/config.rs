//! Configuration management for the infralock tool
//!
//! Sources, lowest priority first: `conf/application.yml` (optional),
//! `INFRALOCK_*` environment variables, command line overrides.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use infralock_common::{DEFAULT_DIAL_TIMEOUT, DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT};
use infralock_lock::LockManagerConfig;
use infralock_store::StoreClientConfig;

use crate::cli::Cli;

pub const STORE_ENDPOINTS: &str = "store.endpoints";
pub const STORE_DIAL_TIMEOUT_MS: &str = "store.dial_timeout_ms";
pub const STORE_REQUEST_TIMEOUT_MS: &str = "store.request_timeout_ms";
pub const LOCK_DEFAULT_TTL_SECONDS: &str = "lock.default_ttl_seconds";
pub const LOCK_HOLDER_ID: &str = "lock.holder_id";
pub const LOGGING_LEVEL: &str = "logging.level";
pub const LOGGING_DIR: &str = "logging.dir";
pub const LOGGING_CONSOLE: &str = "logging.console";
pub const LOGGING_FILE: &str = "logging.file";
pub const LOGGING_ROTATION: &str = "logging.rotation";

pub const DEFAULT_TTL_SECONDS: i64 = 30;

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Build the configuration for a parsed command line
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut builder = Self::builder(&cli.config_file);

        if let Some(endpoints) = &cli.endpoints {
            builder = builder.set_override(STORE_ENDPOINTS, endpoints.clone())?;
        }
        if let Some(level) = &cli.log_level {
            builder = builder.set_override(LOGGING_LEVEL, level.as_str())?;
        }

        Ok(Configuration {
            config: builder.build()?,
        })
    }

    /// Build from a file and the environment only
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Configuration {
            config: Self::builder(path).build()?,
        })
    }

    fn builder(path: &Path) -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("infralock")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key(STORE_ENDPOINTS)
                    .try_parsing(true),
            )
    }

    // ========================================================================
    // Store Configuration
    // ========================================================================

    pub fn store_endpoints(&self) -> Vec<String> {
        if let Ok(values) = self.config.get_array(STORE_ENDPOINTS) {
            let endpoints: Vec<String> = values
                .into_iter()
                .filter_map(|v| v.into_string().ok())
                .collect();
            if !endpoints.is_empty() {
                return endpoints;
            }
        }

        match self.config.get_string(STORE_ENDPOINTS) {
            Ok(value) => value.split(',').map(|s| s.trim().to_string()).collect(),
            Err(_) => vec![DEFAULT_ENDPOINT.to_string()],
        }
    }

    pub fn store_dial_timeout(&self) -> Duration {
        self.duration_ms(STORE_DIAL_TIMEOUT_MS, DEFAULT_DIAL_TIMEOUT)
    }

    pub fn store_request_timeout(&self) -> Duration {
        self.duration_ms(STORE_REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn store_client_config(&self) -> StoreClientConfig {
        StoreClientConfig::new(self.store_endpoints())
            .with_timeouts(self.store_dial_timeout(), self.store_request_timeout())
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn lock_default_ttl(&self) -> i64 {
        self.config
            .get_int(LOCK_DEFAULT_TTL_SECONDS)
            .unwrap_or(DEFAULT_TTL_SECONDS)
    }

    pub fn lock_holder_id(&self) -> Option<String> {
        self.config
            .get_string(LOCK_HOLDER_ID)
            .ok()
            .filter(|s| !s.is_empty())
    }

    pub fn lock_manager_config(&self) -> LockManagerConfig {
        let config = LockManagerConfig::default().with_request_timeout(self.store_request_timeout());
        match self.lock_holder_id() {
            Some(holder_id) => config.with_holder_id(holder_id),
            None => config,
        }
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn log_level(&self) -> String {
        self.config
            .get_string(LOGGING_LEVEL)
            .unwrap_or("info".to_string())
    }

    pub fn log_dir(&self) -> Option<String> {
        self.config.get_string(LOGGING_DIR).ok()
    }

    pub fn log_console(&self) -> bool {
        self.config.get_bool(LOGGING_CONSOLE).unwrap_or(true)
    }

    pub fn log_file(&self) -> bool {
        self.config.get_bool(LOGGING_FILE).unwrap_or(false)
    }

    pub fn log_rotation(&self) -> String {
        self.config
            .get_string(LOGGING_ROTATION)
            .unwrap_or("daily".to_string())
    }

    fn duration_ms(&self, key: &str, default: Duration) -> Duration {
        self.config
            .get_int(key)
            .ok()
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or(default)
    }
}
