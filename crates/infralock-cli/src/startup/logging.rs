//! Logging setup for the infralock tool.
//!
//! Console output is on by default; file output is opt-in. With file output
//! enabled, events go to rolling files under the log directory:
//!
//! | Log File         | Component               | Target Prefixes      |
//! |------------------|-------------------------|----------------------|
//! | infralock.log    | Root logger (all)       | (all)                |
//! | lock.log         | Locks, leases, watches  | infralock_lock       |
//! | registry.log     | Endpoints and config    | infralock_registry   |
//! | store.log        | Store backends          | infralock_store      |
//!
//! Log files are stored in `./logs` by default.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

pub const ROOT_LOG_FILE: &str = "infralock.log";

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "lock.log",
        targets: &["infralock_lock"],
    },
    ComponentLogDef {
        file_name: "registry.log",
        targets: &["infralock_registry"],
    },
    ComponentLogDef {
        file_name: "store.log",
        targets: &["infralock_store"],
    },
];

/// Log rotation policy
#[derive(Debug, Clone, Copy)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    /// `daily`, `hourly` or `never`; anything else rotates daily
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            console_output: true,
            console_level: Level::INFO,
            file_logging: false,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from application configuration. Unknown levels fall back to INFO.
    pub fn from_config(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: &str,
        rotation: &str,
    ) -> Self {
        let level = level.parse().unwrap_or(Level::INFO);

        Self {
            log_dir: log_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("logs")),
            console_output,
            console_level: level,
            file_logging,
            file_level: level,
            rotation: LogRotation::parse(rotation),
        }
    }
}

/// Keeps the non-blocking file writers alive; dropping it flushes buffered output.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

fn build_layers(
    config: &LoggingConfig,
) -> Result<
    (Vec<Box<dyn Layer<Registry> + Send + Sync>>, Vec<WorkerGuard>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(root_filter);
        layers.push(Box::new(root_layer));

        let component_level: LevelFilter = config.file_level.into();
        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let mut targets = Targets::new();
            for target in component.targets {
                targets = targets.with_target(*target, component_level);
            }

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_ansi(false)
                .with_filter(targets);
            layers.push(Box::new(layer));
        }
    }

    Ok((layers, guards))
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` overrides the configured level for the console and root file.
/// The returned guard must live as long as the program.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<LoggingGuard, Box<dyn std::error::Error + Send + Sync>> {
    let (layers, guards) = build_layers(config)?;

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::debug!(
            log_dir = %config.log_dir.display(),
            component_files = COMPONENT_LOGS.len(),
            "File logging initialized"
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.console_output);
        assert!(!config.file_logging);
        assert_eq!(config.console_level, Level::INFO);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_logging_config_from_config() {
        let config = LoggingConfig::from_config(
            Some("/tmp/test-logs".to_string()),
            false,
            true,
            "debug",
            "hourly",
        );
        assert_eq!(config.log_dir, PathBuf::from("/tmp/test-logs"));
        assert!(!config.console_output);
        assert!(config.file_logging);
        assert_eq!(config.file_level, Level::DEBUG);
        assert!(matches!(config.rotation, LogRotation::Hourly));

        let config = LoggingConfig::from_config(None, true, false, "loud", "daily");
        assert_eq!(config.console_level, Level::INFO);
    }

    #[test]
    fn test_log_rotation_conversion() {
        assert_eq!(Rotation::from(LogRotation::Daily), Rotation::DAILY);
        assert_eq!(Rotation::from(LogRotation::Hourly), Rotation::HOURLY);
        assert_eq!(Rotation::from(LogRotation::Never), Rotation::NEVER);

        assert!(matches!(LogRotation::parse("HOURLY"), LogRotation::Hourly));
        assert!(matches!(LogRotation::parse("never"), LogRotation::Never));
        assert!(matches!(LogRotation::parse("weekly"), LogRotation::Daily));
    }

    #[test]
    fn test_component_log_definitions() {
        for component in COMPONENT_LOGS {
            assert!(component.file_name.ends_with(".log"));
            assert!(!component.targets.is_empty());
            assert_ne!(component.file_name, ROOT_LOG_FILE);
        }
    }

    #[test]
    fn test_file_layers_create_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        let config = LoggingConfig {
            log_dir: log_dir.clone(),
            console_output: false,
            file_logging: true,
            ..Default::default()
        };

        let (layers, guards) = build_layers(&config).unwrap();
        assert!(log_dir.is_dir());
        assert_eq!(guards.len(), 1 + COMPONENT_LOGS.len());
        assert_eq!(layers.len(), 1 + COMPONENT_LOGS.len());
    }

    #[test]
    fn test_console_only_has_no_writers() {
        let config = LoggingConfig::default();
        let (layers, guards) = build_layers(&config).unwrap();
        assert_eq!(layers.len(), 1);
        assert!(guards.is_empty());
    }
}
