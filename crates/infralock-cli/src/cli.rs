//! Command line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use infralock_store::LeaseId;

#[derive(Debug, Parser)]
#[command(name = "infralock", version, about = "Distributed locks and endpoint records on etcd")]
pub struct Cli {
    /// Configuration file (optional)
    #[arg(short = 'c', long = "config", default_value = "conf/application.yml")]
    pub config_file: PathBuf,

    /// Comma separated etcd endpoints, overrides `store.endpoints`
    #[arg(long = "endpoints", env = "INFRALOCK_ENDPOINTS", value_delimiter = ',')]
    pub endpoints: Option<Vec<String>>,

    /// Log level, overrides `logging.level`
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Try once to acquire a lock and print its lease id
    Acquire {
        name: String,
        /// Lease TTL in seconds, defaults to `lock.default_ttl_seconds`
        #[arg(long)]
        ttl: Option<i64>,
    },
    /// Release a lock held by a lease
    Release {
        name: String,
        /// Lease id as printed by `acquire` (hex, or `#` followed by decimal)
        lease: LeaseId,
    },
    /// Block until a lock is released
    Wait { name: String },
    /// Acquire a lock (waiting if held), hold it, then release it
    Hold {
        name: String,
        #[arg(long)]
        ttl: Option<i64>,
        /// Seconds to hold before releasing; holds until interrupted when absent
        #[arg(long = "for")]
        hold_for: Option<u64>,
    },
    /// Show the current holder of a lock
    Status { name: String },
    /// Manage endpoint records
    #[command(subcommand)]
    Endpoint(EndpointCommand),
    /// Print every configuration value written to a key until interrupted
    WatchConfig { key: String },
}

#[derive(Debug, Subcommand)]
pub enum EndpointCommand {
    Put {
        key: String,
        address: String,
        port: u16,
        #[arg(long)]
        init: bool,
        /// Metadata entries as `name=value`
        #[arg(long = "meta", value_parser = parse_meta)]
        metadata: Vec<(String, String)>,
    },
    Get { key: String },
    Delete { key: String },
}

fn parse_meta(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{}'", s)),
    }
}
