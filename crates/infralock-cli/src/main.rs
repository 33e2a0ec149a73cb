//! infralock: distributed locks, endpoint records and configuration watches
//! on an etcd cluster.

mod cli;
mod commands;
mod model;
mod startup;

use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use infralock_common::wait_for_shutdown_signal;
use tracing::{error, info};

use crate::cli::Cli;
use crate::commands::CommandContext;
use crate::model::Configuration;
use crate::startup::{LoggingConfig, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let configuration = Configuration::load(&args)?;

    let logging_config = LoggingConfig::from_config(
        configuration.log_dir(),
        configuration.log_console(),
        configuration.log_file(),
        &configuration.log_level(),
        &configuration.log_rotation(),
    );
    let _logging_guard = init_logging(&logging_config).map_err(|e| anyhow!(e))?;

    infralock_lock::metrics::init_metrics();

    let store = infralock_store::connect(&configuration.store_client_config()).await?;
    info!(endpoints = ?store.endpoints(), "Store ready");

    let cancel = wait_for_shutdown_signal();
    let ctx = CommandContext::new(
        Arc::new(store.clone()),
        configuration.lock_manager_config(),
        configuration.lock_default_ttl(),
        cancel,
    );

    let mut stdout = std::io::stdout();
    let result = commands::run(args.command, &ctx, &mut stdout).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }

    drop(ctx);
    store.close();
    result
}
