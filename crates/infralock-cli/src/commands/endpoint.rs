use std::io::Write;

use anyhow::Context;
use infralock_registry::{ConfigWatcher, ServiceEndpoint, WatchExit};
use tokio::sync::mpsc;

use super::CommandContext;
use crate::cli::EndpointCommand;

pub async fn run(
    ctx: &CommandContext,
    command: EndpointCommand,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    match command {
        EndpointCommand::Put {
            key,
            address,
            port,
            init,
            metadata,
        } => {
            let mut endpoint = ServiceEndpoint::new(address, port).with_init(init);
            endpoint.metadata.extend(metadata);
            ctx.registry.put(&key, &endpoint).await?;
            writeln!(out, "{} -> {}", key, endpoint.authority())?;
        }
        EndpointCommand::Get { key } => {
            // Any JSON document is shown, not only endpoint records
            match ctx.registry.get::<serde_json::Value>(&key).await? {
                Some(value) => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
                None => writeln!(out, "{} not found", key)?,
            }
        }
        EndpointCommand::Delete { key } => {
            if ctx.registry.delete(&key).await? {
                writeln!(out, "deleted {}", key)?;
            } else {
                writeln!(out, "{} not found", key)?;
            }
        }
    }
    Ok(())
}

pub async fn watch_config(
    ctx: &CommandContext,
    key: &str,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<serde_json::Value>(16);
    let watcher = ConfigWatcher::new(ctx.store.clone());
    let cancel = ctx.cancel.clone();
    let watched = key.to_string();
    let task = tokio::spawn(async move { watcher.run(&watched, tx, &cancel).await });

    while let Some(value) = rx.recv().await {
        writeln!(out, "{}", serde_json::to_string(&value)?)?;
    }

    let exit = task
        .await
        .context("watch task failed")?
        .with_context(|| format!("watch on '{}' failed", key))?;
    if exit == WatchExit::Cancelled {
        writeln!(out, "watch on {} stopped", key)?;
    }
    Ok(())
}
