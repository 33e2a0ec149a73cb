use std::io::Write;
use std::time::Duration;

use anyhow::{Context, bail};
use infralock_common::{is_valid_key, lock_key};
use infralock_lock::{LockError, WaitOutcome};
use infralock_store::LeaseId;
use tracing::{info, warn};

use super::CommandContext;

fn resolve(name: &str) -> anyhow::Result<String> {
    let key = lock_key(name);
    if !is_valid_key(&key) {
        bail!("invalid lock name '{}'", name);
    }
    Ok(key)
}

fn hold_outlasts_ttl(hold_for: u64, ttl: i64) -> bool {
    i64::try_from(hold_for).map_or(true, |secs| secs >= ttl)
}

pub async fn acquire(
    ctx: &CommandContext,
    name: &str,
    ttl: i64,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let key = resolve(name)?;
    let lease = ctx
        .locks
        .acquire(&key, ttl)
        .await
        .with_context(|| format!("failed to acquire '{}'", name))?;
    writeln!(out, "{}", lease)?;
    Ok(())
}

pub async fn release(
    ctx: &CommandContext,
    name: &str,
    lease: LeaseId,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let key = resolve(name)?;
    match ctx.locks.release(&key, lease).await {
        Ok(()) => writeln!(out, "released {}", name)?,
        Err(LockError::AlreadyReleased(_)) => writeln!(out, "{} was already released", name)?,
        Err(e @ LockError::RevokeFailed { .. }) => {
            // The key is gone; only the lease lingers until its TTL
            warn!(key = %key, error = %e, "Lock released without lease revoke");
            writeln!(out, "released {} (lease {} expires on its own)", name, lease)?;
        }
        Err(e) => return Err(e).with_context(|| format!("failed to release '{}'", name)),
    }
    Ok(())
}

pub async fn wait(
    ctx: &CommandContext,
    name: &str,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let key = resolve(name)?;
    let outcome = ctx
        .locks
        .wait_for_release(&key, &ctx.cancel, || info!(key = %key, "Lock released"))
        .await
        .with_context(|| format!("failed waiting for '{}'", name))?;

    match outcome {
        WaitOutcome::Released => writeln!(out, "{} released", name)?,
        WaitOutcome::Cancelled => writeln!(out, "wait for {} cancelled", name)?,
    }
    Ok(())
}

pub async fn hold(
    ctx: &CommandContext,
    name: &str,
    ttl: i64,
    hold_for: Option<u64>,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let key = resolve(name)?;
    if let Some(secs) = hold_for
        && hold_outlasts_ttl(secs, ttl)
    {
        warn!(key = %key, ttl = ttl, hold_for = secs, "Lease expires before the hold ends");
    }

    let lease = match ctx.locks.lock(&key, ttl, &ctx.cancel).await {
        Ok(lease) => lease,
        Err(LockError::Cancelled(_)) => {
            writeln!(out, "wait for {} cancelled", name)?;
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to lock '{}'", name)),
    };
    writeln!(out, "holding {} with lease {}", name, lease)?;

    match hold_for {
        Some(secs) => {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => ctx.cancel.cancelled().await,
    }

    release(ctx, name, lease, out).await
}

pub async fn status(
    ctx: &CommandContext,
    name: &str,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    let key = resolve(name)?;
    match ctx.locks.holder(&key).await? {
        None => writeln!(out, "{} is free", name)?,
        Some(holder) => {
            let lease = holder
                .lease_id
                .map(|lease| lease.to_string())
                .unwrap_or_else(|| "-".to_string());
            match holder.metadata {
                Some(metadata) => writeln!(
                    out,
                    "{} held by {} since {} (lease {}, ttl {}s)",
                    name,
                    metadata.holder_id,
                    metadata.acquired_at.to_rfc3339(),
                    lease,
                    metadata.ttl_seconds
                )?,
                None => writeln!(out, "{} held (lease {})", name, lease)?,
            }
        }
    }
    Ok(())
}
