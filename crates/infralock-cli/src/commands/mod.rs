//! Subcommand handlers
//!
//! Handlers write their results to `out` so they can run against any store and
//! be checked without a terminal.

mod endpoint;
mod lock;

use std::io::Write;
use std::sync::Arc;

use infralock_common::CancelSignal;
use infralock_lock::{LockManager, LockManagerConfig};
use infralock_registry::EndpointRegistry;
use infralock_store::KvStore;

use crate::cli::Command;

/// Everything a handler needs, built once from the configuration
pub struct CommandContext {
    pub store: Arc<dyn KvStore>,
    pub locks: LockManager,
    pub registry: EndpointRegistry,
    pub default_ttl: i64,
    pub cancel: CancelSignal,
}

impl CommandContext {
    pub fn new(
        store: Arc<dyn KvStore>,
        lock_config: LockManagerConfig,
        default_ttl: i64,
        cancel: CancelSignal,
    ) -> Self {
        let timeout = lock_config.request_timeout;
        Self {
            locks: LockManager::with_config(store.clone(), lock_config),
            registry: EndpointRegistry::with_timeout(store.clone(), timeout),
            store,
            default_ttl,
            cancel,
        }
    }
}

pub async fn run(
    command: Command,
    ctx: &CommandContext,
    out: &mut (dyn Write + Send),
) -> anyhow::Result<()> {
    match command {
        Command::Acquire { name, ttl } => {
            lock::acquire(ctx, &name, ttl.unwrap_or(ctx.default_ttl), out).await
        }
        Command::Release { name, lease } => lock::release(ctx, &name, lease, out).await,
        Command::Wait { name } => lock::wait(ctx, &name, out).await,
        Command::Hold {
            name,
            ttl,
            hold_for,
        } => lock::hold(ctx, &name, ttl.unwrap_or(ctx.default_ttl), hold_for, out).await,
        Command::Status { name } => lock::status(ctx, &name, out).await,
        Command::Endpoint(command) => endpoint::run(ctx, command, out).await,
        Command::WatchConfig { key } => endpoint::watch_config(ctx, &key, out).await,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use infralock_store::MemoryStore;

    pub(crate) fn context(store: &MemoryStore) -> CommandContext {
        CommandContext::new(
            Arc::new(store.clone()),
            LockManagerConfig::default().with_holder_id("cli-test"),
            30,
            CancelSignal::new(),
        )
    }

    pub(crate) fn output(buf: &[u8]) -> String {
        String::from_utf8_lossy(buf).into_owned()
    }

    #[tokio::test]
    async fn test_acquire_uses_default_ttl() {
        let store = MemoryStore::new();
        let ctx = context(&store);
        let mut out = Vec::new();

        run(
            Command::Acquire {
                name: "orders".to_string(),
                ttl: None,
            },
            &ctx,
            &mut out,
        )
        .await
        .unwrap();

        let kv = store
            .get("/infralock/locks/orders")
            .await
            .unwrap()
            .unwrap();
        let lease = kv.lease.unwrap();
        assert_eq!(store.lease_ttl(lease), Some(30));
        assert!(output(&out).contains(&lease.to_string()));
    }
}
