//! etcd v3 backend
//!
//! `etcd_client::Client` is a cheap clonable handle over one gRPC channel;
//! every call clones it because the client API takes `&mut self`.

use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, EventType as EtcdEventType, PutOptions, Txn, TxnOp};
use futures::StreamExt;
use tracing::{debug, info};

use crate::KvStore;
use crate::error::{Result, StoreError};
use crate::model::{EventType, KeyValue, LeaseId, WatchEvent, WatchStream};

/// [`KvStore`] backed by an etcd cluster
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
    endpoints: Vec<String>,
}

impl EtcdStore {
    /// Wrap an already connected client
    pub fn new(client: Client, endpoints: Vec<String>) -> Self {
        Self { client, endpoints }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Access the underlying client for operations outside [`KvStore`]
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Close the connection. Owned by the composing application.
    pub fn close(self) {
        drop(self.client);
        info!(endpoints = ?self.endpoints, "etcd client closed");
    }
}

fn to_key_value(kv: &etcd_client::KeyValue) -> KeyValue {
    let lease = kv.lease();
    KeyValue {
        key: String::from_utf8_lossy(kv.key()).into_owned(),
        value: kv.value().to_vec(),
        create_revision: kv.create_revision(),
        mod_revision: kv.mod_revision(),
        lease: (lease != 0).then_some(LeaseId(lease)),
    }
}

// etcd reports an expired or revoked lease as a NotFound status
fn is_lease_not_found(e: &etcd_client::Error) -> bool {
    matches!(e, etcd_client::Error::GRpcStatus(status) if status.message().contains("lease not found"))
}

#[async_trait]
impl KvStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await?;
        Ok(resp.kvs().first().map(to_key_value))
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: Option<LeaseId>) -> Result<()> {
        let mut client = self.client.clone();
        let options = lease.map(|lease| PutOptions::new().with_lease(lease.as_i64()));
        client.put(key, value, options).await?;
        Ok(())
    }

    async fn create_if_absent(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<bool> {
        let mut client = self.client.clone();
        let txn = Txn::new()
            .when([Compare::create_revision(key, CompareOp::Equal, 0)])
            .and_then([TxnOp::put(
                key,
                value,
                Some(PutOptions::new().with_lease(lease.as_i64())),
            )]);
        let resp = client.txn(txn).await?;
        Ok(resp.succeeded())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut client = self.client.clone();
        let resp = client.delete(key, None).await?;
        Ok(resp.deleted() > 0)
    }

    async fn delete_if_lease(&self, key: &str, lease: LeaseId) -> Result<bool> {
        let mut client = self.client.clone();
        let txn = Txn::new()
            .when([Compare::lease(key, CompareOp::Equal, lease.as_i64())])
            .and_then([TxnOp::delete(key, None)]);
        let resp = client.txn(txn).await?;
        Ok(resp.succeeded())
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId> {
        if ttl_secs <= 0 {
            return Err(StoreError::InvalidArgument(format!(
                "lease ttl must be positive, got {}",
                ttl_secs
            )));
        }
        let mut client = self.client.clone();
        let resp = client.lease_grant(ttl_secs, None).await?;
        Ok(LeaseId(resp.id()))
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        match client.lease_revoke(lease.as_i64()).await {
            Ok(_) => Ok(()),
            Err(e) if is_lease_not_found(&e) => Err(StoreError::LeaseNotFound(lease.as_i64())),
            Err(e) => Err(e.into()),
        }
    }

    async fn watch(&self, key: &str) -> Result<WatchStream> {
        let mut client = self.client.clone();
        let (watcher, stream) = client.watch(key, None).await?;
        debug!(key = %key, watch_id = watcher.watch_id(), "etcd watch established");

        // The watcher owns the request half of the gRPC stream and has to live
        // as long as the event stream does.
        let events = stream
            .map(move |item| {
                let _keep_alive = &watcher;
                match item {
                    Ok(resp) if resp.canceled() => Err(StoreError::WatchClosed(format!(
                        "watch canceled by server: {}",
                        resp.cancel_reason()
                    ))),
                    Ok(resp) => Ok(resp
                        .events()
                        .iter()
                        .map(|event| {
                            let kv = event.kv().map(to_key_value);
                            WatchEvent {
                                event_type: match event.event_type() {
                                    EtcdEventType::Put => EventType::Put,
                                    EtcdEventType::Delete => EventType::Delete,
                                },
                                key: kv.as_ref().map(|kv| kv.key.clone()).unwrap_or_default(),
                                value: kv.as_ref().map(|kv| kv.value.clone()).unwrap_or_default(),
                                revision: kv.map(|kv| kv.mod_revision).unwrap_or_default(),
                            }
                        })
                        .collect::<Vec<_>>()),
                    Err(e) => Err(StoreError::from(e)),
                }
            })
            .flat_map(|batch| match batch {
                Ok(events) => futures::stream::iter(
                    events
                        .into_iter()
                        .map(Ok)
                        .collect::<Vec<Result<WatchEvent>>>(),
                ),
                Err(e) => futures::stream::iter(vec![Err(e)]),
            });

        Ok(Box::pin(events))
    }
}
