//! Consumer-side capability of the pipeline

use std::sync::Arc;

use async_trait::async_trait;
use ports_common::types::Keyed;
use ports_common::{PortsError, Result};
use tracing::trace;

use crate::store::Store;

/// Accepts the items a pipeline yields, one at a time.
#[async_trait]
pub trait Sink<T: Send + 'static>: Send + Sync {
    async fn accept(&self, item: T) -> Result<()>;
}

#[async_trait]
impl<T, K> Sink<T> for Arc<K>
where
    T: Send + 'static,
    K: Sink<T> + ?Sized,
{
    async fn accept(&self, item: T) -> Result<()> {
        (**self).accept(item).await
    }
}

/// Persists keyed records into a [`Store`], keyed by their own identifier.
pub struct Repository<S> {
    store: S,
}

impl<S> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<T, S> Sink<T> for Repository<S>
where
    T: Keyed + Send + 'static,
    S: Store<T>,
{
    async fn accept(&self, item: T) -> Result<()> {
        let key = item.key().to_string();
        trace!(key = %key, "Persisting record");
        self.store.set(&key, item).await.map_err(|e| match e {
            PortsError::Store(message) => {
                PortsError::Store(format!("can not set {key}: {message}"))
            },
            other => PortsError::Store(format!("can not set {key}: {other}")),
        })
    }
}
