//! Keyed persistence
//!
//! [`Store`] is the only persistence capability the pipeline needs: an upsert
//! by key. Reads and deletes are deliberately not part of it.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use ports_common::Result;
use std::sync::Arc;

/// Keyed upsert. A later `set` for the same key replaces the earlier value.
///
/// Implementations must tolerate concurrent callers.
#[async_trait]
pub trait Store<T: Send + 'static>: Send + Sync {
    async fn set(&self, key: &str, value: T) -> Result<()>;
}

#[async_trait]
impl<T, S> Store<T> for Arc<S>
where
    T: Send + 'static,
    S: Store<T> + ?Sized,
{
    async fn set(&self, key: &str, value: T) -> Result<()> {
        (**self).set(key, value).await
    }
}
