//! Record sources
//!
//! A source runs its own production loop and hands the pipeline the receive
//! end of a bounded channel. Items travel only through that channel; how the
//! production ended (exhausted, truncated, failed) is reported separately by
//! [`Production::finish`] so a consumer can tell a complete ingestion from a
//! partial one.

pub mod file;
pub mod network;

pub use file::FileSource;
pub use network::{Ingress, NetworkSource};

use ports_common::{PortsError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Something that produces records onto a channel.
pub trait Source {
    type Item: Send + 'static;

    /// Start producing.
    ///
    /// Failures detectable before the first item (e.g. an unreadable path) are
    /// returned here. `capacity` bounds the raw channel; `cancel` stops production
    /// at the source's next cancellation point.
    fn start(self, capacity: usize, cancel: CancellationToken) -> Result<Production<Self::Item>>;
}

/// A running source: its item channel plus its terminal status.
pub struct Production<T> {
    pub items: mpsc::Receiver<T>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl<T> Production<T> {
    /// A production whose end is signalled only by its channel closing.
    pub fn new(items: mpsc::Receiver<T>) -> Self {
        Self { items, worker: None }
    }

    /// A production driven by `worker`, whose result is the terminal status.
    pub fn with_worker(items: mpsc::Receiver<T>, worker: JoinHandle<Result<()>>) -> Self {
        Self {
            items,
            worker: Some(worker),
        }
    }

    /// Split off the item channel, keeping the status handle.
    pub fn into_parts(self) -> (mpsc::Receiver<T>, ProductionStatus) {
        (self.items, ProductionStatus { worker: self.worker })
    }

    /// Wait for the producer's terminal status.
    pub async fn finish(self) -> Result<()> {
        self.into_parts().1.wait().await
    }
}

/// Terminal status of a production whose channel has been handed off.
pub struct ProductionStatus {
    worker: Option<JoinHandle<Result<()>>>,
}

impl ProductionStatus {
    pub async fn wait(self) -> Result<()> {
        match self.worker {
            Some(worker) => worker
                .await
                .map_err(|e| PortsError::Worker(e.to_string()))?,
            None => Ok(()),
        }
    }
}
