//! Network stream source
//!
//! Every network call feeds the same [`Ingress`]. The ingress is a bounded
//! sender, so a slow store backpressures callers the same way it backpressures
//! the file source: each call's receive loop waits on the send rather than
//! queueing without limit.

use std::pin::pin;

use futures::{Stream, StreamExt};
use ports_common::types::Port;
use ports_common::{PortsError, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Production, Source};
use crate::wire::PortEnvelope;

/// Pipeline-side end of the network source.
pub struct NetworkSource {
    items: mpsc::Receiver<Port>,
}

/// Call-side end of the network source. Cheap to clone, one per connection.
#[derive(Clone)]
pub struct Ingress {
    tx: mpsc::Sender<Port>,
}

impl NetworkSource {
    /// Create a source whose ingress buffers at most `capacity` records.
    ///
    /// The source ends once every [`Ingress`] clone has been dropped.
    pub fn channel(capacity: usize) -> Result<(Ingress, NetworkSource)> {
        if capacity == 0 {
            return Err(PortsError::InvalidCapacity(capacity));
        }

        let (tx, items) = mpsc::channel(capacity);
        Ok((Ingress { tx }, NetworkSource { items }))
    }
}

impl Source for NetworkSource {
    type Item = Port;

    /// The channel is already bounded by [`NetworkSource::channel`]; calls stop
    /// producing when the pipeline side is dropped.
    fn start(self, _capacity: usize, _cancel: CancellationToken) -> Result<Production<Port>> {
        Ok(Production::new(self.items))
    }
}

impl Ingress {
    /// Run one call's receive loop until the peer ends the stream.
    ///
    /// Returns the number of records accepted. A receive error, an invalid
    /// envelope, or a closed pipeline aborts the call with that error; other
    /// calls are unaffected.
    pub async fn receive<S>(&self, inbound: S) -> Result<u64>
    where
        S: Stream<Item = Result<PortEnvelope>>,
    {
        let mut inbound = pin!(inbound);
        let mut received = 0u64;

        while let Some(envelope) = inbound.next().await {
            let envelope = envelope?;
            let uuid = envelope.uuid.clone();
            let port = envelope.into_port()?;

            debug!(uuid = %uuid, key = %port.key, "Received port");
            self.tx
                .send(port)
                .await
                .map_err(|_| PortsError::PipelineClosed)?;
            received += 1;
        }

        info!(received, "Inbound stream ended");
        Ok(received)
    }
}
