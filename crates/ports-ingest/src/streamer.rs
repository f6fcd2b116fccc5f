//! Bounded, cancellable forwarding stage
//!
//! The streamer sits between a source's raw channel and the consumer. Its
//! output buffer is the pipeline's backpressure point: once it is full the
//! forwarding task stops pulling from the source.
//!
//! Delivery is at-most-once. An item already taken from the source when
//! cancellation fires may be dropped instead of forwarded.

use ports_common::{PortsError, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::source::{ProductionStatus, Source};

/// Forward `source` into a bounded stream of at most `capacity` buffered items.
///
/// The returned stream ends when the source is exhausted, when `cancel` fires,
/// or when the stream itself is dropped. Items keep their source order.
pub fn stream<T>(
    source: mpsc::Receiver<T>,
    capacity: usize,
    cancel: CancellationToken,
) -> Result<ReceiverStream<T>>
where
    T: Send + 'static,
{
    if capacity == 0 {
        return Err(PortsError::InvalidCapacity(capacity));
    }

    let (tx, rx) = mpsc::channel(capacity);
    tokio::spawn(forward(source, tx, cancel));

    Ok(ReceiverStream::new(rx))
}

/// Start `source` and bound its output.
///
/// Setup failures (an unreadable path, a zero capacity) are returned before any
/// item flows. The [`ProductionStatus`] reports whether the source ran to
/// completion once the stream has ended.
pub fn stream_source<S>(
    source: S,
    capacity: usize,
    cancel: CancellationToken,
) -> Result<(ReceiverStream<S::Item>, ProductionStatus)>
where
    S: Source,
{
    if capacity == 0 {
        return Err(PortsError::InvalidCapacity(capacity));
    }

    let (items, status) = source.start(capacity, cancel.clone())?.into_parts();
    Ok((stream(items, capacity, cancel)?, status))
}

async fn forward<T>(
    mut source: mpsc::Receiver<T>,
    output: mpsc::Sender<T>,
    cancel: CancellationToken,
) {
    let mut forwarded = 0u64;

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(forwarded, "Streamer cancelled while waiting on source");
                break;
            },
            item = source.recv() => match item {
                Some(item) => item,
                None => {
                    debug!(forwarded, "Source exhausted, closing stream");
                    break;
                },
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(forwarded, "Streamer cancelled with an item in hand, dropping it");
                break;
            },
            sent = output.send(item) => {
                if sent.is_err() {
                    debug!(forwarded, "Stream consumer went away");
                    break;
                }
                forwarded += 1;
                trace!(forwarded, "Forwarded item");
            },
        }
    }
}
