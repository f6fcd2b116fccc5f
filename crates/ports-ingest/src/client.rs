//! Client for the TCP network source
//!
//! Streams a keyed JSON document to a running server, one envelope per record.

use std::path::PathBuf;

use futures::{SinkExt, StreamExt};
use ports_common::types::Port;
use ports_common::{PortsError, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::source::{FileSource, Source};
use crate::wire::{frame_codec, transport_error, PortEnvelope, StreamReply};

/// Send every record in `path` to the server at `addr` and return its reply.
///
/// The document is read through a [`FileSource`] with `capacity` records of
/// read-ahead. If the document turns out to be truncated, the records already
/// sent stay sent and the decode error is returned without waiting for a reply.
pub async fn send_file(
    addr: impl ToSocketAddrs,
    path: impl Into<PathBuf>,
    capacity: usize,
) -> Result<StreamReply> {
    let path = path.into();
    let cancel = CancellationToken::new();
    let _stop_reader = cancel.clone().drop_guard();

    let (mut records, status) = FileSource::<Port>::new(&path)
        .start(capacity, cancel)?
        .into_parts();

    let stream = TcpStream::connect(addr).await?;
    let peer = stream.peer_addr()?;
    info!(%peer, path = %path.display(), "Streaming ports to server");

    let mut framed = Framed::new(stream, frame_codec());
    let mut sent = 0u64;

    while let Some(port) = records.recv().await {
        let envelope = PortEnvelope::new(Uuid::new_v4().to_string(), port.into());
        debug!(uuid = %envelope.uuid, "Sending port");

        let frame = serde_json::to_string(&envelope)?;
        framed.send(frame).await.map_err(transport_error)?;
        sent += 1;
    }

    if let Err(e) = status.wait().await {
        warn!(sent, error = %e, "Document ended early, closing call without reply");
        return Err(e);
    }

    // Half-close so the server sees the end of the call.
    framed.get_mut().shutdown().await?;

    let reply = framed
        .next()
        .await
        .ok_or_else(|| PortsError::Transport("server closed the call without a reply".to_string()))?
        .map_err(transport_error)?;
    let reply: StreamReply = serde_json::from_str(&reply)?;

    info!(sent, ?reply, "Call finished");
    Ok(reply)
}
