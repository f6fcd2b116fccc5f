//! TCP front end for the network source
//!
//! Each accepted connection is one call: the peer streams [`PortEnvelope`]
//! frames, half-closes, and gets a single [`StreamReply`]. A failing call only
//! closes its own connection.

use std::future::{self, Future};
use std::net::SocketAddr;
use std::pin::pin;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ports_common::{PortsError, Result};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::source::Ingress;
use crate::wire::{frame_codec, transport_error, PortEnvelope, StreamReply};

pub struct IngestServer {
    listener: TcpListener,
}

impl IngestServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept calls until `shutdown` resolves.
    ///
    /// After shutdown no new connections are accepted. In-flight calls get
    /// `grace` to finish and are aborted after that. The server's `ingress` is
    /// dropped on return, so the network source ends once no call holds one.
    pub async fn serve<F>(self, ingress: Ingress, shutdown: F, grace: Duration) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(%addr, "Accepting port streams");

        let mut shutdown = pin!(shutdown);
        let mut calls = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(in_flight = calls.len(), "Stopped accepting connections");
                    break;
                },
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Accepted connection");
                        calls.spawn(handle_call(stream, peer, ingress.clone()));
                    },
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
                Some(joined) = calls.join_next(), if !calls.is_empty() => log_call(joined),
            }
        }

        drop(ingress);

        if tokio::time::timeout(grace, drain(&mut calls)).await.is_err() {
            warn!(
                remaining = calls.len(),
                grace_secs = grace.as_secs_f64(),
                "Grace period elapsed, aborting remaining calls"
            );
            calls.shutdown().await;
        }

        info!("Server shut down");
        Ok(())
    }
}

async fn drain(calls: &mut JoinSet<(SocketAddr, Result<u64>)>) {
    while let Some(joined) = calls.join_next().await {
        log_call(joined);
    }
}

fn log_call(joined: std::result::Result<(SocketAddr, Result<u64>), tokio::task::JoinError>) {
    match joined {
        Ok((peer, Ok(received))) => info!(%peer, received, "Call completed"),
        Ok((peer, Err(e))) => warn!(%peer, error = %e, "Call failed"),
        Err(e) => error!(error = %e, "Call task did not finish"),
    }
}

async fn handle_call(
    stream: TcpStream,
    peer: SocketAddr,
    ingress: Ingress,
) -> (SocketAddr, Result<u64>) {
    let framed = Framed::new(stream, frame_codec());
    let (mut writer, reader) = framed.split();

    let inbound = reader.filter_map(|line| future::ready(decode_frame(line)));
    let result = ingress.receive(inbound).await;

    let reply = match &result {
        Ok(count) => StreamReply::Received { count: *count },
        Err(e) => StreamReply::Failed {
            error: e.to_string(),
        },
    };

    let sent = match serde_json::to_string(&reply) {
        Ok(frame) => writer.send(frame).await.map_err(transport_error),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = sent {
        debug!(%peer, error = %e, "Could not deliver reply");
    }

    (peer, result)
}

/// Blank lines are keep-alives and carry no envelope.
fn decode_frame(
    line: std::result::Result<String, LinesCodecError>,
) -> Option<Result<PortEnvelope>> {
    match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(
            serde_json::from_str(&line)
                .map_err(|e| PortsError::InvalidEnvelope(format!("malformed frame: {e}"))),
        ),
        Err(e) => Some(Err(transport_error(e))),
    }
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source::{NetworkSource, Source};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    async fn call(addr: SocketAddr, payload: &str) -> StreamReply {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(payload.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        serde_json::from_str(reply.trim()).unwrap()
    }

    type Running = (SocketAddr, CancellationToken, JoinHandle<Result<()>>, NetworkSource);

    async fn start(capacity: usize) -> Running {
        start_on("127.0.0.1:0", capacity).await
    }

    async fn start_on(listen: &str, capacity: usize) -> Running {
        let (ingress, source) = NetworkSource::channel(capacity).unwrap();
        let server = IngestServer::bind(listen).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve(
            ingress,
            shutdown.clone().cancelled_owned(),
            Duration::from_millis(200),
        ));
        (addr, shutdown, handle, source)
    }

    #[tokio::test]
    async fn test_call_is_acknowledged_with_count() {
        let (addr, shutdown, handle, source) = start(8).await;
        let mut production = source.start(8, CancellationToken::new()).unwrap();

        let payload = concat!(
            "{\"uuid\":\"1\",\"port\":{\"key\":\"AEAJM\",\"name\":\"Ajman\"}}\n",
            "\n",
            "{\"uuid\":\"2\",\"port\":{\"key\":\"AEAUH\"}}\n",
        );
        let reply = call(addr, payload).await;

        assert_eq!(reply, StreamReply::Received { count: 2 });
        assert_eq!(production.items.recv().await.unwrap().name, "Ajman");
        assert_eq!(production.items.recv().await.unwrap().key, "AEAUH");

        shutdown.cancel();
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap().unwrap();

        // Every ingress is gone, so the source has ended.
        assert!(production.items.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_frame_fails_only_that_call() {
        let (addr, shutdown, handle, source) = start(8).await;
        let mut production = source.start(8, CancellationToken::new()).unwrap();

        let failed = call(addr, "{\"uuid\":\"1\",\"port\":{\"key\":\"A\"}}\nnot json\n").await;
        assert!(
            matches!(failed, StreamReply::Failed { error } if error.contains("malformed frame"))
        );

        let ok = call(addr, "{\"uuid\":\"2\",\"port\":{\"key\":\"B\"}}\n").await;
        assert_eq!(ok, StreamReply::Received { count: 1 });

        assert_eq!(production.items.recv().await.unwrap().key, "A");
        assert_eq!(production.items.recv().await.unwrap().key, "B");

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_binds_host_name() {
        let (addr, shutdown, handle, source) = start_on("localhost:0", 2).await;
        let mut production = source.start(2, CancellationToken::new()).unwrap();

        assert!(addr.ip().is_loopback());
        let reply = call(addr, "{\"uuid\":\"1\",\"port\":{\"key\":\"AEAJM\"}}\n").await;
        assert_eq!(reply, StreamReply::Received { count: 1 });
        assert_eq!(production.items.recv().await.unwrap().key, "AEAJM");

        shutdown.cancel();
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_aborts_idle_calls_after_grace() {
        let (addr, shutdown, handle, _source) = start(1).await;

        // Never half-closes.
        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        shutdown.cancel();
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap().unwrap();
    }
}
