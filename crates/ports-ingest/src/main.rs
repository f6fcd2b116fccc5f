//! Ports Ingest - port record ingestion tool

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use ports_common::logging::{init_logging, LogConfig, LogLevel};
use ports_common::types::Port;
use ports_ingest::client;
use ports_ingest::config::IngestConfig;
use ports_ingest::repository::Repository;
use ports_ingest::server::{shutdown_signal, IngestServer};
use ports_ingest::source::{FileSource, NetworkSource};
use ports_ingest::store::MemoryStore;
use ports_ingest::wire::StreamReply;
use ports_ingest::{Pipeline, PipelineOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ports-ingest")]
#[command(author, version, about = "Port record ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Ingest a keyed JSON document into an in-memory store
    File {
        /// Document to read
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Records buffered between stages
        #[arg(short, long)]
        buffer: Option<usize>,
    },

    /// Accept port streams over TCP and ingest them
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        addr: Option<String>,

        /// Records buffered between stages
        #[arg(short, long)]
        buffer: Option<usize>,

        /// Seconds in-flight calls get to finish on shutdown
        #[arg(long)]
        shutdown_timeout: Option<u64>,
    },

    /// Stream a keyed JSON document to a running server
    Send {
        /// Server address
        #[arg(short, long)]
        addr: Option<String>,

        /// Document to send
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the CLI defaults
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("ports-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let mut config = IngestConfig::load();

    match cli.command {
        Command::File { path, buffer } => {
            if let Some(path) = path {
                config.file_path = path;
            }
            if let Some(buffer) = buffer {
                config.buffer_capacity = buffer;
            }
            config.validate()?;
            ingest_file(&config).await?;
        },
        Command::Serve {
            addr,
            buffer,
            shutdown_timeout,
        } => {
            if let Some(addr) = addr {
                config.listen_addr = addr;
            }
            if let Some(buffer) = buffer {
                config.buffer_capacity = buffer;
            }
            if let Some(secs) = shutdown_timeout {
                config.shutdown_timeout_secs = secs;
            }
            config.validate()?;
            config.validate_endpoint()?;
            serve(&config).await?;
        },
        Command::Send { addr, path } => {
            if let Some(addr) = addr {
                config.listen_addr = addr;
            }
            if let Some(path) = path {
                config.file_path = path;
            }
            config.validate()?;
            config.validate_endpoint()?;
            send(&config).await?;
        },
    }

    Ok(())
}

async fn ingest_file(config: &IngestConfig) -> Result<()> {
    info!(
        path = %config.file_path.display(),
        buffer = config.buffer_capacity,
        "Ingesting ports from file"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    let store = Arc::new(MemoryStore::<Port>::new());
    let report = Pipeline::new(
        FileSource::<Port>::new(&config.file_path),
        Repository::new(store.clone()),
    )
    .buffer_capacity(config.buffer_capacity)
    .run(cancel)
    .await?;

    match report.outcome {
        PipelineOutcome::Completed => {
            info!(stored = report.stored, entries = store.len().await, "Ingestion complete");
        },
        PipelineOutcome::Cancelled => {
            warn!(
                stored = report.stored,
                "Ingestion cancelled before the document was exhausted"
            );
        },
    }

    Ok(())
}

async fn serve(config: &IngestConfig) -> Result<()> {
    // Host names are resolved here, when the listener is bound.
    let server = IngestServer::bind(config.listen_addr.as_str()).await?;
    let (ingress, source) = NetworkSource::channel(config.buffer_capacity)?;
    let store = Arc::new(MemoryStore::<Port>::new());

    // `stop` ends the server; `halt` cancels the pipeline if it cannot drain in time.
    let stop = CancellationToken::new();
    let halt = CancellationToken::new();

    let mut pipeline = {
        let stop = stop.clone();
        let pipeline = Pipeline::new(source, Repository::new(store.clone()))
            .buffer_capacity(config.buffer_capacity)
            .run(halt.clone());
        tokio::spawn(async move {
            let result = pipeline.await;
            if let Err(e) = &result {
                error!(error = %e, "Pipeline failed, stopping server");
                stop.cancel();
            }
            result
        })
    };

    let on_signal = stop.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    server
        .serve(ingress, stop.cancelled_owned(), config.shutdown_timeout())
        .await?;

    // With every ingress gone the pipeline drains what is buffered and completes.
    let report = match tokio::time::timeout(config.shutdown_timeout(), &mut pipeline).await {
        Ok(joined) => joined??,
        Err(_) => {
            warn!("Pipeline did not drain in time, cancelling");
            halt.cancel();
            pipeline.await??
        },
    };

    info!(
        stored = report.stored,
        entries = store.len().await,
        outcome = ?report.outcome,
        "Server stopped"
    );
    Ok(())
}

async fn send(config: &IngestConfig) -> Result<()> {
    let reply = client::send_file(
        config.listen_addr.as_str(),
        &config.file_path,
        config.buffer_capacity,
    )
    .await?;

    match reply {
        StreamReply::Received { count } => {
            info!(count, "Server acknowledged ports");
            Ok(())
        },
        StreamReply::Failed { error } => bail!("Server rejected the stream: {error}"),
    }
}
