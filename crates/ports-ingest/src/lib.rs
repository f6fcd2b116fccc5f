//! Ports Ingest Library
//!
//! A bounded, cancellable pipeline that moves port records from a source into
//! a keyed store.
//!
//! # Stages
//!
//! - **Sources**: [`source::FileSource`] streams a keyed JSON document entry by
//!   entry; [`source::NetworkSource`] collects records from concurrent network calls
//! - **Streamer**: [`streamer::stream`] bounds and forwards a source's output
//! - **Sink**: [`repository::Repository`] upserts each record into a [`store::Store`]
//! - **Orchestration**: [`pipeline::Pipeline`] wires the stages and reports
//!   how the run ended
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ports_common::types::Port;
//! use ports_ingest::pipeline::Pipeline;
//! use ports_ingest::repository::Repository;
//! use ports_ingest::source::FileSource;
//! use ports_ingest::store::MemoryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::<Port>::new());
//!     let source = FileSource::<Port>::new("data/ports.json");
//!     let report = Pipeline::new(source, Repository::new(store.clone()))
//!         .buffer_capacity(100)
//!         .run(CancellationToken::new())
//!         .await?;
//!
//!     println!("stored {} ports", report.stored);
//!     Ok(())
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod client;
pub mod config;
pub mod pipeline;
pub mod repository;
pub mod server;
pub mod source;
pub mod store;
pub mod streamer;
pub mod wire;

pub use config::IngestConfig;
pub use pipeline::{Pipeline, PipelineOutcome, PipelineReport};
