//! Source → Streamer → Sink wiring
//!
//! A [`Pipeline`] starts one [`Source`], bounds its output with the
//! [`streamer`](crate::streamer), and hands every item to a [`Sink`] on the
//! caller's task. The first sink failure aborts the run; items still buffered
//! at that point are discarded, not retried.
//!
//! The consumer always reads the stream to its end. Cancellation reaches it
//! through the streamer, which closes the stream once the token fires, so the
//! source's terminal status is checked on every run that does not fail in the
//! sink.

use ports_common::Result;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::repository::Sink;
use crate::source::Source;
use crate::streamer;

/// Default number of buffered records between stages.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// How a pipeline run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The source was exhausted and everything it produced was stored.
    Completed,
    /// The caller cancelled the run.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Records accepted by the sink.
    pub stored: u64,
    pub outcome: PipelineOutcome,
}

pub struct Pipeline<S, K> {
    source: S,
    sink: K,
    capacity: usize,
}

impl<S, K> Pipeline<S, K>
where
    S: Source,
    K: Sink<S::Item>,
{
    pub fn new(source: S, sink: K) -> Self {
        Self {
            source,
            sink,
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Set the buffer capacity for both the source channel and the stream.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Run until the source is exhausted, `cancel` fires, or a stage fails.
    ///
    /// Cancellation is reported as [`PipelineOutcome::Cancelled`], not as an
    /// error. A source that stops part way through (e.g. a truncated
    /// document) fails the run even though its earlier records were stored,
    /// and that failure wins over a cancellation that races with it. Records
    /// the streamer had already buffered when `cancel` fired are still stored.
    #[instrument(skip_all, fields(capacity = self.capacity))]
    pub async fn run(self, cancel: CancellationToken) -> Result<PipelineReport> {
        let Pipeline {
            source,
            sink,
            capacity,
        } = self;

        // Scoped to this run so a sink failure can stop the upstream stages
        // without cancelling the caller's token.
        let stages = cancel.child_token();
        let _stop_stages = stages.clone().drop_guard();

        let (mut stream, status) = streamer::stream_source(source, capacity, stages.clone())?;
        let mut stored = 0u64;

        while let Some(item) = stream.next().await {
            if let Err(e) = sink.accept(item).await {
                error!(stored, error = %e, "Sink rejected record, aborting pipeline");
                stages.cancel();
                return Err(e);
            }
            stored += 1;
        }

        if let Err(e) = status.wait().await {
            error!(stored, error = %e, "Source ended before its input was exhausted");
            return Err(e);
        }

        let outcome = if cancel.is_cancelled() {
            warn!(stored, "Pipeline cancelled");
            PipelineOutcome::Cancelled
        } else {
            info!(stored, "Pipeline completed");
            PipelineOutcome::Completed
        };

        Ok(PipelineReport { stored, outcome })
    }
}
