pub mod spice;

use std::future::Future;
use std::time::Duration;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SpicedashError;

/// Cancellation and deadline shared by everything one request does.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel every operation running under this context (and its clones).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` until it completes, the context is cancelled, or the deadline
    /// passes. Cancellation and expiry both surface as `Timeout`.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, SpicedashError>
    where
        F: Future<Output = Result<T, SpicedashError>>,
    {
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(SpicedashError::Timeout {
                message: "context canceled".to_string(),
            }),
            _ = expiry => Err(SpicedashError::Timeout {
                message: "context deadline exceeded".to_string(),
            }),
            result = fut => result,
        }
    }
}

/// Lazy, single-pass sequence of record batches sharing one schema.
pub struct BatchStream {
    schema: SchemaRef,
    batches: BoxStream<'static, Result<RecordBatch, SpicedashError>>,
    finished: bool,
}

impl BatchStream {
    pub fn new(
        schema: SchemaRef,
        batches: BoxStream<'static, Result<RecordBatch, SpicedashError>>,
    ) -> Self {
        Self {
            schema,
            batches,
            finished: false,
        }
    }

    /// Stream over batches that are already in memory.
    pub fn from_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self::new(schema, stream::iter(batches.into_iter().map(Ok)).boxed())
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Fetch the next batch. Once the end is reached every further call
    /// returns `Ok(None)`.
    pub async fn next_batch(
        &mut self,
        ctx: &QueryContext,
    ) -> Result<Option<RecordBatch>, SpicedashError> {
        if self.finished {
            return Ok(None);
        }
        let next = ctx.run(async { self.batches.next().await.transpose() }).await;
        if matches!(next, Ok(None)) {
            self.finished = true;
        }
        next
    }
}

/// A remote store that can execute a query and stream back Arrow batches.
pub trait Backend {
    fn execute(
        &self,
        ctx: &QueryContext,
        sql: &str,
    ) -> impl Future<Output = Result<BatchStream, SpicedashError>> + Send;

    /// Release the connection handle. Called once when the owning datasource
    /// is disposed.
    fn close(&self) {}
}
