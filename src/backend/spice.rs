use arrow::buffer::Buffer;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::ipc::reader::StreamDecoder;
use arrow::record_batch::RecordBatch;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use std::fmt::Display;
use tracing::{debug, info};

use crate::backend::{Backend, BatchStream, QueryContext};
use crate::config::{DatasourceSettings, clone_secret};
use crate::error::SpicedashError;
use crate::logging::Timer;

/// Media type of an Arrow IPC stream response.
pub const ARROW_STREAM_CONTENT_TYPE: &str = "application/vnd.apache.arrow.stream";

/// Spice runtime reached over its HTTP SQL endpoint, answering in Arrow IPC.
pub struct SpiceBackend {
    endpoint: String,
    api_key: SecretString,
    client: Client,
}

impl SpiceBackend {
    /// Build a backend from datasource settings. Fails fast on a missing API
    /// key or an endpoint that is not an http(s) URL.
    pub fn new(settings: &DatasourceSettings) -> Result<Self, SpicedashError> {
        if settings.api_key.expose_secret().trim().is_empty() {
            return Err(SpicedashError::Config {
                message: "missing api key".to_string(),
            });
        }

        let endpoint = normalize_endpoint(&settings.endpoint)?;

        let client = Client::builder()
            .build()
            .map_err(|e| SpicedashError::Config {
                message: format!("failed to initialize http client: {e}"),
            })?;

        Ok(Self {
            endpoint,
            api_key: clone_secret(&settings.api_key),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn sql_url(&self) -> String {
        format!("{}/v1/sql", self.endpoint)
    }

    /// Map a non-success HTTP status and its body to an error. The body text
    /// is kept verbatim since that is what the remote reported.
    pub fn map_http_error(status: u16, body: &str) -> SpicedashError {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP error: {status}")
        } else {
            body.to_string()
        };
        classify_status(status, message)
    }

    /// Error for a non-success response whose body could not be read.
    pub fn map_unreadable_body(status: u16, reason: impl Display) -> SpicedashError {
        classify_status(
            status,
            format!("HTTP error: {status} (failed to read response body: {reason})"),
        )
    }
}

fn classify_status(status: u16, message: String) -> SpicedashError {
    match status {
        429 => SpicedashError::Throttled { message },
        _ => SpicedashError::Query { message },
    }
}

impl Backend for SpiceBackend {
    async fn execute(
        &self,
        _ctx: &QueryContext,
        sql: &str,
    ) -> Result<BatchStream, SpicedashError> {
        let timer = Timer::start();
        debug!(endpoint = %self.endpoint, "sending query");

        let resp = self
            .client
            .post(self.sql_url())
            .header("X-API-Key", self.api_key.expose_secret())
            .header(ACCEPT, ARROW_STREAM_CONTENT_TYPE)
            .header(CONTENT_TYPE, "text/plain")
            .body(sql.to_string())
            .send()
            .await
            .map_err(|e| SpicedashError::Connection {
                message: format!("failed to execute query: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(match resp.text().await {
                Ok(body) => Self::map_http_error(status.as_u16(), &body),
                Err(e) => Self::map_unreadable_body(status.as_u16(), e),
            });
        }

        let chunks = resp.bytes_stream().map(|chunk| {
            chunk.map_err(|e| SpicedashError::Connection {
                message: format!("failed to read query response: {e}"),
            })
        });
        let stream = decode_arrow_stream(chunks).await?;
        debug!(
            columns = stream.schema().fields().len(),
            elapsed_ms = timer.elapsed_ms() as u64,
            "query schema received"
        );
        Ok(stream)
    }

    fn close(&self) {
        info!(endpoint = %self.endpoint, "closing spice connection");
    }
}

/// Decode an Arrow IPC stream arriving as byte chunks.
///
/// Only the schema message is read here. Record batches are decoded as they
/// are pulled from the returned stream, each pull reading just enough chunks
/// to complete the next batch.
pub async fn decode_arrow_stream<S, B>(chunks: S) -> Result<BatchStream, SpicedashError>
where
    S: Stream<Item = Result<B, SpicedashError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let mut reader = IpcChunks::new(chunks.boxed());
    let schema = reader.read_schema().await?;

    let batches = stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        match reader.next_batch().await {
            Ok(Some(batch)) => Some((Ok(batch), Some(reader))),
            Ok(None) => None,
            // nothing is read past a failure
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed();

    Ok(BatchStream::new(schema, batches))
}

/// Incremental IPC stream decoding over a chunked body.
struct IpcChunks<B> {
    chunks: BoxStream<'static, Result<B, SpicedashError>>,
    decoder: StreamDecoder,
    buffer: Buffer,
    pending: Option<RecordBatch>,
}

impl<B: AsRef<[u8]>> IpcChunks<B> {
    fn new(chunks: BoxStream<'static, Result<B, SpicedashError>>) -> Self {
        Self {
            chunks,
            decoder: StreamDecoder::new(),
            buffer: Buffer::from_vec(Vec::<u8>::new()),
            pending: None,
        }
    }

    async fn read_schema(&mut self) -> Result<SchemaRef, SpicedashError> {
        loop {
            if let Some(schema) = self.decoder.schema() {
                return Ok(schema);
            }
            if self.buffer.is_empty() && !self.fill().await? {
                return Err(SpicedashError::Decode {
                    message: "arrow stream ended before its schema".to_string(),
                });
            }
            if let Some(batch) = self.decoder.decode(&mut self.buffer).map_err(ipc_error)? {
                self.pending = Some(batch);
            }
        }
    }

    async fn next_batch(&mut self) -> Result<Option<RecordBatch>, SpicedashError> {
        if let Some(batch) = self.pending.take() {
            return Ok(Some(batch));
        }
        loop {
            while !self.buffer.is_empty() {
                if let Some(batch) = self.decoder.decode(&mut self.buffer).map_err(ipc_error)? {
                    return Ok(Some(batch));
                }
            }
            if !self.fill().await? {
                // fails when the body stopped mid-message
                self.decoder.finish().map_err(ipc_error)?;
                return Ok(None);
            }
        }
    }

    /// Load the next chunk into the buffer. `false` once the body is drained.
    async fn fill(&mut self) -> Result<bool, SpicedashError> {
        match self.chunks.next().await {
            Some(chunk) => {
                self.buffer = Buffer::from_slice_ref::<u8, _>(chunk?.as_ref());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn ipc_error(e: ArrowError) -> SpicedashError {
    SpicedashError::Decode {
        message: format!("failed to read arrow stream: {e}"),
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<String, SpicedashError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(SpicedashError::Config {
            message: format!("endpoint must be an http(s) URL, got '{endpoint}'"),
        });
    }
    Ok(endpoint.to_string())
}
