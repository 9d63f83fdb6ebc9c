use futures::future::join_all;
use tracing::{Instrument, error, info, info_span, warn};

use crate::backend::spice::SpiceBackend;
use crate::backend::{Backend, BatchStream, QueryContext};
use crate::config::{DatasourceSettings, InstanceSettings};
use crate::error::SpicedashError;
use crate::frame::{FRAME_NAME, Frame, FrameBuilder};
use crate::logging::Timer;
use crate::query::{
    CheckHealthResult, DataQuery, DataResponse, HealthStatus, QueryDataRequest,
    QueryDataResponse, QueryModel,
};

pub const HEALTHY_MESSAGE: &str = "Data source is working";
pub const UNHEALTHY_MESSAGE: &str = "error querying";

/// What draining one batch stream produced.
#[derive(Debug)]
pub struct StreamOutcome {
    pub frame: Frame,
    pub rows: usize,
    pub error: Option<SpicedashError>,
}

/// Drain a stream into a frame, stopping at the first failure. The frame
/// built up to that point is kept.
pub async fn collect_frame(ctx: &QueryContext, mut stream: BatchStream) -> StreamOutcome {
    let mut builder = FrameBuilder::new(FRAME_NAME);

    let started = builder.begin(stream.schema());
    let error = match started {
        Err(e) => Some(e),
        Ok(()) => loop {
            match stream.next_batch(ctx).await {
                Ok(Some(batch)) => {
                    if let Err(e) = builder.push_batch(batch) {
                        break Some(e);
                    }
                }
                Ok(None) => {
                    builder.finish();
                    break None;
                }
                Err(e) => break Some(e),
            }
        },
    };

    let rows = builder.rows();
    StreamOutcome {
        frame: builder.into_frame(),
        rows,
        error,
    }
}

/// One configured datasource instance. Owns its connection to the remote
/// store for its whole lifetime.
pub struct Datasource<B: Backend> {
    backend: B,
    settings: DatasourceSettings,
}

impl Datasource<SpiceBackend> {
    /// Build a datasource talking to a Spice runtime. Credentials are checked
    /// here, so a misconfigured instance never gets created.
    pub fn connect(settings: DatasourceSettings) -> Result<Self, SpicedashError> {
        let backend = SpiceBackend::new(&settings)?;
        info!(endpoint = %backend.endpoint(), "datasource created");
        Ok(Self::new(backend, settings))
    }

    pub fn from_instance(instance: &InstanceSettings) -> Result<Self, SpicedashError> {
        Self::connect(DatasourceSettings::from_instance(instance)?)
    }
}

impl<B: Backend> Datasource<B> {
    pub fn new(backend: B, settings: DatasourceSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &DatasourceSettings {
        &self.settings
    }

    /// A fresh context bounded by the configured timeout.
    pub fn context(&self) -> QueryContext {
        QueryContext::with_timeout(self.settings.query_timeout())
    }

    /// Run every query of a request. Queries are independent: each gets its
    /// own response and one failing never affects the others.
    pub async fn query_data(
        &self,
        ctx: &QueryContext,
        request: &QueryDataRequest,
    ) -> QueryDataResponse {
        let responses = join_all(request.queries.iter().map(|query| async move {
            (query.ref_id.clone(), self.query(ctx, query).await)
        }))
        .await;

        QueryDataResponse {
            responses: responses.into_iter().collect(),
        }
    }

    pub async fn query(&self, ctx: &QueryContext, query: &DataQuery) -> DataResponse {
        let span = info_span!("query", ref_id = %query.ref_id);
        self.run_query(ctx, query).instrument(span).await
    }

    async fn run_query(&self, ctx: &QueryContext, query: &DataQuery) -> DataResponse {
        let timer = Timer::start();

        let model = match QueryModel::parse(&query.json) {
            Ok(model) => model,
            Err(e) => {
                warn!(error = %e, "rejected query");
                return DataResponse::from_error(&e);
            }
        };
        let sql = match model.sql() {
            Ok(sql) => sql,
            Err(e) => {
                warn!(error = %e, "rejected query");
                return DataResponse::from_error(&e);
            }
        };

        let stream = match ctx.run(self.backend.execute(ctx, sql)).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "query failed");
                return DataResponse::from_error(&e);
            }
        };

        let outcome = collect_frame(ctx, stream).await;
        match outcome.error {
            None => {
                info!(
                    rows = outcome.rows,
                    elapsed_ms = timer.elapsed_ms() as u64,
                    "query complete"
                );
                DataResponse::from_frame(outcome.frame)
            }
            Some(e) => {
                error!(error = %e, rows = outcome.rows, "query aborted mid-stream");
                DataResponse::partial(outcome.frame, &e)
            }
        }
    }

    /// Run the diagnostic query; healthy means exactly one row came back.
    pub async fn check_health(&self, ctx: &QueryContext) -> CheckHealthResult {
        let sql = self.settings.health_query.as_str();

        let outcome = match ctx.run(self.backend.execute(ctx, sql)).await {
            Ok(stream) => collect_frame(ctx, stream).await,
            Err(e) => return unhealthy(format!("{UNHEALTHY_MESSAGE}: {}", e.detail())),
        };

        if let Some(e) = outcome.error {
            return unhealthy(format!("{UNHEALTHY_MESSAGE}: {}", e.detail()));
        }
        if outcome.rows != 1 {
            return unhealthy(UNHEALTHY_MESSAGE.to_string());
        }

        CheckHealthResult {
            status: HealthStatus::Ok,
            message: HEALTHY_MESSAGE.to_string(),
        }
    }

    /// Release the remote connection.
    pub fn dispose(self) {
        self.backend.close();
    }
}

fn unhealthy(message: String) -> CheckHealthResult {
    warn!(%message, "health check failed");
    CheckHealthResult {
        status: HealthStatus::Error,
        message,
    }
}
