use clap::Parser;
use spicedash::cli::{self, Cli, Command};
use spicedash::datasource::Datasource;
use spicedash::error::SpicedashError;
use spicedash::logging::{self, Timer};
use spicedash::query::{HealthStatus, QueryDataRequest};
use spicedash::{config, format, masking, output};
use std::path::PathBuf;
use std::process;
use tracing::debug;

#[tokio::main]
async fn main() {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Command::Query(ref args) => {
            run_query(args, cli.verbose, cli.show_secrets, cli.config.as_ref()).await
        }
        Command::Health(ref args) => {
            run_health(args, cli.verbose, cli.show_secrets, cli.config.as_ref()).await
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            output::print_error(&err);
            process::exit(1);
        }
    }
}

async fn run_query(
    args: &cli::QueryArgs,
    verbose: bool,
    show_secrets: bool,
    config_path: Option<&PathBuf>,
) -> Result<bool, SpicedashError> {
    let app_config = config::load_from_args(&args.connection, verbose, show_secrets, config_path)?;
    debug!(
        settings = %masking::describe_settings(&app_config.settings, app_config.show_secrets),
        "settings resolved"
    );

    let request = resolve_request(args)?;
    let datasource = Datasource::connect(app_config.settings)?;

    let timer = Timer::start();
    let ctx = datasource.context();
    let response = datasource.query_data(&ctx, &request).await;
    debug!(
        queries = request.queries.len(),
        elapsed_ms = timer.elapsed_ms() as u64,
        "request complete"
    );

    // a failed query is reported in its own response, not as a process error
    for (ref_id, r) in &response.responses {
        if let Some(e) = &r.error {
            output::print_warning(&format!("query {} failed ({}): {}", ref_id, e.status, e.message));
        }
    }

    output::print_json(&format::query_data_response_to_json(&response))?;
    datasource.dispose();
    Ok(true)
}

async fn run_health(
    args: &cli::HealthArgs,
    verbose: bool,
    show_secrets: bool,
    config_path: Option<&PathBuf>,
) -> Result<bool, SpicedashError> {
    let app_config = config::load_from_args(&args.connection, verbose, show_secrets, config_path)?;
    debug!(
        settings = %masking::describe_settings(&app_config.settings, app_config.show_secrets),
        "settings resolved"
    );

    let datasource = Datasource::connect(app_config.settings)?;
    let ctx = datasource.context();
    let result = datasource.check_health(&ctx).await;

    output::print_json(&format::health_to_json(&result))?;
    datasource.dispose();
    Ok(result.status == HealthStatus::Ok)
}

// --- Helpers ---

fn resolve_request(args: &cli::QueryArgs) -> Result<QueryDataRequest, SpicedashError> {
    if let Some(ref path) = args.request {
        let content = std::fs::read_to_string(path).map_err(|e| SpicedashError::Config {
            message: format!("cannot read request file {}: {}", path.display(), e),
        })?;
        return QueryDataRequest::from_json(&content);
    }
    if args.sql.is_empty() {
        return Err(SpicedashError::Config {
            message: "no query provided; pass SQL text or --request".to_string(),
        });
    }
    Ok(QueryDataRequest::from_sql(&args.sql))
}
