use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "spicedash",
    about = "Run dashboard queries against a Spice runtime and print data frames"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short = 'c', long, global = true, env = "SPICEDASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit diagnostics to stderr
    #[arg(short = 'v', long, global = true, env = "SPICEDASH_VERBOSE")]
    pub verbose: bool,

    /// Disable credential masking in diagnostics
    #[arg(long, global = true, env = "SPICEDASH_SHOW_SECRETS")]
    pub show_secrets: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one or more queries and print the data frames
    Query(QueryArgs),

    /// Check that the datasource can reach the remote store
    Health(HealthArgs),
}

#[derive(Parser, Debug, Default)]
pub struct ConnectionArgs {
    /// Spice runtime endpoint URL
    #[arg(short = 'e', long, env = "SPICEDASH_ENDPOINT")]
    pub endpoint: Option<String>,

    /// API key for the runtime
    #[arg(short = 'k', long, env = "SPICEDASH_API_KEY")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds (default: 30)
    #[arg(short = 't', long, env = "SPICEDASH_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Query used by the health check
    #[arg(long, env = "SPICEDASH_HEALTH_QUERY")]
    pub health_query: Option<String>,

    /// Config file profile name
    #[arg(short = 'P', long, env = "SPICEDASH_PROFILE")]
    pub profile: Option<String>,
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// SQL query texts; each becomes one query with ref id A, B, C, ...
    pub sql: Vec<String>,

    /// Read queries from a JSON file: an array of objects carrying refId
    #[arg(short = 'r', long, conflicts_with = "sql")]
    pub request: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Parser, Debug)]
pub struct HealthArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}
