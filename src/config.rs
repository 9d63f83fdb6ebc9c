use crate::cli::ConnectionArgs;
use crate::error::SpicedashError;
use directories::ProjectDirs;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://data.spiceai.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_QUERY: &str = "SELECT number FROM eth.recent_blocks LIMIT 1";

/// Connection parameters for one datasource instance.
#[derive(Debug)]
pub struct DatasourceSettings {
    pub endpoint: String,
    pub api_key: SecretString,
    pub timeout_secs: u64,
    pub health_query: String,
}

impl DatasourceSettings {
    /// Settings with every optional value at its default.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            health_query: DEFAULT_HEALTH_QUERY.to_string(),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build settings from what the host hands over for an instance.
    pub fn from_instance(instance: &InstanceSettings) -> Result<Self, SpicedashError> {
        let json_data: InstanceJsonData = if instance.json_data.is_null() {
            InstanceJsonData::default()
        } else {
            serde_json::from_value(instance.json_data.clone()).map_err(|e| {
                SpicedashError::Config {
                    message: format!("invalid instance settings: {e}"),
                }
            })?
        };

        let api_key = non_empty(
            instance
                .decrypted_secure_json_data
                .get("apiKey")
                .map(String::as_str),
        )
        .ok_or_else(|| SpicedashError::Config {
            message: "missing api key".to_string(),
        })?;

        let mut settings = Self::new(SecretString::from(api_key.to_string()));
        // the host's config editor stores the address as `flightAddress`
        let address = non_empty(json_data.endpoint.as_deref())
            .or(non_empty(json_data.flight_address.as_deref()));
        if let Some(address) = address {
            settings.endpoint = with_default_scheme(address);
        }
        if let Some(timeout) = json_data.timeout_seconds {
            settings.timeout_secs = timeout;
        }
        if let Some(query) = non_empty(json_data.health_query.as_deref()) {
            settings.health_query = query.to_string();
        }
        Ok(settings)
    }
}

/// Addresses saved without a scheme (`host:port`) are taken as https.
fn with_default_scheme(address: &str) -> String {
    let address = address.trim();
    if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{address}")
    }
}

/// Instance settings as delivered by the host: plain JSON options plus the
/// already-decrypted secure values.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    #[serde(default)]
    pub json_data: serde_json::Value,
    #[serde(default)]
    pub decrypted_secure_json_data: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceJsonData {
    endpoint: Option<String>,
    flight_address: Option<String>,
    timeout_seconds: Option<u64>,
    health_query: Option<String>,
}

/// Top-level configuration for the command-line host.
#[derive(Debug)]
pub struct AppConfig {
    pub settings: DatasourceSettings,
    pub verbose: bool,
    pub show_secrets: bool,
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlDefaults,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDefaults {
    endpoint: Option<String>,
    timeout: Option<u64>,
    verbose: Option<bool>,
    health_query: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    endpoint: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    timeout: Option<u64>,
    health_query: Option<String>,
}

/// Config path resolution result, telling explicit paths from auto-resolved ones.
struct ResolvedConfigPath {
    path: PathBuf,
    /// true if the user named the file via --config or SPICEDASH_CONFIG
    explicit: bool,
}

/// Resolve the config file path: --config flag > env var > platform default.
fn resolve_config_path(cli_config: Option<&PathBuf>) -> Option<ResolvedConfigPath> {
    if let Some(path) = cli_config {
        return Some(ResolvedConfigPath {
            path: path.clone(),
            explicit: true,
        });
    }
    if let Some(path) = env_non_empty("SPICEDASH_CONFIG") {
        return Some(ResolvedConfigPath {
            path: PathBuf::from(path),
            explicit: true,
        });
    }
    ProjectDirs::from("", "", "spicedash").map(|dirs| ResolvedConfigPath {
        path: dirs.config_dir().join("config.toml"),
        explicit: false,
    })
}

/// Load and parse the TOML config file (if it exists).
fn load_toml_config(resolved: Option<&ResolvedConfigPath>) -> Result<TomlConfig, SpicedashError> {
    let resolved = match resolved {
        Some(r) => r,
        None => return Ok(TomlConfig::default()),
    };

    if !resolved.path.exists() {
        if resolved.explicit {
            return Err(SpicedashError::Config {
                message: format!("config file not found: {}", resolved.path.display()),
            });
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&resolved.path).map_err(|e| SpicedashError::Config {
        message: format!("cannot read config file {}: {}", resolved.path.display(), e),
    })?;

    toml::from_str(&content).map_err(|e| SpicedashError::Config {
        message: format!("invalid config file {}: {}", resolved.path.display(), e),
    })
}

/// Treat empty strings as unset.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Read an environment variable, treating an empty value as unset.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve a secret from a direct value, env indirection, or fallback env var.
fn resolve_secret(
    direct: Option<&str>,
    env_key: Option<&str>,
    fallback_env: &str,
) -> Option<SecretString> {
    if let Some(val) = non_empty(direct) {
        return Some(SecretString::from(val.to_string()));
    }
    if let Some(val) = env_key.and_then(env_non_empty) {
        return Some(SecretString::from(val));
    }
    env_non_empty(fallback_env).map(SecretString::from)
}

pub fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

/// Build AppConfig from connection flags: CLI/ENV > profile > defaults.
pub fn load_from_args(
    args: &ConnectionArgs,
    verbose: bool,
    show_secrets: bool,
    config_path: Option<&PathBuf>,
) -> Result<AppConfig, SpicedashError> {
    let resolved_path = resolve_config_path(config_path);
    let toml_config = load_toml_config(resolved_path.as_ref())?;

    let profile = args
        .profile
        .as_ref()
        .map(|name| {
            toml_config
                .profiles
                .get(name)
                .cloned()
                .ok_or_else(|| SpicedashError::Config {
                    message: format!("profile '{}' not found in config file", name),
                })
        })
        .transpose()?
        .unwrap_or_default();

    let api_key = resolve_secret(
        args.api_key.as_deref(),
        profile.api_key_env.as_deref(),
        "SPICEDASH_API_KEY",
    )
    .or_else(|| {
        non_empty(profile.api_key.as_deref()).map(|k| SecretString::from(k.to_string()))
    })
    .ok_or_else(|| SpicedashError::Config {
        message: "no api key specified; use --api-key or configure a profile".to_string(),
    })?;

    let endpoint = non_empty(args.endpoint.as_deref())
        .or(non_empty(profile.endpoint.as_deref()))
        .or(non_empty(toml_config.defaults.endpoint.as_deref()))
        .unwrap_or(DEFAULT_ENDPOINT)
        .to_string();

    let timeout_secs = args
        .timeout
        .or(profile.timeout)
        .or(toml_config.defaults.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let health_query = non_empty(args.health_query.as_deref())
        .or(non_empty(profile.health_query.as_deref()))
        .or(non_empty(toml_config.defaults.health_query.as_deref()))
        .unwrap_or(DEFAULT_HEALTH_QUERY)
        .to_string();

    let verbose = verbose || toml_config.defaults.verbose.unwrap_or(false);

    Ok(AppConfig {
        settings: DatasourceSettings {
            endpoint,
            api_key,
            timeout_secs,
            health_query,
        },
        verbose,
        show_secrets,
    })
}
