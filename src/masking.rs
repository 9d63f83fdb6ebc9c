use secrecy::{ExposeSecret, SecretString};

use crate::config::DatasourceSettings;

/// Format a secret value, respecting the show_secrets flag.
pub fn format_secret(secret: &SecretString, show_secrets: bool) -> String {
    if show_secrets {
        secret.expose_secret().to_string()
    } else {
        "[REDACTED]".to_string()
    }
}

/// One-line description of the effective settings for diagnostics.
pub fn describe_settings(settings: &DatasourceSettings, show_secrets: bool) -> String {
    format!(
        "endpoint={} api_key={} timeout={}s",
        settings.endpoint,
        format_secret(&settings.api_key, show_secrets),
        settings.timeout_secs
    )
}
