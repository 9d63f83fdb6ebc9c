use secrecy::SecretString;
use spicedash::config::DatasourceSettings;
use spicedash::masking::{describe_settings, format_secret};

#[test]
fn test_secret_masked_by_default() {
    let secret = SecretString::from("my-super-secret-key".to_string());
    let output = format_secret(&secret, false);
    assert_eq!(output, "[REDACTED]");
    assert!(!output.contains("my-super-secret-key"));
}

#[test]
fn test_secret_exposed_with_show_secrets() {
    let secret = SecretString::from("my-super-secret-key".to_string());
    let output = format_secret(&secret, true);
    assert_eq!(output, "my-super-secret-key");
}

#[test]
fn test_secret_debug_is_redacted() {
    let secret = SecretString::from("key123".to_string());
    let debug_output = format!("{:?}", secret);
    assert!(!debug_output.contains("key123"), "Debug should not expose secret: {}", debug_output);
}

#[test]
fn test_settings_debug_is_redacted() {
    let settings = DatasourceSettings::new(SecretString::from("key123".to_string()));
    let debug_output = format!("{:?}", settings);
    assert!(!debug_output.contains("key123"), "Debug should not expose secret: {}", debug_output);
}

#[test]
fn test_describe_settings_masks_key() {
    let mut settings = DatasourceSettings::new(SecretString::from("key123".to_string()));
    settings.endpoint = "http://localhost:8090".to_string();
    settings.timeout_secs = 15;

    let masked = describe_settings(&settings, false);
    assert_eq!(masked, "endpoint=http://localhost:8090 api_key=[REDACTED] timeout=15s");

    let shown = describe_settings(&settings, true);
    assert!(shown.contains("api_key=key123"), "Got: {}", shown);
}
