use crate::error::SpicedashError;
use serde_json::Value;

/// Pretty-print a JSON document to stdout.
pub fn print_json(value: &Value) -> Result<(), SpicedashError> {
    let text = to_pretty_json(value)?;
    println!("{}", text);
    Ok(())
}

pub fn to_pretty_json(value: &Value) -> Result<String, SpicedashError> {
    serde_json::to_string_pretty(value).map_err(|e| SpicedashError::Format {
        message: e.to_string(),
    })
}

/// Print error to stderr in the contract format: error: <category>: <message>
pub fn print_error(err: &SpicedashError) {
    eprintln!("error: {}", err);
}

/// Print a warning to stderr for interactive visibility.
pub fn print_warning(message: &str) {
    eprintln!("warning: {}", message);
}
