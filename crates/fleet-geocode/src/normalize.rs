//! Address input normalization
//!
//! Accepts either a newline-delimited string or an array of strings. Array
//! elements may themselves contain several lines; everything is flattened
//! into one ordered list of trimmed, non-empty addresses.

use crate::GeocodeError;
use serde_json::Value;

const INVALID_SHAPE: &str = "addresses must be a newline-delimited string or an array of strings";

/// Normalize raw address input
///
/// # Errors
///
/// * `InvalidInput` - the input has another shape, or no address survives trimming
pub fn normalize_addresses(raw: &Value) -> Result<Vec<String>, GeocodeError> {
    let mut addresses = Vec::new();

    match raw {
        Value::String(text) => push_lines(text, &mut addresses),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(text) => push_lines(text, &mut addresses),
                    _ => return Err(GeocodeError::InvalidInput(INVALID_SHAPE.to_string())),
                }
            }
        }
        _ => return Err(GeocodeError::InvalidInput(INVALID_SHAPE.to_string())),
    }

    if addresses.is_empty() {
        return Err(GeocodeError::InvalidInput(
            "No addresses provided".to_string(),
        ));
    }
    Ok(addresses)
}

fn push_lines(text: &str, out: &mut Vec<String>) {
    out.extend(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
}

/// Reject address lists longer than the caller's cap
pub fn enforce_limit(addresses: &[String], max: usize) -> Result<(), GeocodeError> {
    if addresses.len() > max {
        return Err(GeocodeError::TooMany {
            count: addresses.len(),
            max,
        });
    }
    Ok(())
}
