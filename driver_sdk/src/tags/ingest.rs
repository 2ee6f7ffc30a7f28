//! Parsing of raw readings as they arrive from drivers or the REST API.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("unparsable raw value: {0}")]
    Unparsable(String),

    #[error("unknown tag {tag} on device {device}")]
    UnknownTag { device: String, tag: String },
}

/// Parse an untyped raw reading. `null` means "no sample".
pub fn parse_raw(value: &Value) -> Result<Option<Decimal>, IngestError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(if *b { Decimal::ONE } else { Decimal::ZERO })),
        // Go through the textual form so 0.1 stays 0.1
        Value::Number(n) => parse_str(&n.to_string()).map(Some),
        Value::String(s) => parse_str(s.trim()).map(Some),
        other => Err(IngestError::Unparsable(other.to_string())),
    }
}

fn parse_str(s: &str) -> Result<Decimal, IngestError> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| IngestError::Unparsable(s.to_string()))
}
