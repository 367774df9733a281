//! Versioned encoding of stored payloads
//!
//! Models and tables are stored as JSON envelopes
//! `{"format": <kind>, "version": 1, "payload": ...}` so that a record
//! written by one release can be recognised (or rejected) by another.

use crate::error::{ProphetError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current envelope version
pub const CODEC_VERSION: u32 = 1;

/// Kind of payload carried by an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Fitted model state
    Model,
    /// Prediction rows
    ForecastTable,
    /// Source `(ds, y)` rows
    SourceTable,
    /// Held-out predictions of a cross-validation
    CrossValidationTable,
    /// Per-horizon error metrics
    MetricsTable,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayloadKind::Model => "model",
            PayloadKind::ForecastTable => "forecast_table",
            PayloadKind::SourceTable => "source_table",
            PayloadKind::CrossValidationTable => "cross_validation_table",
            PayloadKind::MetricsTable => "metrics_table",
        };
        f.write_str(name)
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format: PayloadKind,
    version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    format: PayloadKind,
    version: u32,
    payload: T,
}

/// Encode a payload of the given kind
pub fn encode<T: Serialize>(kind: PayloadKind, payload: &T) -> Result<Vec<u8>> {
    let envelope = EnvelopeRef {
        format: kind,
        version: CODEC_VERSION,
        payload,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode a payload, checking its kind and version
pub fn decode<T: DeserializeOwned>(kind: PayloadKind, bytes: &[u8]) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_slice(bytes)
        .map_err(|e| ProphetError::Codec(format!("cannot decode {}: {}", kind, e)))?;

    if envelope.format != kind {
        return Err(ProphetError::Codec(format!(
            "expected a {} payload, found {}",
            kind, envelope.format
        )));
    }
    if envelope.version != CODEC_VERSION {
        return Err(ProphetError::Codec(format!(
            "unsupported {} version {} (expected {})",
            kind, envelope.version, CODEC_VERSION
        )));
    }
    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_checked() {
        let bytes = encode(PayloadKind::SourceTable, &vec![1.0, 2.0]).unwrap();

        let decoded: Vec<f64> = decode(PayloadKind::SourceTable, &bytes).unwrap();
        assert_eq!(decoded, vec![1.0, 2.0]);

        let wrong: Result<Vec<f64>> = decode(PayloadKind::Model, &bytes);
        assert!(matches!(wrong, Err(ProphetError::Codec(_))));
    }

    #[test]
    fn test_version_is_checked() {
        let bytes = br#"{"format":"metrics_table","version":7,"payload":[]}"#;
        let result: Result<Vec<f64>> = decode(PayloadKind::MetricsTable, bytes);
        assert!(matches!(result, Err(ProphetError::Codec(msg)) if msg.contains("version 7")));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result: Result<Vec<f64>> = decode(PayloadKind::ForecastTable, b"\x80\x04pickle");
        assert!(result.is_err());
    }
}
