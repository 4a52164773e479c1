//! Normalizes the remote backend's two interchangeable response
//! envelopes into a single `(ok, data, message)` shape. See `spec.md` §4.3
//! and §9 ("keep the normalization in one place").

use crate::errors::EngineError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnvelope {
    Typed {
        #[serde(rename = "type")]
        kind: String,
        message: Option<String>,
        #[serde(default)]
        data: Value,
    },
    Flagged {
        success: bool,
        message: Option<String>,
        #[serde(default)]
        data: Value,
    },
}

/// Normalized envelope: `Ok(data)` on success, `Err(APIError)` carrying
/// the server message otherwise.
pub fn normalize_envelope(body: &[u8]) -> Result<Value, EngineError> {
    let raw: RawEnvelope = serde_json::from_slice(body)?;
    match raw {
        RawEnvelope::Typed { kind, message, data } => {
            if kind == "3" {
                Err(EngineError::PermanentBackend(
                    message.unwrap_or_else(|| "remote API error".to_string()),
                ))
            } else {
                Ok(data)
            }
        }
        RawEnvelope::Flagged { success, message, data } => {
            if success {
                Ok(data)
            } else {
                Err(EngineError::PermanentBackend(
                    message.unwrap_or_else(|| "remote API error".to_string()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_typed_success() {
        let body = br#"{"type":"1","message":"ok","data":{"x":1}}"#;
        let data = normalize_envelope(body).unwrap();
        assert_eq!(data["x"], 1);
    }

    #[test]
    fn normalizes_typed_error() {
        let body = br#"{"type":"3","message":"boom","data":null}"#;
        let err = normalize_envelope(body).unwrap_err();
        assert!(matches!(err, EngineError::PermanentBackend(m) if m == "boom"));
    }

    #[test]
    fn normalizes_flagged_success() {
        let body = br#"{"success":true,"data":{"y":2}}"#;
        let data = normalize_envelope(body).unwrap();
        assert_eq!(data["y"], 2);
    }

    #[test]
    fn normalizes_flagged_error() {
        let body = br#"{"success":false,"message":"nope"}"#;
        let err = normalize_envelope(body).unwrap_err();
        assert!(matches!(err, EngineError::PermanentBackend(m) if m == "nope"));
    }
}
