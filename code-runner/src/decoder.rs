//! Request decoding: raw body to a validated [`ExecutionRequest`].

use base64::{engine::general_purpose, Engine as _};
use serde_json::{Map, Value};

use crate::{error::ValidationError, types::ExecutionRequest};

const LANGUAGE_FIELD: &str = "language";
const CODE_FIELD: &str = "code";

/// Decode a request body of the form `{"language": ..., "code": <base64>}`.
///
/// Nothing is executed here; a rejected body never reaches the dispatcher.
pub fn decode_request(body: &[u8]) -> Result<ExecutionRequest, ValidationError> {
    let payload: Map<String, Value> = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?;

    let language = string_field(&payload, LANGUAGE_FIELD)?;
    let encoded = string_field(&payload, CODE_FIELD)?;

    let (Some(language), Some(encoded)) = (language, encoded) else {
        return Err(ValidationError::MissingField);
    };

    Ok(ExecutionRequest {
        language: language.to_string(),
        code: decode_source(encoded)?,
    })
}

/// Base64-decode submitted source and require it to be UTF-8 text.
///
/// ASCII whitespace is ignored, so output wrapped by `base64(1)` or MIME
/// encoders decodes as-is. Padding is still required.
pub fn decode_source(encoded: &str) -> Result<String, ValidationError> {
    let bytes = if encoded.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        general_purpose::STANDARD.decode(compact)
    } else {
        general_purpose::STANDARD.decode(encoded)
    }
    .map_err(|e| ValidationError::Decoding(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| ValidationError::Decoding(e.to_string()))
}

/// Inverse of [`decode_source`].
pub fn encode_source(source: &str) -> String {
    general_purpose::STANDARD.encode(source.as_bytes())
}

/// Absent, `null` and `""` all count as missing.
fn string_field<'a>(
    payload: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a str>, ValidationError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ValidationError::MalformedPayload(format!(
            "field `{}` must be a string, got {}",
            name,
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
