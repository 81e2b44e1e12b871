//! Result payload classification and error decoding.
//!
//! The board only needs to peek at the leading byte of a payload to decide
//! whether a callback receives a value or an error. Full decoding of error
//! reports happens here so the board never parses CBOR itself.

use ciborium::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{cbor, CodecError, Result, ResultErrorCode, ERROR_TAG, ERROR_TAG_BYTE};

/// Whether a payload carries a value or an error report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Value,
    Error,
}

/// Classify a payload by its leading byte. Returns `None` for empty payloads.
pub fn classify(payload: &[u8]) -> Option<ResultKind> {
    match payload.first() {
        None => None,
        Some(&ERROR_TAG_BYTE) => Some(ResultKind::Error),
        Some(_) => Some(ResultKind::Value),
    }
}

/// A decoded error report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultError {
    pub code: ResultErrorCode,
    /// The raw numeric code, when one was present.
    pub raw_code: Option<u64>,
    /// Remaining elements of the report, rendered as text.
    pub context: Vec<String>,
}

impl ResultError {
    /// An error report that could not be interpreted.
    pub fn unknown() -> Self {
        Self {
            code: ResultErrorCode::Unknown,
            raw_code: None,
            context: Vec::new(),
        }
    }

    /// Human-readable reason, including the report context when present.
    pub fn reason(&self) -> String {
        if self.context.is_empty() {
            self.code.description().to_string()
        } else {
            format!("{}: {}", self.code.description(), self.context.join(", "))
        }
    }
}

/// Decode an error report `tag(39, [code, context...])`.
///
/// Reports with fewer than two elements decode to [`ResultErrorCode::Unknown`].
///
/// # Errors
///
/// - [`CodecError::EmptyPayload`] if the payload is empty
/// - [`CodecError::Deserialization`] if the payload is not valid CBOR
/// - [`CodecError::NotAnError`] if the payload is not tagged as an error
pub fn decode_error(payload: &[u8]) -> Result<ResultError> {
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    let inner = match cbor::value_from_slice(payload)? {
        Value::Tag(ERROR_TAG, inner) => *inner,
        _ => return Err(CodecError::NotAnError),
    };
    let items = match inner {
        Value::Array(items) => items,
        other => vec![other],
    };
    if items.len() < 2 {
        return Ok(ResultError::unknown());
    }

    let raw_code = items[0]
        .as_integer()
        .and_then(|code| u64::try_from(code).ok());
    let code = raw_code
        .map(ResultErrorCode::from_u64)
        .unwrap_or(ResultErrorCode::Unknown);
    let context = items[1..].iter().map(render).collect();

    Ok(ResultError {
        code,
        raw_code,
        context,
    })
}

/// Encode an error report with the given code and context values.
pub fn encode_error(code: ResultErrorCode, context: &[Value]) -> Result<Vec<u8>> {
    let mut items = Vec::with_capacity(1 + context.len());
    items.push(Value::Integer(code.as_u8().into()));
    items.extend_from_slice(context);
    cbor::to_vec(&Value::Tag(ERROR_TAG, Box::new(Value::Array(items))))
}

/// Decode a value payload into `T`.
///
/// # Errors
///
/// - [`CodecError::EmptyPayload`] if the payload is empty
/// - [`CodecError::Deserialization`] if the payload is an error report or
///   does not decode into `T`
pub fn decode_value<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    match classify(payload) {
        None => Err(CodecError::EmptyPayload),
        Some(ResultKind::Error) => Err(CodecError::Deserialization(
            "payload is an error report".to_string(),
        )),
        Some(ResultKind::Value) => cbor::from_slice(payload),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        Value::Integer(int) => i128::from(*int).to_string(),
        Value::Bytes(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        Value::Bool(flag) => flag.to_string(),
        Value::Float(float) => float.to_string(),
        Value::Null => "null".to_string(),
        other => format!("{other:?}"),
    }
}
