//! JSON payload representations.

use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// A payload accepted by the JSON validator.
///
/// Each variant has exactly one conversion into a [`Value`]: trees and
/// objects are used as-is, text and bytes are parsed as JSON.
///
/// # Example
///
/// ```rust
/// use schemaguard::json::JsonPayload;
/// use serde_json::json;
///
/// let text = JsonPayload::from(r#"{"message": "hello"}"#);
/// assert_eq!(text.into_value().unwrap(), json!({"message": "hello"}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPayload {
    /// An already parsed JSON tree.
    Value(Value),
    /// A JSON object.
    Map(Map<String, Value>),
    /// JSON text.
    Text(String),
    /// JSON encoded as UTF-8 bytes.
    Bytes(Vec<u8>),
}

impl JsonPayload {
    /// Serializes any `serde` value into a payload.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, PayloadError> {
        serde_json::to_value(value)
            .map(JsonPayload::Value)
            .map_err(PayloadError::Serialize)
    }

    /// Returns the JSON tree, borrowing it when no parsing is needed.
    pub fn as_value(&self) -> Result<Cow<'_, Value>, PayloadError> {
        match self {
            JsonPayload::Value(value) => Ok(Cow::Borrowed(value)),
            JsonPayload::Map(map) => Ok(Cow::Owned(Value::Object(map.clone()))),
            JsonPayload::Text(text) => Ok(Cow::Owned(serde_json::from_str(text)?)),
            JsonPayload::Bytes(bytes) => Ok(Cow::Owned(serde_json::from_slice(bytes)?)),
        }
    }

    /// Converts into the JSON tree.
    pub fn into_value(self) -> Result<Value, PayloadError> {
        match self {
            JsonPayload::Value(value) => Ok(value),
            JsonPayload::Map(map) => Ok(Value::Object(map)),
            JsonPayload::Text(text) => Ok(serde_json::from_str(&text)?),
            JsonPayload::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }
}

impl From<Value> for JsonPayload {
    fn from(value: Value) -> Self {
        JsonPayload::Value(value)
    }
}

impl From<Map<String, Value>> for JsonPayload {
    fn from(map: Map<String, Value>) -> Self {
        JsonPayload::Map(map)
    }
}

impl From<String> for JsonPayload {
    fn from(text: String) -> Self {
        JsonPayload::Text(text)
    }
}

impl From<&str> for JsonPayload {
    fn from(text: &str) -> Self {
        JsonPayload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for JsonPayload {
    fn from(bytes: Vec<u8>) -> Self {
        JsonPayload::Bytes(bytes)
    }
}

impl From<&[u8]> for JsonPayload {
    fn from(bytes: &[u8]) -> Self {
        JsonPayload::Bytes(bytes.to_vec())
    }
}

/// Errors that can occur while converting a payload to JSON.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Text or bytes are not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A value could not be serialized.
    #[error("payload could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),
}
