//! JSON-RPC 2.0 wire types and codec.
//!
//! Inbound messages are classified by field presence: `id` + `method` is a
//! request, `method` alone is a notification, `id` alone is a response. A
//! response must carry exactly one of `result` or `error`. Anything else is
//! rejected with the appropriate standard error code, and the original `id`
//! is preserved whenever it can be recovered, including from syntactically
//! broken input, via [`extract_raw_id`].

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes, plus the library's timeout code.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Fired by the request tracker when a pending request's deadline passes.
    pub const REQUEST_TIMEOUT: i64 = -32001;

    /// Drained into pending callbacks when the caller cancels a request.
    pub const REQUEST_CANCELLED: i64 = -32800;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}

/// Marker type that serializes as the literal `"2.0"` and rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(D::Error::custom(format!(
                "unsupported jsonrpc version: {version}"
            )))
        }
    }
}

/// A JSON-RPC request id: integer, string, or null.
///
/// `Null` is only valid as the id of an error response to a request whose id
/// could not be parsed; the tracker never allocates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

impl RequestId {
    pub fn is_null(&self) -> bool {
        matches!(self, RequestId::Null)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// A JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion,
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification (no id, no response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(error_codes::PARSE_ERROR, "Parse error", None)
    }

    pub fn invalid_request(detail: Option<String>) -> Self {
        Self::new(
            error_codes::INVALID_REQUEST,
            detail.unwrap_or_else(|| "Invalid Request".to_string()),
            None,
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method '{method}' not found"),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message, None)
    }

    pub fn internal_error(detail: Option<String>) -> Self {
        Self::new(
            error_codes::INTERNAL_ERROR,
            detail.unwrap_or_else(|| "Internal error".to_string()),
            None,
        )
    }

    pub fn request_timeout() -> Self {
        Self::new(error_codes::REQUEST_TIMEOUT, "Request timed out", None)
    }

    pub fn request_cancelled(reason: Option<String>) -> Self {
        Self::new(
            error_codes::REQUEST_CANCELLED,
            reason.unwrap_or_else(|| "Request cancelled".to_string()),
            None,
        )
    }
}

impl fmt::Display for JsonRpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// Exactly one of `result` or `error`, flattened into the response object.
///
/// The `Error` arm is listed first so untagged deserialization prefers it
/// when both keys are somehow present; [`parse_message`] rejects that case
/// before typed deserialization ever runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Error { error: JsonRpcErrorObject },
    Success { result: Value },
}

/// A JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion,
            id,
            payload: ResponsePayload::Success { result },
        }
    }

    pub fn error(id: RequestId, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion,
            id,
            payload: ResponsePayload::Error { error },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Success { result } => Some(result),
            ResponsePayload::Error { .. } => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        match &self.payload {
            ResponsePayload::Error { error } => Some(error),
            ResponsePayload::Success { .. } => None,
        }
    }
}

/// Unified JSON-RPC message type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Serialize to the single-line wire form. The transport appends its own
    /// terminator; the JSON itself never contains a raw newline.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(r: JsonRpcRequest) -> Self {
        JsonRpcMessage::Request(r)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(r: JsonRpcResponse) -> Self {
        JsonRpcMessage::Response(r)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(n: JsonRpcNotification) -> Self {
        JsonRpcMessage::Notification(n)
    }
}

/// Why an inbound byte sequence could not become a [`JsonRpcMessage`].
///
/// Carries the id to answer with: the extracted one when it is legible,
/// `RequestId::Null` as a last resort.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub id: RequestId,
    pub error: JsonRpcErrorObject,
}

impl ParseFailure {
    fn invalid(id: RequestId, detail: &str) -> Self {
        Self {
            id,
            error: JsonRpcErrorObject::invalid_request(Some(detail.to_string())),
        }
    }

    /// Build the error response this failure maps to.
    pub fn into_response(self) -> JsonRpcResponse {
        JsonRpcResponse::error(self.id, self.error)
    }
}

fn id_from_value(value: &Value) -> Option<RequestId> {
    match value {
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Null => Some(RequestId::Null),
        _ => None,
    }
}

/// Parse one complete JSON message into a classified JSON-RPC value.
pub fn parse_message(raw: &str) -> Result<JsonRpcMessage, ParseFailure> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            return Err(ParseFailure {
                id: extract_raw_id(raw).unwrap_or(RequestId::Null),
                error: JsonRpcErrorObject::parse_error(),
            });
        }
    };

    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return Err(ParseFailure::invalid(RequestId::Null, "message must be an object")),
    };

    // Best-effort id for error correlation on the remaining checks.
    let id = obj.get("id").and_then(id_from_value);
    let correlation_id = id.clone().unwrap_or(RequestId::Null);

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        _ => return Err(ParseFailure::invalid(correlation_id, "jsonrpc must be \"2.0\"")),
    }

    let has_method = obj.contains_key("method");
    let has_id = obj.contains_key("id");

    if has_method {
        let method = match obj.get("method").and_then(Value::as_str) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => {
                return Err(ParseFailure::invalid(
                    correlation_id,
                    "method must be a non-empty string",
                ));
            }
        };
        let params = obj.get("params").cloned();
        if let Some(p) = &params {
            if !p.is_object() && !p.is_array() {
                return Err(ParseFailure::invalid(
                    correlation_id,
                    "params must be an object or array",
                ));
            }
        }
        if has_id {
            let id = match id {
                Some(id) if !id.is_null() => id,
                _ => {
                    return Err(ParseFailure::invalid(
                        RequestId::Null,
                        "request id must be an integer or string",
                    ));
                }
            };
            return Ok(JsonRpcMessage::Request(JsonRpcRequest {
                version: JsonRpcVersion,
                id,
                method,
                params,
            }));
        }
        return Ok(JsonRpcMessage::Notification(JsonRpcNotification {
            version: JsonRpcVersion,
            method,
            params,
        }));
    }

    if has_id {
        let id = match id {
            Some(id) => id,
            None => {
                return Err(ParseFailure::invalid(
                    RequestId::Null,
                    "response id must be an integer, string, or null",
                ));
            }
        };
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");
        let payload = match (has_result, has_error) {
            (true, false) => ResponsePayload::Success {
                result: obj.get("result").cloned().unwrap_or(Value::Null),
            },
            (false, true) => {
                let error: JsonRpcErrorObject =
                    serde_json::from_value(obj.get("error").cloned().unwrap_or(Value::Null))
                        .map_err(|_| {
                            ParseFailure::invalid(id.clone(), "malformed error object")
                        })?;
                ResponsePayload::Error { error }
            }
            _ => {
                return Err(ParseFailure::invalid(
                    id,
                    "response must carry exactly one of result or error",
                ));
            }
        };
        return Ok(JsonRpcMessage::Response(JsonRpcResponse {
            version: JsonRpcVersion,
            id,
            payload,
        }));
    }

    Err(ParseFailure::invalid(
        RequestId::Null,
        "message has neither method nor id",
    ))
}

/// Tolerant scan for an `"id"` value in bytes that failed full JSON parsing.
///
/// Recognises the integer, quoted-string, and literal `null` forms. The first
/// legible candidate wins; on a well-formed message the real parser would
/// have succeeded, so ambiguity here only arises on input that is already
/// broken.
pub fn extract_raw_id(raw: &str) -> Option<RequestId> {
    let bytes = raw.as_bytes();
    let mut search_from = 0;
    while let Some(found) = find_key(bytes, search_from) {
        let mut i = found;
        // Skip whitespace, expect ':'
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b':' {
            search_from = found;
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        match bytes[i] {
            b'-' | b'0'..=b'9' => {
                let start = i;
                if bytes[i] == b'-' {
                    i += 1;
                }
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = raw[start..i].parse::<i64>() {
                    return Some(RequestId::Number(n));
                }
            }
            b'"' => {
                i += 1;
                let start = i;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 2,
                        b'"' => {
                            // Escapes are left as-is: a broken message's id is
                            // echoed back in the byte form it arrived in.
                            if let Ok(s) = std::str::from_utf8(&bytes[start..i]) {
                                return Some(RequestId::String(s.to_string()));
                            }
                            break;
                        }
                        _ => i += 1,
                    }
                }
            }
            b'n' => {
                if raw[i..].starts_with("null") {
                    return Some(RequestId::Null);
                }
            }
            _ => {}
        }
        search_from = found;
    }
    None
}

/// Find the byte offset just past a `"id"` key, starting the search at `from`.
fn find_key(bytes: &[u8], from: usize) -> Option<usize> {
    const KEY: &[u8] = b"\"id\"";
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(KEY.len())
        .position(|w| w == KEY)
        .map(|pos| from + pos + KEY.len())
}
