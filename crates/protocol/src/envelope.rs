//! JSON-RPC 2.0 envelope types.
//!
//! Requests carry a correlation `id` (string or number); an absent `id`
//! marks a notification and suppresses the response. Every non-notification
//! request receives exactly one response with the same `id`, success or
//! error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use palaver_core::error::{Error, ProtocolError};

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard and server-defined error codes.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// An external dependency (backend or store) failed after retries.
    pub const UPSTREAM_FAILURE: i64 = -32000;

    /// Inference produced a response but the turn was not durably recorded.
    pub const NOT_RECORDED: i64 = -32002;
}

/// An inbound request envelope after shape validation.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub method: String,

    /// Correlation token; `None` marks a notification.
    pub id: Option<Value>,

    #[serde(default)]
    pub params: Value,
}

/// An outbound response envelope. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    pub id: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn error_with_data(id: Value, code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
                data: Some(data),
            }),
        }
    }

    /// Build the error response for a handler failure, echoing `id`.
    ///
    /// Backend and store failures are translated to structured codes;
    /// internal details never leak beyond the typed error's own message.
    pub fn from_error(id: Value, err: &Error) -> Self {
        match err {
            Error::Protocol(p) => Self::error(id, protocol_code(p), p.to_string()),
            Error::Context(c) => Self::error(id, codes::INVALID_PARAMS, c.to_string()),
            Error::Backend(b) => Self::error(id, codes::UPSTREAM_FAILURE, b.to_string()),
            Error::Store(s) => Self::error(id, codes::UPSTREAM_FAILURE, s.to_string()),
            Error::ResponseNotRecorded {
                conversation_id,
                response,
                source,
            } => Self::error_with_data(
                id,
                codes::NOT_RECORDED,
                format!("Response generated but not recorded: {source}"),
                serde_json::json!({
                    "conversation_id": conversation_id,
                    "response": response,
                }),
            ),
            Error::Config { message } => Self::error(id, codes::INTERNAL_ERROR, message.clone()),
            Error::Serialization(_) | Error::Internal(_) => {
                Self::error(id, codes::INTERNAL_ERROR, err.to_string())
            }
        }
    }
}

fn protocol_code(err: &ProtocolError) -> i64 {
    match err {
        ProtocolError::ParseError(_) => codes::PARSE_ERROR,
        ProtocolError::InvalidRequest(_) => codes::INVALID_REQUEST,
        ProtocolError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
        ProtocolError::InvalidParams(_) => codes::INVALID_PARAMS,
        ProtocolError::CapabilityNotFound(_) => codes::INVALID_REQUEST,
    }
}

/// Parse a raw envelope body into a request.
///
/// Distinguishes the two failure levels: bytes that are not JSON at all
/// (`ParseError`, responded with a `null` id) and JSON that is not a valid
/// request envelope (`InvalidRequest`, `id` echoed when present).
pub fn parse_request(raw: &str) -> Result<JsonRpcRequest, (Option<Value>, ProtocolError)> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| (None, ProtocolError::ParseError(e.to_string())))?;

    // The id is recoverable even from an otherwise invalid envelope; a
    // JSON `null` id is treated as absent.
    let id = value.get("id").cloned().filter(|v| !v.is_null());

    let Some(obj) = value.as_object() else {
        return Err((
            id,
            ProtocolError::InvalidRequest("envelope must be a JSON object".into()),
        ));
    };

    let method = match obj.get("method").and_then(Value::as_str) {
        Some(m) => m.to_string(),
        None => {
            return Err((
                id,
                ProtocolError::InvalidRequest("missing or non-string 'method'".into()),
            ));
        }
    };

    match id {
        Some(ref i) if !i.is_string() && !i.is_number() => Err((
            None,
            ProtocolError::InvalidRequest("'id' must be a string or number".into()),
        )),
        _ => Ok(JsonRpcRequest {
            method,
            id,
            params: obj.get("params").cloned().unwrap_or(Value::Null),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_request() {
        let req = parse_request(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#).unwrap();
        assert_eq!(req.method, "tools/list");
        assert_eq!(req.id, Some(json!(7)));
        assert!(req.params.is_null());
    }

    #[test]
    fn absent_id_is_notification() {
        let req =
            parse_request(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(req.id.is_none());
    }

    #[test]
    fn null_id_treated_as_notification() {
        let req = parse_request(r#"{"jsonrpc":"2.0","id":null,"method":"x"}"#).unwrap();
        assert!(req.id.is_none());
    }

    #[test]
    fn garbage_is_parse_error() {
        let (id, err) = parse_request("{not json").unwrap_err();
        assert!(id.is_none());
        assert!(matches!(err, ProtocolError::ParseError(_)));
    }

    #[test]
    fn missing_method_echoes_id() {
        let (id, err) = parse_request(r#"{"jsonrpc":"2.0","id":"abc"}"#).unwrap_err();
        assert_eq!(id, Some(json!("abc")));
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }

    #[test]
    fn success_response_omits_error_field() {
        let resp = JsonRpcResponse::success(json!(1), json!({"ok": true}));
        let wire = serde_json::to_string(&resp).unwrap();
        assert!(!wire.contains("\"error\""));
        assert!(wire.contains("\"result\""));
    }

    #[test]
    fn error_response_carries_code() {
        let resp = JsonRpcResponse::error(json!(1), codes::METHOD_NOT_FOUND, "no such method");
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[test]
    fn not_recorded_maps_to_distinct_code() {
        let err = Error::ResponseNotRecorded {
            conversation_id: "conv-1".into(),
            response: "the answer".into(),
            source: palaver_core::error::StoreError::Unavailable("down".into()),
        };
        let resp = JsonRpcResponse::from_error(json!(1), &err);
        let obj = resp.error.unwrap();
        assert_eq!(obj.code, codes::NOT_RECORDED);
        assert_eq!(obj.data.unwrap()["response"], "the answer");
    }

    #[test]
    fn backend_failure_maps_to_upstream_code() {
        let err = Error::Backend(palaver_core::error::BackendError::Timeout("slow".into()));
        let resp = JsonRpcResponse::from_error(json!(1), &err);
        assert_eq!(resp.error.unwrap().code, codes::UPSTREAM_FAILURE);
    }
}
