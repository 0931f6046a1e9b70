/// JSON-RPC 2.0 envelope.
///
/// Requests are decoded by hand from a `serde_json::Value` rather than with a
/// derived `Deserialize`, so a structurally bad envelope can still be
/// answered with the caller's `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::RpcError;

/// The only JSON-RPC version accepted.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision reported by `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Value of the `jsonrpc` member, checked by the dispatcher.
    pub jsonrpc: String,
    /// `None` means the message is a notification and gets no response.
    pub id: Option<Value>,
    pub method: String,
    /// `Value::Null` when absent.
    pub params: Value,
}

impl Request {
    /// Request with an id, i.e. one that expects a response.
    pub fn new(id: impl Into<Value>, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.to_string(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Validate the envelope of a parsed JSON document.
    ///
    /// On failure the returned response echoes the request `id` when it
    /// could be read, `null` otherwise.
    pub fn from_value(value: Value) -> Result<Self, Response> {
        let Value::Object(mut object) = value else {
            return Err(Response::error(
                Value::Null,
                &RpcError::InvalidRequest("request must be a single JSON object".into()),
            ));
        };

        let id = match object.remove("id") {
            None => None,
            Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => Some(id),
            Some(_) => {
                return Err(Response::error(
                    Value::Null,
                    &RpcError::InvalidRequest("'id' must be a string, number or null".into()),
                ));
            }
        };
        let echo = id.clone().unwrap_or(Value::Null);
        let invalid = |message: &str| {
            Response::error(echo.clone(), &RpcError::InvalidRequest(message.to_string()))
        };

        let jsonrpc = match object.remove("jsonrpc") {
            Some(Value::String(v)) => v,
            Some(_) => return Err(invalid("'jsonrpc' must be a string")),
            None => return Err(invalid("missing 'jsonrpc'")),
        };
        let method = match object.remove("method") {
            Some(Value::String(m)) => m,
            Some(_) => return Err(invalid("'method' must be a string")),
            None => return Err(invalid("missing 'method'")),
        };
        let params = match object.remove("params") {
            None | Some(Value::Null) => Value::Null,
            Some(p @ (Value::Object(_) | Value::Array(_))) => p,
            Some(_) => return Err(invalid("'params' must be an object or array")),
        };

        Ok(Self {
            jsonrpc,
            id,
            method,
            params,
        })
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
}

/// JSON-RPC 2.0 response. Exactly one of `result` and `error` is set.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorObject>,
}

impl Response {
    /// Successful response carrying `result`.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response; code and message come from `error`.
    pub fn error(id: Value, error: &RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(ErrorObject {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error_object(&self) -> Option<&ErrorObject> {
        self.error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
