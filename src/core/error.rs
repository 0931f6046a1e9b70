/// Error types for the server.
///
/// Each layer has its own enum; `RpcError` is the one that reaches the wire
/// and knows its JSON-RPC error code.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::core::bridge::TaskId;

/// JSON-RPC 2.0 error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Error returned by a tool or resource handler.
///
/// Carries only a message; the dispatcher adds the failure category when it
/// reports the error to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create an error with the message the client will see.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// What went wrong while a task ran on the host thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The handler returned an error.
    Handler,
    /// The handler panicked.
    Panic,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler => f.write_str("handler error"),
            Self::Panic => f.write_str("handler panicked"),
        }
    }
}

/// Failure description captured on the host thread and handed back to the
/// submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category}: {message}")]
pub struct TaskFailure {
    pub category: FailureCategory,
    pub message: String,
}

/// Registration and lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handler '{0}' is already registered")]
    DuplicateName(String),

    #[error("handler '{0}' not found")]
    NotFound(String),

    #[error("invalid uri template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// Outcome of a bridge submission that did not produce a value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("{0}")]
    Failed(TaskFailure),

    #[error("task {id} timed out after {}ms", timeout.as_millis())]
    TimedOut { id: TaskId, timeout: Duration },

    #[error("host thread is not accepting tasks")]
    Stopped,

    #[error("task {0} was discarded before it ran")]
    Abandoned(TaskId),
}

/// Parameter validation failures.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("arguments must be an object")]
    NotAnObject,

    #[error("missing required parameter: {0}")]
    MissingRequired(String),

    #[error("parameter '{name}' must be of type {expected}")]
    WrongType { name: String, expected: &'static str },

    #[error("parameter '{name}' {constraint}")]
    Constraint { name: String, constraint: String },

    #[error("unexpected parameter: {0}")]
    Unexpected(String),
}

/// Startup configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Errors that end up in a JSON-RPC error response.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported JSON-RPC version: {0}")]
    UnsupportedVersion(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Execution error: {0}")]
    Execution(TaskFailure),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Host unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => codes::PARSE_ERROR,
            Self::InvalidRequest(_) | Self::UnsupportedVersion(_) => codes::INVALID_REQUEST,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) | Self::ResourceNotFound(_) => {
                codes::METHOD_NOT_FOUND
            }
            Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::Execution(_) | Self::Timeout(_) | Self::Unavailable(_) | Self::Internal(_) => {
                codes::INTERNAL_ERROR
            }
        }
    }
}

impl From<SchemaError> for RpcError {
    fn from(e: SchemaError) -> Self {
        Self::InvalidParams(e.to_string())
    }
}

impl From<BridgeError> for RpcError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Failed(failure) => Self::Execution(failure),
            e @ BridgeError::TimedOut { .. } => Self::Timeout(e.to_string()),
            e @ (BridgeError::Stopped | BridgeError::Abandoned(_)) => {
                Self::Unavailable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_jsonrpc_reserved_ranges() {
        assert_eq!(RpcError::Parse("x".into()).code(), -32700);
        assert_eq!(RpcError::UnsupportedVersion("1.0".into()).code(), -32600);
        assert_eq!(RpcError::ToolNotFound("x".into()).code(), -32601);
        assert_eq!(RpcError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(RpcError::Timeout("x".into()).code(), -32603);
    }

    #[test]
    fn bridge_timeout_keeps_category_in_message() {
        let id = TaskId::new();
        let err: RpcError = BridgeError::TimedOut {
            id,
            timeout: Duration::from_millis(250),
        }
        .into();
        assert_eq!(err.code(), codes::INTERNAL_ERROR);
        assert!(err.to_string().starts_with("Timeout: task "));
        assert!(err.to_string().ends_with("timed out after 250ms"));
    }

    #[test]
    fn execution_failure_message_names_the_cause() {
        let err = RpcError::Execution(TaskFailure {
            category: FailureCategory::Panic,
            message: "boom".into(),
        });
        assert_eq!(err.to_string(), "Execution error: handler panicked: boom");
    }

    #[test]
    fn handler_error_displays_its_message() {
        let err = HandlerError::from("no active document");
        assert_eq!(err.to_string(), "no active document");

        let parse: HandlerError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(!parse.message().is_empty());

        let boxed: Box<dyn std::error::Error> = Box::new(err.clone());
        assert_eq!(boxed.to_string(), err.message());
    }
}
