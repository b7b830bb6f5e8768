//! Engine error type — JSON-RPC error codes + HTTP status mapping.
//!
//! One flat enum, a `code()` method, convenience constructors, and a `From`
//! into the JSON-RPC error envelope, carrying exactly the error kinds this
//! engine needs.

use crate::types::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// Domain error codes
// ---------------------------------------------------------------------------

pub const TASK_NOT_FOUND: i64 = -32001;
pub const UNSUPPORTED_OPERATION: i64 = -32002;
pub const PUSH_NOTIFICATIONS_NOT_SUPPORTED: i64 = -32003;
pub const AUTHENTICATION_REQUIRED: i64 = -32004;
pub const AUTHORIZATION_FAILED: i64 = -32005;
pub const PROCESSOR_ERROR: i64 = -32006;

/// Unified error type for the engine's JSON-RPC surface.
///
/// Every variant carries a human-readable message and an optional
/// structured `data` payload.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Parse error: {message}")]
    ParseError {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Method not found: {message}")]
    MethodNotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Invalid params: {message}")]
    InvalidParams {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Task not found: {message}")]
    TaskNotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Unsupported operation: {message}")]
    UnsupportedOperation {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Push notifications not supported: {message}")]
    PushNotificationsNotSupported {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Authentication required: {message}")]
    AuthenticationRequired {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Authorization failed: {message}")]
    AuthorizationFailed {
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Processor error: {message}")]
    ProcessorError {
        message: String,
        data: Option<serde_json::Value>,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into(), data: None }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into(), data: None }
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::MethodNotFound { message: message.into(), data: None }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams { message: message.into(), data: None }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into(), data: None }
    }

    pub fn task_not_found(message: impl Into<String>) -> Self {
        Self::TaskNotFound { message: message.into(), data: None }
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation { message: message.into(), data: None }
    }

    pub fn push_notifications_not_supported(message: impl Into<String>) -> Self {
        Self::PushNotificationsNotSupported { message: message.into(), data: None }
    }

    pub fn authentication_required(message: impl Into<String>) -> Self {
        Self::AuthenticationRequired { message: message.into(), data: None }
    }

    pub fn authorization_failed(message: impl Into<String>) -> Self {
        Self::AuthorizationFailed { message: message.into(), data: None }
    }

    pub fn processor_error(message: impl Into<String>) -> Self {
        Self::ProcessorError { message: message.into(), data: None }
    }

    /// JSON-RPC `error.code` for this variant.
    pub fn code(&self) -> i64 {
        match self {
            EngineError::ParseError { .. } => PARSE_ERROR,
            EngineError::InvalidRequest { .. } => INVALID_REQUEST,
            EngineError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            EngineError::InvalidParams { .. } => INVALID_PARAMS,
            EngineError::InternalError { .. } => INTERNAL_ERROR,
            EngineError::TaskNotFound { .. } => TASK_NOT_FOUND,
            EngineError::UnsupportedOperation { .. } => UNSUPPORTED_OPERATION,
            EngineError::PushNotificationsNotSupported { .. } => PUSH_NOTIFICATIONS_NOT_SUPPORTED,
            EngineError::AuthenticationRequired { .. } => AUTHENTICATION_REQUIRED,
            EngineError::AuthorizationFailed { .. } => AUTHORIZATION_FAILED,
            EngineError::ProcessorError { .. } => PROCESSOR_ERROR,
        }
    }

    /// HTTP status mapping per the transport table. The engine itself
    /// never speaks HTTP, but front doors need a uniform mapping.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::ParseError { .. }
            | EngineError::InvalidRequest { .. }
            | EngineError::InvalidParams { .. } => 400,
            EngineError::AuthenticationRequired { .. } => 401,
            EngineError::AuthorizationFailed { .. } => 403,
            EngineError::MethodNotFound { .. } | EngineError::TaskNotFound { .. } => 404,
            EngineError::UnsupportedOperation { .. } => 405,
            _ => 500,
        }
    }
}

impl From<EngineError> for JsonRpcError {
    fn from(err: EngineError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let data = match &err {
            EngineError::ParseError { data, .. }
            | EngineError::InvalidRequest { data, .. }
            | EngineError::MethodNotFound { data, .. }
            | EngineError::InvalidParams { data, .. }
            | EngineError::InternalError { data, .. }
            | EngineError::TaskNotFound { data, .. }
            | EngineError::UnsupportedOperation { data, .. }
            | EngineError::PushNotificationsNotSupported { data, .. }
            | EngineError::AuthenticationRequired { data, .. }
            | EngineError::AuthorizationFailed { data, .. }
            | EngineError::ProcessorError { data, .. } => data.clone(),
        };
        JsonRpcError { code, message, data }
    }
}
