//! Unified error handling for hostbridge
//!
//! `ErrorCode` is the taxonomy that crosses the process boundary, `BridgeError`
//! covers everything that can go wrong while wiring or running the bridge.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::routing::Verb;

/// Error codes carried by envelopes and data access results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No route or record matches
    NotFound,
    /// Input failed the handler schema
    ValidationError,
    /// Downstream data store failure
    PersistenceError,
    /// Query name is not registered on the bus
    HandlerNotFound,
    /// Handler construction failed at startup
    InstantiationError,
    /// Payload could not be decoded or encoded at the process boundary
    TransportError,
    /// The call deadline passed before persistence was reached
    DeadlineExceeded,
    /// Any other failure raised inside a handler
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::PersistenceError => "PERSISTENCE_ERROR",
            ErrorCode::HandlerNotFound => "HANDLER_NOT_FOUND",
            ErrorCode::InstantiationError => "INSTANTIATION_ERROR",
            ErrorCode::TransportError => "TRANSPORT_ERROR",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error types for the bridge
#[derive(Debug)]
pub enum BridgeError {
    /// Configuration-related errors
    Configuration(String),

    /// I/O errors on the channel or log file
    Io(std::io::Error),

    /// Route template could not be parsed
    InvalidTemplate { template: String, reason: String },

    /// Same verb and structurally identical template registered twice
    DuplicateRoute { verb: Verb, template: String },

    /// Two handlers claim the same query name
    DuplicateHandler(String),

    /// A handler constructor failed; aborts startup
    Instantiation { handler: String, reason: String },

    /// Serialization failures at the process boundary
    Transport(String),

    /// Internal system errors
    Internal(String),
}

impl BridgeError {
    /// Maps the error onto the wire taxonomy
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::Instantiation { .. } => ErrorCode::InstantiationError,
            BridgeError::Transport(_) | BridgeError::Io(_) => ErrorCode::TransportError,
            _ => ErrorCode::InternalError,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            BridgeError::Io(err) => write!(f, "I/O error: {err}"),
            BridgeError::InvalidTemplate { template, reason } => {
                write!(f, "Invalid route template '{template}': {reason}")
            }
            BridgeError::DuplicateRoute { verb, template } => {
                write!(f, "Route already registered: {verb} {template}")
            }
            BridgeError::DuplicateHandler(name) => {
                write!(f, "Query handler already registered: {name}")
            }
            BridgeError::Instantiation { handler, reason } => {
                write!(f, "Failed to instantiate handler '{handler}': {reason}")
            }
            BridgeError::Transport(msg) => write!(f, "Transport error: {msg}"),
            BridgeError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> BridgeResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> BridgeResult<T> {
        self.map_err(|e| BridgeError::Internal(format!("{context}: {e}")))
    }
}

/// Convenience macro for configuration errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::BridgeError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::BridgeError::Configuration(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_in_screaming_snake_case() {
        let value = serde_json::to_value(ErrorCode::HandlerNotFound).unwrap();
        assert_eq!(value, serde_json::json!("HANDLER_NOT_FOUND"));

        let code: ErrorCode = serde_json::from_str("\"DEADLINE_EXCEEDED\"").unwrap();
        assert_eq!(code, ErrorCode::DeadlineExceeded);
        assert_eq!(code.to_string(), "DEADLINE_EXCEEDED");
    }

    #[test]
    fn instantiation_errors_map_to_their_code() {
        let err = BridgeError::Instantiation {
            handler: "users.create".to_string(),
            reason: "store unavailable".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::InstantiationError);
        assert!(err.to_string().contains("users.create"));
    }

    #[test]
    fn with_context_wraps_display() {
        let res: Result<(), &str> = Err("boom");
        let err = res.with_context("loading").unwrap_err();
        assert_eq!(err.to_string(), "Internal error: loading: boom");
    }

    #[test]
    fn config_error_macro_formats() {
        let err = config_error!("missing {}", "etcd");
        assert!(matches!(err, BridgeError::Configuration(ref m) if m == "missing etcd"));
        let err = config_error!("bad level");
        assert!(matches!(err, BridgeError::Configuration(ref m) if m == "bad level"));
    }
}
