//! The success/error envelope that crosses the process boundary.

use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    bus::DataAccessError,
    core::error::{BridgeError, ErrorCode},
};

/// Error half of an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// `{success: true, data} | {success: false, error}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub enum Envelope {
    Success(Value),
    Failure(ErrorBody),
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Envelope::Success(data)
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Envelope::Failure(ErrorBody {
            code: code.as_str().to_string(),
            message: message.into(),
            details: None,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Envelope::Success(data) => Some(data),
            Envelope::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Envelope::Success(_) => None,
            Envelope::Failure(error) => Some(error),
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error().map(|e| e.code.as_str())
    }
}

impl From<RouteError> for Envelope {
    fn from(err: RouteError) -> Self {
        Envelope::Failure(ErrorBody {
            code: err.code,
            message: err.message,
            details: err.details,
        })
    }
}

impl From<Result<Value, RouteError>> for Envelope {
    fn from(result: Result<Value, RouteError>) -> Self {
        match result {
            Ok(data) => Envelope::Success(data),
            Err(err) => err.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        match (raw.success, raw.error) {
            (true, None) => Ok(Envelope::Success(raw.data.unwrap_or(Value::Null))),
            (false, Some(error)) => Ok(Envelope::Failure(error)),
            (true, Some(_)) => Err("successful envelope carries an error".to_string()),
            (false, None) => Err("failed envelope is missing its error".to_string()),
        }
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            // `data` is always present on success, even when null
            Envelope::Success(data) => RawEnvelope {
                success: true,
                data: Some(data),
                error: None,
            },
            Envelope::Failure(error) => RawEnvelope {
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

/// Error returned by a route handler.
///
/// Code, message and details are carried into the envelope verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteError {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl RouteError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// An error with an application-defined code
    pub fn custom(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for RouteError {}

impl From<DataAccessError> for RouteError {
    fn from(err: DataAccessError) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message,
            details: err.details,
        }
    }
}

impl From<BridgeError> for RouteError {
    fn from(err: BridgeError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<Box<dyn Error + Send + Sync>> for RouteError {
    fn from(err: Box<dyn Error + Send + Sync>) -> Self {
        match err.downcast::<RouteError>() {
            Ok(route) => *route,
            Err(other) => Self::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            serde_json::to_value(Envelope::success(json!({"classId": "A1B2C"}))).unwrap(),
            json!({"success": true, "data": {"classId": "A1B2C"}})
        );
        assert_eq!(
            serde_json::to_value(Envelope::success(Value::Null)).unwrap(),
            json!({"success": true, "data": null})
        );

        let failure: Envelope = RouteError::not_found("No route for GET nowhere")
            .with_details(json!({"path": "nowhere"}))
            .into();
        assert_eq!(
            serde_json::to_value(failure).unwrap(),
            json!({
                "success": false,
                "error": {
                    "code": "NOT_FOUND",
                    "message": "No route for GET nowhere",
                    "details": {"path": "nowhere"}
                }
            })
        );
    }

    #[test]
    fn test_payload_survives_serialization() {
        let data = json!({
            "id": "u-1",
            "tags": ["a", "b"],
            "nested": {"n": 1.5, "flag": false, "none": null},
            "text": "ñandú \"quoted\" \n line"
        });
        let envelope = Envelope::success(data.clone());
        let text = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.data(), Some(&data));
    }

    #[test]
    fn test_inconsistent_envelopes_rejected() {
        assert!(serde_json::from_value::<Envelope>(json!({"success": false})).is_err());
        assert!(serde_json::from_value::<Envelope>(json!({
            "success": true,
            "error": {"code": "X", "message": "y"}
        }))
        .is_err());
    }

    #[test]
    fn test_route_error_conversions() {
        let err: RouteError =
            DataAccessError::validation("Invalid query parameters: name", vec!["name".into()])
                .into();
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert_eq!(err.details, Some(json!({"fields": ["name"]})));

        let boxed: Box<dyn Error + Send + Sync> =
            Box::new(RouteError::custom("QUOTA_EXCEEDED", "too many"));
        assert_eq!(RouteError::from(boxed).code, "QUOTA_EXCEEDED");

        let boxed: Box<dyn Error + Send + Sync> = "plain failure".into();
        let err = RouteError::from(boxed);
        assert_eq!(err.code, "INTERNAL_ERROR");
        assert_eq!(err.message, "plain failure");

        let err: RouteError = BridgeError::Transport("bad frame".into()).into();
        assert_eq!(err.code, "TRANSPORT_ERROR");
    }
}
