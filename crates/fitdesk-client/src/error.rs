//! Normalized API error shape
//!
//! Every failure the gateway surfaces is an [`ApiError`]: the server's
//! structured `{message, code, details}` body when it sent one, otherwise a
//! message derived from the transport failure. Raw transport errors never
//! leave the crate.

use fitdesk_storage::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for gateway and service calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Free-form error details keyed by field or category
pub type ErrorDetails = BTreeMap<String, Value>;

/// Message used when neither the server nor the transport supplied one
pub const FALLBACK_MESSAGE: &str = "An error occurred";

/// Code carried by errors from cancelled requests
pub const CANCELLED_CODE: &str = "CANCELLED";

/// Code carried by a refresh attempt with no stored refresh token
pub const NO_REFRESH_TOKEN_CODE: &str = "NO_REFRESH_TOKEN";

/// Code carried by failures to persist credentials locally
pub const STORAGE_ERROR_CODE: &str = "STORAGE_ERROR";

/// Where an error came from
///
/// Not part of the wire shape; used for retry decisions and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorClass {
    /// The server answered with a non-success status
    Server {
        /// HTTP status code
        status: u16,
    },
    /// The request never produced a response
    Network,
    /// The request exceeded the configured timeout
    Timeout,
    /// The caller cancelled the request
    Cancelled,
    /// A success response body could not be decoded
    Decode,
    /// Raised locally without touching the network
    #[default]
    Local,
}

/// Normalized error returned by every gateway call
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable message
    pub message: String,

    /// Machine-readable code, when one is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Structured details supplied by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    #[serde(skip)]
    class: ErrorClass,
}

impl ApiError {
    /// Create an error raised locally
    pub fn local(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
            details: None,
            class: ErrorClass::Local,
        }
    }

    /// Error for a refresh attempt without a stored refresh token
    #[must_use]
    pub fn no_refresh_token() -> Self {
        Self::local(NO_REFRESH_TOKEN_CODE, "No refresh token available")
    }

    /// Error for a request abandoned by its caller
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            message: "Request was cancelled".to_string(),
            code: Some(CANCELLED_CODE.to_string()),
            details: None,
            class: ErrorClass::Cancelled,
        }
    }

    /// Error for a credential write that could not be made durable
    #[must_use]
    pub fn storage(error: &StorageError) -> Self {
        Self::local(
            STORAGE_ERROR_CODE,
            format!("Failed to persist session: {error}"),
        )
    }

    /// Normalize a non-success response
    ///
    /// The body is read as `{message?, code?, details?}`; anything missing
    /// falls back to a status-derived message and no code.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed: Option<Value> = serde_json::from_slice(body).ok();
        let object = parsed.as_ref().and_then(Value::as_object);

        let message = object
            .and_then(|o| o.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map_or_else(|| status_message(status), ToString::to_string);

        let code = object.and_then(|o| o.get("code")).and_then(|c| match c {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        let details = object
            .and_then(|o| o.get("details"))
            .and_then(|d| match d {
                Value::Null => None,
                Value::Object(map) => Some(
                    map.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<ErrorDetails>(),
                ),
                other => Some(ErrorDetails::from([("detail".to_string(), other.clone())])),
            });

        Self {
            message,
            code,
            details,
            class: ErrorClass::Server { status },
        }
    }

    /// Normalize a transport failure; carries no code
    #[must_use]
    pub fn from_transport(error: &reqwest::Error) -> Self {
        let class = if error.is_timeout() {
            ErrorClass::Timeout
        } else {
            ErrorClass::Network
        };
        let message = error.to_string();
        Self {
            message: if message.is_empty() {
                FALLBACK_MESSAGE.to_string()
            } else {
                message
            },
            code: None,
            details: None,
            class,
        }
    }

    /// Error for a success body that did not match the expected shape
    #[must_use]
    pub fn decode(error: &serde_json::Error) -> Self {
        Self {
            message: format!("Failed to parse response: {error}"),
            code: None,
            details: None,
            class: ErrorClass::Decode,
        }
    }

    /// Origin of the error
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        self.class
    }

    /// HTTP status when the server answered
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self.class {
            ErrorClass::Server { status } => Some(status),
            _ => None,
        }
    }

    /// True for a 401 answer
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.class, ErrorClass::Server { status: 401 })
    }

    /// True when the request never reached a response
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self.class, ErrorClass::Network | ErrorClass::Timeout)
    }

    /// True when the caller cancelled the request
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.class, ErrorClass::Cancelled)
    }

    /// Whether repeating the same request could plausibly succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self.class {
            ErrorClass::Network | ErrorClass::Timeout => true,
            ErrorClass::Server { status } => status >= 500 || status == 408 || status == 429,
            ErrorClass::Cancelled | ErrorClass::Decode | ErrorClass::Local => false,
        }
    }
}

fn status_message(status: u16) -> String {
    if status == 0 {
        FALLBACK_MESSAGE.to_string()
    } else {
        format!("Request failed with status code {status}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_from_response_uses_server_fields() {
        let body = json!({
            "message": "Validation failed",
            "code": "VALIDATION_ERROR",
            "details": { "email": ["already taken"] }
        });
        let error = ApiError::from_response(422, body.to_string().as_bytes());

        assert_eq!(error.message, "Validation failed");
        assert_eq!(error.code.as_deref(), Some("VALIDATION_ERROR"));
        assert_eq!(error.details.as_ref().unwrap()["email"], json!(["already taken"]));
        assert_eq!(error.status(), Some(422));
        assert!(!error.is_retryable());
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"<html>Bad Gateway</html>".as_slice())]
    #[case(b"{\"message\": \"  \"}".as_slice())]
    #[case(b"[1, 2, 3]".as_slice())]
    fn test_from_response_falls_back_to_status_message(#[case] body: &[u8]) {
        let error = ApiError::from_response(502, body);
        assert_eq!(error.message, "Request failed with status code 502");
        assert!(error.code.is_none());
        assert!(error.details.is_none());
        assert!(error.is_retryable());
    }

    #[test]
    fn test_numeric_code_and_scalar_details() {
        let body = json!({ "message": "nope", "code": 4031, "details": "quota" });
        let error = ApiError::from_response(403, body.to_string().as_bytes());
        assert_eq!(error.code.as_deref(), Some("4031"));
        assert_eq!(error.details.unwrap()["detail"], json!("quota"));
    }

    #[rstest]
    #[case(401, true, false)]
    #[case(404, false, false)]
    #[case(429, false, true)]
    #[case(500, false, true)]
    fn test_status_classification(
        #[case] status: u16,
        #[case] unauthorized: bool,
        #[case] retryable: bool,
    ) {
        let error = ApiError::from_response(status, b"{}");
        assert_eq!(error.is_unauthorized(), unauthorized);
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn test_local_errors() {
        let error = ApiError::no_refresh_token();
        assert_eq!(error.code.as_deref(), Some(NO_REFRESH_TOKEN_CODE));
        assert_eq!(error.class(), ErrorClass::Local);
        assert_eq!(error.status(), None);

        let cancelled = ApiError::cancelled();
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_retryable());
        assert_eq!(cancelled.code.as_deref(), Some(CANCELLED_CODE));
    }

    #[test]
    fn test_serialized_shape_omits_empty_fields() {
        let error = ApiError::from_response(404, b"{\"message\": \"User not found\"}");
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value, json!({ "message": "User not found" }));
        assert_eq!(error.to_string(), "User not found");
    }
}
