//! Error types for Melon
//!
//! Two families live here. [`ApiError`] is the HTTP-facing error: every
//! recoverable failure below the filter chain (routing, negotiation, body
//! decoding, domain errors) ends up rendered through it. [`RouteError`] and
//! [`StartupError`] are registration-time failures; they are fatal and keep
//! the server from ever accepting a connection.

use crate::config::ConfigError;
use http::StatusCode;
use serde::Serialize;
use std::fmt;

/// Result type alias for Melon operations
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Boxed error returned by domain code.
///
/// Resource verb methods return this so that any error type can flow out of
/// them. An [`ApiError`] travelling inside keeps its own status code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error rendered as an HTTP response
///
/// The body is `{"error":{"type":..,"message":..}}`; the internal detail
/// only reaches the logs.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    /// Machine-readable kind, e.g. `not_found`
    pub error_type: String,
    /// Shown to the client
    pub message: String,
    /// Internal details, logged but never rendered
    pub(crate) internal: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            message: message.into(),
            internal: None,
        }
    }

    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// 401
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// 404
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 405; the router adds the `Allow` header
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", message)
    }

    /// 406
    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_ACCEPTABLE, "not_acceptable", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// 413
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
    }

    /// 415
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            message,
        )
    }

    /// 500
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Attach detail for the logs; it is never rendered
    pub fn with_internal(mut self, details: impl Into<String>) -> Self {
        self.internal = Some(details.into());
        self
    }

    /// Internal details attached with [`ApiError::with_internal`]
    pub fn internal_details(&self) -> Option<&str> {
        self.internal.as_deref()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.status.as_u16(), self.error_type, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Wire shape of an error body
#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        Self {
            error: ErrorBody {
                error_type: err.error_type,
                message: err.message,
            },
        }
    }
}

/// Registration-time routing failure.
///
/// Raised while routes are being registered, never while serving. A router
/// that produced one of these must not be put into service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The same (method, pattern) pair was registered twice
    #[error("duplicate route: {method} {pattern} is already registered")]
    Duplicate { method: String, pattern: String },

    /// Two patterns of equal specificity can match the same path
    #[error(
        "ambiguous route: {new} overlaps {existing} with the same number of parameters; \
         use distinct literal segments or differing segment counts"
    )]
    Ambiguous { existing: String, new: String },

    /// The pattern could not be parsed
    #[error("malformed route pattern {pattern:?}: {reason}")]
    MalformedPattern { pattern: String, reason: String },

    /// The method is neither `*` nor a valid HTTP method token
    #[error("invalid route method {0:?}")]
    InvalidMethod(String),
}

/// Fatal failure while building or starting the server
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// One or more routes could not be registered
    #[error("route registration failed: {}", join_errors(.0))]
    Routes(Vec<RouteError>),

    /// Configuration was missing or invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A connector could not bind its listening socket
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<RouteError> for StartupError {
    fn from(err: RouteError) -> Self {
        StartupError::Routes(vec![err])
    }
}

fn join_errors(errors: &[RouteError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_details_are_not_part_of_the_rendered_body() {
        let err = ApiError::internal("Internal Server Error").with_internal("db password rejected");
        assert_eq!(err.internal_details(), Some("db password rejected"));

        let body = serde_json::to_string(&ErrorResponse::from(err)).unwrap();
        assert!(!body.contains("password"));
        assert!(body.contains("internal_error"));
    }

    #[test]
    fn startup_error_lists_every_route_error() {
        let err = StartupError::Routes(vec![
            RouteError::InvalidMethod("G ET".to_string()),
            RouteError::Duplicate {
                method: "GET".to_string(),
                pattern: "/users".to_string(),
            },
        ]);
        let message = err.to_string();
        assert!(message.contains("G ET"));
        assert!(message.contains("/users"));
    }
}
