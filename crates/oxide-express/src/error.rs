//! Error types for routing and request handling.

use oxide_express_path::PatternError;
use thiserror::Error;

use crate::bind::BindError;
use crate::request::Method;

/// Errors returned by handlers and registration calls.
///
/// Registration fails with [`Error::Pattern`]. Everything else is produced at
/// request time and handed to the application's error handler, which turns it
/// into a response using [`Error::status_code`].
#[derive(Debug, Error)]
pub enum Error {
    /// No route matched the request.
    #[error("Cannot {method} {path}")]
    NotFound { method: Method, path: String },

    /// A route matched the path, but not for this method.
    #[error("Method Not Allowed")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    /// Invalid path or domain pattern.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Route name not found.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// Request binding failed.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// An explicit HTTP error.
    #[error("{message}")]
    Status { code: u16, message: String },

    /// Anything else a handler wants to report.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Creates an error carrying an explicit status code.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Creates a 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// Creates a 401 error.
    pub fn unauthorized() -> Self {
        Self::new(401, "Unauthorized")
    }

    /// Creates a 403 error.
    pub fn forbidden() -> Self {
        Self::new(403, "Forbidden")
    }

    /// Creates a 404 error.
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    /// Creates a 413 error.
    pub fn payload_too_large() -> Self {
        Self::new(413, "Request Entity Too Large")
    }

    /// Returns the HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::Bind(err) => err.status_code(),
            Self::Status { code, .. } => *code,
            Self::Pattern(_) | Self::RouteNotFound(_) | Self::Internal(_) => 500,
        }
    }
}

/// Result type alias for handlers and registration.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found = Error::NotFound {
            method: Method::Get,
            path: "/x".into(),
        };
        assert_eq!(not_found.status_code(), 404);
        assert_eq!(not_found.to_string(), "Cannot GET /x");

        assert_eq!(Error::new(418, "teapot").status_code(), 418);
        assert_eq!(Error::not_found().status_code(), 404);
        assert_eq!(Error::forbidden().to_string(), "Forbidden");
        assert_eq!(Error::Internal("boom".into()).status_code(), 500);
        assert_eq!(
            Error::from(BindError::Decode {
                raw: "x".into(),
                kind: "i64"
            })
            .status_code(),
            400
        );
        assert_eq!(
            Error::from(BindError::ContentTypeMismatch {
                expected: "application/json",
                actual: "text/plain".into(),
            })
            .status_code(),
            415
        );
    }
}
