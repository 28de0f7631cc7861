//! Error types for the PushLite client
//!
//! Most failures in this crate are deliberately non-fatal: storage and
//! network errors are logged and reduced to "absent" or "not delivered" at
//! the component that owns them. The variants below exist so that those
//! components have something typed to log, and so the host API can report
//! the one error it does surface (`EngineStopped`).

use thiserror::Error;

/// Result type alias for PushLite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the PushLite client
#[derive(Error, Debug)]
pub enum Error {
    /// Key/value store errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connect, timeout, TLS, body)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The remote service answered with a non-2xx status
    #[error("{call} rejected with status {status}")]
    Status {
        /// Which remote call was rejected
        call: &'static str,
        /// HTTP status code
        status: u16,
    },

    /// The coordinator task is no longer running
    #[error("PushLite engine has stopped")]
    EngineStopped,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a status rejection error
    pub fn status(call: &'static str, status: u16) -> Self {
        Self::Status { call, status }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_the_call() {
        let err = Error::status("registration", 503);
        assert_eq!(err.to_string(), "registration rejected with status 503");
    }

    #[test]
    fn json_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
