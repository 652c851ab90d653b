//! Error types for cfgrab.
//!
//! Two families live here. [`Error`] covers caller-input and setup failures
//! that abort an operation outright. [`FetchError`] covers everything that
//! can go wrong talking to a single device; it is recorded on that device's
//! outcome and never fails a batch.

use std::fmt;
use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Main error type for cfgrab operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Inventory and descriptor errors
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Configuration loading errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Device model registry errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem errors outside of per-file persistence reports
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Inventory and request-body errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// A descriptor failed validation
    #[error("Invalid device descriptor: {message}")]
    InvalidDescriptor { message: String },

    /// A request body was neither a device object nor a list of them
    #[error("Invalid request body: {message}")]
    InvalidRequestBody { message: String },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// TOML syntax or type error
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value was out of range or malformed
    #[error("Invalid configuration value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Device model registry errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The model has no registry entry, or the entry cannot serve the request
    #[error("Unsupported device model '{model}': {reason}")]
    UnsupportedDeviceModel { model: String, reason: String },
}

/// Per-device retrieval failure.
///
/// Only owned strings are carried so outcomes stay plain, cloneable values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No command or endpoint is known for the device model
    #[error("Unsupported device model '{model}': {reason}")]
    UnsupportedDeviceModel { model: String, reason: String },

    /// The device was unreachable or refused the connection
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// The device rejected the credentials
    #[error("Authentication failed for user '{user}'")]
    Auth { user: String },

    /// The fetch did not finish before its deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The device answered, but not with a usable configuration
    #[error("{}", protocol_message(.status, .message))]
    Protocol { status: Option<u16>, message: String },

    /// The fetch task panicked or was aborted
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn protocol_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {code}: {message}"),
        None => format!("Protocol error: {message}"),
    }
}

impl FetchError {
    /// The error category, as reported on the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedDeviceModel { .. } => ErrorKind::UnsupportedDeviceModel,
            Self::Connection { .. } => ErrorKind::ConnectionError,
            Self::Auth { .. } => ErrorKind::AuthError,
            Self::Timeout(_) => ErrorKind::TimeoutError,
            Self::Protocol { .. } => ErrorKind::ProtocolError,
            Self::Internal { .. } => ErrorKind::InternalError,
        }
    }

    /// HTTP status code, for REST protocol errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            status: None,
            message: message.into(),
        }
    }

    pub(crate) fn connection(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Connection {
            target: target.into(),
            message: message.to_string(),
        }
    }
}

impl From<PlatformError> for FetchError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::UnsupportedDeviceModel { model, reason } => {
                Self::UnsupportedDeviceModel { model, reason }
            }
        }
    }
}

/// Wire names of the per-device error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnsupportedDeviceModel,
    ConnectionError,
    AuthError,
    TimeoutError,
    ProtocolError,
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnsupportedDeviceModel => "UnsupportedDeviceModel",
            Self::ConnectionError => "ConnectionError",
            Self::AuthError => "AuthError",
            Self::TimeoutError => "TimeoutError",
            Self::ProtocolError => "ProtocolError",
            Self::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

/// Result type alias using cfgrab's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_display_with_status() {
        let err = FetchError::Protocol {
            status: Some(503),
            message: "service unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: service unavailable");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.kind(), ErrorKind::ProtocolError);
    }

    #[test]
    fn test_protocol_display_without_status() {
        let err = FetchError::protocol("exit status 1");
        assert_eq!(err.to_string(), "Protocol error: exit status 1");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_platform_error_converts_to_fetch_error() {
        let err: FetchError = PlatformError::UnsupportedDeviceModel {
            model: "acme".to_string(),
            reason: "no registry entry".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedDeviceModel);
        assert!(err.to_string().contains("acme"));
    }

    #[test]
    fn test_kind_display_matches_wire_name() {
        assert_eq!(ErrorKind::TimeoutError.to_string(), "TimeoutError");
        assert_eq!(
            serde_json::to_string(&ErrorKind::ConnectionError).unwrap(),
            "\"ConnectionError\""
        );
    }
}
