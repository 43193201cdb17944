//! Error handling for PortKit
//!
//! Provides error types for the two layers of the manager:
//! - Catalog errors (device enumeration)
//! - Session errors (port lifecycle and byte transport)
//!
//! All error types use `thiserror`. Nothing here is fatal to the process:
//! every failure is surfaced once via the event bus and, for mutating
//! operations, as a boolean or `Result` return at the call site.

use thiserror::Error;

/// Device catalog error type
///
/// Represents failures while enumerating serial devices. Enumeration
/// failures are always recoverable: the catalog falls back to a basic
/// name-only listing after reporting the error.
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    /// The platform device query failed
    #[error("Device enumeration failed: {reason}")]
    EnumerationFailure {
        /// Description of the underlying platform error.
        reason: String,
    },
}

/// Port session error type
///
/// Represents errors in the port session state machine and the transmit
/// and receive paths.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Connection parameters failed validation
    #[error("Invalid connection parameters: {reason}")]
    ConfigurationError {
        /// The reason the parameters are invalid.
        reason: String,
    },

    /// Failed to open the port (busy, absent, permission denied)
    #[error("Failed to open port {port}: {reason}")]
    OpenFailure {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Hardware release failed while closing; state is still forced Closed
    #[error("Failed to close port {port}: {reason}")]
    CloseFailure {
        /// The name of the port that failed to close cleanly.
        port: String,
        /// The reason the close failed.
        reason: String,
    },

    /// Hex payload had an odd number of digits after stripping
    #[error("Hex payload must contain an even number of digits, got {digit_count}")]
    MalformedHexPayload {
        /// Number of hex digits remaining after stripping separators.
        digit_count: usize,
    },

    /// Write failed after validation passed; counters unchanged
    #[error("Transmit failed: {reason}")]
    TransmitFailure {
        /// The reason the write failed.
        reason: String,
    },

    /// A single read attempt failed; the dispatcher keeps running
    #[error("Receive failed: {reason}")]
    ReceiveFailure {
        /// The reason the read failed.
        reason: String,
    },
}

impl SessionError {
    /// Short machine-readable code for event reporting
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::ConfigurationError { .. } => "ConfigurationError",
            SessionError::OpenFailure { .. } => "OpenFailure",
            SessionError::CloseFailure { .. } => "CloseFailure",
            SessionError::MalformedHexPayload { .. } => "MalformedHexPayload",
            SessionError::TransmitFailure { .. } => "TransmitFailure",
            SessionError::ReceiveFailure { .. } => "ReceiveFailure",
        }
    }
}

/// Main error type for PortKit
///
/// A unified error type that can represent any error from both layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Device catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Port session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a catalog error
    pub fn is_catalog_error(&self) -> bool {
        matches!(self, Error::Catalog(_))
    }

    /// Check if this is a session error
    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_codes() {
        let err = SessionError::MalformedHexPayload { digit_count: 3 };
        assert_eq!(err.code(), "MalformedHexPayload");
        assert!(err.to_string().contains('3'));

        let err = SessionError::OpenFailure {
            port: "COM3".to_string(),
            reason: "busy".to_string(),
        };
        assert_eq!(err.code(), "OpenFailure");
        assert!(err.to_string().contains("COM3"));
    }

    #[test]
    fn test_unified_error_conversion() {
        let err: Error = CatalogError::EnumerationFailure {
            reason: "WMI query failed".to_string(),
        }
        .into();
        assert!(err.is_catalog_error());
        assert!(!err.is_session_error());
    }
}
