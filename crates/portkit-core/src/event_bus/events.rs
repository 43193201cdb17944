//! Event type definitions for the event bus.
//!
//! Events are designed to be cloneable and serializable so callers can
//! log, replay, or marshal them onto their own execution context.

use serde::{Deserialize, Serialize};

/// Root event enum for the three observable channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PortEvent {
    /// Raw bytes arrived from the port. Fired once per successful
    /// non-empty read; each event is a fragment, not a complete message.
    DataArrived {
        /// The bytes read in one pass.
        bytes: Vec<u8>,
    },
    /// Session status changed (open, close, configuration update,
    /// successful send, counter reset).
    StatusChanged {
        /// Human-readable status message.
        message: String,
    },
    /// A failure was captured somewhere in the manager.
    ErrorOccurred {
        /// Machine-readable error code (e.g. "OpenFailure").
        code: String,
        /// Human-readable error message, including the cause if known.
        message: String,
    },
}

impl PortEvent {
    /// Build a data-arrived event
    pub fn data(bytes: Vec<u8>) -> Self {
        PortEvent::DataArrived { bytes }
    }

    /// Build a status-changed event
    pub fn status(message: impl Into<String>) -> Self {
        PortEvent::StatusChanged {
            message: message.into(),
        }
    }

    /// Build an error-occurred event
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        PortEvent::ErrorOccurred {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Get the channel this event belongs to
    pub fn channel(&self) -> EventChannel {
        match self {
            PortEvent::DataArrived { .. } => EventChannel::Data,
            PortEvent::StatusChanged { .. } => EventChannel::Status,
            PortEvent::ErrorOccurred { .. } => EventChannel::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            PortEvent::DataArrived { bytes } => format!("RX: {} bytes", bytes.len()),
            PortEvent::StatusChanged { message } => format!("Status: {}", message),
            PortEvent::ErrorOccurred { code, message } => {
                format!("Error [{}]: {}", code, message)
            }
        }
    }
}

/// Event channel for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventChannel {
    /// Inbound payload bytes.
    Data,
    /// Status messages.
    Status,
    /// Captured failures.
    Error,
}

impl std::fmt::Display for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventChannel::Data => write!(f, "Data"),
            EventChannel::Status => write!(f, "Status"),
            EventChannel::Error => write!(f, "Error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_channel() {
        assert_eq!(
            PortEvent::data(vec![1, 2, 3]).channel(),
            EventChannel::Data
        );
        assert_eq!(
            PortEvent::status("Port COM3 opened").channel(),
            EventChannel::Status
        );
        assert_eq!(
            PortEvent::error("OpenFailure", "port busy").channel(),
            EventChannel::Error
        );
    }

    #[test]
    fn test_event_description() {
        let event = PortEvent::error("OpenFailure", "Failed to open port COM3: busy");
        assert!(event.description().contains("OpenFailure"));
        assert!(event.description().contains("COM3"));
    }

    #[test]
    fn test_event_serialization() {
        let event = PortEvent::data(vec![0x41, 0x42]);
        let json = serde_json::to_string(&event).expect("Should serialize");
        let parsed: PortEvent = serde_json::from_str(&json).expect("Should deserialize");

        if let PortEvent::DataArrived { bytes } = parsed {
            assert_eq!(bytes, vec![0x41, 0x42]);
        } else {
            panic!("Wrong event type after deserialization");
        }
    }
}
