//! Connection parameter set and validation.
//!
//! Parameters are validated as a unit before a session may open;
//! partially-specified sets are rejected with a `ConfigurationError`.

use portkit_core::SessionError;
use serde::{Deserialize, Serialize};

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Flow control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// RTS/CTS hardware flow control.
    Hardware,
    /// XON/XOFF software flow control.
    Software,
}

/// Parameters for one port connection
///
/// `Default` mirrors the manager's initial configuration: no target port,
/// 9600 baud, 8 data bits, 1 stop bit, no parity, no flow control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Target port name (e.g. "COM3", "/dev/ttyUSB0").
    pub port_name: String,
    /// Baud rate in bits per second.
    pub baud_rate: u32,
    /// Data bits per character (5 to 8).
    pub data_bits: u8,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

impl ConnectionParameters {
    /// Validate the parameter set as a unit
    ///
    /// Checks: non-empty port name, positive baud rate, 5-8 data bits,
    /// 1-2 stop bits.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.port_name.is_empty() {
            return Err(SessionError::ConfigurationError {
                reason: "port name is empty".to_string(),
            });
        }
        if self.baud_rate == 0 {
            return Err(SessionError::ConfigurationError {
                reason: "baud rate must be positive".to_string(),
            });
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(SessionError::ConfigurationError {
                reason: format!("unsupported data bits: {}", self.data_bits),
            });
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(SessionError::ConfigurationError {
                reason: format!("unsupported stop bits: {}", self.stop_bits),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_params() -> ConnectionParameters {
        ConnectionParameters {
            port_name: "COM3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_parameters() {
        let params = ConnectionParameters::default();
        assert_eq!(params.baud_rate, 9600);
        assert_eq!(params.data_bits, 8);
        assert_eq!(params.stop_bits, 1);
        assert_eq!(params.parity, Parity::None);
        assert_eq!(params.flow_control, FlowControl::None);
        // Default has no target port, so it is not openable as-is.
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_valid_parameters() {
        assert!(valid_params().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_baud() {
        let mut params = valid_params();
        params.baud_rate = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_data_bits() {
        for bits in [0, 4, 9] {
            let mut params = valid_params();
            params.data_bits = bits;
            assert!(params.validate().is_err(), "data_bits {} accepted", bits);
        }
    }

    #[test]
    fn test_rejects_bad_stop_bits() {
        let mut params = valid_params();
        params.stop_bits = 3;
        assert!(params.validate().is_err());
    }
}
