//! Low-level serial port access.
//!
//! Wraps the `serialport` crate behind two small traits so the session
//! state machine can be exercised against mock hardware:
//! - [`SerialLink`]: the open handle (write, read, byte-availability)
//! - [`LinkOpener`]: the factory that turns validated parameters into a
//!   live handle
//!
//! The hardware read/write timeout is fixed at open time; callers get no
//! timeout knobs beyond it.

use crate::params::{ConnectionParameters, FlowControl, Parity};
use portkit_core::SessionError;
use std::io;
use std::time::Duration;

/// Read/write timeout baked into every opened handle.
const HANDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// An open serial port handle
///
/// The handle is released by dropping the link; every exit path of the
/// session drops its link on close.
pub trait SerialLink: Send {
    /// Write the whole buffer in one call
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush buffered output to the device
    fn flush(&mut self) -> io::Result<()>;

    /// Read available data into the buffer
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes currently readable without blocking
    fn available(&mut self) -> io::Result<usize>;
}

/// Factory that opens a [`SerialLink`] from validated parameters
pub trait LinkOpener: Send + Sync {
    /// Open a link, applying the parameter set and the fixed timeouts
    fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn SerialLink>, SessionError>;
}

fn to_serialport_data_bits(bits: u8) -> Result<serialport::DataBits, SessionError> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        _ => Err(SessionError::ConfigurationError {
            reason: format!("unsupported data bits: {}", bits),
        }),
    }
}

fn to_serialport_stop_bits(bits: u8) -> Result<serialport::StopBits, SessionError> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        _ => Err(SessionError::ConfigurationError {
            reason: format!("unsupported stop bits: {}", bits),
        }),
    }
}

fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn to_serialport_flow_control(flow: FlowControl) -> serialport::FlowControl {
    match flow {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
        FlowControl::Software => serialport::FlowControl::Software,
    }
}

/// Real serial link backed by the `serialport` crate
struct SystemSerialLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink for SystemSerialLink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.port)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.port, buf)
    }

    fn available(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Default opener using the system serial subsystem
#[derive(Debug, Default)]
pub struct SystemLinkOpener;

impl LinkOpener for SystemLinkOpener {
    fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn SerialLink>, SessionError> {
        let builder = serialport::new(&params.port_name, params.baud_rate)
            .timeout(HANDLE_TIMEOUT)
            .data_bits(to_serialport_data_bits(params.data_bits)?)
            .stop_bits(to_serialport_stop_bits(params.stop_bits)?)
            .parity(to_serialport_parity(params.parity))
            .flow_control(to_serialport_flow_control(params.flow_control));

        match builder.open() {
            Ok(port) => Ok(Box::new(SystemSerialLink { port })),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", params.port_name, e);
                Err(SessionError::OpenFailure {
                    port: params.port_name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
