//! # PortKit Communication
//!
//! Serial-port communication manager: device discovery with short-lived
//! caching, a single-port session state machine, text/hex transmit
//! encoding, and a background reception dispatcher that republishes
//! inbound bytes as events.
//!
//! The manager assumes no particular UI toolkit. Callers supply connection
//! parameters and outbound payload text, and consume status, error and
//! data events via the [`portkit_core::EventBus`].

pub mod catalog;
pub mod encoder;
pub mod params;
pub mod serial;
pub mod session;

pub use catalog::{DeviceCatalog, DeviceDescriptor, DeviceRegistry, RegistryEntry, SystemRegistry};
pub use encoder::encode_payload;
pub use params::{ConnectionParameters, FlowControl, Parity};
pub use serial::{LinkOpener, SerialLink, SystemLinkOpener};
pub use session::{PortSession, PortState};
