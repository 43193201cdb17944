//! # PortKit Core
//!
//! Core types for the PortKit serial-port communication manager.
//! Provides the unified error types and the publish/subscribe event bus
//! that decouples the port session from whatever consumes it.

pub mod error;
pub mod event_bus;

pub use error::{CatalogError, Error, Result, SessionError};

pub use event_bus::{
    EventBus, EventBusConfig, EventChannel, EventFilter, PortEvent, SubscriptionId,
};
