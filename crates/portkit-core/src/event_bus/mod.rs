//! # Event Bus Module
//!
//! Publish/subscribe channels decoupling the port session from its caller.
//!
//! ## Overview
//!
//! Three logical channels are carried over one bus:
//! - data arrived (raw inbound bytes)
//! - status changed (human-readable lifecycle messages)
//! - error occurred (every captured failure, exactly once)
//!
//! Publishers emit without knowing subscribers; subscribers filter by
//! channel. Delivery is fire-and-forget: events are not queued or replayed
//! for late subscribers, and within a single channel events preserve the
//! order they were raised.
//!
//! ## Usage
//!
//! ```rust
//! use portkit_core::event_bus::{EventBus, EventChannel, EventFilter, PortEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Channels(vec![EventChannel::Data]),
//!     |event| {
//!         if let PortEvent::DataArrived { bytes } = event {
//!             println!("{} bytes arrived", bytes.len());
//!         }
//!     },
//! );
//!
//! bus.publish(PortEvent::data(vec![0x41, 0x42]));
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
