//! Event Bus implementation.
//!
//! Provides the EventBus struct shared between the port session and its
//! consumers. The bus is constructed explicitly and passed by `Arc`; there
//! is no process-global instance.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{EventChannel, PortEvent};

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Filter to receive only specific event channels
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive events on any of these channels.
    Channels(Vec<EventChannel>),
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &PortEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Channels(channels) => channels.contains(&event.channel()),
        }
    }
}

/// Type alias for event handler functions
type EventHandler = Box<dyn Fn(PortEvent) + Send + Sync>;

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast mirror.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Publish/subscribe bus for port events
///
/// Synchronous handlers are invoked on the publishing thread in
/// subscription order, so per-channel event order follows publish order.
/// Every event is also mirrored onto a broadcast channel for async
/// consumers. Publishing never blocks on subscriber processing beyond the
/// handler bodies themselves, and events are not retained for subscribers
/// that attach later.
pub struct EventBus {
    /// Broadcast channel sender for async receivers
    sender: broadcast::Sender<PortEvent>,
    /// Registered synchronous handlers, in subscription order
    handlers: Arc<RwLock<Vec<(SubscriptionId, EventFilter, EventHandler)>>>,
    /// Configuration
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            handlers: Arc::new(RwLock::new(Vec::new())),
            config,
        }
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of synchronous handlers that matched the event.
    /// Delivery is fire-and-forget: a bus with no subscribers accepts the
    /// event and drops it.
    pub fn publish(&self, event: PortEvent) -> usize {
        tracing::trace!("{}", event.description());

        let handlers = self.handlers.read();
        let mut notified = 0;
        for (_, filter, handler) in handlers.iter() {
            if filter.matches(&event) {
                handler(event.clone());
                notified += 1;
            }
        }

        // Mirror onto the broadcast channel; an error just means no async
        // receiver is attached right now.
        let _ = self.sender.send(event);

        notified
    }

    /// Subscribe to events with a synchronous handler
    ///
    /// The handler is called on the publishing thread, so it should return
    /// quickly. Handlers that touch UI-like shared state must marshal onto
    /// their own serialization context.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(PortEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let mut handlers = self.handlers.write();
        handlers.push((id, filter, Box::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Get a receiver for async event consumption
    pub fn receiver(&self) -> broadcast::Receiver<PortEvent> {
        self.sender.subscribe()
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sub_id, _, _)| *sub_id != id);
        let removed = handlers.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get the number of active synchronous subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}
