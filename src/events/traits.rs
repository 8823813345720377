//! Publisher/Subscriber Traits
//!
//! Core traits for the lifecycle event bus. Subscribers are registered with a
//! [`DeliveryMode`] selecting the synchronous channel, the asynchronous channel,
//! or both.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::envelope::EventEnvelope;
use super::error::EventResult;

/// Base trait for all events carried by the bus
pub trait NotificationEvent: Send + Sync + Clone + fmt::Debug + 'static {
    /// Short description used in logs and failure reports
    fn summary(&self) -> String {
        format!("{:?}", self)
    }
}

bitflags! {
    /// Channels a subscriber receives events on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeliveryMode: u8 {
        /// Delivered inline on the publishing thread
        const SYNC = 0b01;
        /// Delivered on the bus worker pool
        const ASYNC = 0b10;
        const BOTH = Self::SYNC.bits() | Self::ASYNC.bits();
    }
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::SYNC
    }
}

/// Components that handle bus events
pub trait Subscriber<T>: Send + Sync
where
    T: NotificationEvent,
{
    /// Handle an incoming event.
    ///
    /// Errors and panics never reach the publisher; the bus forwards them to
    /// the error handling subsystem.
    fn handle_event(&self, event: &EventEnvelope<T>) -> EventResult<()>;

    /// Get the subscriber identifier (must be unique per bus)
    fn subscriber_id(&self) -> &str;

    /// Check if this subscriber should receive the event
    fn should_receive(&self, _event: &EventEnvelope<T>) -> bool {
        true
    }
}

/// Adapter turning a closure into a [`Subscriber`]
pub struct FnSubscriber<F> {
    id: String,
    handler: F,
}

impl<F> FnSubscriber<F> {
    pub fn new<S: Into<String>>(id: S, handler: F) -> Self {
        Self { id: id.into(), handler }
    }
}

impl<T, F> Subscriber<T> for FnSubscriber<F>
where
    T: NotificationEvent,
    F: Fn(&EventEnvelope<T>) -> EventResult<()> + Send + Sync,
{
    fn handle_event(&self, event: &EventEnvelope<T>) -> EventResult<()> {
        (self.handler)(event)
    }

    fn subscriber_id(&self) -> &str {
        &self.id
    }
}

/// Statistics about event delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Total events published
    pub events_published: u64,

    /// Total deliveries that completed successfully
    pub events_delivered: u64,

    /// Total deliveries where the subscriber failed or panicked
    pub delivery_failures: u64,

    /// Async deliveries run on the publishing thread because the queue was full
    pub caller_runs: u64,
}
