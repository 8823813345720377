//! Lifecycle Event Bus
//!
//! Dual-mode publish/subscribe. `publish` first enqueues the event for every
//! asynchronous subscriber on the worker pool, then delivers it inline to the
//! synchronous subscribers in registration order. Subscriber failures, whether
//! returned or panicked, are repackaged as
//! [`EventError::LifecycleEventError`] and routed to the error handler
//! registry; publishers never observe them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use parking_lot::RwLock;

use super::envelope::EventEnvelope;
use super::error::{Channel, EventError, EventResult};
use super::lifecycle::LifecycleEvent;
use super::pool::{Dispatch, WorkerPool};
use super::traits::{DeliveryMode, DeliveryStats, NotificationEvent, Subscriber};
use crate::errors::handler::{contain, panic_message};
use crate::errors::{ErrorHandlerRegistry, RuntimeError};

/// The bus instantiated for lifecycle events
pub type LifecycleBus = EventBus<LifecycleEvent>;

/// Worker pool sizing for the asynchronous channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            queue_capacity: 256,
        }
    }
}

#[derive(Default)]
struct StatsCounters {
    published: AtomicU64,
    delivered: AtomicU64,
    failures: AtomicU64,
    caller_runs: AtomicU64,
}

type SubscriberList<T> = RwLock<Vec<Arc<dyn Subscriber<T>>>>;

pub struct EventBus<T: NotificationEvent> {
    sync_subscribers: SubscriberList<T>,
    async_subscribers: SubscriberList<T>,
    pool: WorkerPool,
    errors: Arc<ErrorHandlerRegistry>,
    stats: Arc<StatsCounters>,
}

impl<T: NotificationEvent> EventBus<T> {
    pub fn new(errors: Arc<ErrorHandlerRegistry>) -> Self {
        Self::with_config(BusConfig::default(), errors)
    }

    pub fn with_config(config: BusConfig, errors: Arc<ErrorHandlerRegistry>) -> Self {
        Self {
            sync_subscribers: RwLock::new(Vec::new()),
            async_subscribers: RwLock::new(Vec::new()),
            pool: WorkerPool::new("plinth-events", config.workers, config.queue_capacity),
            errors,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    /// Register a subscriber on the channels selected by `mode`
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>, mode: DeliveryMode) -> EventResult<()> {
        let id = subscriber.subscriber_id().to_string();
        if mode.is_empty() {
            return Err(EventError::InvalidDeliveryMode { subscriber_id: id });
        }

        // Hold both write locks so the duplicate check and insert are one step
        let mut sync_subscribers = self.sync_subscribers.write();
        let mut async_subscribers = self.async_subscribers.write();

        let taken = sync_subscribers
            .iter()
            .chain(async_subscribers.iter())
            .any(|existing| existing.subscriber_id() == id);
        if taken {
            return Err(EventError::subscriber_already_exists(id));
        }

        if mode.contains(DeliveryMode::SYNC) {
            sync_subscribers.push(Arc::clone(&subscriber));
        }
        if mode.contains(DeliveryMode::ASYNC) {
            async_subscribers.push(subscriber);
        }
        debug!("Subscribed '{}' with mode {:?}", id, mode);
        Ok(())
    }

    /// Remove a subscriber from every channel
    pub fn unsubscribe(&self, subscriber_id: &str) -> EventResult<()> {
        let mut sync_subscribers = self.sync_subscribers.write();
        let mut async_subscribers = self.async_subscribers.write();

        let before = sync_subscribers.len() + async_subscribers.len();
        sync_subscribers.retain(|s| s.subscriber_id() != subscriber_id);
        async_subscribers.retain(|s| s.subscriber_id() != subscriber_id);

        if sync_subscribers.len() + async_subscribers.len() == before {
            return Err(EventError::subscriber_not_found(subscriber_id));
        }
        debug!("Unsubscribed '{}'", subscriber_id);
        Ok(())
    }

    /// Deliver on both channels: async enqueue first, then sync inline
    pub fn publish(&self, envelope: EventEnvelope<T>) {
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        trace!("Publishing {}", envelope.event().summary());
        self.dispatch_async(&envelope);
        self.dispatch_sync(&envelope);
    }

    /// Deliver to synchronous subscribers only
    pub fn publish_sync(&self, envelope: EventEnvelope<T>) {
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        self.dispatch_sync(&envelope);
    }

    /// Deliver to asynchronous subscribers only
    pub fn publish_async(&self, envelope: EventEnvelope<T>) {
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        self.dispatch_async(&envelope);
    }

    /// Wrap `event` in a fresh envelope, publish it and return the envelope
    pub fn emit(&self, event: T) -> EventEnvelope<T> {
        let envelope = EventEnvelope::new(event);
        self.publish(envelope.clone());
        envelope
    }

    fn dispatch_sync(&self, envelope: &EventEnvelope<T>) {
        // Snapshot so subscribers may (un)subscribe while handling
        let subscribers: Vec<_> = self.sync_subscribers.read().clone();
        for subscriber in subscribers {
            deliver(&subscriber, envelope, Channel::Sync, &self.errors, &self.stats);
        }
    }

    fn dispatch_async(&self, envelope: &EventEnvelope<T>) {
        let subscribers: Vec<_> = self.async_subscribers.read().clone();
        if subscribers.is_empty() {
            return;
        }
        if self.pool.is_shut_down() {
            warn!(
                "Event bus is shut down; {} dropped for {} async subscribers",
                envelope.event().summary(),
                subscribers.len()
            );
            return;
        }

        for subscriber in subscribers {
            let queued = envelope.clone();
            let errors = Arc::clone(&self.errors);
            let stats = Arc::clone(&self.stats);
            let dispatch = self.pool.execute(move || {
                deliver(&subscriber, &queued, Channel::Async, &errors, &stats);
            });
            match dispatch {
                Dispatch::Queued => {}
                Dispatch::CallerRan => {
                    self.stats.caller_runs.fetch_add(1, Ordering::Relaxed);
                }
                Dispatch::Rejected => {
                    warn!("Event bus rejected async delivery of {}", envelope.event().summary());
                }
            }
        }
    }

    /// Block until queued async deliveries finish; `false` on timeout
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.pool.wait_idle(timeout)
    }

    /// Stop the worker pool after draining it. Later publishes reach
    /// synchronous subscribers only.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool.is_shut_down()
    }

    /// Drop every subscriber on both channels
    pub fn clear_subscribers(&self) {
        let mut sync_subscribers = self.sync_subscribers.write();
        let mut async_subscribers = self.async_subscribers.write();
        sync_subscribers.clear();
        async_subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        let sync_subscribers = self.sync_subscribers.read();
        let async_subscribers = self.async_subscribers.read();
        let async_only = async_subscribers
            .iter()
            .filter(|a| !sync_subscribers.iter().any(|s| s.subscriber_id() == a.subscriber_id()))
            .count();
        sync_subscribers.len() + async_only
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.sync_subscribers.read().iter().any(|s| s.subscriber_id() == subscriber_id)
            || self.async_subscribers.read().iter().any(|s| s.subscriber_id() == subscriber_id)
    }

    /// Subscriber ids in registration order, with the channels each receives
    pub fn list_subscribers(&self) -> Vec<(String, DeliveryMode)> {
        let sync_subscribers = self.sync_subscribers.read();
        let async_subscribers = self.async_subscribers.read();

        let mut listed: Vec<(String, DeliveryMode)> = sync_subscribers
            .iter()
            .map(|s| (s.subscriber_id().to_string(), DeliveryMode::SYNC))
            .collect();
        for subscriber in async_subscribers.iter() {
            match listed.iter_mut().find(|(id, _)| id == subscriber.subscriber_id()) {
                Some((_, mode)) => *mode |= DeliveryMode::ASYNC,
                None => listed.push((subscriber.subscriber_id().to_string(), DeliveryMode::ASYNC)),
            }
        }
        listed
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            events_published: self.stats.published.load(Ordering::Relaxed),
            events_delivered: self.stats.delivered.load(Ordering::Relaxed),
            delivery_failures: self.stats.failures.load(Ordering::Relaxed),
            caller_runs: self.stats.caller_runs.load(Ordering::Relaxed),
        }
    }

    pub fn error_handlers(&self) -> &Arc<ErrorHandlerRegistry> {
        &self.errors
    }
}

fn deliver<T: NotificationEvent>(
    subscriber: &Arc<dyn Subscriber<T>>,
    envelope: &EventEnvelope<T>,
    channel: Channel,
    errors: &ErrorHandlerRegistry,
    stats: &StatsCounters,
) {
    if !subscriber.should_receive(envelope) {
        return;
    }

    let outcome = contain(|| subscriber.handle_event(envelope));
    let cause = match outcome {
        Ok(Ok(())) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    stats.failures.fetch_add(1, Ordering::Relaxed);
    let failure = EventError::lifecycle(
        channel,
        subscriber.subscriber_id(),
        envelope.event().summary(),
        cause,
    );
    debug!("{}", failure);
    errors.handle_current(&RuntimeError::from(failure));
}
