//! Lifecycle Event Bus
//!
//! Typed events about plugin and component lifecycle operations, delivered to
//! subscribers synchronously, asynchronously on a bounded worker pool, or both.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod traits;

pub use bus::{BusConfig, EventBus, LifecycleBus};
pub use envelope::EventEnvelope;
pub use error::{Channel, EventError, EventResult};
pub use lifecycle::{LifecycleEvent, LifecycleEventKind, Phase};
pub use traits::{DeliveryMode, DeliveryStats, FnSubscriber, NotificationEvent, Subscriber};
