//! Event Envelope
//!
//! Every published event travels inside an envelope carrying its own id and a
//! correlation id. The Pre and Post events of one operation share the
//! correlation id, so subscribers can pair them up.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::traits::NotificationEvent;

#[derive(Debug, Clone)]
pub struct EventEnvelope<T> {
    id: Uuid,
    correlation: Uuid,
    published_at: DateTime<Utc>,
    event: T,
}

impl<T: NotificationEvent> EventEnvelope<T> {
    /// Wrap an event that starts a new correlation
    pub fn new(event: T) -> Self {
        let id = Uuid::now_v7();
        Self {
            id,
            correlation: id,
            published_at: Utc::now(),
            event,
        }
    }

    /// Wrap a follow-up event in the same correlation as `self`
    pub fn follow(&self, event: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            correlation: self.correlation,
            published_at: Utc::now(),
            event,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn correlation(&self) -> Uuid {
        self.correlation
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn event(&self) -> &T {
        &self.event
    }

    pub fn into_event(self) -> T {
        self.event
    }
}
