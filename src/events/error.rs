//! Event Bus Error Types

use std::fmt;

use thiserror::Error;

use crate::errors::ErrorKind;

/// Result type for event bus operations and subscriber callbacks
pub type EventResult<T> = Result<T, EventError>;

/// The bus channel a delivery travelled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Sync,
    Async,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Sync => f.write_str("sync"),
            Channel::Async => f.write_str("async"),
        }
    }
}

/// Errors raised by the event bus or by subscribers
#[derive(Error, Debug, Clone)]
pub enum EventError {
    /// A subscriber failed while handling an event
    #[error("Subscriber '{subscriber}' failed on {channel} channel handling {event}: {cause}")]
    LifecycleEventError {
        channel: Channel,
        subscriber: String,
        event: String,
        cause: String,
    },

    /// Returned by subscriber callbacks to signal failure
    #[error("Event handler failed: {message}")]
    HandlerFailed { message: String },

    #[error("Subscriber '{subscriber_id}' already exists")]
    SubscriberAlreadyExists { subscriber_id: String },

    #[error("Subscriber '{subscriber_id}' not found")]
    SubscriberNotFound { subscriber_id: String },

    #[error("Subscriber '{subscriber_id}' asked for no delivery channel")]
    InvalidDeliveryMode { subscriber_id: String },
}

impl EventError {
    /// Create a lifecycle event error
    pub fn lifecycle<S, E, C>(channel: Channel, subscriber: S, event: E, cause: C) -> Self
    where
        S: Into<String>,
        E: Into<String>,
        C: Into<String>,
    {
        Self::LifecycleEventError {
            channel,
            subscriber: subscriber.into(),
            event: event.into(),
            cause: cause.into(),
        }
    }

    /// Create a handler failure, for use inside subscriber callbacks
    pub fn handler_failed<S: Into<String>>(message: S) -> Self {
        Self::HandlerFailed { message: message.into() }
    }

    /// Create a subscriber already exists error
    pub fn subscriber_already_exists<S: Into<String>>(subscriber_id: S) -> Self {
        Self::SubscriberAlreadyExists { subscriber_id: subscriber_id.into() }
    }

    /// Create a subscriber not found error
    pub fn subscriber_not_found<S: Into<String>>(subscriber_id: S) -> Self {
        Self::SubscriberNotFound { subscriber_id: subscriber_id.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::LifecycleEventError { .. } => ErrorKind::LifecycleEventError,
            EventError::HandlerFailed { .. } => ErrorKind::HandlerFailed,
            EventError::SubscriberAlreadyExists { .. } => ErrorKind::SubscriberAlreadyExists,
            EventError::SubscriberNotFound { .. } => ErrorKind::SubscriberNotFound,
            EventError::InvalidDeliveryMode { .. } => ErrorKind::InvalidDeliveryMode,
        }
    }

    /// The channel a delivery failure happened on, if this is one
    pub fn channel(&self) -> Option<Channel> {
        match self {
            EventError::LifecycleEventError { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}
