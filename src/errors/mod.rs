//! Runtime-wide Error Types
//!
//! Each subsystem owns a `thiserror` enum; [`RuntimeError`] unifies them so the
//! error handling subsystem can route any failure by its [`ErrorKind`].

pub mod handler;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::component::ComponentError;
use crate::events::EventError;
use crate::guard::GuardError;
use crate::messages::MessageCatalog;
use crate::plugin::PluginError;

pub use handler::{
    install_panic_hook, ErrorHandler, ErrorHandlerRegistry, HandlingOutcome, ThreadInfo,
};

/// Result type spanning every subsystem
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Any failure the runtime can surface or route to an error handler
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Event(#[from] EventError),

    /// A panic captured on some thread
    #[error("Thread '{thread}' panicked: {message}")]
    Panic { thread: String, message: String },
}

impl RuntimeError {
    pub fn panic<T: Into<String>, M: Into<String>>(thread: T, message: M) -> Self {
        Self::Panic {
            thread: thread.into(),
            message: message.into(),
        }
    }

    /// The concrete kind, used for handler lookup
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Guard(err) => match err {
                GuardError::UnauthorizedCaller { .. } => ErrorKind::UnauthorizedCaller,
                GuardError::GuardMisuse { .. } => ErrorKind::GuardMisuse,
            },
            RuntimeError::Plugin(err) => err.kind(),
            RuntimeError::Component(err) => err.kind(),
            RuntimeError::Event(err) => err.kind(),
            RuntimeError::Panic { .. } => ErrorKind::Panic,
        }
    }

    /// Human-readable text through the locale collaborator
    pub fn describe(&self, catalog: &dyn MessageCatalog) -> String {
        catalog.render(self.kind().as_str(), &self.to_string())
    }
}

macro_rules! error_kinds {
    ($($variant:ident),+ $(,)?) => {
        /// Concrete error kinds known to the runtime
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorKind {
            $($variant),+
        }

        impl ErrorKind {
            pub const ALL: &'static [ErrorKind] = &[$(ErrorKind::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ErrorKind::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

error_kinds!(
    UnauthorizedCaller,
    GuardMisuse,
    MissingManifest,
    DescriptorParse,
    MissingDescriptorField,
    UnsupportedPluginVersion,
    PackageUnreadable,
    EntryPointLoadFailed,
    EntryPointContractViolation,
    ConstructorFailed,
    DescriptorAlreadyBound,
    DuplicateName,
    PluginNotFound,
    IllegalStateTransition,
    HookFailed,
    UnloadRefused,
    PluginLoadFailed,
    DiscoveryFailed,
    ComponentNameConflict,
    ArgumentShapeMismatch,
    ComponentConstructionFailed,
    MissingResolverTarget,
    ResolverConflict,
    ResolverFailed,
    InvocationFailed,
    LifecycleEventError,
    HandlerFailed,
    SubscriberAlreadyExists,
    SubscriberNotFound,
    InvalidDeliveryMode,
    Panic,
);

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown error kind: {}", s))
    }
}
