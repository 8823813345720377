//! Lifecycle Event Types
//!
//! Events published by the plugin loader and the component pipeline. Events
//! carry copies of descriptors, never live registry entries.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::traits::NotificationEvent;
use crate::plugin::{PluginDescriptor, PluginError, PluginState};

/// Where an event sits relative to the operation it reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Published before the operation's effects
    Pre,
    /// Published after the operation succeeded
    Post,
    /// A standalone notification with no Pre/Post pairing
    Notice,
}

/// What happened
#[derive(Debug, Clone)]
pub enum LifecycleEventKind {
    PluginDiscovery {
        directory: PathBuf,
    },
    PluginRegistered {
        descriptor: PluginDescriptor,
    },
    StateChange {
        plugin: String,
        previous: PluginState,
        target: PluginState,
    },
    AdvanceAll {
        target: PluginState,
    },
    PluginUnloaded {
        plugin: String,
    },
    PluginLoadFailed {
        file: PathBuf,
        cause: PluginError,
    },
    ComponentLoad {
        name: String,
        type_name: &'static str,
    },
    CreateAll {
        namespace: String,
    },
}

impl LifecycleEventKind {
    /// Variant name, stable across releases
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEventKind::PluginDiscovery { .. } => "PluginDiscovery",
            LifecycleEventKind::PluginRegistered { .. } => "PluginRegistered",
            LifecycleEventKind::StateChange { .. } => "StateChange",
            LifecycleEventKind::AdvanceAll { .. } => "AdvanceAll",
            LifecycleEventKind::PluginUnloaded { .. } => "PluginUnloaded",
            LifecycleEventKind::PluginLoadFailed { .. } => "PluginLoadFailed",
            LifecycleEventKind::ComponentLoad { .. } => "ComponentLoad",
            LifecycleEventKind::CreateAll { .. } => "CreateAll",
        }
    }
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEventKind::PluginDiscovery { directory } => {
                write!(f, "PluginDiscovery({})", directory.display())
            }
            LifecycleEventKind::PluginRegistered { descriptor } => {
                write!(f, "PluginRegistered({})", descriptor.name())
            }
            LifecycleEventKind::StateChange { plugin, previous, target } => {
                write!(f, "StateChange({}: {} -> {})", plugin, previous, target)
            }
            LifecycleEventKind::AdvanceAll { target } => write!(f, "AdvanceAll({})", target),
            LifecycleEventKind::PluginUnloaded { plugin } => write!(f, "PluginUnloaded({})", plugin),
            LifecycleEventKind::PluginLoadFailed { file, cause } => {
                write!(f, "PluginLoadFailed({}: {})", file.display(), cause)
            }
            LifecycleEventKind::ComponentLoad { name, type_name } => {
                write!(f, "ComponentLoad({} as {})", type_name, name)
            }
            LifecycleEventKind::CreateAll { namespace } => write!(f, "CreateAll({})", namespace),
        }
    }
}

/// A lifecycle event: a phase plus the kind of operation
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub phase: Phase,
    pub kind: LifecycleEventKind,
}

impl LifecycleEvent {
    pub fn pre(kind: LifecycleEventKind) -> Self {
        Self { phase: Phase::Pre, kind }
    }

    pub fn post(kind: LifecycleEventKind) -> Self {
        Self { phase: Phase::Post, kind }
    }

    pub fn notice(kind: LifecycleEventKind) -> Self {
        Self { phase: Phase::Notice, kind }
    }

    /// The Post counterpart of this event
    pub fn to_post(&self) -> Self {
        Self::post(self.kind.clone())
    }

    pub fn is_pre(&self) -> bool {
        self.phase == Phase::Pre
    }

    pub fn is_post(&self) -> bool {
        self.phase == Phase::Post
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.phase, self.kind)
    }
}

impl NotificationEvent for LifecycleEvent {
    fn summary(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_phase() {
        let pre = LifecycleEvent::pre(LifecycleEventKind::StateChange {
            plugin: "alpha".to_string(),
            previous: PluginState::Registered,
            target: PluginState::Enabled,
        });
        assert!(pre.is_pre());
        assert_eq!(pre.to_string(), "Pre StateChange(alpha: Registered -> Enabled)");

        let post = pre.to_post();
        assert!(post.is_post());
        assert_eq!(post.kind.name(), "StateChange");
        assert_eq!(post.summary(), "Post StateChange(alpha: Registered -> Enabled)");
    }

    #[test]
    fn test_load_failure_summary() {
        let event = LifecycleEvent::notice(LifecycleEventKind::PluginLoadFailed {
            file: PathBuf::from("plugins/broken.plx"),
            cause: PluginError::missing_field("author"),
        });
        assert_eq!(event.phase, Phase::Notice);
        assert!(event.summary().contains("broken.plx"));
        assert!(event.summary().contains("author"));
    }
}
