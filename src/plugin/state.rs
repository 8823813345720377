//! Plugin State Machine
//!
//! ```text
//! Registered -> Enabled -> Loaded -> Stopped -> Disabled -> Enabled -> ...
//! ```
//!
//! Every state accepts exactly one successor. `Registered` is the initial state
//! and is never a legal target.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{PluginError, PluginResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluginState {
    Registered,
    Enabled,
    Loaded,
    Stopped,
    Disabled,
}

/// Lifecycle hook run when entering a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    OnEnable,
    OnLoad,
    OnStop,
    OnDisable,
}

impl LifecycleHook {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleHook::OnEnable => "on_enable",
            LifecycleHook::OnLoad => "on_load",
            LifecycleHook::OnStop => "on_stop",
            LifecycleHook::OnDisable => "on_disable",
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PluginState {
    pub const ALL: [PluginState; 5] = [
        PluginState::Registered,
        PluginState::Enabled,
        PluginState::Loaded,
        PluginState::Stopped,
        PluginState::Disabled,
    ];

    /// The single state this one may advance to
    pub fn successor(&self) -> PluginState {
        match self {
            PluginState::Registered => PluginState::Enabled,
            PluginState::Enabled => PluginState::Loaded,
            PluginState::Loaded => PluginState::Stopped,
            PluginState::Stopped => PluginState::Disabled,
            PluginState::Disabled => PluginState::Enabled,
        }
    }

    pub fn can_advance_to(&self, next: PluginState) -> bool {
        self.successor() == next
    }

    /// Validate a proposed transition for `plugin`
    pub fn validate(&self, plugin: &str, next: PluginState) -> PluginResult<()> {
        if self.can_advance_to(next) {
            Ok(())
        } else {
            Err(PluginError::illegal_transition(plugin, *self, next))
        }
    }

    /// Hook run on entering this state; `None` for `Registered`
    pub fn entry_hook(&self) -> Option<LifecycleHook> {
        match self {
            PluginState::Registered => None,
            PluginState::Enabled => Some(LifecycleHook::OnEnable),
            PluginState::Loaded => Some(LifecycleHook::OnLoad),
            PluginState::Stopped => Some(LifecycleHook::OnStop),
            PluginState::Disabled => Some(LifecycleHook::OnDisable),
        }
    }

    /// States from which a plugin may be unloaded
    pub fn is_unloadable(&self) -> bool {
        matches!(self, PluginState::Registered | PluginState::Disabled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PluginState::Enabled | PluginState::Loaded)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PluginState::Registered => "Registered",
            PluginState::Enabled => "Enabled",
            PluginState::Loaded => "Loaded",
            PluginState::Stopped => "Stopped",
            PluginState::Disabled => "Disabled",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_cycle() {
        let mut state = PluginState::Registered;
        let mut visited = vec![state];
        for _ in 0..5 {
            state = state.successor();
            visited.push(state);
        }
        assert_eq!(
            visited,
            vec![
                PluginState::Registered,
                PluginState::Enabled,
                PluginState::Loaded,
                PluginState::Stopped,
                PluginState::Disabled,
                PluginState::Enabled,
            ]
        );
    }

    #[test]
    fn test_registered_is_never_a_target() {
        for state in PluginState::ALL {
            assert!(!state.can_advance_to(PluginState::Registered));
        }
        assert_eq!(PluginState::Registered.entry_hook(), None);
    }

    #[test]
    fn test_hooks() {
        assert_eq!(PluginState::Enabled.entry_hook(), Some(LifecycleHook::OnEnable));
        assert_eq!(PluginState::Loaded.entry_hook(), Some(LifecycleHook::OnLoad));
        assert_eq!(PluginState::Stopped.entry_hook(), Some(LifecycleHook::OnStop));
        assert_eq!(PluginState::Disabled.entry_hook().map(|h| h.name()), Some("on_disable"));
    }

    #[test]
    fn test_unloadable_states() {
        let unloadable: Vec<_> = PluginState::ALL.into_iter().filter(|s| s.is_unloadable()).collect();
        assert_eq!(unloadable, vec![PluginState::Registered, PluginState::Disabled]);
    }

    #[test]
    fn test_validate_reports_both_states() {
        let err = PluginState::Enabled.validate("alpha", PluginState::Enabled).unwrap_err();
        match err {
            PluginError::IllegalStateTransition { plugin, current, attempted } => {
                assert_eq!(plugin, "alpha");
                assert_eq!(current, PluginState::Enabled);
                assert_eq!(attempted, PluginState::Enabled);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
