//! Plugin Registry
//!
//! Two concurrent maps keyed by plugin name: the loaded plugins and their
//! recorded states. Every name present in one map is present in the other.
//! Each mutation is a single atomic map operation; multi-step sequences such
//! as check-then-register are the caller's responsibility.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};

use super::descriptor::PluginDescriptor;
use super::entry::PluginEntry;
use super::error::{PluginError, PluginResult};
use super::state::PluginState;

/// A loaded plugin: its entry point instance plus the descriptor it came from
pub struct Plugin {
    // Declared first so the entry instance drops before the isolation unit
    // held by the descriptor
    entry: Mutex<Box<dyn PluginEntry>>,
    descriptor: PluginDescriptor,
}

impl Plugin {
    pub fn new(entry: Box<dyn PluginEntry>, descriptor: PluginDescriptor) -> Self {
        Self {
            entry: Mutex::new(entry),
            descriptor,
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Exclusive access to the entry instance for running hooks.
    ///
    /// The lock is held while a hook runs and is not reentrant: code reached
    /// from a hook must use [`Plugin::try_entry`] for its own plugin.
    pub fn entry(&self) -> MutexGuard<'_, Box<dyn PluginEntry>> {
        self.entry.lock()
    }

    /// The entry instance, or `None` while a hook holds it
    pub fn try_entry(&self) -> Option<MutexGuard<'_, Box<dyn PluginEntry>>> {
        self.entry.try_lock()
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name())
            .field("entry_point", &self.descriptor.entry_point())
            .finish()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, Arc<Plugin>>,
    states: DashMap<String, PluginState>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under `name` in the `Registered` state.
    ///
    /// An existing entry under the same name is kept and the newcomer rejected.
    pub fn insert(&self, name: &str, plugin: Arc<Plugin>) -> PluginResult<()> {
        match self.plugins.entry(name.to_string()) {
            Entry::Occupied(_) => Err(PluginError::duplicate_name(name)),
            Entry::Vacant(slot) => {
                slot.insert(plugin);
                self.states.insert(name.to_string(), PluginState::Registered);
                Ok(())
            }
        }
    }

    /// Remove a plugin from both maps, returning it
    pub fn remove(&self, name: &str) -> Option<Arc<Plugin>> {
        let removed = self.plugins.remove(name).map(|(_, plugin)| plugin);
        self.states.remove(name);
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.plugins.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn state_of(&self, name: &str) -> Option<PluginState> {
        self.states.get(name).map(|entry| *entry.value())
    }

    /// Record a new state for a registered plugin
    pub fn set_state(&self, name: &str, state: PluginState) -> PluginResult<()> {
        match self.states.get_mut(name) {
            Some(mut current) => {
                *current = state;
                Ok(())
            }
            None => Err(PluginError::plugin_not_found(name)),
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All plugins, sorted by name
    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.names().iter().filter_map(|name| self.get(name)).collect()
    }

    /// All recorded states, sorted by name
    pub fn states(&self) -> Vec<(String, PluginState)> {
        let mut states: Vec<(String, PluginState)> = self
            .states
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
