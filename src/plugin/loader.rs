//! Plugin Loader
//!
//! Discovers plugin packages, loads them into isolation units, registers the
//! resulting plugins and drives their state machine. Every lifecycle-affecting
//! operation publishes a Pre event before its effect and a Post event after it,
//! sharing one correlation id. Validation happens before the Pre event, so a
//! rejected operation publishes nothing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use super::descriptor::PluginDescriptor;
use super::entry::{HookResult, PluginEntry, PLUGIN_CONTRACT};
use super::error::{PluginError, PluginResult};
use super::isolation::{IsolationProvider, Symbol};
use super::registry::{Plugin, PluginRegistry};
use super::state::PluginState;
use crate::component::ComponentNamespace;
use crate::errors::handler::{contain, panic_message};
use crate::errors::RuntimeError;
use crate::events::{EventEnvelope, LifecycleBus, LifecycleEvent, LifecycleEventKind};
use crate::guard::{verify_token, CallerFilter, OrchestratorToken};
use crate::version::RuntimeVersion;

/// Package file extension scanned for by default
pub const DEFAULT_PACKAGE_EXTENSION: &str = "plx";

const LOADER_OWNERS: &[CallerFilter] = &[CallerFilter::owner("Runtime")];
const DISCOVERY_CALLERS: &[CallerFilter] = &[CallerFilter::exact("Runtime", "start")];
const ADVANCE_ALL_CALLERS: &[CallerFilter] = &[
    CallerFilter::exact("Runtime", "start"),
    CallerFilter::exact("Runtime", "shutdown"),
];

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Extension of package files, without the dot
    pub package_extension: String,
    /// Version plugins are checked against
    pub running_version: RuntimeVersion,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            running_version: RuntimeVersion::current(),
        }
    }
}

/// Per-plugin outcome of a bulk advance; plugins skipped as illegal are absent
pub type AdvanceReport = BTreeMap<String, PluginResult<()>>;

pub struct PluginLoader {
    registry: PluginRegistry,
    bus: Arc<LifecycleBus>,
    provider: Arc<dyn IsolationProvider>,
    config: LoaderConfig,
}

impl PluginLoader {
    pub fn new(
        token: &OrchestratorToken,
        bus: Arc<LifecycleBus>,
        provider: Arc<dyn IsolationProvider>,
        config: LoaderConfig,
    ) -> PluginResult<Self> {
        verify_token(token, LOADER_OWNERS)?;
        Ok(Self {
            registry: PluginRegistry::new(),
            bus,
            provider,
            config,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Load every package in `directory`.
    ///
    /// The scan is not recursive. Packages are loaded in file name order and
    /// independently: a failing package is reported as a `PluginLoadFailed`
    /// notice on the asynchronous channel and to the error handlers, and the
    /// scan moves on. Returns the names of the plugins loaded.
    pub fn discover_and_load(&self, token: &OrchestratorToken, directory: &Path) -> PluginResult<Vec<String>> {
        verify_token(token, DISCOVERY_CALLERS)?;
        let packages = self.list_packages(directory)?;

        let pre = EventEnvelope::new(LifecycleEvent::pre(LifecycleEventKind::PluginDiscovery {
            directory: directory.to_path_buf(),
        }));
        self.bus.publish(pre.clone());

        let mut loaded = Vec::with_capacity(packages.len());
        for package in packages {
            match self.load(&package) {
                Ok(name) => loaded.push(name),
                Err(cause) => self.report_load_failure(&pre, package, cause),
            }
        }

        info!("Loaded {} plugin(s) from {}", loaded.len(), directory.display());
        self.bus.publish(pre.follow(pre.event().to_post()));
        Ok(loaded)
    }

    fn list_packages(&self, directory: &Path) -> PluginResult<Vec<PathBuf>> {
        let entries = fs::read_dir(directory).map_err(|e| {
            PluginError::discovery_failed(format!("cannot read {}: {}", directory.display(), e))
        })?;

        let extension = self.config.package_extension.trim_start_matches('.');
        let mut packages: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
            })
            .collect();
        packages.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!("Found {} package(s) in {}", packages.len(), directory.display());
        Ok(packages)
    }

    fn report_load_failure(&self, discovery: &EventEnvelope<LifecycleEvent>, file: PathBuf, cause: PluginError) {
        warn!("Failed to load {}: {}", file.display(), cause);
        let wrapped = PluginError::load_failed(&file, cause.clone());
        self.bus.publish_async(discovery.follow(LifecycleEvent::notice(
            LifecycleEventKind::PluginLoadFailed { file, cause },
        )));
        self.bus.error_handlers().handle_current(&RuntimeError::from(wrapped));
    }

    /// Load one package and register the plugin it contains
    pub fn load(&self, package: &Path) -> PluginResult<String> {
        let descriptor = PluginDescriptor::read_from_package(package)?;
        descriptor.check_compatibility(&self.config.running_version)?;
        // Isolating may extract and map native code; a registered name keeps its unit
        if self.registry.contains(descriptor.name()) {
            return Err(PluginError::duplicate_name(descriptor.name()));
        }

        let unit = self.provider.isolate(package, &descriptor)?;
        let entry_point = descriptor.entry_point();
        let decl = match unit.resolve(entry_point) {
            Some(Symbol::Plugin(decl)) if decl.is_compatible() => decl,
            Some(Symbol::Plugin(decl)) => {
                return Err(PluginError::contract_violation(
                    entry_point,
                    format!(
                        "built for plugin contract {}, runtime provides {}",
                        decl.contract, PLUGIN_CONTRACT
                    ),
                ))
            }
            Some(other) => {
                return Err(PluginError::contract_violation(
                    entry_point,
                    format!("resolves to a {}, not a plugin entry point", other.kind()),
                ))
            }
            None => {
                return Err(PluginError::entry_point_load_failed(
                    entry_point,
                    format!("not found in {} or the host", package.display()),
                ))
            }
        };

        let entry = contain(decl.construct).map_err(|payload| {
            PluginError::constructor_failed(entry_point, panic_message(payload.as_ref()))
        })?;

        descriptor.bind_package_file(package)?;
        descriptor.bind_isolation_unit(unit)?;

        let name = descriptor.name().to_string();
        self.register(&name, Plugin::new(entry, descriptor))?;
        Ok(name)
    }

    /// Register a plugin in the `Registered` state; an existing name wins
    pub fn register(&self, name: &str, plugin: Plugin) -> PluginResult<()> {
        if self.registry.contains(name) {
            return Err(PluginError::duplicate_name(name));
        }

        let pre = EventEnvelope::new(LifecycleEvent::pre(LifecycleEventKind::PluginRegistered {
            descriptor: plugin.descriptor().clone(),
        }));
        self.bus.publish(pre.clone());

        self.registry.insert(name, Arc::new(plugin))?;
        info!("Registered plugin '{}'", name);

        self.bus.publish(pre.follow(pre.event().to_post()));
        Ok(())
    }

    /// Advance `name` to `target`, running the hook that belongs to `target`
    pub fn advance(&self, name: &str, target: PluginState) -> PluginResult<()> {
        self.advance_with(name, target, |entry: &mut dyn PluginEntry| match target.entry_hook() {
            Some(hook) => entry.run_hook(hook),
            None => Ok(()),
        })
    }

    /// Advance `name` to `target`, running `hook` in place of the state's own.
    ///
    /// A hook that fails or panics leaves the recorded state unchanged and no
    /// Post event is published. The plugin's entry lock is held while `hook`
    /// runs.
    pub fn advance_with<F>(&self, name: &str, target: PluginState, hook: F) -> PluginResult<()>
    where
        F: FnOnce(&mut dyn PluginEntry) -> HookResult,
    {
        let plugin = self
            .registry
            .get(name)
            .ok_or_else(|| PluginError::plugin_not_found(name))?;
        let current = self
            .registry
            .state_of(name)
            .ok_or_else(|| PluginError::plugin_not_found(name))?;
        current.validate(name, target)?;

        let pre = EventEnvelope::new(LifecycleEvent::pre(LifecycleEventKind::StateChange {
            plugin: name.to_string(),
            previous: current,
            target,
        }));
        self.bus.publish(pre.clone());

        let hook_name = target.entry_hook().map(|h| h.name()).unwrap_or("transition");
        {
            let mut entry = plugin.entry();
            let outcome = contain(|| hook(&mut **entry));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{:#}", e)),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };
            if let Some(message) = failure {
                warn!("Plugin '{}' {} failed: {}", name, hook_name, message);
                return Err(PluginError::hook_failed(name, hook_name, message));
            }
        }

        self.registry.set_state(name, target)?;
        info!("Plugin '{}' {} -> {}", name, current, target);

        self.bus.publish(pre.follow(pre.event().to_post()));
        Ok(())
    }

    /// Advance every registered plugin to `target`, in name order.
    ///
    /// Plugins for which the transition is illegal are skipped.
    pub fn advance_all(&self, token: &OrchestratorToken, target: PluginState) -> PluginResult<AdvanceReport> {
        verify_token(token, ADVANCE_ALL_CALLERS)?;

        let pre = EventEnvelope::new(LifecycleEvent::pre(LifecycleEventKind::AdvanceAll { target }));
        self.bus.publish(pre.clone());

        let mut report = AdvanceReport::new();
        for name in self.registry.names() {
            match self.advance(&name, target) {
                Err(PluginError::IllegalStateTransition { current, .. }) => {
                    debug!("Skipping '{}': {} cannot advance to {}", name, current, target);
                }
                result => {
                    report.insert(name, result);
                }
            }
        }

        self.bus.publish(pre.follow(pre.event().to_post()));
        Ok(report)
    }

    /// Remove a `Registered` or `Disabled` plugin.
    ///
    /// The entry instance is dropped before the isolation unit; a native
    /// library is unmapped once nothing else holds its unit.
    pub fn unload(&self, name: &str) -> PluginResult<()> {
        let state = self
            .registry
            .state_of(name)
            .ok_or_else(|| PluginError::plugin_not_found(name))?;
        if !state.is_unloadable() {
            return Err(PluginError::unload_refused(name, state));
        }

        let pre = EventEnvelope::new(LifecycleEvent::pre(LifecycleEventKind::PluginUnloaded {
            plugin: name.to_string(),
        }));
        self.bus.publish(pre.clone());

        if let Some(plugin) = self.registry.remove(name) {
            let held = Arc::strong_count(&plugin) - 1;
            drop(plugin);
            if held > 0 {
                debug!("Plugin '{}' removed while {} other handle(s) remain", name, held);
            }
        }
        info!("Unloaded plugin '{}'", name);

        self.bus.publish(pre.follow(pre.event().to_post()));
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn state_of(&self, name: &str) -> Option<PluginState> {
        self.registry.state_of(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.registry.get(name)
    }

    pub fn all_plugins(&self) -> Vec<Arc<Plugin>> {
        self.registry.plugins()
    }

    pub fn all_states(&self) -> Vec<(String, PluginState)> {
        self.registry.states()
    }

    /// Component namespace of a loaded plugin, retaining its isolation unit.
    ///
    /// Plugins registered without an isolation unit have none.
    pub fn plugin_namespace(&self, name: &str) -> Option<ComponentNamespace> {
        let plugin = self.registry.get(name)?;
        let descriptor = plugin.descriptor();
        let unit = descriptor.isolation_unit()?;
        Some(unit.namespace(descriptor.entry_point()).retaining(Arc::clone(unit)))
    }

    /// Namespaces of every plugin currently `Loaded`, in name order
    pub fn loaded_namespaces(&self) -> Vec<ComponentNamespace> {
        self.registry
            .states()
            .into_iter()
            .filter(|(_, state)| *state == PluginState::Loaded)
            .filter_map(|(name, _)| self.plugin_namespace(&name))
            .collect()
    }
}
