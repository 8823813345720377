//! Runtime Composition Root
//!
//! [`Runtime`] owns the error handlers, the lifecycle bus, the plugin loader
//! and the component pipeline, and is the only holder of orchestrator tokens.
//! Startup runs in a fixed order:
//!
//! 1. discover and register plugin packages
//! 2. create the runtime's own components, then the host's
//! 3. advance every plugin to `Enabled`, then to `Loaded`
//! 4. create the components of each loaded plugin's namespace
//!
//! Load failures during discovery reach only handlers registered on
//! [`Runtime::error_handlers`] before `start`; the built-in reporter does not
//! exist yet.
//!
//! A startup that fails part way leaves the runtime `Failed`: it cannot be
//! started again, but `shutdown` still stops whatever did come up.
//!
//! Shutdown advances plugins to `Stopped` and `Disabled`, drains the bus and
//! stops its workers.

use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;

use crate::component::{
    runtime_namespace, ComponentDescriptor, ComponentNamespace, ComponentPipeline, ComponentRegistry,
    CreationOutcome, FactoryInstantiation, InstantiationStrategy,
};
use crate::config::RuntimeConfig;
use crate::errors::{ErrorHandlerRegistry, RuntimeResult};
use crate::events::LifecycleBus;
use crate::guard::{CallSite, GuardError, OrchestratorToken};
use crate::messages::{DefaultCatalog, MessageCatalog};
use crate::plugin::{
    AdvanceReport, DefaultIsolationProvider, IsolationProvider, PluginLoader, PluginState, SymbolTable,
};

/// Namespace of components supplied by the embedding application
pub const HOST_NAMESPACE: &str = "host";

const NEW: CallSite = CallSite::new("Runtime", "new");
const START: CallSite = CallSite::new("Runtime", "start");
const SHUTDOWN: CallSite = CallSite::new("Runtime", "shutdown");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePhase {
    Built,
    Starting,
    Started,
    Failed,
    ShutDown,
}

impl fmt::Display for RuntimePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuntimePhase::Built => "built",
            RuntimePhase::Starting => "starting",
            RuntimePhase::Started => "started",
            RuntimePhase::Failed => "failed",
            RuntimePhase::ShutDown => "shut down",
        };
        f.write_str(label)
    }
}

/// What startup did
#[derive(Debug)]
pub struct StartupReport {
    /// Plugins loaded from the plugin directory
    pub discovered: Vec<String>,
    pub enabled: AdvanceReport,
    pub loaded: AdvanceReport,
    /// Every component creation attempt, in creation order
    pub components: Vec<CreationOutcome>,
}

impl StartupReport {
    pub fn components_created(&self) -> usize {
        self.components.iter().filter(|o| o.is_ok()).count()
    }

    pub fn component_failures(&self) -> Vec<&CreationOutcome> {
        self.components.iter().filter(|o| !o.is_ok()).collect()
    }

    /// Plugins whose hooks failed while enabling or loading
    pub fn plugin_failures(&self) -> Vec<&str> {
        self.enabled
            .iter()
            .chain(self.loaded.iter())
            .filter(|(_, result)| result.is_err())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug)]
pub struct ShutdownReport {
    pub stopped: AdvanceReport,
    pub disabled: AdvanceReport,
    /// Whether queued events drained before the timeout
    pub drained: bool,
}

/// Assembles a [`Runtime`]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    host_symbols: SymbolTable,
    host_components: Vec<ComponentDescriptor>,
    catalog: Option<Arc<dyn MessageCatalog>>,
    strategy: Option<Arc<dyn InstantiationStrategy>>,
    provider: Option<Arc<dyn IsolationProvider>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            host_symbols: SymbolTable::new(),
            host_components: Vec::new(),
            catalog: None,
            strategy: None,
            provider: None,
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Symbols plugins may resolve from the host
    pub fn host_symbols(mut self, symbols: SymbolTable) -> Self {
        self.host_symbols = symbols;
        self
    }

    /// Add a component to the host namespace
    pub fn host_component(mut self, descriptor: ComponentDescriptor) -> Self {
        self.host_components.push(descriptor);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn MessageCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn instantiation(mut self, strategy: Arc<dyn InstantiationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Replace the default isolation provider; host symbols are then unused
    pub fn isolation_provider(mut self, provider: Arc<dyn IsolationProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn build(self) -> RuntimeResult<Runtime> {
        let errors = Arc::new(ErrorHandlerRegistry::new());
        let bus = Arc::new(LifecycleBus::with_config(self.config.bus_config(), Arc::clone(&errors)));

        let catalog: Arc<dyn MessageCatalog> = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(DefaultCatalog::for_locale(&self.config.locale)),
        };
        let strategy: Arc<dyn InstantiationStrategy> = match self.strategy {
            Some(strategy) => strategy,
            None => Arc::new(FactoryInstantiation::new()),
        };
        let provider: Arc<dyn IsolationProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(DefaultIsolationProvider::new(
                Arc::new(self.host_symbols),
                self.config.cache_dir.clone(),
            )),
        };

        let token = OrchestratorToken::issue(NEW);
        let loader = PluginLoader::new(&token, Arc::clone(&bus), provider, self.config.loader_config())?;
        let pipeline = ComponentPipeline::with_strategy(Arc::clone(&bus), Arc::clone(&errors), strategy);

        Ok(Runtime {
            bus,
            errors,
            pipeline,
            loader,
            catalog,
            host: ComponentNamespace::new(HOST_NAMESPACE, self.host_components),
            config: self.config,
            phase: Mutex::new(RuntimePhase::Built),
        })
    }
}

pub struct Runtime {
    bus: Arc<LifecycleBus>,
    errors: Arc<ErrorHandlerRegistry>,
    pipeline: ComponentPipeline,
    loader: PluginLoader,
    catalog: Arc<dyn MessageCatalog>,
    host: ComponentNamespace,
    config: RuntimeConfig,
    phase: Mutex<RuntimePhase>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Run the startup sequence once
    pub fn start(&self) -> RuntimeResult<StartupReport> {
        self.enter(&[RuntimePhase::Built], RuntimePhase::Starting)?;
        let outcome = self.run_startup();
        self.settle(RuntimePhase::Started, &outcome);
        outcome
    }

    fn run_startup(&self) -> RuntimeResult<StartupReport> {
        let token = OrchestratorToken::issue(START);

        let discovered = if self.config.plugin_dir.is_dir() {
            self.loader.discover_and_load(&token, &self.config.plugin_dir)?
        } else {
            info!("Plugin directory {} not found, no plugins loaded", self.config.plugin_dir.display());
            Vec::new()
        };

        let mut components = self.pipeline.create_all(&token, &runtime_namespace(Arc::clone(&self.catalog)))?;
        components.extend(self.pipeline.create_all(&token, &self.host)?);

        let enabled = self.loader.advance_all(&token, PluginState::Enabled)?;
        let loaded = self.loader.advance_all(&token, PluginState::Loaded)?;

        for namespace in self.loader.loaded_namespaces() {
            components.extend(self.pipeline.create_all(&token, &namespace)?);
        }

        let report = StartupReport {
            discovered,
            enabled,
            loaded,
            components,
        };
        info!(
            "Runtime started: {} plugin(s), {} component(s)",
            self.loader.all_plugins().len(),
            report.components_created()
        );
        for name in report.plugin_failures() {
            warn!("Plugin '{}' did not reach Loaded", name);
        }
        Ok(report)
    }

    /// Stop and disable every plugin, then drain and stop the bus
    pub fn shutdown(&self) -> RuntimeResult<ShutdownReport> {
        self.enter(&[RuntimePhase::Started, RuntimePhase::Failed], RuntimePhase::ShutDown)?;
        let token = OrchestratorToken::issue(SHUTDOWN);

        let stopped = self.loader.advance_all(&token, PluginState::Stopped)?;
        let disabled = self.loader.advance_all(&token, PluginState::Disabled)?;

        let drained = self.bus.wait_idle(self.config.shutdown_timeout);
        if !drained {
            warn!("Event queue did not drain within {:?}", self.config.shutdown_timeout);
        }
        self.bus.shutdown();
        info!("Runtime shut down");

        Ok(ShutdownReport {
            stopped,
            disabled,
            drained,
        })
    }

    fn enter(&self, expected: &[RuntimePhase], next: RuntimePhase) -> RuntimeResult<()> {
        let mut phase = self.phase.lock();
        if !expected.contains(&*phase) {
            return Err(GuardError::misuse(format!("runtime is {}, cannot move to {}", *phase, next)).into());
        }
        *phase = next;
        Ok(())
    }

    /// Record how a phase change that was in progress ended
    fn settle<T>(&self, success: RuntimePhase, outcome: &RuntimeResult<T>) {
        let next = match outcome {
            Ok(_) => success,
            Err(e) => {
                warn!("Runtime failed while {}: {}", *self.phase.lock(), e);
                RuntimePhase::Failed
            }
        };
        *self.phase.lock() = next;
    }

    pub fn phase(&self) -> RuntimePhase {
        *self.phase.lock()
    }

    pub fn bus(&self) -> &Arc<LifecycleBus> {
        &self.bus
    }

    pub fn error_handlers(&self) -> &Arc<ErrorHandlerRegistry> {
        &self.errors
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn pipeline(&self) -> &ComponentPipeline {
        &self.pipeline
    }

    pub fn components(&self) -> &ComponentRegistry {
        self.pipeline.registry()
    }

    pub fn catalog(&self) -> &Arc<dyn MessageCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Subscribers and handlers can be plugin components; release them
        // while the plugins' isolation units still hold their code
        self.bus.shutdown();
        self.bus.clear_subscribers();
        self.errors.clear();
    }
}
