//! Plugin System Module
//!
//! Loads plugin packages into isolation units, keeps them in a registry and
//! drives each through its state machine.
//!
//! # Example Usage
//!
//! ```no_run
//! use plinth::plugin::{PluginDescriptor, PluginState};
//!
//! let descriptor = PluginDescriptor::from_yaml(
//!     "name: Alpha\nmain-class: demo::alpha::AlphaPlugin\napi-version: '2.0'\nauthor: Ada\n",
//! )?;
//! assert_eq!(descriptor.namespace(), "demo::alpha");
//! assert!(PluginState::Registered.can_advance_to(PluginState::Enabled));
//! # Ok::<(), plinth::plugin::PluginError>(())
//! ```

pub mod descriptor;
pub mod entry;
pub mod error;
pub mod isolation;
pub mod loader;
pub mod registry;
pub mod state;

#[cfg(test)]
pub mod tests;

pub use descriptor::{PluginDescriptor, MANIFEST_NAME};
pub use entry::{
    export_symbol, no_components, ComponentExport, EntryConstructor, EntryPointDecl, HookResult,
    PluginEntry, PLUGIN_CONTRACT,
};
pub use error::{PluginError, PluginResult};
pub use isolation::{
    DefaultIsolationProvider, HostIsolation, IsolationProvider, IsolationUnit, NativeIsolation,
    Symbol, SymbolTable,
};
pub use loader::{AdvanceReport, LoaderConfig, PluginLoader, DEFAULT_PACKAGE_EXTENSION};
pub use registry::{Plugin, PluginRegistry};
pub use state::{LifecycleHook, PluginState};
