//! Shared fixtures for the integration tests
//!
//! Plugin entry points exposed through a host symbol table, zip package
//! writers, and a recorder that subscribes to a runtime's lifecycle bus.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use parking_lot::{const_mutex, Mutex};
use zip::write::FileOptions;
use zip::ZipWriter;

use plinth::component::{Component, ComponentDescriptor};
use plinth::config::RuntimeConfig;
use plinth::events::{DeliveryMode, EventEnvelope, EventResult, FnSubscriber, LifecycleEvent};
use plinth::plugin::{HookResult, PluginEntry, SymbolTable};
use plinth::runtime::{Runtime, RuntimeBuilder};

/// Hooks run by [`AuditedPlugin`] instances, as `plugin:hook`.
/// Tests share the log, so each entry point backs at most one test.
static AUDIT: Mutex<Vec<String>> = const_mutex(Vec::new());

/// Entry point that records its hooks in the shared audit log
pub struct AuditedPlugin {
    name: &'static str,
}

impl AuditedPlugin {
    fn record(&self, hook: &str) -> HookResult {
        AUDIT.lock().push(format!("{}:{}", self.name, hook));
        Ok(())
    }
}

impl PluginEntry for AuditedPlugin {
    fn on_enable(&mut self) -> HookResult {
        self.record("on_enable")
    }

    fn on_load(&mut self) -> HookResult {
        self.record("on_load")
    }

    fn on_stop(&mut self) -> HookResult {
        self.record("on_stop")
    }

    fn on_disable(&mut self) -> HookResult {
        self.record("on_disable")
    }
}

/// Entry point whose `on_load` hook always fails
pub struct StubbornPlugin;

impl PluginEntry for StubbornPlugin {
    fn on_load(&mut self) -> HookResult {
        bail!("database unreachable")
    }
}

pub fn alpha_entry() -> Box<dyn PluginEntry> {
    Box::new(AuditedPlugin { name: "Alpha" })
}

pub fn gamma_entry() -> Box<dyn PluginEntry> {
    Box::new(AuditedPlugin { name: "Gamma" })
}

pub fn delta_entry() -> Box<dyn PluginEntry> {
    Box::new(AuditedPlugin { name: "Delta" })
}

pub fn stubborn_entry() -> Box<dyn PluginEntry> {
    Box::new(StubbornPlugin)
}

/// Audit entries recorded for `plugin`, in order
pub fn audit_of(plugin: &str) -> Vec<String> {
    let prefix = format!("{}:", plugin);
    AUDIT
        .lock()
        .iter()
        .filter(|entry| entry.starts_with(&prefix))
        .map(|entry| entry[prefix.len()..].to_string())
        .collect()
}

/// Component exported by the Alpha plugin's module
#[derive(Default)]
pub struct AlphaService;

impl Component for AlphaService {}

/// Symbols the host exposes to packages
pub fn host_symbols() -> SymbolTable {
    SymbolTable::new()
        .with_plugin("acme::alpha::AlphaPlugin", alpha_entry)
        .with_plugin("acme::gamma::GammaPlugin", gamma_entry)
        .with_plugin("acme::delta::DeltaPlugin", delta_entry)
        .with_plugin("acme::stubborn::StubbornPlugin", stubborn_entry)
        .with_component("acme::alpha", ComponentDescriptor::of::<AlphaService>())
}

/// Manifest text; `None` leaves the author out
pub fn manifest(name: &str, main_class: &str, api_version: &str, author: Option<&str>) -> String {
    let mut text = format!("name: {}\nmain-class: {}\napi-version: '{}'\n", name, main_class, api_version);
    if let Some(author) = author {
        text.push_str(&format!("author: {}\n", author));
    }
    text
}

/// Write a zip package holding `manifest` as its `plugin.yml`
pub fn write_package(dir: &Path, file_name: &str, manifest: &str) -> PathBuf {
    let path = dir.join(file_name);
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    writer.start_file("plugin.yml", FileOptions::default()).unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

pub fn config_for(plugin_dir: &Path) -> RuntimeConfig {
    RuntimeConfig {
        plugin_dir: plugin_dir.to_path_buf(),
        cache_dir: plugin_dir.join(".cache"),
        event_workers: 2,
        event_queue_capacity: 32,
        shutdown_timeout: Duration::from_secs(5),
        ..RuntimeConfig::default()
    }
}

/// Builder over `plugin_dir` with the fixture host symbols
pub fn builder_for(plugin_dir: &Path) -> RuntimeBuilder {
    Runtime::builder().config(config_for(plugin_dir)).host_symbols(host_symbols())
}

/// Subscribe a recorder to `runtime`'s bus on `mode`
pub fn record_events(runtime: &Runtime, id: &str, mode: DeliveryMode) -> Arc<Mutex<Vec<LifecycleEvent>>> {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let writer = Arc::clone(&sink);
    let subscriber = FnSubscriber::new(id, move |envelope: &EventEnvelope<LifecycleEvent>| -> EventResult<()> {
        writer.lock().push(envelope.event().clone());
        Ok(())
    });
    runtime.bus().subscribe(Arc::new(subscriber), mode).unwrap();
    sink
}

/// Display text of recorded events
pub fn labels(events: &Mutex<Vec<LifecycleEvent>>) -> Vec<String> {
    events.lock().iter().map(|event| event.to_string()).collect()
}
