//! Integration Tests for Runtime Startup and Shutdown
//!
//! Covers the composition root: phase enforcement, component passes in
//! order, host components wired by the built-in resolvers, and configuration
//! loaded from a TOML file.

mod common;

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use plinth::component::{Component, ComponentDescriptor, Marker, EVENT_SUBSCRIBER};
use plinth::config::ConfigManager;
use plinth::errors::ErrorKind;
use plinth::events::{DeliveryMode, EventEnvelope, EventResult, LifecycleEvent, Subscriber};
use plinth::runtime::{Runtime, RuntimePhase, HOST_NAMESPACE};
use tempfile::TempDir;

use common::*;

#[derive(Default)]
struct Clock;

impl Component for Clock {}

#[derive(Default)]
struct Scheduler;

impl Component for Scheduler {}

/// Host component subscribed through its `event-subscriber` marker
struct Watcher {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Component for Watcher {
    fn as_subscriber(self: Arc<Self>) -> Option<Arc<dyn Subscriber<LifecycleEvent>>> {
        Some(self)
    }
}

impl Subscriber<LifecycleEvent> for Watcher {
    fn handle_event(&self, event: &EventEnvelope<LifecycleEvent>) -> EventResult<()> {
        self.seen.lock().push(event.event().to_string());
        Ok(())
    }

    fn subscriber_id(&self) -> &str {
        "watcher"
    }
}

#[test]
fn test_component_passes_run_in_order() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "alpha.plx",
        &manifest("Alpha", "acme::alpha::AlphaPlugin", "2.0", Some("Ada Lovelace")),
    );

    let runtime = builder_for(dir.path())
        .host_component(ComponentDescriptor::of::<Scheduler>().order(5))
        .host_component(ComponentDescriptor::of::<Clock>().order(1))
        .build()
        .unwrap();
    let events = record_events(&runtime, "events", DeliveryMode::SYNC);
    runtime.start().unwrap();

    let passes: Vec<String> = labels(&events)
        .into_iter()
        .filter(|label| label.starts_with("Pre CreateAll"))
        .collect();
    assert_eq!(
        passes,
        vec!["Pre CreateAll(plinth::runtime)", "Pre CreateAll(host)", "Pre CreateAll(acme::alpha)"]
    );

    let host_loads: Vec<String> = labels(&events)
        .into_iter()
        .filter(|label| label.starts_with("Post ComponentLoad") && !label.contains("plinth::"))
        .collect();
    assert_eq!(host_loads.len(), 3);
    assert!(host_loads[0].contains("Clock"));
    assert!(host_loads[1].contains("Scheduler"));
    assert!(host_loads[2].contains("AlphaService"));
}

#[test]
fn test_host_subscriber_is_wired_by_marker() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "gamma.plx",
        &manifest("Gamma", "acme::gamma::GammaPlugin", "2.0", Some("Grace Hopper")),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let runtime = builder_for(dir.path())
        .host_component(
            ComponentDescriptor::with_constructor(move || Watcher { seen: Arc::clone(&sink) })
                .marked(Marker::with_value(EVENT_SUBSCRIBER, "sync")),
        )
        .build()
        .unwrap();
    runtime.start().unwrap();

    assert!(runtime.bus().has_subscriber("watcher"));
    let seen = seen.lock().clone();
    assert!(seen.contains(&"Post StateChange(Gamma: Enabled -> Loaded)".to_string()));
    assert!(!seen.iter().any(|label| label.contains("PluginDiscovery")));
}

#[test]
fn test_phases_are_enforced() {
    let dir = TempDir::new().unwrap();
    let runtime = builder_for(dir.path()).build().unwrap();
    assert_eq!(runtime.phase(), RuntimePhase::Built);

    assert_eq!(runtime.shutdown().unwrap_err().kind(), ErrorKind::GuardMisuse);

    let report = runtime.start().unwrap();
    assert!(report.discovered.is_empty());
    assert_eq!(runtime.phase(), RuntimePhase::Started);
    assert_eq!(runtime.start().unwrap_err().kind(), ErrorKind::GuardMisuse);

    let shutdown = runtime.shutdown().unwrap();
    assert!(shutdown.drained);
    assert!(runtime.bus().is_shut_down());
    assert_eq!(runtime.phase(), RuntimePhase::ShutDown);
}

#[test]
fn test_missing_plugin_dir_starts_empty() {
    let dir = TempDir::new().unwrap();
    let runtime = builder_for(&dir.path().join("absent"))
        .host_component(ComponentDescriptor::of::<Clock>())
        .build()
        .unwrap();

    let report = runtime.start().unwrap();
    assert!(report.discovered.is_empty());
    assert!(runtime.loader().all_plugins().is_empty());
    assert_eq!(runtime.components().names_in(HOST_NAMESPACE), vec!["Clock"]);
    assert!(runtime.bus().has_subscriber("lifecycle-journal"));
}

#[test]
fn test_runtime_built_from_config_file() {
    let dir = TempDir::new().unwrap();
    let plugins = dir.path().join("packages");
    fs::create_dir(&plugins).unwrap();
    write_package(
        &plugins,
        "gamma.bundle",
        &manifest("Gamma", "acme::gamma::GammaPlugin", "1.3", Some("Grace Hopper")),
    );
    write_package(
        &plugins,
        "alpha.plx",
        &manifest("Alpha", "acme::alpha::AlphaPlugin", "2.0", Some("Ada Lovelace")),
    );

    let config_path = dir.path().join("plinth.toml");
    fs::write(
        &config_path,
        format!(
            "[runtime]\nplugin-dir = \"{}\"\npackage-extension = \".bundle\"\n\n[events]\nworkers = 1\nqueue-capacity = 8\n",
            plugins.display()
        ),
    )
    .unwrap();

    let config = ConfigManager::load_from_file(config_path).unwrap().runtime_config().unwrap();
    assert_eq!(config.package_extension, "bundle");
    assert_eq!(config.event_workers, 1);

    let runtime = Runtime::builder().config(config).host_symbols(host_symbols()).build().unwrap();
    let report = runtime.start().unwrap();
    assert_eq!(report.discovered, vec!["Gamma".to_string()]);
}
