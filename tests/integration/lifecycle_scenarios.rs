//! Integration Tests for Plugin Lifecycle Scenarios
//!
//! Drives real zip packages through a runtime:
//! - discovery with a malformed package alongside a good one
//! - the full hook cycle from startup to shutdown
//! - Pre/Post pairing of state change events
//! - hook failures leaving a plugin behind

mod common;

use std::time::Duration;

use plinth::events::{DeliveryMode, LifecycleEventKind, Phase};
use plinth::plugin::{PluginError, PluginState};
use tempfile::TempDir;

use common::*;

#[test]
fn test_discovery_skips_package_without_author() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "alpha.plx",
        &manifest("Alpha", "acme::alpha::AlphaPlugin", "2.0", Some("Ada Lovelace")),
    );
    write_package(dir.path(), "anonymous.plx", &manifest("Anonymous", "acme::gamma::GammaPlugin", "1.2", None));

    let runtime = builder_for(dir.path()).build().unwrap();
    let notices = record_events(&runtime, "notices", DeliveryMode::ASYNC);

    let report = runtime.start().unwrap();
    assert_eq!(report.discovered, vec!["Alpha".to_string()]);
    assert!(runtime.loader().is_registered("Alpha"));
    assert!(!runtime.loader().is_registered("Anonymous"));

    assert!(runtime.bus().wait_idle(Duration::from_secs(5)));
    let failures: Vec<_> = notices
        .lock()
        .iter()
        .filter(|event| matches!(event.kind, LifecycleEventKind::PluginLoadFailed { .. }))
        .cloned()
        .collect();
    assert_eq!(failures.len(), 1);

    let failure = &failures[0];
    assert_eq!(failure.phase, Phase::Notice);
    match &failure.kind {
        LifecycleEventKind::PluginLoadFailed { file, cause } => {
            assert_eq!(file.file_name().unwrap(), "anonymous.plx");
            match cause {
                PluginError::MissingDescriptorField { field } => assert_eq!(field, "author"),
                other => panic!("unexpected cause: {}", other),
            }
        }
        other => panic!("unexpected event: {}", other),
    }
}

#[test]
fn test_plugin_runs_every_hook_once() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "delta.plx",
        &manifest("Delta", "acme::delta::DeltaPlugin", "2.0", Some("Dana Scott")),
    );

    let runtime = builder_for(dir.path()).build().unwrap();
    runtime.start().unwrap();
    assert_eq!(runtime.loader().state_of("Delta"), Some(PluginState::Loaded));
    assert_eq!(audit_of("Delta"), vec!["on_enable", "on_load"]);

    let report = runtime.shutdown().unwrap();
    assert!(report.stopped["Delta"].is_ok());
    assert!(report.disabled["Delta"].is_ok());
    assert_eq!(runtime.loader().state_of("Delta"), Some(PluginState::Disabled));
    assert_eq!(audit_of("Delta"), vec!["on_enable", "on_load", "on_stop", "on_disable"]);

    runtime.loader().unload("Delta").unwrap();
    assert!(!runtime.loader().is_registered("Delta"));
}

#[test]
fn test_loaded_plugin_contributes_its_components() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "alpha.plx",
        &manifest("Alpha", "acme::alpha::AlphaPlugin", "2.0", Some("Ada Lovelace")),
    );

    let runtime = builder_for(dir.path()).build().unwrap();
    let report = runtime.start().unwrap();

    assert!(report.component_failures().is_empty());
    assert_eq!(runtime.components().names_in("acme::alpha"), vec!["AlphaService"]);
    let entry = runtime.components().entry("AlphaService").unwrap();
    assert!(entry.type_name().ends_with("AlphaService"));
}

#[test]
fn test_state_changes_are_bracketed() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "gamma.plx",
        &manifest("Gamma", "acme::gamma::GammaPlugin", "1.0", Some("Grace Hopper")),
    );

    let runtime = builder_for(dir.path()).build().unwrap();
    let events = record_events(&runtime, "events", DeliveryMode::SYNC);
    runtime.start().unwrap();

    let state_changes: Vec<String> = labels(&events)
        .into_iter()
        .filter(|label| label.contains("StateChange"))
        .collect();
    assert_eq!(
        state_changes,
        vec![
            "Pre StateChange(Gamma: Registered -> Enabled)",
            "Post StateChange(Gamma: Registered -> Enabled)",
            "Pre StateChange(Gamma: Enabled -> Loaded)",
            "Post StateChange(Gamma: Enabled -> Loaded)",
        ]
    );

    let bulk: Vec<String> = labels(&events)
        .into_iter()
        .filter(|label| label.contains("AdvanceAll"))
        .collect();
    assert_eq!(
        bulk,
        vec![
            "Pre AdvanceAll(Enabled)",
            "Post AdvanceAll(Enabled)",
            "Pre AdvanceAll(Loaded)",
            "Post AdvanceAll(Loaded)",
        ]
    );
}

#[test]
fn test_failing_hook_leaves_plugin_enabled() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "stubborn.plx",
        &manifest("Stubborn", "acme::stubborn::StubbornPlugin", "2.0", Some("Ops")),
    );

    let runtime = builder_for(dir.path()).build().unwrap();
    let events = record_events(&runtime, "events", DeliveryMode::SYNC);
    let report = runtime.start().unwrap();

    assert_eq!(report.plugin_failures(), vec!["Stubborn"]);
    assert_eq!(runtime.loader().state_of("Stubborn"), Some(PluginState::Enabled));
    let message = report.loaded["Stubborn"].as_ref().unwrap_err().to_string();
    assert!(message.contains("database unreachable"));

    let labels = labels(&events);
    assert!(labels.contains(&"Pre StateChange(Stubborn: Enabled -> Loaded)".to_string()));
    assert!(!labels.contains(&"Post StateChange(Stubborn: Enabled -> Loaded)".to_string()));
}

#[test]
fn test_unsupported_version_is_not_registered() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "future.plx",
        &manifest("Future", "acme::gamma::GammaPlugin", "9.0", Some("Marty")),
    );

    let runtime = builder_for(dir.path()).build().unwrap();
    let notices = record_events(&runtime, "notices", DeliveryMode::ASYNC);
    let report = runtime.start().unwrap();
    assert!(report.discovered.is_empty());

    assert!(runtime.bus().wait_idle(Duration::from_secs(5)));
    let causes: Vec<_> = notices
        .lock()
        .iter()
        .filter_map(|event| match &event.kind {
            LifecycleEventKind::PluginLoadFailed { cause, .. } => Some(cause.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(causes.len(), 1);
    assert!(matches!(causes[0], PluginError::UnsupportedPluginVersion { .. }));
}
