//! Integration Tests for Error Routing
//!
//! Failures never reach the publisher or the orchestrator's caller directly;
//! they are routed by kind to error handlers:
//! - load failures during discovery
//! - subscriber failures on either bus channel
//! - handlers wired from `exception-handler` method markers
//! - panics on arbitrary threads through the panic hook

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use plinth::component::{
    Component, ComponentDescriptor, ComponentResult, Marker, MethodDescriptor, EVENT_SUBSCRIBER,
    EXCEPTION_HANDLER,
};
use plinth::errors::{install_panic_hook, ErrorHandler, ErrorKind, HandlingOutcome, RuntimeError, ThreadInfo};
use plinth::events::{
    Channel, DeliveryMode, EventEnvelope, EventError, EventResult, FnSubscriber, LifecycleEvent,
    LifecycleEventKind, Subscriber,
};
use plinth::plugin::PluginState;
use tempfile::TempDir;

use common::*;

type Caught = Arc<Mutex<Vec<(String, RuntimeError)>>>;

fn catching(sink: &Caught) -> Arc<dyn ErrorHandler> {
    let sink = Arc::clone(sink);
    Arc::new(move |thread: &ThreadInfo, err: &RuntimeError| {
        sink.lock().push((thread.name().to_string(), err.clone()));
    })
}

/// Subscriber rejecting every state change it sees
struct Grumpy;

impl Component for Grumpy {
    fn as_subscriber(self: Arc<Self>) -> Option<Arc<dyn Subscriber<LifecycleEvent>>> {
        Some(self)
    }
}

impl Subscriber<LifecycleEvent> for Grumpy {
    fn handle_event(&self, event: &EventEnvelope<LifecycleEvent>) -> EventResult<()> {
        match event.event().kind {
            LifecycleEventKind::StateChange { .. } => Err(EventError::handler_failed("not today")),
            _ => Ok(()),
        }
    }

    fn subscriber_id(&self) -> &str {
        "grumpy"
    }
}

/// Host component whose `record` method handles subscriber failures
struct Catcher {
    seen: Caught,
}

impl Catcher {
    fn record(&self, thread: &ThreadInfo, err: &RuntimeError) -> ComponentResult<()> {
        self.seen.lock().push((thread.name().to_string(), err.clone()));
        Ok(())
    }
}

impl Component for Catcher {}

#[test]
fn test_load_failure_reaches_registered_handler() {
    let dir = TempDir::new().unwrap();
    write_package(dir.path(), "anonymous.plx", &manifest("Anonymous", "acme::gamma::GammaPlugin", "2.0", None));

    let runtime = builder_for(dir.path()).build().unwrap();
    let caught: Caught = Arc::default();
    runtime.error_handlers().register(ErrorKind::PluginLoadFailed, catching(&caught));

    runtime.start().unwrap();

    let caught = caught.lock();
    assert_eq!(caught.len(), 1);
    let (_, err) = &caught[0];
    assert_eq!(err.kind(), ErrorKind::PluginLoadFailed);
    assert!(err.to_string().contains("anonymous.plx"));
    assert!(err.to_string().contains("Missing descriptor field: author"));
    assert_eq!(runtime.error_handlers().escalation_count(), 0);
}

#[test]
fn test_subscriber_failure_reaches_marked_method() {
    let dir = TempDir::new().unwrap();
    write_package(
        dir.path(),
        "gamma.plx",
        &manifest("Gamma", "acme::gamma::GammaPlugin", "2.0", Some("Grace Hopper")),
    );

    let caught: Caught = Arc::default();
    let sink = Arc::clone(&caught);
    let runtime = builder_for(dir.path())
        .host_component(
            ComponentDescriptor::with_constructor(move || Catcher { seen: Arc::clone(&sink) }).method(
                MethodDescriptor::binary::<Catcher, ThreadInfo, RuntimeError, _>("record", Catcher::record)
                    .marked(Marker::with_value(EXCEPTION_HANDLER, "LifecycleEventError")),
            ),
        )
        .host_component(
            ComponentDescriptor::with_constructor(|| Grumpy)
                .order(1)
                .marked(Marker::with_value(EVENT_SUBSCRIBER, "sync")),
        )
        .build()
        .unwrap();

    runtime.start().unwrap();
    assert_eq!(runtime.loader().state_of("Gamma"), Some(PluginState::Loaded));

    let caught = caught.lock();
    // Pre and Post for both the Enabled and the Loaded transition
    assert_eq!(caught.len(), 4);
    for (_, err) in caught.iter() {
        assert_eq!(err.kind(), ErrorKind::LifecycleEventError);
        match err {
            RuntimeError::Event(event_err) => {
                assert_eq!(event_err.channel(), Some(Channel::Sync));
                assert!(event_err.to_string().contains("grumpy"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}

#[test]
fn test_async_subscriber_failure_is_routed_from_worker() {
    let dir = TempDir::new().unwrap();
    let runtime = builder_for(dir.path()).build().unwrap();
    let caught: Caught = Arc::default();
    runtime.error_handlers().register(ErrorKind::LifecycleEventError, catching(&caught));

    let failing = FnSubscriber::new("fragile", |_: &EventEnvelope<LifecycleEvent>| -> EventResult<()> {
        Err(EventError::handler_failed("queue full"))
    });
    runtime.bus().subscribe(Arc::new(failing), DeliveryMode::ASYNC).unwrap();

    runtime.bus().emit(LifecycleEvent::notice(LifecycleEventKind::AdvanceAll {
        target: PluginState::Enabled,
    }));
    assert!(runtime.bus().wait_idle(Duration::from_secs(5)));

    let caught = caught.lock();
    assert_eq!(caught.len(), 1);
    let (thread, err) = &caught[0];
    assert!(thread.starts_with("plinth-events-"));
    match err {
        RuntimeError::Event(event_err) => assert_eq!(event_err.channel(), Some(Channel::Async)),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(runtime.bus().stats().delivery_failures, 1);
}

#[test]
fn test_generic_handler_exists_only_after_start() {
    let dir = TempDir::new().unwrap();
    let runtime = builder_for(dir.path()).build().unwrap();
    let orphan = RuntimeError::panic("worker", "lost");

    assert_eq!(runtime.error_handlers().handle_current(&orphan), HandlingOutcome::Escalated);
    assert_eq!(runtime.error_handlers().escalation_count(), 1);

    runtime.start().unwrap();
    assert!(runtime.error_handlers().has_generic());
    assert_eq!(runtime.error_handlers().handle_current(&orphan), HandlingOutcome::Generic);
    assert_eq!(runtime.error_handlers().escalation_count(), 1);
}

#[test]
fn test_panics_are_routed_through_the_hook() {
    let dir = TempDir::new().unwrap();
    let runtime = builder_for(dir.path()).build().unwrap();
    let caught: Caught = Arc::default();
    runtime.error_handlers().register(ErrorKind::Panic, catching(&caught));
    install_panic_hook(Arc::clone(runtime.error_handlers()));

    let outcome = thread::Builder::new()
        .name("plugin-worker".to_string())
        .spawn(|| panic!("worker gave up"))
        .unwrap()
        .join();
    assert!(outcome.is_err());

    let caught = caught.lock();
    let (thread, err) = caught
        .iter()
        .find(|(thread, _)| thread == "plugin-worker")
        .expect("panic was not routed");
    assert_eq!(thread, "plugin-worker");
    assert_eq!(err.kind(), ErrorKind::Panic);
    assert!(err.to_string().contains("worker gave up"));
}

#[test]
fn test_contained_subscriber_panic_is_routed_once() {
    let dir = TempDir::new().unwrap();
    let runtime = builder_for(dir.path()).build().unwrap();
    let caught: Caught = Arc::default();
    runtime.error_handlers().register(ErrorKind::Panic, catching(&caught));
    runtime.error_handlers().register(ErrorKind::LifecycleEventError, catching(&caught));
    install_panic_hook(Arc::clone(runtime.error_handlers()));

    let exploding = FnSubscriber::new("exploding", |_: &EventEnvelope<LifecycleEvent>| -> EventResult<()> {
        panic!("subscriber blew up")
    });
    runtime.bus().subscribe(Arc::new(exploding), DeliveryMode::SYNC).unwrap();
    runtime.bus().emit(LifecycleEvent::notice(LifecycleEventKind::AdvanceAll {
        target: PluginState::Enabled,
    }));

    // Other tests share the process-wide hook; keep what surfaced on this thread
    let here = thread::current().name().unwrap_or("<unnamed>").to_string();
    let kinds: Vec<ErrorKind> = caught
        .lock()
        .iter()
        .filter(|(thread, _)| *thread == here)
        .map(|(_, err)| err.kind())
        .collect();
    assert_eq!(kinds, vec![ErrorKind::LifecycleEventError]);
}

#[test]
fn test_panicking_panic_handler_falls_back_to_generic() {
    let dir = TempDir::new().unwrap();
    let runtime = builder_for(dir.path()).build().unwrap();
    runtime.error_handlers().register(
        ErrorKind::Panic,
        Arc::new(|_: &ThreadInfo, _: &RuntimeError| panic!("handler broke too")),
    );
    let caught: Caught = Arc::default();
    runtime.error_handlers().set_generic(catching(&caught));
    install_panic_hook(Arc::clone(runtime.error_handlers()));

    let outcome = thread::Builder::new()
        .name("fragile-worker".to_string())
        .spawn(|| panic!("worker tripped"))
        .unwrap()
        .join();
    assert!(outcome.is_err());

    let caught = caught.lock();
    let (_, err) = caught
        .iter()
        .find(|(thread, _)| thread == "fragile-worker")
        .expect("panic did not reach the generic handler");
    assert_eq!(err.kind(), ErrorKind::Panic);
    assert!(err.to_string().contains("worker tripped"));
}
