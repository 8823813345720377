//! Built-in Runtime Components
//!
//! The runtime's own namespace, created before the host's:
//!
//! * [`ExceptionHandlerResolver`] registers methods marked
//!   `exception-handler` with the error handler registry. The marker value
//!   names the [`ErrorKind`]; without a value the method becomes the generic
//!   handler.
//! * [`SubscriberResolver`] subscribes components marked `event-subscriber`
//!   to the lifecycle bus. The marker value selects `sync`, `async` or `both`.
//! * [`LifecycleJournal`] logs every lifecycle event.
//! * [`DefaultErrorReporter`] is the generic error handler, logging errors
//!   through the message catalogue.

use std::any::Any;
use std::sync::Arc;

use log::{debug, error};

use super::descriptor::{ComponentDescriptor, Marker, MarkerId, MethodDescriptor, ParamType};
use super::error::{ComponentError, ComponentResult};
use super::namespace::{ComponentNamespace, RUNTIME_NAMESPACE};
use super::traits::{ClassResolver, Component, MethodResolver, ResolveContext};
use crate::errors::{ErrorHandler, ErrorKind, RuntimeError, ThreadInfo};
use crate::events::{DeliveryMode, EventEnvelope, EventResult, LifecycleEvent, Subscriber};
use crate::messages::MessageCatalog;

pub const EXCEPTION_HANDLER: MarkerId = MarkerId::from_static("exception-handler");
pub const EVENT_SUBSCRIBER: MarkerId = MarkerId::from_static("event-subscriber");

/// Parse a delivery mode marker value; absent means synchronous
pub fn parse_delivery_mode(value: Option<&str>) -> Option<DeliveryMode> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("sync") => Some(DeliveryMode::SYNC),
        Some("async") => Some(DeliveryMode::ASYNC),
        Some("both") => Some(DeliveryMode::BOTH),
        Some(_) => None,
    }
}

#[derive(Default)]
pub struct ExceptionHandlerResolver;

impl ExceptionHandlerResolver {
    fn expected_shape() -> [ParamType; 2] {
        [ParamType::of::<ThreadInfo>(), ParamType::of::<RuntimeError>()]
    }
}

impl Component for ExceptionHandlerResolver {
    fn as_method_resolver(&self) -> Option<&dyn MethodResolver> {
        Some(self)
    }
}

impl MethodResolver for ExceptionHandlerResolver {
    fn resolve_method(
        &self,
        ctx: &ResolveContext<'_>,
        component: &Arc<dyn Component>,
        method: &MethodDescriptor,
        marker: &Marker,
    ) -> ComponentResult<()> {
        self.check_argument_shape(method, &Self::expected_shape())?;

        let kind = match marker.value() {
            Some(value) => Some(value.parse::<ErrorKind>().map_err(|e| {
                ComponentError::invocation_failed(method.name(), e)
            })?),
            None => None,
        };

        let target = Arc::clone(component);
        let invoker = Arc::clone(method.invoker());
        let method_name = format!("{}::{}", ctx.component_name, method.name());
        let handler: Arc<dyn ErrorHandler> = Arc::new(move |thread: &ThreadInfo, err: &RuntimeError| {
            let args: [&dyn Any; 2] = [thread, err];
            if let Err(e) = invoker(&*target, &args) {
                error!("Exception handler {} failed: {}", method_name, e);
            }
        });

        match kind {
            Some(kind) => {
                debug!("{}::{} handles {}", ctx.component_name, method.name(), kind);
                ctx.errors.register(kind, handler);
            }
            None => {
                debug!("{}::{} is the generic exception handler", ctx.component_name, method.name());
                ctx.errors.set_generic(handler);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SubscriberResolver;

impl Component for SubscriberResolver {
    fn as_class_resolver(&self) -> Option<&dyn ClassResolver> {
        Some(self)
    }
}

impl ClassResolver for SubscriberResolver {
    fn resolve_class(
        &self,
        ctx: &ResolveContext<'_>,
        component: &Arc<dyn Component>,
        descriptor: &ComponentDescriptor,
        marker: &Marker,
    ) -> ComponentResult<()> {
        let mode = parse_delivery_mode(marker.value()).ok_or_else(|| {
            ComponentError::resolver_failed(
                "SubscriberResolver",
                ctx.component_name,
                format!("unknown delivery mode '{}'", marker.value().unwrap_or_default()),
            )
        })?;

        let subscriber = Arc::clone(component).as_subscriber().ok_or_else(|| {
            ComponentError::resolver_failed(
                "SubscriberResolver",
                ctx.component_name,
                format!("{} is marked {} but is not a subscriber", descriptor.type_name(), EVENT_SUBSCRIBER),
            )
        })?;

        ctx.bus.subscribe(subscriber, mode).map_err(|e| {
            ComponentError::resolver_failed("SubscriberResolver", ctx.component_name, e.to_string())
        })
    }
}

/// Logs every lifecycle event at debug level
#[derive(Default)]
pub struct LifecycleJournal;

impl Component for LifecycleJournal {
    fn as_subscriber(self: Arc<Self>) -> Option<Arc<dyn Subscriber<LifecycleEvent>>> {
        Some(self)
    }
}

impl Subscriber<LifecycleEvent> for LifecycleJournal {
    fn handle_event(&self, event: &EventEnvelope<LifecycleEvent>) -> EventResult<()> {
        debug!("[{}] {}", event.correlation(), event.event());
        Ok(())
    }

    fn subscriber_id(&self) -> &str {
        "lifecycle-journal"
    }
}

/// Generic error handler logging through the message catalogue
pub struct DefaultErrorReporter {
    catalog: Arc<dyn MessageCatalog>,
}

impl DefaultErrorReporter {
    pub fn new(catalog: Arc<dyn MessageCatalog>) -> Self {
        Self { catalog }
    }

    pub fn report(&self, thread: &ThreadInfo, err: &RuntimeError) -> ComponentResult<()> {
        error!("[{}] {}", thread.name(), err.describe(self.catalog.as_ref()));
        Ok(())
    }
}

impl Component for DefaultErrorReporter {}

/// The runtime's own component namespace
pub fn runtime_namespace(catalog: Arc<dyn MessageCatalog>) -> ComponentNamespace {
    ComponentNamespace::empty(RUNTIME_NAMESPACE)
        .with(
            ComponentDescriptor::of::<ExceptionHandlerResolver>()
                .order(-100)
                .resolves(EXCEPTION_HANDLER),
        )
        .with(
            ComponentDescriptor::of::<SubscriberResolver>()
                .order(-100)
                .resolves(EVENT_SUBSCRIBER),
        )
        .with(ComponentDescriptor::of::<LifecycleJournal>().marked(Marker::new(EVENT_SUBSCRIBER)))
        .with(
            ComponentDescriptor::with_constructor(move || DefaultErrorReporter::new(Arc::clone(&catalog)))
                .method(
                    MethodDescriptor::binary::<DefaultErrorReporter, ThreadInfo, RuntimeError, _>(
                        "report",
                        DefaultErrorReporter::report,
                    )
                    .marked(Marker::new(EXCEPTION_HANDLER)),
                ),
        )
}
