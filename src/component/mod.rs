//! Component Creation Pipeline
//!
//! Components are the host application's internal building blocks. They are
//! declared with [`ComponentDescriptor`]s, grouped into
//! [`ComponentNamespace`]s, and created by the [`ComponentPipeline`] in a
//! deterministic order. Resolver components wire later components through the
//! markers attached to their descriptors.

pub mod builtin;
pub mod descriptor;
pub mod error;
pub mod instantiation;
pub mod namespace;
pub mod pipeline;
pub mod traits;

pub use builtin::{
    runtime_namespace, DefaultErrorReporter, ExceptionHandlerResolver, LifecycleJournal,
    SubscriberResolver, EVENT_SUBSCRIBER, EXCEPTION_HANDLER,
};
pub use descriptor::{
    ComponentDescriptor, ComponentMarker, Marker, MarkerId, MethodDescriptor, ParamType,
};
pub use error::{ComponentError, ComponentResult};
pub use instantiation::{FactoryInstantiation, InstantiationStrategy};
pub use namespace::{ComponentNamespace, ComponentRegistry, RegisteredComponent, RUNTIME_NAMESPACE};
pub use pipeline::{ComponentPipeline, CreationOutcome};
pub use traits::{AsAny, ClassResolver, Component, MethodResolver, ResolveContext};
